use bitflags::*;

use crate::hardware::ppu::Mode;

bitflags! {
    /// FF40 — LCDC. Never locked by the PPU, so every bit can change
    /// mid-scanline and the fetcher rereads it each dot.
    #[derive(Default)]
    pub struct LcdControl: u8 {
        /// DMG: background+window enable. CGB: BG/window master priority;
        /// when clear, sprites always win regardless of priority bits.
        const BG_WINDOW_PRIORITY = 0b0000_0001;
        const SPRITE_DISPLAY_ENABLE = 0b0000_0010;
        /// 0 = 8x8 sprites, 1 = 8x16.
        const SPRITE_SIZE = 0b0000_0100;
        /// 0 = BG tile map at 0x9800, 1 = 0x9C00.
        const BG_TILE_MAP_SELECT = 0b0000_1000;
        /// Tile data addressing for BG and window:
        /// 0 = signed indexing from 0x9000, 1 = unsigned from 0x8000.
        const BG_WINDOW_TILE_SELECT = 0b0001_0000;
        const WINDOW_DISPLAY = 0b0010_0000;
        /// 0 = window tile map at 0x9800, 1 = 0x9C00.
        const WINDOW_MAP_SELECT = 0b0100_0000;
        /// LCD / PPU power.
        const LCD_DISPLAY = 0b1000_0000;
    }
}

bitflags! {
    /// FF41 — STAT. Bit 7 is unwired and reads 1, bits 0-2 are read only.
    #[derive(Default)]
    pub struct LcdStatus: u8 {
        const MODE_FLAG_0 = 0b0000_0001;
        const MODE_FLAG_1 = 0b0000_0010;
        const COINCIDENCE_FLAG = 0b0000_0100;
        const MODE_0_HBLANK_INTERRUPT = 0b0000_1000;
        const MODE_1_VBLANK_INTERRUPT = 0b0001_0000;
        const MODE_2_OAM_INTERRUPT = 0b0010_0000;
        const COINCIDENCE_INTERRUPT = 0b0100_0000;
        const UNUSED = 0b1000_0000;
    }
}

bitflags! {
    /// OAM byte 3, also the layout of CGB background-map attribute bytes
    /// (where bit 7 is the BG-over-OBJ priority and bit 4 is unused).
    #[derive(Default)]
    pub struct AttributeFlags: u8 {
        /// CGB palette index (OBP0-7 / BGP0-7).
        const PALETTE_NUMBER_CGB = 0b0000_0111;
        /// CGB tile data bank.
        const TILE_VRAM_BANK = 0b0000_1000;
        /// DMG sprite palette select (OBP0/OBP1).
        const PALETTE_NUMBER = 0b0001_0000;
        const X_FLIP = 0b0010_0000;
        const Y_FLIP = 0b0100_0000;
        /// 0 = OBJ above BG, 1 = OBJ behind BG colours 1-3.
        const OBJ_TO_BG_PRIORITY = 0b1000_0000;
    }
}

impl AttributeFlags {
    pub fn cgb_palette_number(&self) -> u8 {
        self.bits & 0x07
    }
}

impl LcdStatus {
    pub fn mode_flag(&self) -> Mode {
        match self.bits & 0x3 {
            0 => Mode::HBlank,
            1 => Mode::VBlank,
            2 => Mode::OamSearch,
            _ => Mode::Drawing,
        }
    }

    pub fn set_mode_flag(&mut self, mode: Mode) {
        self.bits = (self.bits & 0xFC)
            | match mode {
                Mode::HBlank => 0,
                Mode::VBlank => 1,
                Mode::OamSearch => 2,
                Mode::Drawing => 3,
            };
    }
}
