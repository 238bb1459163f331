use itertools::Itertools;
use log::*;

use crate::emulator::EmulatorMode;
use crate::hardware::cartridge::header::CgbSupport;
use crate::hardware::cartridge::{Cartridge, CartridgeError};
use crate::hardware::mmu::cgb::{Hdma, HdmaMode, SpeedSwitch};
use crate::hardware::mmu::dma::OamDma;
use crate::hardware::mmu::hram::Hram;
use crate::hardware::mmu::wram::Wram;
use crate::hardware::ppu::palette::RGB;
use crate::hardware::ppu::*;
use crate::io::interrupts::{InterruptFlags, Interrupts, INTERRUPTS_ENABLE, INTERRUPTS_FLAG};
use crate::io::io_registers::{IoRegisters, SIO_CONT, SIO_DATA};
use crate::io::joypad::{InputKey, Joypad, JOYPAD_REGISTER};
use crate::io::timer::*;
use crate::EmulatorOptions;

pub mod cgb;
pub mod dma;
pub mod hram;
pub mod wram;

/// 16 KB ROM bank 0. From cartridge, the MBC may remap it in MBC1 RAM mode.
pub const ROM_BANK_00_START: u16 = 0x0000;
pub const ROM_BANK_00_END: u16 = 0x3FFF;
/// 16 KB switchable ROM bank.
pub const ROM_BANK_NN_START: u16 = 0x4000;
pub const ROM_BANK_NN_END: u16 = 0x7FFF;
/// 8 KB VRAM, two banks on CGB.
pub const VRAM_START: u16 = 0x8000;
pub const VRAM_END: u16 = 0x9FFF;
/// External cartridge RAM, MBC controlled.
pub const EXTERNAL_RAM_START: u16 = 0xA000;
pub const EXTERNAL_RAM_END: u16 = 0xBFFF;
pub const WRAM_BANK_00_START: u16 = 0xC000;
pub const WRAM_BANK_00_END: u16 = 0xCFFF;
/// Bank 1 on DMG, banks 1-7 on CGB.
pub const WRAM_BANK_NN_START: u16 = 0xD000;
pub const WRAM_BANK_NN_END: u16 = 0xDFFF;
/// Mirror of 0xC000-0xDDFF.
pub const ECHO_RAM_START: u16 = 0xE000;
pub const ECHO_RAM_END: u16 = 0xFDFF;
pub const ECHO_RAM_OFFSET: u16 = 0x2000;
pub const OAM_START: u16 = 0xFE00;
pub const OAM_END: u16 = 0xFE9F;
/// Reads 0xFF, writes vanish.
pub const NOT_USABLE_START: u16 = 0xFEA0;
pub const NOT_USABLE_END: u16 = 0xFEFF;
pub const IO_START: u16 = 0xFF00;
pub const IO_END: u16 = 0xFF7F;
pub const HRAM_START: u16 = 0xFF80;
pub const HRAM_END: u16 = 0xFFFE;

/// Writing FF46 schedules the OAM DMA engine.
pub const DMA_TRANSFER: u16 = 0xFF46;
/// CGB speed switch arm register.
pub const CGB_KEY1: u16 = 0xFF4D;
/// GDMA/HDMA source and destination, write only.
pub const CGB_HDMA_1: u16 = 0xFF51;
pub const CGB_HDMA_2: u16 = 0xFF52;
pub const CGB_HDMA_3: u16 = 0xFF53;
pub const CGB_HDMA_4: u16 = 0xFF54;
/// Transfer length/mode/status.
pub const CGB_HDMA_5: u16 = 0xFF55;
pub const CGB_WRAM_BANK: u16 = 0xFF70;

pub const INVALID_READ: u8 = 0xFF;

/// The bus interface the CPU executes against. `tick` is the cooperative
/// yield point: one M-cycle of PPU/DMA/timer progress, invoked *before*
/// the memory access it accompanies.
pub trait MemoryMapper {
    fn read_byte(&self, address: u16) -> u8;
    fn write_byte(&mut self, address: u16, value: u8);
    /// Advance every clocked component by one M-cycle (4 T-cycles).
    fn tick(&mut self);
    fn interrupts(&self) -> &Interrupts;
    fn interrupts_mut(&mut self) -> &mut Interrupts;
    /// KEY1 bit 0 has been set and STOP should perform the switch.
    fn speed_switch_armed(&self) -> bool;
    fn set_speed_switch_in_progress(&mut self, in_progress: bool);
    /// Flip between single and double speed, clearing the armed bit.
    fn toggle_speed(&mut self);
    /// STOP always zeroes the divider.
    fn reset_divider(&mut self);
}

/// The machine's memory bus: owns every addressable component and
/// arbitrates between the CPU and the DMA engines.
pub struct Memory {
    cartridge: Cartridge,
    pub emulation_mode: EmulatorMode,
    pub speed: SpeedSwitch,
    pub hdma: Hdma,
    pub dma: OamDma,
    pub ppu: Ppu,
    pub hram: Hram,
    pub wram: Wram,
    pub joypad: Joypad,
    pub timers: TimerRegisters,
    pub interrupts: Interrupts,
    pub io_registers: IoRegisters,
    /// T-cycles of the CPU clock since power on.
    clock: u64,
    /// A block transfer is feeding the bus; don't start another from its
    /// own ticks.
    in_block_transfer: bool,
}

impl Memory {
    pub fn new(rom: &[u8], options: EmulatorOptions) -> Result<Self, CartridgeError> {
        let cartridge = Cartridge::new(rom, options.saved_ram, options.saved_rtc)?;

        let emulation_mode = match options.emulator_mode {
            EmulatorMode::DMG if cartridge.header().cgb_support == CgbSupport::Only => {
                warn!("Cartridge is CGB-only, overriding requested DMG mode");
                EmulatorMode::CGB
            }
            EmulatorMode::CGB if !cartridge.header().cgb_support.supports_cgb() => {
                // A CGB machine runs plain carts in DMG compatibility mode.
                EmulatorMode::DMG
            }
            mode => mode,
        };

        let mut result = Memory {
            cartridge,
            emulation_mode,
            speed: SpeedSwitch::default(),
            hdma: Hdma::new(),
            dma: OamDma::default(),
            ppu: Ppu::new(options.display_colour, emulation_mode.is_cgb()),
            hram: Hram::new(),
            wram: Wram::new(),
            joypad: Joypad::new(),
            timers: TimerRegisters::default(),
            interrupts: Interrupts::default(),
            io_registers: IoRegisters::new(),

            clock: 0,
            in_block_transfer: false,
        };

        // Post-boot state.
        result.timers.system_clock = if emulation_mode.is_cgb() { 0xAC00 } else { 0xAB00 };
        result.interrupts.overwrite_flag(0xE1);
        result.io_registers.write_byte(SIO_DATA, 0x00);
        result.io_registers.write_byte(SIO_CONT, 0x7E);
        result.io_registers.write_byte(DMA_TRANSFER, 0x00);

        Ok(result)
    }

    pub fn read_byte(&self, address: u16) -> u8 {
        match address {
            ROM_BANK_00_START..=ROM_BANK_00_END => self.cartridge.read_rom_low(address),
            ROM_BANK_NN_START..=ROM_BANK_NN_END => self.cartridge.read_rom_high(address),
            VRAM_START..=VRAM_END => self.ppu.read_vram(address),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.read_external_ram(address),
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.read_bank_0(address),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.read_bank_n(address),
            ECHO_RAM_START..=ECHO_RAM_END => self.wram.read_echo(address),
            OAM_START..=OAM_END => self.ppu.read_oam(address, self.dma.active),
            NOT_USABLE_START..=NOT_USABLE_END => INVALID_READ,
            IO_START..=IO_END => self.read_io_byte(address),
            HRAM_START..=HRAM_END => self.hram.read_byte(address),
            INTERRUPTS_ENABLE => self.interrupts.read_enable(),
        }
    }

    pub fn write_byte(&mut self, address: u16, value: u8) {
        match address {
            ROM_BANK_00_START..=ROM_BANK_NN_END => self.cartridge.write_control(address, value),
            VRAM_START..=VRAM_END => self.ppu.write_vram(address, value),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => {
                self.cartridge.write_external_ram(address, value)
            }
            WRAM_BANK_00_START..=WRAM_BANK_00_END => self.wram.write_bank_0(address, value),
            WRAM_BANK_NN_START..=WRAM_BANK_NN_END => self.wram.write_bank_n(address, value),
            ECHO_RAM_START..=ECHO_RAM_END => self.wram.write_echo(address, value),
            OAM_START..=OAM_END => self.ppu.write_oam(address, value, self.dma.active),
            NOT_USABLE_START..=NOT_USABLE_END => {
                trace!("Write to unusable memory: {:04X}", address)
            }
            IO_START..=IO_END => self.write_io_byte(address, value),
            HRAM_START..=HRAM_END => self.hram.write_byte(address, value),
            INTERRUPTS_ENABLE => self.interrupts.overwrite_enable(value),
        }
    }

    fn read_io_byte(&self, address: u16) -> u8 {
        match address {
            JOYPAD_REGISTER => self.joypad.read_register(),
            SIO_DATA | SIO_CONT => self.io_registers.read_byte(address),
            DIVIDER_REGISTER => self.timers.divider(),
            TIMER_COUNTER => self.timers.timer_counter,
            TIMER_MODULO => self.timers.timer_modulo,
            TIMER_CONTROL => self.timers.timer_control.to_bits(),
            INTERRUPTS_FLAG => self.interrupts.read_flag(),
            LCD_CONTROL_REGISTER => self.ppu.lcd_control(),
            LCD_STATUS_REGISTER => self.ppu.lcd_status(),
            SCY_REGISTER => self.ppu.scy(),
            SCX_REGISTER => self.ppu.scx(),
            LY_REGISTER => self.ppu.ly(),
            LYC_REGISTER => self.ppu.lyc(),
            DMA_TRANSFER => self.io_registers.read_byte(address),
            BG_PALETTE => self.ppu.bg_palette(),
            OB_PALETTE_0 => self.ppu.obj_palette_0(),
            OB_PALETTE_1 => self.ppu.obj_palette_1(),
            WY_REGISTER => self.ppu.window_y(),
            WX_REGISTER => self.ppu.window_x(),
            CGB_KEY1 if self.emulation_mode.is_cgb() => self.speed.read_key1(),
            CGB_VRAM_BANK if self.emulation_mode.is_cgb() => self.ppu.vram_bank(),
            CGB_HDMA_1..=CGB_HDMA_4 => INVALID_READ,
            CGB_HDMA_5 if self.emulation_mode.is_cgb() => self.hdma.read_control(),
            CGB_BG_PALETTE_INDEX if self.emulation_mode.is_cgb() => self.ppu.bg_palette_index(),
            CGB_BG_PALETTE_DATA if self.emulation_mode.is_cgb() => self.ppu.bg_palette_data(),
            CGB_OBJ_PALETTE_INDEX if self.emulation_mode.is_cgb() => self.ppu.obj_palette_index(),
            CGB_OBJ_PALETTE_DATA if self.emulation_mode.is_cgb() => self.ppu.obj_palette_data(),
            CGB_OBJECT_PRIORITY if self.emulation_mode.is_cgb() => self.ppu.object_priority(),
            CGB_WRAM_BANK if self.emulation_mode.is_cgb() => self.wram.read_bank_select(),
            // The CGB-only registers above fall through to here on DMG.
            CGB_KEY1 | CGB_VRAM_BANK | CGB_HDMA_5 | CGB_BG_PALETTE_INDEX | CGB_BG_PALETTE_DATA
            | CGB_OBJ_PALETTE_INDEX | CGB_OBJ_PALETTE_DATA | CGB_OBJECT_PRIORITY
            | CGB_WRAM_BANK => INVALID_READ,
            _ => self.io_registers.read_byte(address),
        }
    }

    fn write_io_byte(&mut self, address: u16, value: u8) {
        match address {
            JOYPAD_REGISTER => self.joypad.write_register(value),
            SIO_DATA | SIO_CONT => self.io_registers.write_byte(address, value),
            DIVIDER_REGISTER => self.timers.set_divider(),
            TIMER_COUNTER => self.timers.set_timer_counter(value),
            TIMER_MODULO => self.timers.set_timer_modulo(value),
            TIMER_CONTROL => self.timers.set_timer_control(value),
            INTERRUPTS_FLAG => self.interrupts.overwrite_flag(value),
            LCD_CONTROL_REGISTER => self.ppu.set_lcd_control(value, &mut self.interrupts),
            LCD_STATUS_REGISTER => self.ppu.set_lcd_status(value, &mut self.interrupts),
            SCY_REGISTER => self.ppu.set_scy(value),
            SCX_REGISTER => self.ppu.set_scx(value),
            LY_REGISTER => {} // read only
            LYC_REGISTER => self.ppu.set_lyc(value, &mut self.interrupts),
            DMA_TRANSFER => {
                self.io_registers.write_byte(address, value);
                self.dma.schedule(value);
            }
            BG_PALETTE => self.ppu.set_bg_palette(value),
            OB_PALETTE_0 => self.ppu.set_obj_palette_0(value),
            OB_PALETTE_1 => self.ppu.set_obj_palette_1(value),
            WY_REGISTER => self.ppu.set_window_y(value),
            WX_REGISTER => self.ppu.set_window_x(value),
            CGB_KEY1 if self.emulation_mode.is_cgb() => self.speed.write_key1(value),
            CGB_VRAM_BANK if self.emulation_mode.is_cgb() => self.ppu.set_vram_bank(value),
            CGB_HDMA_1 if self.emulation_mode.is_cgb() => self.hdma.write_source_high(value),
            CGB_HDMA_2 if self.emulation_mode.is_cgb() => self.hdma.write_source_low(value),
            CGB_HDMA_3 if self.emulation_mode.is_cgb() => self.hdma.write_destination_high(value),
            CGB_HDMA_4 if self.emulation_mode.is_cgb() => self.hdma.write_destination_low(value),
            CGB_HDMA_5 if self.emulation_mode.is_cgb() => {
                if self.hdma.write_control(value) == Some(HdmaMode::General) {
                    self.gdma_transfer();
                }
            }
            CGB_BG_PALETTE_INDEX if self.emulation_mode.is_cgb() => {
                self.ppu.set_bg_palette_index(value)
            }
            CGB_BG_PALETTE_DATA if self.emulation_mode.is_cgb() => {
                self.ppu.set_bg_palette_data(value)
            }
            CGB_OBJ_PALETTE_INDEX if self.emulation_mode.is_cgb() => {
                self.ppu.set_obj_palette_index(value)
            }
            CGB_OBJ_PALETTE_DATA if self.emulation_mode.is_cgb() => {
                self.ppu.set_obj_palette_data(value)
            }
            CGB_OBJECT_PRIORITY if self.emulation_mode.is_cgb() => {
                self.ppu.set_object_priority(value)
            }
            CGB_WRAM_BANK if self.emulation_mode.is_cgb() => self.wram.write_bank_select(value),
            // Writes to CGB-only registers are dropped in DMG mode.
            CGB_KEY1 | CGB_VRAM_BANK | CGB_HDMA_1..=CGB_HDMA_5 | CGB_BG_PALETTE_INDEX
            | CGB_BG_PALETTE_DATA | CGB_OBJ_PALETTE_INDEX | CGB_OBJ_PALETTE_DATA
            | CGB_OBJECT_PRIORITY | CGB_WRAM_BANK => {}
            _ => self.io_registers.write_byte(address, value),
        }
    }

    /// One M-cycle through every clocked component. The CPU calls this
    /// (through `MemoryMapper::tick`) before each of its memory accesses.
    fn tick_internal(&mut self) {
        self.clock = self.clock.wrapping_add(4);

        // The whole timer block freezes while the speed switch drains.
        if !self.speed.switch_in_progress {
            if let Some(interrupt) = self.timers.tick() {
                self.interrupts.request(interrupt);
            }
        }

        // In double speed the CPU runs twice as fast as the dot clock.
        let dots = if self.speed.double_speed { 2 } else { 4 };
        self.ppu.tick(dots, &mut self.interrupts);

        self.tick_oam_dma();

        if self.ppu.take_hblank_edge() && self.hdma.hblank_active() && !self.in_block_transfer {
            self.hdma_step_block();
        }
    }

    fn tick_oam_dma(&mut self) {
        if let Some(sprite) = self.dma.tick() {
            let base = sprite as u16 * 4;
            for i in 0..4 {
                let byte = self.dma_read(self.dma.source + base + i);
                self.ppu.dma_write_oam((base + i) as u8, byte);
            }
        }
    }

    /// DMA engines read around the CPU-side VRAM lock.
    fn dma_read(&self, address: u16) -> u8 {
        match address {
            VRAM_START..=VRAM_END => self.ppu.dma_read_vram(address),
            _ => self.read_byte(address),
        }
    }

    /// General-purpose VRAM DMA: runs to completion right now, the CPU is
    /// stalled while the PPU and timer keep ticking. Two bytes move per
    /// M-cycle in single speed, one in double speed.
    fn gdma_transfer(&mut self) {
        let source = self.hdma.source();
        let destination = self.hdma.destination();
        let total = self.hdma.blocks_remaining() as u16 * 16;
        debug!(
            "GDMA of {} bytes from {:#06X} to {:#06X}",
            total, source, destination
        );

        let bytes = (0..total).map(|i| self.dma_read(source + i)).collect_vec();
        self.transfer_block(&bytes, destination);
        self.hdma.complete();
    }

    /// One 16-byte HBlank-paced block.
    fn hdma_step_block(&mut self) {
        let offset = self.hdma.block_offset();
        let source = self.hdma.source() + offset;
        let destination = self.hdma.destination() + offset;

        let bytes = (0..16).map(|i| self.dma_read(source + i)).collect_vec();
        self.transfer_block(&bytes, destination);
        self.hdma.advance_block();
    }

    fn transfer_block(&mut self, bytes: &[u8], destination: u16) {
        let bytes_per_cycle = if self.speed.double_speed { 1 } else { 2 };

        self.in_block_transfer = true;
        for (i, byte) in bytes.iter().enumerate() {
            self.ppu.dma_write_vram(destination + i as u16, *byte);
            if (i + 1) % bytes_per_cycle == 0 {
                self.tick_internal();
            }
        }
        self.in_block_transfer = false;
    }

    pub fn press_key(&mut self, key: InputKey) {
        if self.joypad.press_key(key) {
            self.interrupts.request(InterruptFlags::JOYPAD);
        }
    }

    pub fn release_key(&mut self, key: InputKey) {
        self.joypad.release_key(key);
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cartridge
    }

    pub fn frame_buffer(&self) -> &[RGB] {
        self.ppu.frame_buffer()
    }

    pub fn take_frame_complete(&mut self) -> bool {
        self.ppu.take_frame_complete()
    }

    /// CPU-clock T-cycles since power on.
    pub fn clock(&self) -> u64 {
        self.clock
    }
}

impl MemoryMapper for Memory {
    fn read_byte(&self, address: u16) -> u8 {
        Memory::read_byte(self, address)
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        Memory::write_byte(self, address, value)
    }

    fn tick(&mut self) {
        self.tick_internal();
    }

    fn interrupts(&self) -> &Interrupts {
        &self.interrupts
    }

    fn interrupts_mut(&mut self) -> &mut Interrupts {
        &mut self.interrupts
    }

    fn speed_switch_armed(&self) -> bool {
        self.emulation_mode.is_cgb() && self.speed.armed()
    }

    fn set_speed_switch_in_progress(&mut self, in_progress: bool) {
        self.speed.switch_in_progress = in_progress;
    }

    fn toggle_speed(&mut self) {
        self.speed.toggle();
        self.speed.switch_in_progress = false;
        debug!(
            "Speed switch complete, now in {} speed",
            if self.speed.double_speed { "double" } else { "single" }
        );
    }

    fn reset_divider(&mut self) {
        self.timers.set_divider();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::cartridge::header::{compute_header_checksum, NINTENDO_LOGO};
    use crate::hardware::ppu::Mode;
    use pretty_assertions::assert_eq;

    fn test_rom(cgb: bool) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x104..0x134].copy_from_slice(&NINTENDO_LOGO);
        if cgb {
            rom[0x143] = 0x80;
        }
        rom[0x14D] = compute_header_checksum(&rom);
        rom
    }

    fn dmg_memory() -> Memory {
        Memory::new(&test_rom(false), EmulatorOptions::default()).unwrap()
    }

    fn cgb_memory() -> Memory {
        let options = crate::EmulatorOptionsBuilder::new()
            .with_mode(EmulatorMode::CGB)
            .build();
        Memory::new(&test_rom(true), options).unwrap()
    }

    /// Park the PPU in VBlank so VRAM/OAM are unlocked.
    fn run_to_vblank(memory: &mut Memory) {
        while memory.ppu.mode() != Mode::VBlank {
            memory.tick_internal();
        }
    }

    #[test]
    fn unusable_region_reads_ff_and_drops_writes() {
        let mut memory = dmg_memory();
        for address in NOT_USABLE_START..=NOT_USABLE_END {
            memory.write_byte(address, 0x12);
            assert_eq!(memory.read_byte(address), 0xFF);
        }
    }

    #[test]
    fn echo_ram_mirrors_wram() {
        let mut memory = dmg_memory();
        memory.write_byte(0xC100, 0x34);
        assert_eq!(memory.read_byte(0xE100), 0x34);

        memory.write_byte(0xFDFF, 0x56);
        assert_eq!(memory.read_byte(0xDDFF), 0x56);
    }

    #[test]
    fn vram_reads_ff_while_ppu_draws() {
        let mut memory = dmg_memory();
        run_to_vblank(&mut memory);
        memory.write_byte(0x8010, 0x77);
        assert_eq!(memory.read_byte(0x8010), 0x77);

        // Walk into mode 3 of the next frame.
        while memory.ppu.mode() != Mode::Drawing {
            memory.tick_internal();
        }
        assert_eq!(memory.read_byte(0x8010), 0xFF);
        memory.write_byte(0x8010, 0x99);

        run_to_vblank(&mut memory);
        assert_eq!(memory.read_byte(0x8010), 0x77);
    }

    #[test]
    fn oam_dma_masks_oam_for_160_cycles() {
        let mut memory = dmg_memory();
        run_to_vblank(&mut memory);
        memory.write_byte(0xC000, 0x42);
        memory.write_byte(0xFE00, 0x11);
        assert_eq!(memory.read_byte(0xFE00), 0x11);

        memory.write_byte(DMA_TRANSFER, 0xC0);
        for _ in 0..159 {
            memory.tick_internal();
            assert_eq!(memory.read_byte(0xFE00), 0xFF);
        }

        memory.tick_internal();
        assert!(!memory.dma.active);
        assert_eq!(memory.read_byte(0xFE00), 0x42);
    }

    #[test]
    fn dma_source_above_df_is_clamped() {
        let mut memory = dmg_memory();
        memory.write_byte(DMA_TRANSFER, 0xFE);
        memory.tick_internal();
        assert_eq!(memory.dma.source, 0xDF00);
    }

    #[test]
    fn gdma_copies_immediately_and_burns_cycles() {
        let mut memory = cgb_memory();
        run_to_vblank(&mut memory);
        for i in 0..32u16 {
            memory.write_byte(0xC000 + i, i as u8);
        }

        // Source 0xC000, destination 0x8800, two blocks.
        memory.write_byte(CGB_HDMA_1, 0xC0);
        memory.write_byte(CGB_HDMA_2, 0x00);
        memory.write_byte(CGB_HDMA_3, 0x08);
        memory.write_byte(CGB_HDMA_4, 0x00);
        let clock_before = memory.clock();
        memory.write_byte(CGB_HDMA_5, 0x01);

        // 32 bytes at 2 bytes per M-cycle.
        assert_eq!(memory.clock() - clock_before, 16 * 4);
        assert_eq!(memory.read_byte(CGB_HDMA_5), 0xFF);
        for i in 0..32u16 {
            assert_eq!(memory.read_byte(0x8800 + i), i as u8);
        }
    }

    #[test]
    fn hdma_moves_one_block_per_hblank() {
        let mut memory = cgb_memory();
        run_to_vblank(&mut memory);
        for i in 0..48u16 {
            memory.write_byte(0xC000 + i, 0xAB);
        }

        memory.write_byte(CGB_HDMA_1, 0xC0);
        memory.write_byte(CGB_HDMA_2, 0x00);
        memory.write_byte(CGB_HDMA_3, 0x08);
        memory.write_byte(CGB_HDMA_4, 0x00);
        memory.write_byte(CGB_HDMA_5, 0x82);
        assert!(memory.hdma.hblank_active());
        // Nothing moves during VBlank.
        memory.tick_internal();
        assert_eq!(memory.ppu.dma_read_vram(0x8800), 0x00);

        // First HBlank of the next frame transfers exactly one block.
        while memory.ppu.mode() != Mode::HBlank {
            memory.tick_internal();
        }
        assert_eq!(memory.ppu.dma_read_vram(0x8800), 0xAB);
        assert_eq!(memory.ppu.dma_read_vram(0x880F), 0xAB);
        assert_eq!(memory.ppu.dma_read_vram(0x8810), 0x00);
        assert_eq!(memory.read_byte(CGB_HDMA_5), 0x80 | 1);

        while memory.ppu.mode() != Mode::OamSearch {
            memory.tick_internal();
        }
        while memory.ppu.mode() != Mode::HBlank {
            memory.tick_internal();
        }
        assert_eq!(memory.ppu.dma_read_vram(0x8810), 0xAB);
        assert_eq!(memory.read_byte(CGB_HDMA_5), 0x80 | 0);
    }

    #[test]
    fn hdma_cancel_keeps_remaining_length() {
        let mut memory = cgb_memory();
        memory.write_byte(CGB_HDMA_5, 0x84);
        assert!(memory.hdma.hblank_active());

        memory.write_byte(CGB_HDMA_5, 0x00);
        assert!(!memory.hdma.hblank_active());
        assert_eq!(memory.read_byte(CGB_HDMA_5), 0x80 | 4);
    }

    #[test]
    fn cgb_registers_hidden_on_dmg() {
        let mut memory = dmg_memory();
        assert_eq!(memory.read_byte(CGB_KEY1), 0xFF);
        assert_eq!(memory.read_byte(CGB_HDMA_5), 0xFF);
        assert_eq!(memory.read_byte(CGB_WRAM_BANK), 0xFF);

        // Writes to the WRAM bank register do nothing in DMG mode.
        memory.write_byte(CGB_WRAM_BANK, 0x3);
        memory.write_byte(0xD000, 0x77);
        memory.write_byte(CGB_WRAM_BANK, 0x1);
        assert_eq!(memory.read_byte(0xD000), 0x77);
    }

    #[test]
    fn wram_banking_on_cgb() {
        let mut memory = cgb_memory();
        memory.write_byte(CGB_WRAM_BANK, 0x3);
        memory.write_byte(0xD000, 0x77);

        memory.write_byte(CGB_WRAM_BANK, 0x1);
        assert_eq!(memory.read_byte(0xD000), 0x00);

        memory.write_byte(CGB_WRAM_BANK, 0x3);
        assert_eq!(memory.read_byte(0xD000), 0x77);
        assert_eq!(memory.read_byte(CGB_WRAM_BANK), 0xF8 | 0x3);
    }

    #[test]
    fn frame_takes_70224_t_cycles() {
        let mut memory = dmg_memory();
        // The post-boot first frame runs a few dots short; skip it.
        while !memory.take_frame_complete() {
            memory.tick_internal();
        }

        let start = memory.clock();
        while !memory.take_frame_complete() {
            memory.tick_internal();
        }
        assert_eq!(memory.clock() - start, 70_224);
    }

    #[test]
    fn double_speed_frame_takes_140448_t_cycles() {
        let mut memory = cgb_memory();
        memory.speed.double_speed = true;
        while !memory.take_frame_complete() {
            memory.tick_internal();
        }

        let start = memory.clock();
        while !memory.take_frame_complete() {
            memory.tick_internal();
        }
        assert_eq!(memory.clock() - start, 140_448);
    }

    #[test]
    fn joypad_press_requests_interrupt_when_row_selected() {
        let mut memory = dmg_memory();
        memory.write_byte(JOYPAD_REGISTER, 0x20);
        memory.press_key(InputKey::Left);

        assert!(memory
            .interrupts
            .interrupt_flag
            .contains(InterruptFlags::JOYPAD));
        assert_eq!(memory.read_byte(JOYPAD_REGISTER) & 0x0F, 0b1101);
    }
}
