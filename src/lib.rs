//! A cycle-accurate Game Boy / Game Boy Color emulation core. The host
//! supplies a ROM image and an event loop; this crate supplies the machine:
//! SM83 CPU, bus with interleaved timer/DMA/joypad/MBC hardware, and a
//! pixel-FIFO PPU producing 160x144 RGB frames.

pub mod emulator;
pub mod hardware;
pub mod io;

use crate::emulator::EmulatorMode;
pub use crate::hardware::cartridge::mbc3::RtcState;
pub use crate::hardware::cartridge::CartridgeError;
pub use crate::hardware::ppu::palette::{DisplayColour, RGB};
pub use crate::hardware::ppu::{FRAMEBUFFER_SIZE, RESOLUTION_HEIGHT, RESOLUTION_WIDTH};
pub use crate::io::joypad::InputKey;

/// Everything configurable about a session, gathered before boot.
#[derive(Debug)]
pub struct EmulatorOptions {
    pub emulator_mode: EmulatorMode,
    /// Battery RAM from an earlier session.
    pub saved_ram: Option<Vec<u8>>,
    /// MBC3 clock state from an earlier session.
    pub saved_rtc: Option<RtcState>,
    /// Host mapping of the four DMG shades.
    pub display_colour: DisplayColour,
}

impl Default for EmulatorOptions {
    fn default() -> Self {
        EmulatorOptionsBuilder::new().build()
    }
}

#[derive(Debug)]
pub struct EmulatorOptionsBuilder {
    emulator_mode: EmulatorMode,
    saved_ram: Option<Vec<u8>>,
    saved_rtc: Option<RtcState>,
    display_colour: DisplayColour,
}

impl EmulatorOptionsBuilder {
    pub fn new() -> Self {
        EmulatorOptionsBuilder {
            emulator_mode: EmulatorMode::DMG,
            saved_ram: None,
            saved_rtc: None,
            display_colour: DisplayColour::default(),
        }
    }

    pub fn with_mode(mut self, mode: EmulatorMode) -> Self {
        self.emulator_mode = mode;
        self
    }

    pub fn saved_ram(mut self, saved_ram: Option<Vec<u8>>) -> Self {
        self.saved_ram = saved_ram;
        self
    }

    pub fn saved_rtc(mut self, saved_rtc: Option<RtcState>) -> Self {
        self.saved_rtc = saved_rtc;
        self
    }

    pub fn display_colour(mut self, display_colour: DisplayColour) -> Self {
        self.display_colour = display_colour;
        self
    }

    pub fn build(self) -> EmulatorOptions {
        EmulatorOptions {
            emulator_mode: self.emulator_mode,
            saved_ram: self.saved_ram,
            saved_rtc: self.saved_rtc,
            display_colour: self.display_colour,
        }
    }
}

impl From<EmulatorOptions> for EmulatorOptionsBuilder {
    fn from(options: EmulatorOptions) -> Self {
        EmulatorOptionsBuilder {
            emulator_mode: options.emulator_mode,
            saved_ram: options.saved_ram,
            saved_rtc: options.saved_rtc,
            display_colour: options.display_colour,
        }
    }
}
