use crate::hardware::cartridge::mbc3::RtcState;
use crate::hardware::cartridge::CartridgeError;
use crate::hardware::cpu::Cpu;
use crate::hardware::mmu::Memory;
use crate::hardware::ppu::palette::RGB;
use crate::hardware::registers::{Flags, Registers};
use crate::io::joypad::InputKey;
use crate::EmulatorOptions;

/// T-cycles per frame in single-speed mode; doubled in double speed.
pub const CYCLES_PER_FRAME: u32 = 70224;
/// The emulated refresh rate the host should pace frames against.
pub const FRAME_RATE: f64 = 59.7275;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum EmulatorMode {
    DMG,
    CGB,
}

impl EmulatorMode {
    pub fn is_dmg(self) -> bool {
        self == EmulatorMode::DMG
    }

    pub fn is_cgb(self) -> bool {
        self == EmulatorMode::CGB
    }
}

/// The assembled machine. The host owns the event loop: it repeatedly calls
/// [`Emulator::emulate_cycle`] (or [`Emulator::run_to_vblank`]), injects
/// input between instructions, and presents the framebuffer when a frame
/// completes.
pub struct Emulator {
    cpu: Cpu<Memory>,
}

impl Emulator {
    pub fn new(rom: &[u8], options: EmulatorOptions) -> Result<Self, CartridgeError> {
        let memory = Memory::new(rom, options)?;
        let mode = memory.emulation_mode;
        let header_checksum = memory.cartridge().header().header_checksum;

        let mut cpu = Cpu::new(memory);
        cpu.registers = post_boot_registers(mode, header_checksum);

        Ok(Emulator { cpu })
    }

    /// Dispatch exactly one instruction (every component advances from the
    /// ticks inside it). Returns `true` when a displayable frame finished.
    pub fn emulate_cycle(&mut self) -> bool {
        self.cpu.step();
        self.cpu.mmu.take_frame_complete()
    }

    /// Run until the PPU hands over a frame. Spins forever if the LCD is
    /// switched off; hosts wanting a bound should drive `emulate_cycle`.
    pub fn run_to_vblank(&mut self) {
        while !self.emulate_cycle() {}
    }

    /// 160x144 RGB output of the last completed frame.
    pub fn frame_buffer(&self) -> &[RGB] {
        self.cpu.mmu.frame_buffer()
    }

    pub fn mode(&self) -> EmulatorMode {
        self.cpu.mmu.emulation_mode
    }

    pub fn press_key(&mut self, key: InputKey) {
        self.cpu.mmu.press_key(key);
    }

    pub fn release_key(&mut self, key: InputKey) {
        self.cpu.mmu.release_key(key);
    }

    /// External RAM contents for battery-backed carts, to be persisted by
    /// the host at session end.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.cpu.mmu.cartridge().battery_ram()
    }

    /// MBC3 clock snapshot for persistence.
    pub fn rtc_state(&self) -> Option<RtcState> {
        self.cpu.mmu.cartridge().rtc_state()
    }

    /// Feed the MBC3 clock a wall-time second count.
    pub fn update_rtc(&mut self, now: u64) {
        self.cpu.mmu.cartridge_mut().update_rtc(now);
    }

    /// For host-side inspection while paused; the machine must not be
    /// mid-`emulate_cycle`.
    pub fn memory(&self) -> &Memory {
        &self.cpu.mmu
    }
}

/// Register contents after the boot ROM would have run; we start straight
/// at 0x0100. On DMG the carry/half-carry flags depend on whether the boot
/// ROM saw a zero header checksum.
fn post_boot_registers(mode: EmulatorMode, header_checksum: u8) -> Registers {
    let mut registers = Registers::new();
    registers.pc = 0x0100;
    registers.sp = 0xFFFE;

    if mode.is_cgb() {
        registers.a = 0x11;
        registers.f = Flags::from_bits_truncate(0x80);
        registers.set_bc(0x0000);
        registers.set_de(0xFF56);
        registers.set_hl(0x000D);
    } else {
        registers.a = 0x01;
        registers.f = Flags::from_bits_truncate(if header_checksum == 0 { 0xF0 } else { 0xB0 });
        registers.set_bc(0x0013);
        registers.set_de(0x00D8);
        registers.set_hl(0x014D);
    }

    registers
}
