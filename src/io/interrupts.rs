use bitflags::*;

/// The flag used to signal that an interrupt is pending (IF).
pub const INTERRUPTS_FLAG: u16 = 0xFF0F;
/// Interrupt Enable register (IE).
pub const INTERRUPTS_ENABLE: u16 = 0xFFFF;

/// The five interrupt sources in dispatch priority order (VBlank highest).
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub enum Interrupt {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl Interrupt {
    pub fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x40,
            Interrupt::LcdStat => 0x48,
            Interrupt::Timer => 0x50,
            Interrupt::Serial => 0x58,
            Interrupt::Joypad => 0x60,
        }
    }

    /// The highest-priority interrupt in a requested-and-enabled mask.
    /// Callers must pass a non-empty mask.
    pub fn highest_priority(pending: u8) -> Interrupt {
        match pending.trailing_zeros() {
            0 => Interrupt::VBlank,
            1 => Interrupt::LcdStat,
            2 => Interrupt::Timer,
            3 => Interrupt::Serial,
            _ => Interrupt::Joypad,
        }
    }
}

bitflags! {
    #[derive(Default)]
    pub struct InterruptFlags: u8 {
        const VBLANK = 0b0000_0001;
        const LCD    = 0b0000_0010;
        const TIMER  = 0b0000_0100;
        const SERIAL = 0b0000_1000;
        const JOYPAD = 0b0001_0000;
    }
}

/// IE and IF. IF's upper three bits are unwired and read as 1.
#[derive(Default, Debug, Clone)]
pub struct Interrupts {
    pub interrupt_enable: InterruptFlags,
    pub interrupt_flag: InterruptFlags,
}

impl Interrupts {
    pub fn request(&mut self, interrupt: InterruptFlags) {
        self.interrupt_flag.insert(interrupt);
    }

    /// The requested-and-enabled mask, restricted to the five real sources.
    pub fn pending(&self) -> u8 {
        (self.interrupt_flag & self.interrupt_enable).bits() & 0x1F
    }

    pub fn read_flag(&self) -> u8 {
        0xE0 | self.interrupt_flag.bits()
    }

    pub fn read_enable(&self) -> u8 {
        self.interrupt_enable.bits()
    }

    pub fn overwrite_flag(&mut self, value: u8) {
        self.interrupt_flag = InterruptFlags::from_bits_truncate(value);
    }

    pub fn overwrite_enable(&mut self, value: u8) {
        self.interrupt_enable = InterruptFlags::from_bits_truncate(value);
    }

    pub fn acknowledge(&mut self, interrupt: Interrupt) {
        self.interrupt_flag
            .remove(InterruptFlags::from_bits_truncate(1 << interrupt as u8));
    }
}
