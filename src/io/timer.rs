use crate::io::interrupts::InterruptFlags;

/// Upper byte of the internal 16-bit counter. Writing any value resets the
/// whole counter to zero.
pub const DIVIDER_REGISTER: u16 = 0xFF04;
/// Incremented on the falling edge of the selected counter bit while TAC
/// bit 2 is set; reloaded from TMA one cycle after overflowing.
pub const TIMER_COUNTER: u16 = 0xFF05;
pub const TIMER_MODULO: u16 = 0xFF06;
pub const TIMER_CONTROL: u16 = 0xFF07;

/// The counter bit feeding TIMA, per TAC bits 0-1.
#[derive(Debug, Copy, Clone, PartialEq)]
enum InputClock {
    C1024 = 0x0,
    C16 = 0x1,
    C64 = 0x2,
    C256 = 0x3,
}

impl InputClock {
    /// The mask of the single counter bit whose falling edge ticks TIMA.
    fn edge_bit(self) -> u16 {
        match self {
            InputClock::C16 => 0x0008,
            InputClock::C64 => 0x0020,
            InputClock::C256 => 0x0080,
            InputClock::C1024 => 0x0200,
        }
    }
}

impl From<u8> for InputClock {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0x0 => InputClock::C1024,
            0x1 => InputClock::C16,
            0x2 => InputClock::C64,
            _ => InputClock::C256,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TimerControl {
    enabled: bool,
    input_select: InputClock,
}

impl TimerControl {
    pub fn to_bits(self) -> u8 {
        // Unused upper bits are forced high.
        0xF8 | ((self.enabled as u8) << 2) | self.input_select as u8
    }
}

impl Default for TimerControl {
    fn default() -> Self {
        TimerControl {
            enabled: false,
            input_select: InputClock::C1024,
        }
    }
}

impl From<u8> for TimerControl {
    fn from(value: u8) -> Self {
        TimerControl {
            enabled: value & 0b0100 != 0,
            input_select: InputClock::from(value),
        }
    }
}

/// DIV/TIMA/TMA/TAC. The divider is the top byte of `system_clock`, which
/// advances 4 T-cycles per M-cycle tick. TIMA increments are edge-detected
/// on `system_clock`, so DIV and TAC writes can synthesize a falling edge
/// and tick TIMA spuriously, exactly as the DMG does.
#[derive(Debug, Default)]
pub struct TimerRegisters {
    pub system_clock: u16,
    pub timer_counter: u8,
    pub timer_modulo: u8,
    pub timer_control: TimerControl,
    /// Overflow happened; reload+interrupt fires on the next tick.
    overflow_pending: bool,
    /// The reload happened on the current tick (TIMA == TMA window).
    reloaded_this_cycle: bool,
}

impl TimerRegisters {
    pub fn divider(&self) -> u8 {
        (self.system_clock >> 8) as u8
    }

    /// Advance the timer block by one M-cycle (4 T-cycles).
    pub fn tick(&mut self) -> Option<InterruptFlags> {
        let mut requested = None;
        self.reloaded_this_cycle = false;

        // The TMA reload and interrupt are delayed a full M-cycle after the
        // overflow; TIMA reads 0x00 in between.
        if self.overflow_pending {
            self.overflow_pending = false;
            self.reloaded_this_cycle = true;
            self.timer_counter = self.timer_modulo;
            requested = Some(InterruptFlags::TIMER);
        }

        let old_clock = self.system_clock;
        self.system_clock = self.system_clock.wrapping_add(4);

        if self.timer_control.enabled && self.falling_edge(old_clock, self.system_clock) {
            self.increment_counter();
        }

        requested
    }

    fn falling_edge(&self, old_clock: u16, new_clock: u16) -> bool {
        let bit = self.timer_control.input_select.edge_bit();
        (old_clock & bit) != 0 && (new_clock & bit) == 0
    }

    fn increment_counter(&mut self) {
        let (new_value, overflowed) = self.timer_counter.overflowing_add(1);
        self.timer_counter = new_value;
        self.overflow_pending = overflowed;
    }

    /// Any write zeroes the internal counter. If the selected bit was high
    /// the clear is a falling edge and TIMA ticks.
    pub fn set_divider(&mut self) {
        let old_clock = self.system_clock;
        self.system_clock = 0;

        if self.timer_control.enabled && self.falling_edge(old_clock, 0) {
            self.increment_counter();
        }
    }

    /// A write in the cycle before a pending reload cancels the overflow;
    /// a write during the reload cycle is discarded in favour of TMA.
    pub fn set_timer_counter(&mut self, value: u8) {
        if self.overflow_pending {
            self.overflow_pending = false;
        }

        if self.reloaded_this_cycle {
            self.timer_counter = self.timer_modulo;
        } else {
            self.timer_counter = value;
        }
    }

    /// A TMA write during the reload cycle is forwarded straight into TIMA.
    pub fn set_timer_modulo(&mut self, value: u8) {
        if self.reloaded_this_cycle {
            self.timer_counter = value;
        }
        self.timer_modulo = value;
    }

    /// Changing TAC re-evaluates the edge detector against the full 16-bit
    /// counter and may tick TIMA: disabling the timer while the selected bit
    /// is high, or moving the selection from a high bit to a low one, both
    /// look like falling edges to the DMG's multiplexer.
    pub fn set_timer_control(&mut self, value: u8) {
        let old_control = self.timer_control;
        self.timer_control = TimerControl::from(value);

        let old_bit = old_control.input_select.edge_bit();
        let new_bit = self.timer_control.input_select.edge_bit();

        let glitch = if old_control.enabled && !self.timer_control.enabled {
            self.system_clock & old_bit != 0
        } else {
            old_control.enabled
                && self.timer_control.enabled
                && (self.system_clock & old_bit) != 0
                && (self.system_clock & new_bit) == 0
        };

        if glitch {
            self.increment_counter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_timer(select: u8) -> TimerRegisters {
        let mut timers = TimerRegisters::default();
        timers.set_timer_control(0b0100 | select);
        timers
    }

    #[test]
    fn divider_is_upper_byte() {
        let mut timers = TimerRegisters::default();
        for _ in 0..64 {
            timers.tick();
        }
        assert_eq!(timers.system_clock, 256);
        assert_eq!(timers.divider(), 1);
    }

    #[test]
    fn tima_ticks_at_selected_frequency() {
        // 262144 Hz = every 16 T-cycles = every 4 M-cycle ticks.
        let mut timers = enabled_timer(0x1);
        for _ in 0..16 {
            timers.tick();
        }
        assert_eq!(timers.timer_counter, 4);
    }

    #[test]
    fn overflow_reload_is_delayed_one_cycle() {
        let mut timers = enabled_timer(0x1);
        timers.timer_modulo = 0xAB;
        timers.timer_counter = 0xFF;

        // Run up to the falling edge that overflows TIMA.
        for _ in 0..4 {
            assert!(timers.tick().is_none());
        }
        // TIMA reads 0 during the delay cycle, the reload + interrupt come
        // on the following tick.
        assert_eq!(timers.timer_counter, 0x00);
        assert_eq!(timers.tick(), Some(InterruptFlags::TIMER));
        assert_eq!(timers.timer_counter, 0xAB);
    }

    #[test]
    fn tima_write_cancels_pending_overflow() {
        let mut timers = enabled_timer(0x1);
        timers.timer_modulo = 0xAB;
        timers.timer_counter = 0xFF;
        for _ in 0..4 {
            timers.tick();
        }

        timers.set_timer_counter(0x42);

        assert!(timers.tick().is_none());
        assert_eq!(timers.timer_counter, 0x42);
    }

    #[test]
    fn div_write_can_tick_tima() {
        let mut timers = enabled_timer(0x1);
        // Advance until bit 3 of the counter is set.
        for _ in 0..2 {
            timers.tick();
        }
        assert_eq!(timers.system_clock & 0x8, 0x8);

        timers.set_divider();

        assert_eq!(timers.system_clock, 0);
        assert_eq!(timers.timer_counter, 1);
    }

    #[test]
    fn tac_disable_glitch_uses_16_bit_counter() {
        // 4096 Hz selects bit 9; only a 16-bit comparison can see it.
        let mut timers = enabled_timer(0x0);
        while timers.system_clock & 0x0200 == 0 {
            timers.tick();
        }
        let before = timers.timer_counter;

        timers.set_timer_control(0b0000);

        assert_eq!(timers.timer_counter, before + 1);
    }

    #[test]
    fn tac_frequency_change_glitch() {
        let mut timers = enabled_timer(0x3);
        // Bit 7 high, bit 3 low: switching 256 -> 16 drops the mux input.
        timers.system_clock = 0x0080;

        timers.set_timer_control(0b0101);

        assert_eq!(timers.timer_counter, 1);
    }

    #[test]
    fn control_register_upper_bits_forced() {
        let timers = enabled_timer(0x2);
        assert_eq!(timers.timer_control.to_bits(), 0xF8 | 0b0110);
    }
}
