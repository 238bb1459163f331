use nanoserde::{DeJson, SerJson};

use crate::hardware::cartridge::mbc::{EXTERNAL_RAM_BANK_SIZE, INVALID_READ};

const SECONDS_PER_DAY: u64 = 86_400;

/// Persistable snapshot of the clock chip: the five counter registers plus
/// the wall-clock second they were last brought up to date.
#[derive(Debug, Default, Clone, SerJson, DeJson)]
pub struct RtcState {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub day_low: u8,
    /// Bit 0: day counter bit 8, bit 6: halt, bit 7: day carry.
    pub day_high: u8,
    pub last_wall_time: u64,
}

/// The MBC3's real-time clock. The live registers only advance when the
/// host hands us a wall-clock timestamp; games read a latched snapshot that
/// freezes on a 0->1 write to the latch register.
#[derive(Debug, Default)]
pub struct Rtc {
    state: RtcState,
    latched: RtcState,
    latch_register: u8,
}

impl Rtc {
    pub fn from_state(state: RtcState) -> Self {
        Rtc {
            latched: state.clone(),
            state,
            latch_register: 0x1,
        }
    }

    pub fn state(&self) -> &RtcState {
        &self.state
    }

    /// Roll the counters forward to `now` (seconds since an arbitrary host
    /// epoch). A halted clock only records the timestamp.
    pub fn advance_to(&mut self, now: u64) {
        let halted = self.state.day_high & 0x40 != 0;
        let elapsed = now.saturating_sub(self.state.last_wall_time);
        self.state.last_wall_time = now;

        if halted || elapsed == 0 {
            return;
        }

        let days_held =
            (self.state.day_low as u64) | (((self.state.day_high & 0x1) as u64) << 8);
        let mut total = self.state.seconds as u64
            + self.state.minutes as u64 * 60
            + self.state.hours as u64 * 3600
            + days_held * SECONDS_PER_DAY
            + elapsed;

        self.state.seconds = (total % 60) as u8;
        total /= 60;
        self.state.minutes = (total % 60) as u8;
        total /= 60;
        self.state.hours = (total % 24) as u8;
        let days = total / 24;

        self.state.day_low = days as u8;
        self.state.day_high = (self.state.day_high & 0xFE) | ((days >> 8) & 0x1) as u8;
        if days > 0x1FF {
            // Day counter overflowed: set the carry bit, it sticks until
            // the game clears it.
            self.state.day_high |= 0x80;
        }
    }

    pub fn write_latch(&mut self, value: u8) {
        if self.latch_register == 0 && value == 1 {
            self.latched = self.state.clone();
        }
        self.latch_register = value;
    }

    pub fn read_register(&self, selected: u8) -> u8 {
        match selected {
            0x08 => self.latched.seconds,
            0x09 => self.latched.minutes,
            0x0A => self.latched.hours,
            0x0B => self.latched.day_low,
            0x0C => self.latched.day_high,
            _ => INVALID_READ,
        }
    }

    pub fn write_register(&mut self, selected: u8, value: u8) {
        match selected {
            0x08 => self.state.seconds = value & 0x3F,
            0x09 => self.state.minutes = value & 0x3F,
            0x0A => self.state.hours = value & 0x1F,
            0x0B => self.state.day_low = value,
            0x0C => self.state.day_high = value & 0xC1,
            _ => {}
        }
    }
}

/// MBC3: 7-bit ROM bank, a shared secondary register selecting either a RAM
/// bank (0-3) or an RTC register (0x08-0x0C), and the latch mechanism.
#[derive(Debug)]
pub struct Mbc3 {
    pub ram: Vec<u8>,
    pub rtc: Option<Rtc>,
    ram_enabled: bool,
    rom_banks: usize,
    pub(super) rom_bank: usize,
    /// Value last written to 0x4000-0x5FFF: a RAM bank or an RTC selector.
    ram_or_rtc_select: u8,
}

impl Mbc3 {
    pub fn new(rom_banks: usize, ram: Vec<u8>, rtc: Option<Rtc>) -> Self {
        Mbc3 {
            ram,
            rtc,
            ram_enabled: false,
            rom_banks,
            rom_bank: 1,
            ram_or_rtc_select: 0,
        }
    }

    pub(super) fn write_control(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => self.ram_enabled = value & 0xF == 0xA,
            0x2000..=0x3FFF => {
                let bank = (value & 0x7F) as usize & (self.rom_banks - 1);
                self.rom_bank = if bank == 0 { 1 } else { bank };
            }
            0x4000..=0x5FFF => {
                let value = value & 0xF;
                match value {
                    0x00..=0x03 => self.ram_or_rtc_select = value,
                    0x08..=0x0C if self.rtc.is_some() => self.ram_or_rtc_select = value,
                    _ => {}
                }
            }
            0x6000..=0x7FFF => {
                if let Some(rtc) = self.rtc.as_mut() {
                    rtc.write_latch(value);
                }
            }
            _ => {}
        }
    }

    pub(super) fn read_ram(&self, offset: usize) -> u8 {
        if !self.ram_enabled {
            return INVALID_READ;
        }

        if self.ram_or_rtc_select < 0x04 {
            if self.ram.is_empty() {
                return INVALID_READ;
            }
            let bank = self.ram_or_rtc_select as usize;
            self.ram[(bank * EXTERNAL_RAM_BANK_SIZE + offset) % self.ram.len()]
        } else {
            self.rtc
                .as_ref()
                .map_or(INVALID_READ, |rtc| rtc.read_register(self.ram_or_rtc_select))
        }
    }

    pub(super) fn write_ram(&mut self, offset: usize, value: u8) {
        if !self.ram_enabled {
            return;
        }

        if self.ram_or_rtc_select < 0x04 {
            if self.ram.is_empty() {
                return;
            }
            let bank = self.ram_or_rtc_select as usize;
            let len = self.ram.len();
            self.ram[(bank * EXTERNAL_RAM_BANK_SIZE + offset) % len] = value;
        } else if let Some(rtc) = self.rtc.as_mut() {
            rtc.write_register(self.ram_or_rtc_select, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_bank_is_seven_bits_with_zero_promotion() {
        let mut mbc = Mbc3::new(128, Vec::new(), None);

        mbc.write_control(0x2000, 0x00);
        assert_eq!(mbc.rom_bank, 1);

        mbc.write_control(0x2000, 0xFF);
        assert_eq!(mbc.rom_bank, 0x7F);
    }

    #[test]
    fn secondary_register_selects_ram_or_rtc() {
        let mut mbc = Mbc3::new(128, vec![0; 4 * EXTERNAL_RAM_BANK_SIZE], Some(Rtc::default()));
        mbc.write_control(0x0000, 0x0A);

        mbc.write_control(0x4000, 0x02);
        mbc.write_ram(0x10, 0x55);
        assert_eq!(mbc.ram[2 * EXTERNAL_RAM_BANK_SIZE + 0x10], 0x55);

        mbc.write_control(0x4000, 0x09);
        mbc.write_ram(0, 30);
        mbc.write_control(0x6000, 0x00);
        mbc.write_control(0x6000, 0x01);
        assert_eq!(mbc.read_ram(0), 30);
    }

    #[test]
    fn latch_freezes_snapshot_on_rising_write() {
        let mut rtc = Rtc::default();
        rtc.write_register(0x08, 10);
        rtc.write_latch(0x00);
        rtc.write_latch(0x01);
        assert_eq!(rtc.read_register(0x08), 10);

        // Live registers move on, the latched copy stays.
        rtc.write_register(0x08, 50);
        assert_eq!(rtc.read_register(0x08), 10);

        rtc.write_latch(0x00);
        rtc.write_latch(0x01);
        assert_eq!(rtc.read_register(0x08), 50);
    }

    #[test]
    fn advance_rolls_over_fields() {
        let mut rtc = Rtc::default();
        // 1 day, 2 hours, 3 minutes, 4 seconds.
        rtc.advance_to(SECONDS_PER_DAY + 2 * 3600 + 3 * 60 + 4);

        assert_eq!(rtc.state().seconds, 4);
        assert_eq!(rtc.state().minutes, 3);
        assert_eq!(rtc.state().hours, 2);
        assert_eq!(rtc.state().day_low, 1);
    }

    #[test]
    fn halted_clock_does_not_advance() {
        let mut rtc = Rtc::default();
        rtc.write_register(0x0C, 0x40);
        rtc.advance_to(1000);

        assert_eq!(rtc.state().seconds, 0);
    }
}
