use log::*;
use thiserror::Error;

use crate::hardware::cartridge::header::CartridgeHeader;
use crate::hardware::cartridge::mbc::{Mbc1, Mbc2, MemoryBankController};
use crate::hardware::cartridge::mbc3::{Mbc3, Rtc, RtcState};
use crate::hardware::cartridge::mbc5::Mbc5;

pub mod header;
pub mod mbc;
pub mod mbc3;
pub mod mbc5;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("ROM image of {0} bytes is too small to hold a cartridge header")]
    TooSmall(usize),
    #[error("boot logo bytes do not match")]
    InvalidLogo,
    #[error("header checksum mismatch (computed {computed:#04X}, stored {stored:#04X})")]
    ChecksumMismatch { computed: u8, stored: u8 },
    #[error("cartridge type {0:#04X} is not supported")]
    UnsupportedMbc(u8),
}

/// A parsed and validated cartridge. The raw ROM bytes live here for the
/// whole session; the MBC owns the banking state and any external RAM.
pub struct Cartridge {
    header: CartridgeHeader,
    rom: Vec<u8>,
    mbc: MemoryBankController,
    has_battery: bool,
}

impl Cartridge {
    pub fn new(
        rom: &[u8],
        saved_ram: Option<Vec<u8>>,
        saved_rtc: Option<RtcState>,
    ) -> Result<Self, CartridgeError> {
        let header = CartridgeHeader::parse(rom)?;
        debug!(
            "Cartridge: {:?} (type {:#04X}, {} ROM banks, {} bytes RAM)",
            header.title,
            header.cartridge_type,
            header.rom_banks(),
            header.ram_size_bytes()
        );

        let rom_banks = header.rom_banks();
        let ram = external_ram(&header, saved_ram);

        let mbc = match header.cartridge_type {
            0x00 | 0x08 | 0x09 => MemoryBankController::None { ram },
            0x01..=0x03 => MemoryBankController::Mbc1(Mbc1::new(rom_banks, ram)),
            0x05 | 0x06 => MemoryBankController::Mbc2(Mbc2::new(rom_banks, ram)),
            0x0F | 0x10 => MemoryBankController::Mbc3(Mbc3::new(
                rom_banks,
                ram,
                Some(saved_rtc.map_or_else(Rtc::default, Rtc::from_state)),
            )),
            0x11..=0x13 => MemoryBankController::Mbc3(Mbc3::new(rom_banks, ram, None)),
            0x19..=0x1B => MemoryBankController::Mbc5(Mbc5::new(rom_banks, ram, false)),
            0x1C..=0x1E => MemoryBankController::Mbc5(Mbc5::new(rom_banks, ram, true)),
            other => return Err(CartridgeError::UnsupportedMbc(other)),
        };

        Ok(Cartridge {
            has_battery: matches!(
                header.cartridge_type,
                0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E
            ),
            header,
            rom: rom.to_vec(),
            mbc,
        })
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    /// 0x0000-0x3FFF.
    pub fn read_rom_low(&self, address: u16) -> u8 {
        self.mbc.read_rom_low(&self.rom, address)
    }

    /// 0x4000-0x7FFF.
    pub fn read_rom_high(&self, address: u16) -> u8 {
        self.mbc.read_rom_high(&self.rom, address)
    }

    /// 0xA000-0xBFFF.
    pub fn read_external_ram(&self, address: u16) -> u8 {
        self.mbc.read_ram(address)
    }

    pub fn write_external_ram(&mut self, address: u16, value: u8) {
        self.mbc.write_ram(address, value);
    }

    /// ROM-range writes land on the MBC's control registers.
    pub fn write_control(&mut self, address: u16, value: u8) {
        self.mbc.write_control(address, value);
    }

    /// The external RAM blob, if this cartridge would persist it on real
    /// hardware. Saving it is the host's responsibility.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        if self.has_battery {
            Some(self.mbc.ram())
        } else {
            None
        }
    }

    /// Current RTC snapshot for persistence (MBC3 clock carts only).
    pub fn rtc_state(&self) -> Option<RtcState> {
        match &self.mbc {
            MemoryBankController::Mbc3(mbc) => mbc.rtc.as_ref().map(|rtc| rtc.state().clone()),
            _ => None,
        }
    }

    /// Roll the RTC forward to the given wall-clock second.
    pub fn update_rtc(&mut self, now: u64) {
        if let MemoryBankController::Mbc3(mbc) = &mut self.mbc {
            if let Some(rtc) = mbc.rtc.as_mut() {
                rtc.advance_to(now);
            }
        }
    }
}

fn external_ram(header: &CartridgeHeader, saved_ram: Option<Vec<u8>>) -> Vec<u8> {
    // MBC2 carts have their 512 half-bytes on the controller itself and
    // advertise a RAM size of 0.
    let size = if matches!(header.cartridge_type, 0x05 | 0x06) {
        Mbc2::RAM_SIZE
    } else {
        header.ram_size_bytes()
    };

    match saved_ram {
        Some(saved) if saved.len() == size => saved,
        Some(saved) => {
            warn!(
                "Saved RAM of {} bytes does not match cartridge RAM size {}, ignoring",
                saved.len(),
                size
            );
            vec![0xFF; size]
        }
        None => vec![0xFF; size],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::cartridge::header::{compute_header_checksum, NINTENDO_LOGO};
    use crate::hardware::cartridge::mbc::ROM_BANK_SIZE;

    pub fn rom_with_type(cartridge_type: u8, rom_size: u8, ram_size: u8) -> Vec<u8> {
        let mut rom = vec![0u8; 0x4000 * (2 << rom_size as usize)];
        rom[0x104..0x134].copy_from_slice(&NINTENDO_LOGO);
        rom[0x147] = cartridge_type;
        rom[0x148] = rom_size;
        rom[0x149] = ram_size;
        rom[0x14D] = compute_header_checksum(&rom);
        rom
    }

    #[test]
    fn bank_switch_changes_high_window() {
        let mut rom = rom_with_type(0x01, 2, 0);
        // Tag the first byte of every bank with its bank number.
        for bank in 0..8 {
            rom[bank * ROM_BANK_SIZE] = bank as u8;
        }
        rom[0x14D] = compute_header_checksum(&rom);

        let mut cartridge = Cartridge::new(&rom, None, None).unwrap();
        assert_eq!(cartridge.read_rom_high(0x4000), 1);

        cartridge.write_control(0x2000, 0x05);
        assert_eq!(cartridge.read_rom_high(0x4000), 5);
        assert_eq!(cartridge.read_rom_low(0x0000), 0);
    }

    #[test]
    fn unsupported_type_is_fatal() {
        let rom = rom_with_type(0xFC, 0, 0);
        assert!(matches!(
            Cartridge::new(&rom, None, None),
            Err(CartridgeError::UnsupportedMbc(0xFC))
        ));
    }

    #[test]
    fn battery_ram_only_on_battery_carts() {
        let rom = rom_with_type(0x03, 0, 0x2);
        let cartridge = Cartridge::new(&rom, None, None).unwrap();
        assert_eq!(cartridge.battery_ram().map(<[u8]>::len), Some(0x2000));

        let rom = rom_with_type(0x01, 0, 0x2);
        let cartridge = Cartridge::new(&rom, None, None).unwrap();
        assert!(cartridge.battery_ram().is_none());
    }

    #[test]
    fn saved_ram_restores_contents() {
        let rom = rom_with_type(0x03, 0, 0x2);
        let mut saved = vec![0u8; 0x2000];
        saved[0x123] = 0x42;

        let mut cartridge = Cartridge::new(&rom, Some(saved), None).unwrap();
        cartridge.write_control(0x0000, 0x0A);
        assert_eq!(cartridge.read_external_ram(0xA123), 0x42);
    }
}
