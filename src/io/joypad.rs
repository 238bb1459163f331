//! The joypad register multiplexes eight buttons over one nibble: writes to
//! bits 4-5 pick the direction and/or action row, reads see the selected
//! rows OR-ed together with pressed keys reading 0.

use bitflags::*;

pub const JOYPAD_REGISTER: u16 = 0xFF00;

#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub enum InputKey {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

bitflags! {
    /// One row of four keys, active high internally (the register inverts).
    #[derive(Default)]
    struct KeyRow: u8 {
        const RIGHT_A    = 0b0001;
        const LEFT_B     = 0b0010;
        const UP_SELECT  = 0b0100;
        const DOWN_START = 0b1000;
    }
}

impl InputKey {
    fn row_bit(self) -> KeyRow {
        match self {
            InputKey::Right | InputKey::A => KeyRow::RIGHT_A,
            InputKey::Left | InputKey::B => KeyRow::LEFT_B,
            InputKey::Up | InputKey::Select => KeyRow::UP_SELECT,
            InputKey::Down | InputKey::Start => KeyRow::DOWN_START,
        }
    }

    fn is_direction(self) -> bool {
        matches!(
            self,
            InputKey::Right | InputKey::Left | InputKey::Up | InputKey::Down
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct Joypad {
    pressed_directions: KeyRow,
    pressed_actions: KeyRow,
    select_directions: bool,
    select_actions: bool,
}

impl Joypad {
    pub fn new() -> Self {
        Joypad::default()
    }

    /// Synthesize P1: bits 6-7 always read 1, bits 4-5 echo the row
    /// selection, the low nibble is the selected rows with pressed = 0.
    pub fn read_register(&self) -> u8 {
        let mut pressed = KeyRow::empty();
        if self.select_directions {
            pressed.insert(self.pressed_directions);
        }
        if self.select_actions {
            pressed.insert(self.pressed_actions);
        }

        0b1100_0000
            | (!self.select_actions as u8) << 5
            | (!self.select_directions as u8) << 4
            | (!pressed.bits() & 0xF)
    }

    /// Only the row-select bits are writable; 0 selects a row.
    pub fn write_register(&mut self, value: u8) {
        self.select_directions = value & 0b0001_0000 == 0;
        self.select_actions = value & 0b0010_0000 == 0;
    }

    /// Register a key as held down. Returns `true` if the press should
    /// raise a joypad interrupt (its row is currently selected).
    pub fn press_key(&mut self, key: InputKey) -> bool {
        let bit = key.row_bit();
        if key.is_direction() {
            self.pressed_directions.insert(bit);
            self.select_directions
        } else {
            self.pressed_actions.insert(bit);
            self.select_actions
        }
    }

    pub fn release_key(&mut self, key: InputKey) {
        let bit = key.row_bit();
        if key.is_direction() {
            self.pressed_directions.remove(bit);
        } else {
            self.pressed_actions.remove(bit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_selected_reads_high() {
        let mut joypad = Joypad::new();
        joypad.write_register(0x30);
        joypad.press_key(InputKey::A);

        assert_eq!(joypad.read_register(), 0xFF);
    }

    #[test]
    fn selected_row_pulls_pressed_keys_low() {
        let mut joypad = Joypad::new();
        // Bit 4 low selects the direction row.
        joypad.write_register(0x20);
        joypad.press_key(InputKey::Down);

        assert_eq!(joypad.read_register(), 0b1110_0111);

        joypad.release_key(InputKey::Down);
        assert_eq!(joypad.read_register(), 0b1110_1111);
    }

    #[test]
    fn both_rows_merge() {
        let mut joypad = Joypad::new();
        joypad.write_register(0x00);
        joypad.press_key(InputKey::Start);
        joypad.press_key(InputKey::Right);

        assert_eq!(joypad.read_register() & 0x0F, 0b0110);
    }

    #[test]
    fn press_interrupts_only_when_row_selected() {
        let mut joypad = Joypad::new();
        joypad.write_register(0x20); // directions selected

        assert!(joypad.press_key(InputKey::Left));
        assert!(!joypad.press_key(InputKey::B));
    }
}
