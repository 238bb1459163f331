//! Shared rotate/shift helpers; the unprefixed RLCA/RLA/RRCA/RRA forms are
//! the same circuits with the zero flag forced low.

use crate::hardware::cpu::traits::{ReadU8, WriteU8};
use crate::hardware::cpu::Cpu;
use crate::hardware::mmu::MemoryMapper;

impl<M: MemoryMapper> Cpu<M> {
    /// C <- [7 <- 0] <- [7]
    pub(crate) fn rotate_left<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        let result = value.rotate_left(1);

        self.set_rotate_flags(result, value & 0x80 != 0);
        self.write_u8(target, result);
    }

    /// C <- [7 <- 0] <- C
    pub(crate) fn rotate_left_through_carry<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        let result = value << 1 | self.registers.carry() as u8;

        self.set_rotate_flags(result, value & 0x80 != 0);
        self.write_u8(target, result);
    }

    /// [0] -> [7 -> 0] -> C
    pub(crate) fn rotate_right<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        let result = value.rotate_right(1);

        self.set_rotate_flags(result, value & 0x01 != 0);
        self.write_u8(target, result);
    }

    /// C -> [7 -> 0] -> C
    pub(crate) fn rotate_right_through_carry<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        let result = (self.registers.carry() as u8) << 7 | value >> 1;

        self.set_rotate_flags(result, value & 0x01 != 0);
        self.write_u8(target, result);
    }

    /// C <- [7 <- 0] <- 0
    pub(crate) fn shift_left_arithmetic<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        let result = value << 1;

        self.set_rotate_flags(result, value & 0x80 != 0);
        self.write_u8(target, result);
    }

    /// [7] -> [7 -> 0] -> C, sign bit sticks.
    pub(crate) fn shift_right_arithmetic<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        let result = (value & 0x80) | value >> 1;

        self.set_rotate_flags(result, value & 0x01 != 0);
        self.write_u8(target, result);
    }

    /// 0 -> [7 -> 0] -> C
    pub(crate) fn shift_right_logical<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        let result = value >> 1;

        self.set_rotate_flags(result, value & 0x01 != 0);
        self.write_u8(target, result);
    }

    #[inline]
    fn set_rotate_flags(&mut self, result: u8, carry: bool) {
        self.registers.set_zero(result == 0);
        self.registers.set_negative(false);
        self.registers.set_half_carry(false);
        self.registers.set_carry(carry);
    }
}
