//! The SM83 core. Cycle accuracy comes from interleaving `tick` calls with
//! the sub-operations of each instruction (through `read_byte_cycle` and
//! friends in `fetch.rs`), never from totalling cycles afterwards.

use log::*;

use crate::hardware::cpu::execute::{AddressTarget, JumpCondition};
use crate::hardware::cpu::traits::{ReadU16, ReadU8, WriteU16, WriteU8};
use crate::hardware::mmu::MemoryMapper;
use crate::hardware::registers::Reg8::A;
use crate::hardware::registers::{Reg16, Registers};

mod alu;
mod execute;
mod fetch;
mod traits;

#[cfg(test)]
mod tests;

#[derive(Debug)]
pub struct Cpu<M: MemoryMapper> {
    pub registers: Registers,
    pub mmu: M,
    /// T-cycles this CPU has driven, for instrumentation and tests.
    pub cycles_performed: u64,
    pub ime: bool,
    pub halted: bool,
    opcode: u8,
    /// EI takes effect after the following instruction.
    schedule_ime_set: bool,
    /// The HALT bug: the next opcode fetch does not advance PC.
    halt_bug_pending: bool,
}

impl<M: MemoryMapper> Cpu<M> {
    pub fn new(mmu: M) -> Self {
        Cpu {
            registers: Registers::new(),
            mmu,
            cycles_performed: 0,
            ime: false,
            halted: false,
            opcode: 0,
            schedule_ime_set: false,
            halt_bug_pending: false,
        }
    }

    /// Dispatch one instruction (or idle in halt mode), then service any
    /// pending interrupt. All clocked hardware advances from within.
    pub fn step(&mut self) {
        if self.schedule_ime_set {
            self.schedule_ime_set = false;
            self.ime = true;
        }

        if self.halted {
            self.add_cycles();
            self.handle_interrupts();
            return;
        }

        self.opcode = if self.halt_bug_pending {
            self.halt_bug_pending = false;
            // The fetch happens but PC stays put, doubling this opcode.
            self.read_byte_cycle(self.registers.pc)
        } else {
            self.get_instr_u8()
        };

        #[cfg(feature = "cpu-logging")]
        trace!("op {:02X} {}", self.opcode, self.registers);

        self.execute(self.opcode);
        self.handle_interrupts();
    }

    /// One M-cycle with no bus traffic.
    fn nop(&mut self) {}

    /// Undefined opcodes: real hardware wedges, we log and move on.
    fn unknown(&mut self) {
        warn!("Undefined opcode {:#04X} executed as a no-op", self.opcode);
    }

    /// `ld rr,nn` and `ld (nn),SP` (the only 16-bit store).
    fn load_16bit<T: Copy, U: Copy>(&mut self, destination: T, source: U)
    where
        Self: WriteU16<T> + ReadU16<U>,
    {
        let value = self.read_u16(source);
        self.write_u16(destination, value);
    }

    /// `ld` in all its 8-bit shapes. Never touches flags.
    fn load_8bit<T: Copy, U: Copy>(&mut self, destination: T, source: U)
    where
        Self: WriteU8<T> + ReadU8<U>,
    {
        let value = self.read_u8(source);
        self.write_u8(destination, value);
    }

    /// `ld SP,HL`, one internal cycle.
    fn load_sp_hl(&mut self) {
        self.registers.sp = self.registers.hl();
        self.add_cycles();
    }

    /// `ld HL,SP+i8`. Flags come from the low-byte addition.
    ///
    /// Flags: `00HC`
    fn load_hl_sp_offset(&mut self) {
        let offset = self.get_instr_u8() as i8 as u16;
        let sp = self.registers.sp;

        self.registers.set_hl(sp.wrapping_add(offset));
        self.set_sp_offset_flags(sp, offset);
        self.add_cycles();
    }

    /// `add SP,i8`, two internal cycles.
    ///
    /// Flags: `00HC`
    fn add_sp(&mut self) {
        let offset = self.get_instr_u8() as i8 as u16;
        let sp = self.registers.sp;

        self.registers.sp = sp.wrapping_add(offset);
        self.set_sp_offset_flags(sp, offset);
        self.add_cycles();
        self.add_cycles();
    }

    fn set_sp_offset_flags(&mut self, sp: u16, offset: u16) {
        self.registers.set_zero(false);
        self.registers.set_negative(false);
        self.registers
            .set_half_carry((sp & 0xF) + (offset & 0xF) > 0xF);
        self.registers
            .set_carry((sp & 0xFF) + (offset & 0xFF) > 0xFF);
    }

    /// `inc r8` / `inc (HL)`.
    ///
    /// Flags: `Z0H-`
    fn increment<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        let result = value.wrapping_add(1);

        self.registers.set_zero(result == 0);
        self.registers.set_negative(false);
        self.registers.set_half_carry(value & 0xF == 0xF);

        self.write_u8(target, result);
    }

    /// `dec r8` / `dec (HL)`.
    ///
    /// Flags: `Z1H-`
    fn decrement<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        let result = value.wrapping_sub(1);

        self.registers.set_zero(result == 0);
        self.registers.set_negative(true);
        self.registers.set_half_carry(value & 0xF == 0);

        self.write_u8(target, result);
    }

    /// `inc rr`, one internal cycle, no flags.
    fn increment16(&mut self, target: Reg16) {
        let value = self.read_u16(target).wrapping_add(1);
        self.write_u16(target, value);
        self.add_cycles();
    }

    /// `dec rr`, one internal cycle, no flags.
    fn decrement16(&mut self, target: Reg16) {
        let value = self.read_u16(target).wrapping_sub(1);
        self.write_u16(target, value);
        self.add_cycles();
    }

    /// `add HL,rr`, one internal cycle.
    ///
    /// Flags: `-0HC` with the half carry out of bit 11.
    fn add16(&mut self, source: Reg16) {
        let hl = self.registers.hl();
        let value = self.read_u16(source);
        let (result, overflowed) = hl.overflowing_add(value);

        self.registers.set_negative(false);
        self.registers
            .set_half_carry((hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF);
        self.registers.set_carry(overflowed);

        self.registers.set_hl(result);
        self.add_cycles();
    }

    /// `add A,x`.
    ///
    /// Flags: `Z0HC`
    fn add<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T>,
    {
        let value = self.read_u8(target);
        let (result, overflowed) = self.registers.a.overflowing_add(value);

        self.registers.set_zero(result == 0);
        self.registers.set_negative(false);
        self.registers
            .set_half_carry((self.registers.a & 0xF) + (value & 0xF) > 0xF);
        self.registers.set_carry(overflowed);

        self.registers.a = result;
    }

    /// `adc A,x`. H and C treat the carry as a second, separate addition:
    /// folding it into one 9-bit sum misses the case where both additions
    /// cross the nibble boundary.
    ///
    /// Flags: `Z0HC`
    fn adc<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T>,
    {
        let value = self.read_u8(target);
        let carry = self.registers.carry() as u8;
        let partial = self.registers.a.wrapping_add(value);
        let result = partial.wrapping_add(carry);

        let half_carry = (self.registers.a & 0xF) + (value & 0xF) > 0xF || (partial & 0xF) + carry > 0xF;
        let full_carry =
            self.registers.a.checked_add(value).is_none() || partial.checked_add(carry).is_none();

        self.registers.set_zero(result == 0);
        self.registers.set_negative(false);
        self.registers.set_half_carry(half_carry);
        self.registers.set_carry(full_carry);

        self.registers.a = result;
    }

    /// `sub A,x`.
    ///
    /// Flags: `Z1HC`
    fn sub<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T>,
    {
        let value = self.read_u8(target);
        let result = self.registers.a.wrapping_sub(value);

        self.registers.set_zero(result == 0);
        self.registers.set_negative(true);
        self.registers
            .set_half_carry(self.registers.a & 0xF < value & 0xF);
        self.registers.set_carry(self.registers.a < value);

        self.registers.a = result;
    }

    /// `sbc A,x`, same two-step flag rule as `adc`.
    ///
    /// Flags: `Z1HC`
    fn sbc<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T>,
    {
        let value = self.read_u8(target);
        let carry = self.registers.carry() as u8;
        let partial = self.registers.a.wrapping_sub(value);
        let result = partial.wrapping_sub(carry);

        let half_borrow = self.registers.a & 0xF < value & 0xF || partial & 0xF < carry;
        let full_borrow = self.registers.a < value || partial < carry;

        self.registers.set_zero(result == 0);
        self.registers.set_negative(true);
        self.registers.set_half_carry(half_borrow);
        self.registers.set_carry(full_borrow);

        self.registers.a = result;
    }

    /// Flags: `Z010`
    fn and<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T>,
    {
        self.registers.a &= self.read_u8(target);

        self.registers.set_zero(self.registers.a == 0);
        self.registers.set_negative(false);
        self.registers.set_half_carry(true);
        self.registers.set_carry(false);
    }

    /// Flags: `Z000`
    fn xor<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T>,
    {
        self.registers.a ^= self.read_u8(target);

        self.registers.set_zero(self.registers.a == 0);
        self.registers.set_negative(false);
        self.registers.set_half_carry(false);
        self.registers.set_carry(false);
    }

    /// Flags: `Z000`
    fn or<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T>,
    {
        self.registers.a |= self.read_u8(target);

        self.registers.set_zero(self.registers.a == 0);
        self.registers.set_negative(false);
        self.registers.set_half_carry(false);
        self.registers.set_carry(false);
    }

    /// `cp A,x`: `sub` without the writeback.
    ///
    /// Flags: `Z1HC`
    fn compare<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T>,
    {
        let value = self.read_u8(target);
        let result = self.registers.a.wrapping_sub(value);

        self.registers.set_zero(result == 0);
        self.registers.set_negative(true);
        self.registers
            .set_half_carry(self.registers.a & 0xF < value & 0xF);
        self.registers.set_carry(self.registers.a < value);
    }

    /// Decimal-adjust A after a BCD add or subtract, driven by N/H/C and
    /// the nibbles of A.
    ///
    /// Flags: `Z-0C`
    fn daa(&mut self) {
        let input = self.registers.a;
        let mut result = input;

        if !self.registers.negative() {
            if self.registers.half_carry() || input & 0x0F > 0x09 {
                result = result.wrapping_add(0x06);
            }
            if self.registers.carry() || input > 0x99 {
                result = result.wrapping_add(0x60);
                self.registers.set_carry(true);
            }
        } else {
            if self.registers.half_carry() {
                result = result.wrapping_sub(0x06);
            }
            if self.registers.carry() {
                result = result.wrapping_sub(0x60);
            }
        }

        self.registers.a = result;
        self.registers.set_zero(result == 0);
        self.registers.set_half_carry(false);
    }

    /// Flags: `-11-`
    fn cpl(&mut self) {
        self.registers.a = !self.registers.a;
        self.registers.set_negative(true);
        self.registers.set_half_carry(true);
    }

    /// Flags: `-001`
    fn scf(&mut self) {
        self.registers.set_negative(false);
        self.registers.set_half_carry(false);
        self.registers.set_carry(true);
    }

    /// Flags: `-00C` with C inverted.
    fn ccf(&mut self) {
        let carry = self.registers.carry();
        self.registers.set_negative(false);
        self.registers.set_half_carry(false);
        self.registers.set_carry(!carry);
    }

    /// Rotate instructions on A clear Z unconditionally.
    fn rlca(&mut self) {
        self.rotate_left(A);
        self.registers.set_zero(false);
    }

    fn rla(&mut self) {
        self.rotate_left_through_carry(A);
        self.registers.set_zero(false);
    }

    fn rrca(&mut self) {
        self.rotate_right(A);
        self.registers.set_zero(false);
    }

    fn rra(&mut self) {
        self.rotate_right_through_carry(A);
        self.registers.set_zero(false);
    }

    fn test_condition(&self, condition: JumpCondition) -> bool {
        match condition {
            JumpCondition::NotZero => !self.registers.zero(),
            JumpCondition::Zero => self.registers.zero(),
            JumpCondition::NotCarry => !self.registers.carry(),
            JumpCondition::Carry => self.registers.carry(),
            JumpCondition::Always => true,
        }
    }

    /// `jr cc,i8`. The internal cycle is only spent on a taken branch.
    fn jump_relative(&mut self, condition: JumpCondition) {
        let offset = self.get_instr_u8() as i8;
        if self.test_condition(condition) {
            self.registers.pc = self.registers.pc.wrapping_add(offset as u16);
            self.add_cycles();
        }
    }

    /// `jp cc,nn`.
    fn jump(&mut self, condition: JumpCondition) {
        let address = self.get_instr_u16();
        if self.test_condition(condition) {
            self.registers.pc = address;
            self.add_cycles();
        }
    }

    /// `jp HL` takes no extra cycle at all.
    fn jump_hl(&mut self) {
        self.registers.pc = self.registers.hl();
    }

    /// `call cc,nn`: the push's internal cycle doubles as the branch
    /// decision cycle.
    fn call(&mut self, condition: JumpCondition) {
        let address = self.get_instr_u16();
        if self.test_condition(condition) {
            self.push_helper(self.registers.pc);
            self.registers.pc = address;
        }
    }

    /// `ret`, 4 cycles.
    fn ret(&mut self) {
        self.registers.pc = self.read_short_cycle(self.registers.sp);
        self.registers.sp = self.registers.sp.wrapping_add(2);
        self.add_cycles();
    }

    /// `ret cc`: one cycle for the decision, and on a taken branch another
    /// one after PC is updated.
    fn ret_conditional(&mut self, condition: JumpCondition) {
        self.add_cycles();
        if self.test_condition(condition) {
            self.ret();
        }
    }

    /// `reti` = `ret` plus an immediate (not delayed) IME set.
    fn reti(&mut self) {
        self.ret();
        self.ime = true;
    }

    /// `rst vec`, a one-byte call.
    fn rst(&mut self, vector: u8) {
        self.push_helper(self.registers.pc);
        self.registers.pc = vector as u16;
    }

    fn push(&mut self, target: Reg16) {
        let value = self.read_u16(target);
        self.push_helper(value);
    }

    /// One internal cycle, then the high byte goes to SP-1 and the low
    /// byte to SP-2.
    pub(crate) fn push_helper(&mut self, value: u16) {
        self.add_cycles();
        self.write_byte_cycle(self.registers.sp.wrapping_sub(1), (value >> 8) as u8);
        self.write_byte_cycle(self.registers.sp.wrapping_sub(2), value as u8);
        self.registers.sp = self.registers.sp.wrapping_sub(2);
    }

    /// Two reads, then SP moves. `pop AF` keeps the flag low nibble zero
    /// through the register file.
    fn pop(&mut self, target: Reg16) {
        let value = self.read_short_cycle(self.registers.sp);
        self.write_u16(target, value);
        self.registers.sp = self.registers.sp.wrapping_add(2);
    }

    /// `di` masks interrupts with no delay.
    fn di(&mut self) {
        self.ime = false;
    }

    /// `ei` arms IME for after the next instruction, so `ei; di` never
    /// lets an interrupt through.
    fn ei(&mut self) {
        self.schedule_ime_set = true;
    }

    /// `halt`. With IME clear and an interrupt already pending the CPU
    /// fails to stop and instead re-runs the next opcode (the halt bug).
    fn halt(&mut self) {
        let pending = self.mmu.interrupts().pending() != 0;

        if self.ime || !pending {
            self.halted = true;
        } else {
            self.halt_bug_pending = true;
        }
    }

    /// `stop`: zeroes DIV, and on a CGB with KEY1 armed spends 2050
    /// M-cycles flipping the speed. Input is not sampled in between.
    fn stop(&mut self) {
        // STOP is encoded as two bytes; the second is discarded.
        self.get_instr_u8();
        self.mmu.reset_divider();

        if self.mmu.speed_switch_armed() {
            debug!("STOP with KEY1 armed, switching speed");
            self.mmu.set_speed_switch_in_progress(true);
            for _ in 0..2050 {
                self.add_cycles();
            }
            self.mmu.toggle_speed();
        }
    }

    /*
       CB-prefixed page
    */

    /// `rlc r8/[HL]`. Flags: `Z00C`
    fn rlc<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        self.rotate_left(target);
    }

    /// `rrc r8/[HL]`. Flags: `Z00C`
    fn rrc<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        self.rotate_right(target);
    }

    /// `rl r8/[HL]`. Flags: `Z00C`
    fn rl<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        self.rotate_left_through_carry(target);
    }

    /// `rr r8/[HL]`. Flags: `Z00C`
    fn rr<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        self.rotate_right_through_carry(target);
    }

    /// `sla r8/[HL]`. Flags: `Z00C`
    fn sla<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        self.shift_left_arithmetic(target);
    }

    /// `sra r8/[HL]`. Flags: `Z00C`
    fn sra<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        self.shift_right_arithmetic(target);
    }

    /// `swap r8/[HL]`: exchange the nibbles.
    ///
    /// Flags: `Z000`
    fn swap<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        let result = value << 4 | value >> 4;

        self.registers.set_zero(result == 0);
        self.registers.set_negative(false);
        self.registers.set_half_carry(false);
        self.registers.set_carry(false);

        self.write_u8(target, result);
    }

    /// `srl r8/[HL]`. Flags: `Z00C`
    fn srl<T: Copy>(&mut self, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        self.shift_right_logical(target);
    }

    /// `bit n,r8/[HL]`.
    ///
    /// Flags: `Z01-`
    fn bit<T: Copy>(&mut self, bit: u8, target: T)
    where
        Self: ReadU8<T>,
    {
        let value = self.read_u8(target);

        self.registers.set_zero(value & (1 << bit) == 0);
        self.registers.set_negative(false);
        self.registers.set_half_carry(true);
    }

    /// `set n,r8/[HL]`. Flags untouched.
    fn set<T: Copy>(&mut self, bit: u8, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        self.write_u8(target, value | 1 << bit);
    }

    /// `res n,r8/[HL]`. Flags untouched.
    fn res<T: Copy>(&mut self, bit: u8, target: T)
    where
        Self: ReadU8<T> + WriteU8<T>,
    {
        let value = self.read_u8(target);
        self.write_u8(target, value & !(1 << bit));
    }

    /// `ld (nn),SP` gets its own wrapper so the dispatch table reads
    /// uniformly.
    fn load_mem_sp(&mut self) {
        self.load_16bit(AddressTarget::ImmediateAddress, Reg16::SP);
    }
}
