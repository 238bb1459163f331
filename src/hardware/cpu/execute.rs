use crate::hardware::cpu::Cpu;
use crate::hardware::mmu::MemoryMapper;
use crate::hardware::registers::Reg8;

/// The non-register addressing forms an 8- or 16-bit operand can take.
#[derive(Debug, Copy, Clone)]
pub enum AddressTarget {
    BcIndirect,
    DeIndirect,
    HlIndirect,
    /// (HL), then HL += 1.
    HlIncrement,
    /// (HL), then HL -= 1.
    HlDecrement,
    /// The byte (or byte pair) following the opcode.
    Immediate,
    /// A 16-bit address operand, dereferenced.
    ImmediateAddress,
    /// 0xFF00 + immediate byte.
    HighImmediate,
    /// 0xFF00 + C.
    HighC,
}

/// Either a plain register or a memory form; what the 8-bit columns of the
/// opcode table decode to.
#[derive(Debug, Copy, Clone)]
pub enum Operand8 {
    Register(Reg8),
    Address(AddressTarget),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum JumpCondition {
    NotZero,
    Zero,
    NotCarry,
    Carry,
    Always,
}

/// Low-3-bits operand column: B,C,D,E,H,L,(HL),A.
fn operand_column(bits: u8) -> Operand8 {
    match bits & 0x07 {
        0x0 => Operand8::Register(Reg8::B),
        0x1 => Operand8::Register(Reg8::C),
        0x2 => Operand8::Register(Reg8::D),
        0x3 => Operand8::Register(Reg8::E),
        0x4 => Operand8::Register(Reg8::H),
        0x5 => Operand8::Register(Reg8::L),
        0x6 => Operand8::Address(AddressTarget::HlIndirect),
        _ => Operand8::Register(Reg8::A),
    }
}

/// Bits 3-5 pick the destination row of the LD block.
fn operand_row(opcode: u8) -> Operand8 {
    operand_column(opcode >> 3)
}

fn prefixed_bit(opcode: u8) -> u8 {
    (opcode >> 3) & 0x07
}

impl<M: MemoryMapper> Cpu<M> {
    pub(crate) fn execute(&mut self, opcode: u8) {
        use crate::hardware::registers::Reg16::*;
        use crate::hardware::registers::Reg8::*;
        use AddressTarget::*;
        use JumpCondition::*;

        match opcode {
            0x00 => self.nop(),
            0x01 => self.load_16bit(BC, Immediate),
            0x02 => self.load_8bit(BcIndirect, A),
            0x03 => self.increment16(BC),
            0x04 => self.increment(B),
            0x05 => self.decrement(B),
            0x06 => self.load_8bit(B, Immediate),
            0x07 => self.rlca(),
            0x08 => self.load_mem_sp(),
            0x09 => self.add16(BC),
            0x0A => self.load_8bit(A, BcIndirect),
            0x0B => self.decrement16(BC),
            0x0C => self.increment(C),
            0x0D => self.decrement(C),
            0x0E => self.load_8bit(C, Immediate),
            0x0F => self.rrca(),
            0x10 => self.stop(),
            0x11 => self.load_16bit(DE, Immediate),
            0x12 => self.load_8bit(DeIndirect, A),
            0x13 => self.increment16(DE),
            0x14 => self.increment(D),
            0x15 => self.decrement(D),
            0x16 => self.load_8bit(D, Immediate),
            0x17 => self.rla(),
            0x18 => self.jump_relative(Always),
            0x19 => self.add16(DE),
            0x1A => self.load_8bit(A, DeIndirect),
            0x1B => self.decrement16(DE),
            0x1C => self.increment(E),
            0x1D => self.decrement(E),
            0x1E => self.load_8bit(E, Immediate),
            0x1F => self.rra(),
            0x20 => self.jump_relative(NotZero),
            0x21 => self.load_16bit(HL, Immediate),
            0x22 => self.load_8bit(HlIncrement, A),
            0x23 => self.increment16(HL),
            0x24 => self.increment(H),
            0x25 => self.decrement(H),
            0x26 => self.load_8bit(H, Immediate),
            0x27 => self.daa(),
            0x28 => self.jump_relative(Zero),
            0x29 => self.add16(HL),
            0x2A => self.load_8bit(A, HlIncrement),
            0x2B => self.decrement16(HL),
            0x2C => self.increment(L),
            0x2D => self.decrement(L),
            0x2E => self.load_8bit(L, Immediate),
            0x2F => self.cpl(),
            0x30 => self.jump_relative(NotCarry),
            0x31 => self.load_16bit(SP, Immediate),
            0x32 => self.load_8bit(HlDecrement, A),
            0x33 => self.increment16(SP),
            0x34 => self.increment(HlIndirect),
            0x35 => self.decrement(HlIndirect),
            0x36 => self.load_8bit(HlIndirect, Immediate),
            0x37 => self.scf(),
            0x38 => self.jump_relative(Carry),
            0x39 => self.add16(SP),
            0x3A => self.load_8bit(A, HlDecrement),
            0x3B => self.decrement16(SP),
            0x3C => self.increment(A),
            0x3D => self.decrement(A),
            0x3E => self.load_8bit(A, Immediate),
            0x3F => self.ccf(),
            0x76 => self.halt(),
            0x40..=0x7F => self.load_8bit(operand_row(opcode), operand_column(opcode)),
            0x80..=0x87 => self.add(operand_column(opcode)),
            0x88..=0x8F => self.adc(operand_column(opcode)),
            0x90..=0x97 => self.sub(operand_column(opcode)),
            0x98..=0x9F => self.sbc(operand_column(opcode)),
            0xA0..=0xA7 => self.and(operand_column(opcode)),
            0xA8..=0xAF => self.xor(operand_column(opcode)),
            0xB0..=0xB7 => self.or(operand_column(opcode)),
            0xB8..=0xBF => self.compare(operand_column(opcode)),
            0xC0 => self.ret_conditional(NotZero),
            0xC1 => self.pop(BC),
            0xC2 => self.jump(NotZero),
            0xC3 => self.jump(Always),
            0xC4 => self.call(NotZero),
            0xC5 => self.push(BC),
            0xC6 => self.add(Immediate),
            0xC7 => self.rst(0x00),
            0xC8 => self.ret_conditional(Zero),
            0xC9 => self.ret(),
            0xCA => self.jump(Zero),
            0xCB => self.prefixed_call(),
            0xCC => self.call(Zero),
            0xCD => self.call(Always),
            0xCE => self.adc(Immediate),
            0xCF => self.rst(0x08),
            0xD0 => self.ret_conditional(NotCarry),
            0xD1 => self.pop(DE),
            0xD2 => self.jump(NotCarry),
            0xD3 => self.unknown(),
            0xD4 => self.call(NotCarry),
            0xD5 => self.push(DE),
            0xD6 => self.sub(Immediate),
            0xD7 => self.rst(0x10),
            0xD8 => self.ret_conditional(Carry),
            0xD9 => self.reti(),
            0xDA => self.jump(Carry),
            0xDB => self.unknown(),
            0xDC => self.call(Carry),
            0xDD => self.unknown(),
            0xDE => self.sbc(Immediate),
            0xDF => self.rst(0x18),
            0xE0 => self.load_8bit(HighImmediate, A),
            0xE1 => self.pop(HL),
            0xE2 => self.load_8bit(HighC, A),
            0xE3 | 0xE4 => self.unknown(),
            0xE5 => self.push(HL),
            0xE6 => self.and(Immediate),
            0xE7 => self.rst(0x20),
            0xE8 => self.add_sp(),
            0xE9 => self.jump_hl(),
            0xEA => self.load_8bit(ImmediateAddress, A),
            0xEB..=0xED => self.unknown(),
            0xEE => self.xor(Immediate),
            0xEF => self.rst(0x28),
            0xF0 => self.load_8bit(A, HighImmediate),
            0xF1 => self.pop(AF),
            0xF2 => self.load_8bit(A, HighC),
            0xF3 => self.di(),
            0xF4 => self.unknown(),
            0xF5 => self.push(AF),
            0xF6 => self.or(Immediate),
            0xF7 => self.rst(0x30),
            0xF8 => self.load_hl_sp_offset(),
            0xF9 => self.load_sp_hl(),
            0xFA => self.load_8bit(A, ImmediateAddress),
            0xFB => self.ei(),
            0xFC | 0xFD => self.unknown(),
            0xFE => self.compare(Immediate),
            0xFF => self.rst(0x38),
        }
    }

    pub(crate) fn execute_prefixed(&mut self, opcode: u8) {
        let target = operand_column(opcode);
        match opcode {
            0x00..=0x07 => self.rlc(target),
            0x08..=0x0F => self.rrc(target),
            0x10..=0x17 => self.rl(target),
            0x18..=0x1F => self.rr(target),
            0x20..=0x27 => self.sla(target),
            0x28..=0x2F => self.sra(target),
            0x30..=0x37 => self.swap(target),
            0x38..=0x3F => self.srl(target),
            0x40..=0x7F => self.bit(prefixed_bit(opcode), target),
            0x80..=0xBF => self.res(prefixed_bit(opcode), target),
            0xC0..=0xFF => self.set(prefixed_bit(opcode), target),
        }
    }
}
