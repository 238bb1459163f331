use pretty_assertions::assert_eq;

use crate::hardware::cpu::tests::{cpu_with_code, read_short};
use crate::io::interrupts::InterruptFlags;

#[test]
fn dispatch_jumps_to_vector_and_clears_flag() {
    // A NOP, with a timer interrupt pending and enabled.
    let mut cpu = cpu_with_code(&[0x00]);
    cpu.registers.sp = 0xFFFE;
    cpu.ime = true;
    cpu.mmu.interrupts.overwrite_enable(0x04);
    cpu.mmu.interrupts.request(InterruptFlags::TIMER);

    cpu.step();

    assert_eq!(cpu.registers.pc, 0x50);
    assert!(!cpu.ime);
    assert!(!cpu.mmu.interrupts.interrupt_flag.contains(InterruptFlags::TIMER));
    // Pushed return address is the instruction after the NOP.
    assert_eq!(read_short(&cpu, 0xFFFC), 0x0001);
    // NOP (4) + dispatch (20).
    assert_eq!(cpu.cycles_performed, 24);
}

#[test]
fn priority_order_is_fixed() {
    let mut cpu = cpu_with_code(&[0x00]);
    cpu.registers.sp = 0xFFFE;
    cpu.ime = true;
    cpu.mmu.interrupts.overwrite_enable(0x1F);
    cpu.mmu.interrupts.overwrite_flag(0x1A); // LCD, Serial, Joypad

    cpu.step();

    assert_eq!(cpu.registers.pc, 0x48);
}

#[test]
fn no_dispatch_with_ime_clear() {
    let mut cpu = cpu_with_code(&[0x00, 0x00]);
    cpu.mmu.interrupts.overwrite_enable(0x01);
    cpu.mmu.interrupts.request(InterruptFlags::VBLANK);

    cpu.step();

    assert_eq!(cpu.registers.pc, 0x01);
    assert!(cpu
        .mmu
        .interrupts
        .interrupt_flag
        .contains(InterruptFlags::VBLANK));
}

#[test]
fn ei_takes_effect_after_the_next_instruction() {
    // EI; NOP; NOP with a pending interrupt the whole time.
    let mut cpu = cpu_with_code(&[0xFB, 0x00, 0x00]);
    cpu.registers.sp = 0xFFFE;
    cpu.mmu.interrupts.overwrite_enable(0x01);
    cpu.mmu.interrupts.request(InterruptFlags::VBLANK);

    cpu.step();
    assert!(!cpu.ime);
    assert_eq!(cpu.registers.pc, 0x01);

    // IME turns on at the start of this step; the interrupt dispatches
    // after the NOP executes.
    cpu.step();
    assert_eq!(cpu.registers.pc, 0x40);
}

#[test]
fn ei_then_di_lets_nothing_through() {
    let mut cpu = cpu_with_code(&[0xFB, 0xF3, 0x00]);
    cpu.mmu.interrupts.overwrite_enable(0x01);
    cpu.mmu.interrupts.request(InterruptFlags::VBLANK);

    cpu.step(); // EI
    cpu.step(); // DI: IME was set at dispatch start, cleared before the check
    cpu.step(); // NOP

    assert!(!cpu.ime);
    assert_eq!(cpu.registers.pc, 0x03);
}

#[test]
fn halt_wakes_without_dispatch_when_ime_clear() {
    let mut cpu = cpu_with_code(&[0x76, 0x00]);
    cpu.mmu.interrupts.overwrite_enable(0x04);

    cpu.step();
    assert!(cpu.halted);

    // Idle steps while nothing is pending.
    cpu.step();
    cpu.step();
    assert!(cpu.halted);
    assert_eq!(cpu.registers.pc, 0x01);

    cpu.mmu.interrupts.request(InterruptFlags::TIMER);
    cpu.step();
    assert!(!cpu.halted);
    // No vector jump, execution continues inline.
    cpu.step();
    assert_eq!(cpu.registers.pc, 0x02);
}

#[test]
fn halt_with_ime_dispatches_on_wake() {
    let mut cpu = cpu_with_code(&[0x76]);
    cpu.registers.sp = 0xFFFE;
    cpu.ime = true;
    cpu.mmu.interrupts.overwrite_enable(0x04);

    cpu.step();
    assert!(cpu.halted);

    cpu.mmu.interrupts.request(InterruptFlags::TIMER);
    cpu.step();

    assert!(!cpu.halted);
    assert_eq!(cpu.registers.pc, 0x50);
    assert_eq!(read_short(&cpu, 0xFFFC), 0x0001);
}

#[test]
fn halt_bug_repeats_the_following_opcode() {
    // HALT with IME clear and an enabled interrupt already pending, then
    // INC B: the fetch happens twice without PC moving in between.
    let mut cpu = cpu_with_code(&[0x76, 0x04, 0x00]);
    cpu.mmu.interrupts.overwrite_enable(0x04);
    cpu.mmu.interrupts.request(InterruptFlags::TIMER);

    cpu.step();
    assert!(!cpu.halted);

    cpu.step();
    cpu.step();

    // INC B ran twice.
    assert_eq!(cpu.registers.b, 2);
    assert_eq!(cpu.registers.pc, 0x02);
}

#[test]
fn reti_enables_ime_immediately() {
    let mut cpu = cpu_with_code(&[0xD9, 0x00]);
    cpu.registers.sp = 0xFFFC;
    cpu.mmu.interrupts.overwrite_enable(0x01);
    cpu.mmu.interrupts.request(InterruptFlags::VBLANK);

    cpu.step();

    // RETI's own interrupt check already dispatches.
    assert_eq!(cpu.registers.pc, 0x40);
    assert!(!cpu.ime);
}
