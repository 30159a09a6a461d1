//! End-to-end runs of small hand-assembled programs (spec §8 traces).

use z33::instruction::AddressingMode;
use z33::{Instruction, Memory, Processor, RegisterId, StopReason};

fn run_program(instructions: &[Instruction]) -> Processor<Memory> {
    let mut processor = Processor::new(Memory::new()).code(0, instructions).unwrap();
    processor.run();
    processor
}

#[test]
fn countdown_loop_decrements_a_to_zero() {
    let processor = run_program(&[
        Instruction::Ld {
            src: AddressingMode::Immediate(3),
            dst: RegisterId::A,
        },
        Instruction::Cmp {
            src: AddressingMode::Immediate(0),
            dst: RegisterId::A,
        },
        Instruction::Jeq {
            target: AddressingMode::Direct(10),
        },
        Instruction::Sub {
            src: AddressingMode::Immediate(1),
            dst: RegisterId::A,
        },
        Instruction::Jmp {
            target: AddressingMode::Direct(2),
        },
        Instruction::Reset,
    ]);
    assert_eq!(processor.registers().get(RegisterId::A), 0);
}

#[test]
fn call_and_rtn_round_trip_the_program_counter() {
    let mut processor = Processor::new(Memory::new())
        .with_register(RegisterId::Sp, 9000)
        .code(
            0,
            &[
                Instruction::Call {
                    target: AddressingMode::Direct(4),
                },
                Instruction::Reset,
                Instruction::Nop,
                Instruction::Nop,
                Instruction::Rtn,
            ],
        )
        .unwrap();
    let outcome = processor.run();
    // `call` pushed return address 2 (the `reset` right after it); `rtn`
    // landed back there, and executing that `reset` advanced `pc` to 4.
    assert_eq!(outcome.stop_reason, StopReason::Reset);
    assert_eq!(processor.registers().get(RegisterId::Pc), 4);
}

#[test]
fn push_and_pop_are_inverses() {
    let mut processor = Processor::new(Memory::new())
        .with_register(RegisterId::Sp, 9000)
        .code(
            0,
            &[
                Instruction::Push {
                    src: AddressingMode::Immediate(42),
                },
                Instruction::Pop { dst: RegisterId::B },
                Instruction::Reset,
            ],
        )
        .unwrap();
    processor.run();
    assert_eq!(processor.registers().get(RegisterId::B), 42);
    assert_eq!(processor.registers().get(RegisterId::Sp), 9000);
}

#[test]
fn privileged_rti_outside_supervisor_mode_traps_to_the_handler() {
    let sr = z33::StatusFlags::default().to_word();
    let mut processor = Processor::new(Memory::new())
        .with_register(RegisterId::Sr, sr)
        .code(0, &[Instruction::Rti])
        .unwrap();
    processor.step();
    assert_eq!(
        processor.registers().get(RegisterId::Pc),
        z33::constants::EXCEPTION_VECTOR_ADDRESS
    );
}

#[test]
fn div_computes_src_over_dst_and_checks_dst_for_zero() {
    let mut processor = Processor::new(Memory::new())
        .code(
            0,
            &[
                Instruction::Ld {
                    src: AddressingMode::Immediate(20),
                    dst: RegisterId::B,
                },
                Instruction::Ld {
                    src: AddressingMode::Immediate(4),
                    dst: RegisterId::A,
                },
                Instruction::Div {
                    src: AddressingMode::Register(RegisterId::B),
                    dst: RegisterId::A,
                },
                Instruction::Reset,
            ],
        )
        .unwrap();
    processor.run();
    assert_eq!(processor.registers().get(RegisterId::A), 5);
}

#[test]
fn supervisor_mode_may_write_sr_directly() {
    let mut processor = Processor::new(Memory::new())
        .code(
            0,
            &[
                Instruction::Ld {
                    src: AddressingMode::Immediate(0),
                    dst: RegisterId::Sr,
                },
                Instruction::Reset,
            ],
        )
        .unwrap();
    // Processor::new boots in supervisor mode, so this `ld` should succeed.
    let outcome = processor.step();
    assert_eq!(outcome, z33::StepOutcome::Continue);
    assert_eq!(processor.registers().get(RegisterId::Sr), 0);
}
