//! The Z33 runner: register file, memory, instruction cache, and the
//! fetch-decode-execute loop (spec §5 "Runner").

mod cache;
mod core;

pub use core::StepOutcome;

use crate::exception::Exception;
use crate::memory::Storage;
use crate::register::{RegisterFile, RegisterId};
use crate::status::StatusFlags;
use cache::InstructionCache;

/// A running Z33 machine over some [`Storage`] backing. Generic so tests
/// can plug in a bare in-memory stub while the standard variation uses
/// [`crate::memory::Memory`].
#[derive(Clone, Debug)]
pub struct Processor<M: Storage> {
    registers: RegisterFile,
    memory: M,
    cache: InstructionCache,
}

/// Why [`Processor::run`]/[`Processor::run_bounded`] stopped driving the
/// machine.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum StopReason {
    /// `reset` executed (spec §4.6: the only outcome that ends the loop).
    Reset,
    /// The bound passed to [`Processor::run_bounded`] was reached without
    /// the program resetting.
    StepLimitReached,
    /// The exception prologue itself failed; the machine's state no
    /// longer reflects what the architecture promises.
    Fatal(Exception),
}

/// The outcome of running a program, carrying the triple an observer needs
/// to understand why it stopped: the program counter, the status
/// register, and the [`StopReason`].
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct RunOutcome {
    pub pc: u32,
    pub sr: u32,
    pub stop_reason: StopReason,
}

impl<M: Storage> Processor<M> {
    /// Boots with all registers zeroed except `sr`, which starts in
    /// supervisor mode (the machine begins executing with full privilege,
    /// the same way `reset` re-establishes it).
    pub fn new(memory: M) -> Processor<M> {
        let cache = InstructionCache::new(memory.size());
        let mut processor = Processor {
            registers: RegisterFile::default(),
            memory,
            cache,
        };
        let mut flags = StatusFlags::default();
        flags.supervisor = true;
        processor.registers.set_raw(RegisterId::Sr, flags.to_word());
        processor
    }

    /// [`Processor::new`] followed by setting `pc` to `entry_point`, for
    /// programs that don't start at address 0.
    pub fn with_entry_point(memory: M, entry_point: u32) -> Processor<M> {
        let mut processor = Processor::new(memory);
        processor.registers.set_raw(RegisterId::Pc, entry_point);
        processor
    }

    /// Assembles and installs `instructions` starting at `address`, for
    /// building a program directly from [`crate::instruction::Instruction`]
    /// values rather than going through the assembler crate (used heavily
    /// by this crate's own tests).
    pub fn code(
        mut self,
        address: u32,
        instructions: &[crate::instruction::Instruction],
    ) -> Result<Processor<M>, crate::Exception> {
        let mut cursor = address;
        for instruction in instructions {
            let word = crate::instruction::encode(*instruction)
                .map_err(|_| crate::Exception::InvalidInstruction)?;
            self.memory.set(cursor, (word >> 32) as u32)?;
            self.memory.set(cursor + 1, word as u32)?;
            cursor += crate::constants::INSTRUCTION_WORDS;
        }
        self.cache.invalidate_all();
        Ok(self)
    }

    /// Installs the reset/interrupt handler address expected by spec §3:
    /// writes `entry` to the exception-vector word so that `reset` and
    /// serviced exceptions land there. This is a convenience over manually
    /// poking memory; the vector address itself
    /// ([`crate::constants::EXCEPTION_VECTOR_ADDRESS`]) is fixed by the
    /// architecture, not configurable.
    pub fn interrupt_handler(mut self, entry: u32) -> Result<Processor<M>, crate::Exception> {
        self.memory
            .set(crate::constants::EXCEPTION_VECTOR_ADDRESS, entry)?;
        self.cache.invalidate_all();
        Ok(self)
    }

    /// Sets a register's initial value directly, bypassing write
    /// protection. Meant for program setup before [`Processor::run`]
    /// starts (seeding `sp`, forcing a starting privilege level for a
    /// test) — not something an executing program can reach for itself.
    pub fn with_register(mut self, id: RegisterId, value: u32) -> Processor<M> {
        self.registers.set_raw(id, value);
        self
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Runs until `reset` executes, returning the register state at that
    /// point (spec §4.6: `reset` is the only outcome that ends the loop).
    /// `trap` and every other exception are serviced and execution
    /// continues from the vector; a program whose handler never resets
    /// runs forever, same as the hardware would.
    pub fn run(&mut self) -> RunOutcome {
        loop {
            match self.step() {
                StepOutcome::Reset => return self.outcome(StopReason::Reset),
                StepOutcome::Fatal(exception) => return self.outcome(StopReason::Fatal(exception)),
                StepOutcome::Continue | StepOutcome::Exception(_) => {}
            }
        }
    }

    /// Runs for at most `limit` instructions, for tests and tooling that
    /// need a bound on non-terminating programs.
    pub fn run_bounded(&mut self, limit: u32) -> RunOutcome {
        for _ in 0..limit {
            match self.step() {
                StepOutcome::Reset => return self.outcome(StopReason::Reset),
                StepOutcome::Fatal(exception) => return self.outcome(StopReason::Fatal(exception)),
                StepOutcome::Continue | StepOutcome::Exception(_) => {}
            }
        }
        self.outcome(StopReason::StepLimitReached)
    }

    fn outcome(&self, stop_reason: StopReason) -> RunOutcome {
        RunOutcome {
            pc: self.registers.get(RegisterId::Pc),
            sr: self.registers.get(RegisterId::Sr),
            stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{encode, AddressingMode, Instruction};
    use crate::memory::Memory;

    fn assemble(instructions: &[Instruction]) -> Memory {
        let mut words = Vec::new();
        for instruction in instructions {
            let word = encode(*instruction).unwrap();
            words.push((word >> 32) as u32);
            words.push(word as u32);
        }
        Memory::with_image(&words)
    }

    #[test]
    fn add_sets_registers_and_advances_pc_by_two() {
        let memory = assemble(&[
            Instruction::Add {
                src: AddressingMode::Immediate(5),
                dst: RegisterId::A,
            },
            Instruction::Reset,
        ]);
        let mut processor = Processor::new(memory);
        processor.step();
        assert_eq!(processor.registers().get(RegisterId::A), 5);
        assert_eq!(processor.registers().get(RegisterId::Pc), 2);
    }

    #[test]
    fn division_by_zero_vectors_to_the_exception_handler() {
        // dst (%a) is the divisor per spec §4.4; 0 there raises before the
        // dividend in %b is ever read.
        let mut processor = Processor::new(Memory::new())
            .code(
                0,
                &[
                    Instruction::Div {
                        src: AddressingMode::Register(RegisterId::B),
                        dst: RegisterId::A,
                    },
                    Instruction::Reset,
                ],
            )
            .unwrap();
        let outcome = processor.step();
        assert_eq!(outcome, StepOutcome::Exception(crate::Exception::DivisionByZero));
        assert_eq!(
            processor.registers().get(RegisterId::Pc),
            crate::constants::EXCEPTION_VECTOR_ADDRESS
        );
        assert_eq!(
            processor.memory().get(crate::constants::EVENT_CODE_ADDRESS),
            Ok(crate::exception::EventCode::DivisionByZero.code())
        );
    }

    #[test]
    fn trap_vectors_to_the_handler_and_execution_continues() {
        let mut processor = Processor::new(Memory::new())
            .code(0, &[Instruction::Trap])
            .unwrap()
            .code(crate::constants::EXCEPTION_VECTOR_ADDRESS, &[Instruction::Reset])
            .unwrap();
        let outcome = processor.step();
        assert_eq!(outcome, StepOutcome::Exception(crate::Exception::Trap));
        assert_eq!(
            processor.registers().get(RegisterId::Pc),
            crate::constants::EXCEPTION_VECTOR_ADDRESS
        );
        let run_outcome = processor.run();
        assert_eq!(run_outcome.stop_reason, StopReason::Reset);
    }

    #[test]
    fn run_stops_on_reset() {
        let memory = assemble(&[Instruction::Reset]);
        let mut processor = Processor::new(memory);
        let outcome = processor.run();
        assert_eq!(outcome.stop_reason, StopReason::Reset);
    }
}
