//! Single-instruction execution (spec §4 "Operations", §6 worked trace).

use crate::constants::{
    EVENT_CODE_ADDRESS, EXCEPTION_VECTOR_ADDRESS, INSTRUCTION_WORDS, SAVED_PC_ADDRESS,
    SAVED_SR_ADDRESS,
};
use crate::exception::Exception;
use crate::instruction::{self, AddressingMode, Instruction};
use crate::memory::Storage;
use crate::register::RegisterId;
use crate::status::StatusFlags;

use super::Processor;

/// What happened in the course of one call to [`Processor::step`] (spec §4.6).
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum StepOutcome {
    /// Execution should continue with the next instruction.
    Continue,
    /// `reset` was executed: the machine has been returned to its startup
    /// state and the caller's run loop should stop driving it.
    Reset,
    /// An exception was raised and serviced (prologue ran, `pc` now points
    /// at the vector); execution continues from there on the next `step`.
    /// Surfaced so a caller can observe/log what happened without treating
    /// it as a halt condition — unlike `reset`, it is not one.
    Exception(Exception),
    /// The exception prologue itself failed to write its reserved words.
    /// Unrecoverable: the machine's state no longer reflects what the
    /// architecture promises, so this is reported to the host rather than
    /// serviced like an ordinary exception.
    Fatal(Exception),
}

/// What a single instruction's execution resolved to, before any exception
/// servicing happens. Distinct from [`StepOutcome`] because `execute`
/// itself never services exceptions — it only ever succeeds normally or
/// raises one.
enum ExecOutcome {
    Continue,
    Reset,
}

impl<M: Storage> Processor<M> {
    /// Executes exactly one instruction at the current `pc`.
    ///
    /// Any [`Exception`] raised while fetching, decoding, or executing is
    /// caught here and run through the standard exception prologue — that
    /// mirrors how the hardware itself behaves, and keeps `run` a plain
    /// loop over `step`. `trap` is just another exception (event code 4)
    /// serviced the same way; only `reset` halts the loop.
    pub fn step(&mut self) -> StepOutcome {
        match self.try_step() {
            Ok(ExecOutcome::Continue) => StepOutcome::Continue,
            Ok(ExecOutcome::Reset) => StepOutcome::Reset,
            Err(exception) => match self.service_exception(exception) {
                Ok(()) => StepOutcome::Exception(exception),
                Err(_) => StepOutcome::Fatal(exception),
            },
        }
    }

    fn try_step(&mut self) -> Result<ExecOutcome, Exception> {
        let pc = self.registers.get(RegisterId::Pc);
        let instruction = self.fetch_and_decode(pc)?;

        if instruction.is_privileged() && !self.status().supervisor {
            return Err(Exception::PrivilegedInstruction);
        }

        self.registers
            .set_raw(RegisterId::Pc, pc.wrapping_add(INSTRUCTION_WORDS));

        self.execute(instruction)
    }

    fn fetch_and_decode(&mut self, pc: u32) -> Result<Instruction, Exception> {
        if let Some(instruction) = self.cache.get(pc) {
            return Ok(instruction);
        }
        let (high, low) = self.memory.get_instruction_words(pc)?;
        let word = ((high as u64) << 32) | low as u64;
        let instruction = instruction::decode(word).map_err(|_| Exception::InvalidInstruction)?;
        self.cache.store(pc, instruction);
        Ok(instruction)
    }

    fn status(&self) -> StatusFlags {
        StatusFlags::from_word(self.registers.get(RegisterId::Sr))
    }

    fn set_status(&mut self, flags: StatusFlags) {
        self.registers.set_raw(RegisterId::Sr, flags.to_word());
    }

    fn read_operand(&self, mode: AddressingMode) -> Result<u32, Exception> {
        Ok(match mode {
            AddressingMode::Immediate(v) => v,
            AddressingMode::Register(r) => self.registers.get_checked(r)?,
            AddressingMode::Direct(addr) => self.memory.get(addr)?,
            AddressingMode::Indirect(r) => self.memory.get(self.registers.get(r))?,
            AddressingMode::IndexedIndirect(r, offset) => {
                let base = self.registers.get(r) as i64;
                self.memory.get((base + offset as i64) as u32)?
            }
        })
    }

    fn write_operand(&mut self, mode: AddressingMode, value: u32) -> Result<(), Exception> {
        match mode {
            AddressingMode::Immediate(_) => return Err(Exception::InvalidInstruction),
            AddressingMode::Register(r) => self.registers.set(r, value)?,
            AddressingMode::Direct(addr) => {
                self.memory.set(addr, value)?;
                self.cache.invalidate_all();
            }
            AddressingMode::Indirect(r) => {
                self.memory.set(self.registers.get(r), value)?;
                self.cache.invalidate_all();
            }
            AddressingMode::IndexedIndirect(r, offset) => {
                let base = self.registers.get(r) as i64;
                self.memory.set((base + offset as i64) as u32, value)?;
                self.cache.invalidate_all();
            }
        }
        Ok(())
    }

    fn push(&mut self, value: u32) -> Result<(), Exception> {
        let sp = self.registers.get(RegisterId::Sp).wrapping_sub(1);
        self.registers.set_raw(RegisterId::Sp, sp);
        self.memory.set(sp, value)?;
        self.cache.invalidate_all();
        Ok(())
    }

    fn pop(&mut self) -> Result<u32, Exception> {
        let sp = self.registers.get(RegisterId::Sp);
        let value = self.memory.get(sp)?;
        self.registers.set_raw(RegisterId::Sp, sp.wrapping_add(1));
        Ok(value)
    }

    fn jump_if(&mut self, target: AddressingMode, condition: bool) -> Result<(), Exception> {
        if condition {
            let address = self.read_operand(target)?;
            self.registers.set_raw(RegisterId::Pc, address);
        }
        Ok(())
    }

    fn execute(&mut self, instruction: Instruction) -> Result<ExecOutcome, Exception> {
        use Instruction::*;
        match instruction {
            Add { src, dst } => {
                let lhs = self.registers.get(dst);
                let rhs = self.read_operand(src)?;
                self.registers.set(dst, lhs.wrapping_add(rhs))?;
                self.set_status(self.status().with_arithmetic(lhs, rhs, false));
            }
            Sub { src, dst } => {
                let lhs = self.registers.get(dst);
                let rhs = self.read_operand(src)?;
                self.registers.set(dst, lhs.wrapping_sub(rhs))?;
                self.set_status(self.status().with_arithmetic(lhs, rhs, true));
            }
            Cmp { src, dst } => {
                let lhs = self.registers.get(dst);
                let rhs = self.read_operand(src)?;
                self.set_status(self.status().with_arithmetic(lhs, rhs, true));
            }
            And { src, dst } => {
                let result = self.registers.get(dst) & self.read_operand(src)?;
                self.registers.set(dst, result)?;
                self.set_status(self.status().with_zero_negative(result));
            }
            Or { src, dst } => {
                let result = self.registers.get(dst) | self.read_operand(src)?;
                self.registers.set(dst, result)?;
                self.set_status(self.status().with_zero_negative(result));
            }
            Xor { src, dst } => {
                let result = self.registers.get(dst) ^ self.read_operand(src)?;
                self.registers.set(dst, result)?;
                self.set_status(self.status().with_zero_negative(result));
            }
            Not { dst } => {
                let result = !self.registers.get(dst);
                self.registers.set(dst, result)?;
                self.set_status(self.status().with_zero_negative(result));
            }
            Shl { src, dst } => {
                let shift = self.read_operand(src)? & 0x1F;
                let result = self.registers.get(dst) << shift;
                self.registers.set(dst, result)?;
                self.set_status(self.status().with_zero_negative(result));
            }
            Shr { src, dst } => {
                let shift = self.read_operand(src)? & 0x1F;
                let result = self.registers.get(dst) >> shift;
                self.registers.set(dst, result)?;
                self.set_status(self.status().with_zero_negative(result));
            }
            Div { src, dst } => {
                // spec §4.4: `dst <- src/dst`, raising on the divisor, `dst`.
                let divisor = self.registers.get(dst);
                if divisor == 0 {
                    return Err(Exception::DivisionByZero);
                }
                let dividend = self.read_operand(src)?;
                let result = dividend / divisor;
                self.registers.set(dst, result)?;
                self.set_status(self.status().with_zero_negative(result));
            }
            Ld { src, dst } => {
                let value = self.read_operand(src)?;
                self.registers.set(dst, value)?;
                self.set_status(self.status().with_zero_negative(value));
            }
            St { src, dst } => {
                let value = self.registers.get(src);
                self.write_operand(dst, value)?;
            }
            Swap { lhs, rhs } => {
                let left = self.read_operand(lhs)?;
                let right = self.registers.get(rhs);
                self.write_operand(lhs, right)?;
                self.registers.set(rhs, left)?;
            }
            Fas { mem, reg } => {
                let old = self.registers.get(reg);
                self.registers.set(reg, 1)?;
                self.write_operand(mem, old)?;
            }
            Push { src } => {
                let value = self.read_operand(src)?;
                self.push(value)?;
            }
            Pop { dst } => {
                let value = self.pop()?;
                self.registers.set(dst, value)?;
                self.set_status(self.status().with_zero_negative(value));
            }
            Call { target } => {
                let pc = self.registers.get(RegisterId::Pc);
                self.push(pc)?;
                let address = self.read_operand(target)?;
                self.registers.set_raw(RegisterId::Pc, address);
            }
            Rtn => {
                let address = self.pop()?;
                self.registers.set_raw(RegisterId::Pc, address);
            }
            Jmp { target } => self.jump_if(target, true)?,
            Jeq { target } => self.jump_if(target, self.status().zero)?,
            Jne { target } => self.jump_if(target, !self.status().zero)?,
            Jle { target } => {
                let s = self.status();
                self.jump_if(target, s.zero || s.overflow != s.carry)?
            }
            Jlt { target } => {
                let s = self.status();
                self.jump_if(target, s.overflow != s.carry)?
            }
            Jge { target } => {
                let s = self.status();
                self.jump_if(target, s.overflow == s.carry)?
            }
            Jgt { target } => {
                let s = self.status();
                self.jump_if(target, !s.zero && s.overflow == s.carry)?
            }
            Nop => {}
            Reset => {
                self.registers = crate::register::RegisterFile::default();
                let mut flags = StatusFlags::default();
                flags.supervisor = true;
                self.set_status(flags);
                self.cache.invalidate_all();
                return Ok(ExecOutcome::Reset);
            }
            Rti => {
                let saved_pc = self.memory.get(SAVED_PC_ADDRESS)?;
                let saved_sr = self.memory.get(SAVED_SR_ADDRESS)?;
                self.registers.set_raw(RegisterId::Pc, saved_pc);
                self.registers.set_raw(RegisterId::Sr, saved_sr);
            }
            Trap => return Err(Exception::Trap),
        }
        Ok(ExecOutcome::Continue)
    }

    /// Saves `pc`/`sr`/event code to their reserved words, enters
    /// supervisor mode with interrupts disabled, and jumps to the
    /// exception vector (spec §3 "Exceptions"). A write failure here means
    /// the reserved words themselves are out of bounds — a fatal,
    /// unrecoverable condition rather than an ordinary exception, so it is
    /// propagated to the caller instead of silently discarded.
    fn service_exception(&mut self, exception: Exception) -> Result<(), Exception> {
        let pc = self.registers.get(RegisterId::Pc);
        let sr = self.registers.get(RegisterId::Sr);
        self.memory.set(SAVED_PC_ADDRESS, pc).map_err(|_| exception)?;
        self.memory.set(SAVED_SR_ADDRESS, sr).map_err(|_| exception)?;
        self.memory
            .set(EVENT_CODE_ADDRESS, exception.event_code().code())
            .map_err(|_| exception)?;
        self.cache.invalidate_all();

        let mut flags = self.status();
        flags.supervisor = true;
        flags.interrupt_enable = false;
        self.set_status(flags);
        self.registers
            .set_raw(RegisterId::Pc, EXCEPTION_VECTOR_ADDRESS);
        Ok(())
    }
}
