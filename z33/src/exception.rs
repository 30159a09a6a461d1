//! Exception vectoring (spec §3 "Exceptions", §6 "reset"/"rti").

use thiserror::Error;

/// The event codes the processor can vector on, in the order the teaching
/// material assigns them. `z33-asm` never needs these; they live here
/// because they are observable through `mem[102]` after a trap.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[repr(u32)]
pub enum EventCode {
    HardwareInterrupt = 0,
    DivisionByZero = 1,
    InvalidInstruction = 2,
    PrivilegedInstruction = 3,
    Trap = 4,
    InvalidMemoryAccess = 5,
}

impl EventCode {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// An exception raised while executing one instruction. Carries enough to
/// let the runner perform the standard exception prologue: save `pc`/`sr`,
/// write the event code, clear `ie`, set `sv`, jump to the vector.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Error)]
pub enum Exception {
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid instruction encoding at decode time")]
    InvalidInstruction,
    #[error("privileged instruction executed outside supervisor mode")]
    PrivilegedInstruction,
    #[error("trap instruction executed")]
    Trap,
    #[error("memory access out of bounds or otherwise invalid")]
    InvalidMemoryAccess,
}

impl Exception {
    pub fn event_code(self) -> EventCode {
        match self {
            Exception::DivisionByZero => EventCode::DivisionByZero,
            Exception::InvalidInstruction => EventCode::InvalidInstruction,
            Exception::PrivilegedInstruction => EventCode::PrivilegedInstruction,
            Exception::Trap => EventCode::Trap,
            Exception::InvalidMemoryAccess => EventCode::InvalidMemoryAccess,
        }
    }
}
