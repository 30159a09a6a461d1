//! The Z33 teaching architecture: instruction set, register/memory/flag
//! semantics, and a runner that executes assembled programs.
//!
//! This crate is the machine; `z33-asm` turns assembly source into the
//! word streams [`processor::Processor`] runs.

pub mod constants;
pub mod exception;
pub mod instruction;
pub mod memory;
pub mod processor;
pub mod register;
pub mod status;

pub use exception::{EventCode, Exception};
pub use instruction::{decode, encode, AddressingMode, Instruction, OpCode};
pub use memory::{Memory, Storage};
pub use processor::{Processor, RunOutcome, StepOutcome, StopReason};
pub use register::{RegisterFile, RegisterId};
pub use status::StatusFlags;
