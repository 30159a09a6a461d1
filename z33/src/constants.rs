//! Architectural constants for the standard Z33 variation (spec §3, §6).

/// Number of 32-bit words in main memory for the standard variation.
pub const MEMORY_SIZE: u32 = 10_000;

/// Each instruction occupies two consecutive memory words (64 bits).
pub const INSTRUCTION_WORDS: u32 = 2;

/// Word holding the saved `pc` during exception service.
pub const SAVED_PC_ADDRESS: u32 = 100;

/// Word holding the saved `sr` during exception service.
pub const SAVED_SR_ADDRESS: u32 = 101;

/// Word holding the event code of the exception being serviced.
pub const EVENT_CODE_ADDRESS: u32 = 102;

/// Address execution resumes at when an exception is serviced.
pub const EXCEPTION_VECTOR_ADDRESS: u32 = 200;

/// `sr` bit positions (spec §3).
pub const SR_CARRY_BIT: u32 = 0;
pub const SR_ZERO_BIT: u32 = 1;
pub const SR_NEGATIVE_BIT: u32 = 2;
pub const SR_OVERFLOW_BIT: u32 = 3;
pub const SR_INTERRUPT_ENABLE_BIT: u32 = 8;
pub const SR_SUPERVISOR_BIT: u32 = 9;
