//! Register identities and the register file (spec §3 "Registers").
//!
//! Register codes are the distinct, non-zero integers each register is
//! assigned at startup so that indirect/indexed-indirect addressing and the
//! `st`/`swap` "register operand" field can name a register the same way a
//! memory-addressing mode names a location. `call`'s description ("write
//! src to register code 3 (pc)") fixes `pc`'s code at 3; the remaining
//! codes follow the `{a, b, pc, sp, sr}` ordering the rest of the spec uses.

use util_derive::EnumFromStr;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, EnumFromStr)]
pub enum RegisterId {
    A,
    B,
    Pc,
    Sp,
    Sr,
}

impl RegisterId {
    pub const ALL: [RegisterId; 5] = [
        RegisterId::A,
        RegisterId::B,
        RegisterId::Pc,
        RegisterId::Sp,
        RegisterId::Sr,
    ];

    /// The non-zero code this register is addressed by (`@reg` operands,
    /// the fixed register field of two-operand instructions).
    pub fn code(self) -> u8 {
        match self {
            RegisterId::A => 1,
            RegisterId::B => 2,
            RegisterId::Pc => 3,
            RegisterId::Sp => 4,
            RegisterId::Sr => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<RegisterId> {
        RegisterId::ALL.into_iter().find(|r| r.code() == code)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            RegisterId::A => "a",
            RegisterId::B => "b",
            RegisterId::Pc => "pc",
            RegisterId::Sp => "sp",
            RegisterId::Sr => "sr",
        }
    }

    /// Only `sr` is write-protected from ordinary instruction execution in
    /// the standard variation: its bits only change through flag-setting
    /// instructions, `rti`, and the exception prologue, never through a
    /// plain `ld`/`pop`.
    pub fn is_write_protected(self) -> bool {
        matches!(self, RegisterId::Sr)
    }
}

impl std::fmt::Display for RegisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// The flat register bank: one word per register, indexed by [`RegisterId`].
///
/// Protection is modeled generically (a per-register flag, checked by the
/// processor before a write reaches the bank) rather than special-cased
/// by name, so a variation that protects other registers needs no change
/// here.
#[derive(Clone, Debug, Default)]
pub struct RegisterFile {
    a: u32,
    b: u32,
    pc: u32,
    sp: u32,
    sr: u32,
}

impl RegisterFile {
    pub fn get(&self, id: RegisterId) -> u32 {
        match id {
            RegisterId::A => self.a,
            RegisterId::B => self.b,
            RegisterId::Pc => self.pc,
            RegisterId::Sp => self.sp,
            RegisterId::Sr => self.sr,
        }
    }

    /// Writes unconditionally, bypassing the write-protection flag.
    /// Used by the processor's exception prologue and `rti`, which are
    /// themselves the mechanisms protection is meant to route through.
    pub fn set_raw(&mut self, id: RegisterId, value: u32) {
        match id {
            RegisterId::A => self.a = value,
            RegisterId::B => self.b = value,
            RegisterId::Pc => self.pc = value,
            RegisterId::Sp => self.sp = value,
            RegisterId::Sr => self.sr = value,
        }
    }

    /// Reads as an ordinary instruction operand would: refused if `id` is
    /// protected and the machine isn't currently in supervisor mode (spec
    /// §4.4: accessing a protected register in user mode raises
    /// `PrivilegedInstruction`).
    pub fn get_checked(&self, id: RegisterId) -> Result<u32, crate::Exception> {
        if id.is_write_protected() && !self.supervisor() {
            return Err(crate::Exception::PrivilegedInstruction);
        }
        Ok(self.get(id))
    }

    /// Writes as an ordinary instruction would: refused if `id` is
    /// protected and the machine isn't currently in supervisor mode.
    /// Supervisor mode may write any register, including `sr` itself
    /// (e.g. `ld flags, %sr`).
    pub fn set(&mut self, id: RegisterId, value: u32) -> Result<(), crate::Exception> {
        if id.is_write_protected() && !self.supervisor() {
            return Err(crate::Exception::PrivilegedInstruction);
        }
        self.set_raw(id, value);
        Ok(())
    }

    fn supervisor(&self) -> bool {
        crate::status::StatusFlags::from_word(self.sr).supervisor
    }
}
