//! Instructions and addressing modes (spec §4 "Instruction set").

mod encoding;

pub use encoding::{decode, encode, DecodeError, EncodeError};

use crate::register::RegisterId;
use num_derive::{FromPrimitive, ToPrimitive};
use util_derive::EnumFromStr;

/// One of the five ways an operand can name a value (spec §3 "Addressing
/// modes"). `Immediate` and `Direct` carry a bare 32-bit word; the assembler
/// is responsible for resolving labels to the address or literal that ends
/// up here before an `Instruction` is built.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum AddressingMode {
    Immediate(u32),
    Register(RegisterId),
    Direct(u32),
    Indirect(RegisterId),
    IndexedIndirect(RegisterId, i32),
}

impl AddressingMode {
    pub(crate) fn kind(self) -> Kind {
        match self {
            AddressingMode::Immediate(_) => Kind::Immediate,
            AddressingMode::Register(_) => Kind::Register,
            AddressingMode::Direct(_) => Kind::Direct,
            AddressingMode::Indirect(_) => Kind::Indirect,
            AddressingMode::IndexedIndirect(_, _) => Kind::IndexedIndirect,
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub(crate) enum Kind {
    Immediate,
    Register,
    Direct,
    Indirect,
    IndexedIndirect,
}

pub(crate) const KIND_IMMEDIATE: u8 = 1 << 0;
pub(crate) const KIND_REGISTER: u8 = 1 << 1;
pub(crate) const KIND_DIRECT: u8 = 1 << 2;
pub(crate) const KIND_INDIRECT: u8 = 1 << 3;
pub(crate) const KIND_INDEXED_INDIRECT: u8 = 1 << 4;
pub(crate) const KIND_ALL: u8 =
    KIND_IMMEDIATE | KIND_REGISTER | KIND_DIRECT | KIND_INDIRECT | KIND_INDEXED_INDIRECT;
pub(crate) const KIND_MEMORY_ONLY: u8 = KIND_DIRECT | KIND_INDIRECT | KIND_INDEXED_INDIRECT;
pub(crate) const KIND_WRITABLE: u8 =
    KIND_REGISTER | KIND_DIRECT | KIND_INDIRECT | KIND_INDEXED_INDIRECT;
pub(crate) const KIND_PUSHABLE: u8 = KIND_IMMEDIATE | KIND_REGISTER;

impl Kind {
    pub(crate) fn mask(self) -> u8 {
        match self {
            Kind::Immediate => KIND_IMMEDIATE,
            Kind::Register => KIND_REGISTER,
            Kind::Direct => KIND_DIRECT,
            Kind::Indirect => KIND_INDIRECT,
            Kind::IndexedIndirect => KIND_INDEXED_INDIRECT,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Kind> {
        Some(match code {
            0 => Kind::Immediate,
            1 => Kind::Register,
            2 => Kind::Direct,
            3 => Kind::Indirect,
            4 => Kind::IndexedIndirect,
            _ => return None,
        })
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Kind::Immediate => 0,
            Kind::Register => 1,
            Kind::Direct => 2,
            Kind::Indirect => 3,
            Kind::IndexedIndirect => 4,
        }
    }
}

/// Every opcode the standard variation assigns (spec §4 opcode table).
/// Values not listed there are reserved and never decode successfully.
#[derive(Clone, Copy, Eq, PartialEq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
#[repr(u8)]
pub enum OpCode {
    Add = 0,
    And = 1,
    Call = 2,
    Cmp = 3,
    Div = 4,
    Fas = 5,
    Jmp = 6,
    Jeq = 7,
    Jne = 8,
    Jle = 9,
    Jlt = 10,
    Jge = 11,
    Jgt = 12,
    Ld = 13,
    Nop = 14,
    Not = 15,
    Or = 16,
    Pop = 18,
    Push = 19,
    Reset = 20,
    Rti = 21,
    Rtn = 22,
    Shl = 23,
    Shr = 24,
    St = 25,
    Sub = 26,
    Swap = 27,
    Trap = 28,
    Xor = 29,
}

impl OpCode {
    /// Only `rti` requires supervisor mode (spec §4 opcode table).
    pub fn is_privileged(self) -> bool {
        matches!(self, OpCode::Rti)
    }

    /// Whether the general (variable-mode) operand is the mnemonic's second
    /// operand rather than its first. `st %reg, dst` writes a register's
    /// value to a variable-mode destination, so unlike every other
    /// two-operand instruction the fixed register comes first.
    pub(crate) fn reversed_machine_code_arguments(self) -> bool {
        matches!(self, OpCode::St)
    }

    pub(crate) fn general_kind_mask(self) -> u8 {
        match self {
            OpCode::Add
            | OpCode::And
            | OpCode::Cmp
            | OpCode::Div
            | OpCode::Ld
            | OpCode::Or
            | OpCode::Shl
            | OpCode::Shr
            | OpCode::Sub
            | OpCode::Xor
            | OpCode::Call
            | OpCode::Jmp
            | OpCode::Jeq
            | OpCode::Jne
            | OpCode::Jle
            | OpCode::Jlt
            | OpCode::Jge
            | OpCode::Jgt => KIND_ALL,
            OpCode::Fas | OpCode::St => KIND_MEMORY_ONLY,
            OpCode::Swap => KIND_WRITABLE,
            OpCode::Push => KIND_PUSHABLE,
            OpCode::Not | OpCode::Pop => KIND_REGISTER,
            OpCode::Nop | OpCode::Reset | OpCode::Rti | OpCode::Rtn | OpCode::Trap => 0,
        }
    }
}

/// A fully decoded instruction, typed so that an operand position which can
/// only ever be a register is a [`RegisterId`] field rather than a general
/// [`AddressingMode`] that happens to be validated at runtime.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Instruction {
    Add { src: AddressingMode, dst: RegisterId },
    And { src: AddressingMode, dst: RegisterId },
    Call { target: AddressingMode },
    Cmp { src: AddressingMode, dst: RegisterId },
    Div { src: AddressingMode, dst: RegisterId },
    Fas { mem: AddressingMode, reg: RegisterId },
    Jmp { target: AddressingMode },
    Jeq { target: AddressingMode },
    Jne { target: AddressingMode },
    Jle { target: AddressingMode },
    Jlt { target: AddressingMode },
    Jge { target: AddressingMode },
    Jgt { target: AddressingMode },
    Ld { src: AddressingMode, dst: RegisterId },
    Nop,
    Not { dst: RegisterId },
    Or { src: AddressingMode, dst: RegisterId },
    Pop { dst: RegisterId },
    Push { src: AddressingMode },
    Reset,
    Rti,
    Rtn,
    Shl { src: AddressingMode, dst: RegisterId },
    Shr { src: AddressingMode, dst: RegisterId },
    St { src: RegisterId, dst: AddressingMode },
    Sub { src: AddressingMode, dst: RegisterId },
    Swap { lhs: AddressingMode, rhs: RegisterId },
    Trap,
    Xor { src: AddressingMode, dst: RegisterId },
}

impl Instruction {
    pub fn opcode(self) -> OpCode {
        match self {
            Instruction::Add { .. } => OpCode::Add,
            Instruction::And { .. } => OpCode::And,
            Instruction::Call { .. } => OpCode::Call,
            Instruction::Cmp { .. } => OpCode::Cmp,
            Instruction::Div { .. } => OpCode::Div,
            Instruction::Fas { .. } => OpCode::Fas,
            Instruction::Jmp { .. } => OpCode::Jmp,
            Instruction::Jeq { .. } => OpCode::Jeq,
            Instruction::Jne { .. } => OpCode::Jne,
            Instruction::Jle { .. } => OpCode::Jle,
            Instruction::Jlt { .. } => OpCode::Jlt,
            Instruction::Jge { .. } => OpCode::Jge,
            Instruction::Jgt { .. } => OpCode::Jgt,
            Instruction::Ld { .. } => OpCode::Ld,
            Instruction::Nop => OpCode::Nop,
            Instruction::Not { .. } => OpCode::Not,
            Instruction::Or { .. } => OpCode::Or,
            Instruction::Pop { .. } => OpCode::Pop,
            Instruction::Push { .. } => OpCode::Push,
            Instruction::Reset => OpCode::Reset,
            Instruction::Rti => OpCode::Rti,
            Instruction::Rtn => OpCode::Rtn,
            Instruction::Shl { .. } => OpCode::Shl,
            Instruction::Shr { .. } => OpCode::Shr,
            Instruction::St { .. } => OpCode::St,
            Instruction::Sub { .. } => OpCode::Sub,
            Instruction::Swap { .. } => OpCode::Swap,
            Instruction::Trap => OpCode::Trap,
            Instruction::Xor { .. } => OpCode::Xor,
        }
    }

    pub fn is_privileged(self) -> bool {
        self.opcode().is_privileged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonics_round_trip_through_enum_from_str() {
        use util::EnumFromStr;
        assert_eq!(OpCode::from_str("jlt"), Ok(OpCode::Jlt));
        assert!(OpCode::from_str("bogus").is_err());
    }

    #[test]
    fn only_rti_is_privileged() {
        assert!(OpCode::Rti.is_privileged());
        assert!(!OpCode::Trap.is_privileged());
        assert!(!OpCode::Reset.is_privileged());
    }
}
