//! Bit-level view over the `sr` register word (spec §3 "Status register").

use crate::constants::{
    SR_CARRY_BIT, SR_INTERRUPT_ENABLE_BIT, SR_NEGATIVE_BIT, SR_OVERFLOW_BIT, SR_SUPERVISOR_BIT,
    SR_ZERO_BIT,
};

/// A read-only snapshot of `sr`'s flag bits, plus the helpers to build a
/// new `sr` word from them. Kept separate from [`crate::register::RegisterFile`]
/// so flag computation (done once per ALU-ish instruction) doesn't need to
/// reach back into the whole register bank.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct StatusFlags {
    pub carry: bool,
    pub zero: bool,
    pub negative: bool,
    pub overflow: bool,
    pub interrupt_enable: bool,
    pub supervisor: bool,
}

impl StatusFlags {
    pub fn from_word(word: u32) -> StatusFlags {
        StatusFlags {
            carry: word & (1 << SR_CARRY_BIT) != 0,
            zero: word & (1 << SR_ZERO_BIT) != 0,
            negative: word & (1 << SR_NEGATIVE_BIT) != 0,
            overflow: word & (1 << SR_OVERFLOW_BIT) != 0,
            interrupt_enable: word & (1 << SR_INTERRUPT_ENABLE_BIT) != 0,
            supervisor: word & (1 << SR_SUPERVISOR_BIT) != 0,
        }
    }

    pub fn to_word(self) -> u32 {
        let mut word = 0u32;
        word |= (self.carry as u32) << SR_CARRY_BIT;
        word |= (self.zero as u32) << SR_ZERO_BIT;
        word |= (self.negative as u32) << SR_NEGATIVE_BIT;
        word |= (self.overflow as u32) << SR_OVERFLOW_BIT;
        word |= (self.interrupt_enable as u32) << SR_INTERRUPT_ENABLE_BIT;
        word |= (self.supervisor as u32) << SR_SUPERVISOR_BIT;
        word
    }

    /// Recomputes `zero`/`negative` from a result word, leaving the other
    /// flags untouched. Used by instructions that only define those two
    /// (`ld`, `pop`, `and`, `or`, `xor`, `not`, `shl`, `shr`).
    pub fn with_zero_negative(self, result: u32) -> StatusFlags {
        StatusFlags {
            zero: result == 0,
            negative: (result as i32) < 0,
            ..self
        }
    }

    /// Recomputes all four arithmetic flags from operands of an
    /// `add`/`sub`/`cmp`, in the two's-complement sense the teaching
    /// architecture defines them: `carry` is unsigned overflow (unsigned
    /// borrow for subtraction), `overflow` is signed overflow.
    ///
    /// Overflow is computed from the classic sign-bit identity
    /// (`(lhs ^ rhs) & (lhs ^ result)` is negative) rather than by
    /// negating `rhs` and adding, so `rhs == i32::MIN` (a valid 32-bit
    /// operand) never hits Rust's debug-mode negate-overflow panic.
    pub fn with_arithmetic(self, lhs: u32, rhs: u32, subtract: bool) -> StatusFlags {
        let truncated = if subtract {
            lhs.wrapping_sub(rhs)
        } else {
            lhs.wrapping_add(rhs)
        };
        let carry = if subtract {
            lhs < rhs
        } else {
            lhs as u64 + rhs as u64 > u32::MAX as u64
        };
        let signed_lhs = lhs as i32;
        let signed_rhs = rhs as i32;
        let signed_result = truncated as i32;
        let overflow = if subtract {
            ((signed_lhs ^ signed_rhs) & (signed_lhs ^ signed_result)) < 0
        } else {
            (!(signed_lhs ^ signed_rhs) & (signed_lhs ^ signed_result)) < 0
        };
        StatusFlags {
            carry,
            zero: truncated == 0,
            negative: (truncated as i32) < 0,
            overflow,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtracting_i32_min_does_not_panic() {
        let flags = StatusFlags::default().with_arithmetic(0, 0x8000_0000, true);
        assert!(!flags.zero);
    }

    #[test]
    fn add_overflow_is_detected() {
        let flags = StatusFlags::default().with_arithmetic(0x7FFF_FFFF, 1, false);
        assert!(flags.overflow);
        assert!(flags.negative);
    }

    #[test]
    fn subtract_sets_carry_on_unsigned_borrow() {
        let flags = StatusFlags::default().with_arithmetic(1, 2, true);
        assert!(flags.carry);
    }
}
