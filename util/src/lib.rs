//! Small helpers shared by the `z33` and `z33-asm` crates.
//!
//! This used to also carry an `Endian` type alias for byte-serializing
//! register/memory words. `z33`'s memory is word-addressed (`Vec<u32>`),
//! not byte-addressed, so there is no byte marshalling left to do here.

use std::fmt;

/// Error produced by an [`EnumFromStr`] implementation when a name doesn't
/// match any variant.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ParseEnumError {
    pub value: String,
    pub enum_name: &'static str,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "\"{}\" is not a valid {}",
            &self.value, &self.enum_name
        )
    }
}

impl std::error::Error for ParseEnumError {}

/// Implemented by closed, fieldless enums (mnemonics, register names) that
/// are written by name in assembly source and parsed case-sensitively.
pub trait EnumFromStr: Sized {
    fn from_str(s: &str) -> Result<Self, ParseEnumError>;
}
