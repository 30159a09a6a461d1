//! Error types for preprocessing, parsing and assembling (spec §4 "Errors").

use thiserror::Error;

/// A location in the original, pre-preprocessing source: the file it came
/// from (as given to the [`crate::preprocessor::FileResolver`]) and a
/// 1-based line number within it.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum PreprocessError {
    #[error("{at}: #include cycle: {path} is already being included")]
    IncludeCycle { at: SourceLocation, path: String },
    #[error("{at}: could not resolve included file {path}")]
    UnresolvedInclude { at: SourceLocation, path: String },
    #[error("{at}: {name} redefined with a different replacement")]
    MacroRedefined { at: SourceLocation, name: String },
    #[error("{at}: #elseif/#else without a matching #if")]
    UnmatchedConditional { at: SourceLocation },
    #[error("{at}: #if without a matching #endif")]
    UnterminatedConditional { at: SourceLocation },
    #[error("{at}: malformed directive: {message}")]
    MalformedDirective { at: SourceLocation, message: String },
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ParseError {
    #[error("{at}: {message}")]
    Syntax { at: SourceLocation, message: String },
    #[error("{at}: operand mode is not valid for `{mnemonic}`")]
    IllegalOperand { at: SourceLocation, mnemonic: String },
    #[error("{at}: literal {value} does not fit in {bits} bits")]
    LiteralOutOfRange {
        at: SourceLocation,
        value: i64,
        bits: u32,
    },
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AssembleError {
    #[error("{at}: label `{name}` is used but never defined")]
    UndefinedLabel { at: SourceLocation, name: String },
    #[error("{at}: label `{name}` is defined more than once")]
    DuplicateLabel { at: SourceLocation, name: String },
    #[error("program does not fit in memory: needs {needed} words, have {available}")]
    ProgramTooLarge { needed: u32, available: u32 },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Encode(#[from] z33::instruction::EncodeError),
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}
