//! Preprocessor, parser, and assembler for Z33 assembly source.
//!
//! [`preprocessor`] expands `#include`/`#define`/`#if` directives into
//! plain assembly text plus a [`code_map::CodeMap`] back to the original
//! files. [`parser`] turns that text into a [`parser::ParsedProgram`].
//! [`assemble`] resolves labels and encodes the result into the word
//! stream [`z33::processor::Processor`] runs.

pub mod assemble;
pub mod code_map;
pub mod error;
pub mod labels;
pub mod parser;
pub mod preprocessor;

pub use assemble::{assemble, AssembledProgram, SourceMap};
pub use code_map::{CodeMap, OriginalPosition, Segment, SegmentKind};
pub use error::Error;
pub use parser::{parse, ParsedProgram};
pub use preprocessor::{FileResolver, MapResolver, Preprocessor};

/// Runs the full pipeline: preprocess `entry_path` through `resolver`,
/// parse the result, and assemble it into a word image.
pub fn assemble_file(
    resolver: &dyn FileResolver,
    entry_path: &str,
) -> Result<AssembledProgram, Error> {
    let mut preprocessor = Preprocessor::new(resolver);
    let (text, _code_map) = preprocessor.run(entry_path)?;
    let program = parse(&text, entry_path).map_err(error::AssembleError::from)?;
    assemble::assemble(&program, entry_path).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_an_included_program_end_to_end() {
        let resolver = MapResolver::new()
            .with_file("main.s", "#include \"start.s\"\ntrap\n")
            .with_file("start.s", "ld 1, %a\n");
        let assembled = assemble_file(&resolver, "main.s").unwrap();
        assert_eq!(assembled.image.len(), 4);
    }
}
