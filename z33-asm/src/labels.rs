//! First assembly pass: walks the parsed program computing each label's
//! address (spec §4.3, §4.4 "labels resolve inside `.word`/`.addr`").

use crate::error::{AssembleError, SourceLocation};
use crate::parser::{Directive, Line, ParsedProgram, Value};
use std::collections::HashMap;
use z33::constants::INSTRUCTION_WORDS;

#[derive(Clone, Debug, Default)]
pub struct LabelMap {
    addresses: HashMap<String, u32>,
}

impl LabelMap {
    pub fn get(&self, name: &str) -> Option<u32> {
        self.addresses.get(name).copied()
    }

    pub fn resolve(&self, value: &Value, at: &SourceLocation) -> Result<i64, AssembleError> {
        match value {
            Value::Literal(n) => Ok(*n),
            Value::Label(name) => self.get(name).map(|addr| addr as i64).ok_or_else(|| {
                AssembleError::UndefinedLabel { at: at.clone(), name: name.clone() }
            }),
        }
    }
}

fn literal_or_zero(value: &Value) -> i64 {
    match value {
        Value::Literal(n) => *n,
        Value::Label(_) => 0,
    }
}

/// Computes every label's address by walking the program once, tracking
/// the word cursor the way the final image will be laid out.
pub fn build(program: &ParsedProgram, file: &str) -> Result<LabelMap, AssembleError> {
    let mut map = LabelMap::default();
    let mut cursor: u32 = 0;

    for located in &program.lines {
        let at = SourceLocation { file: file.to_string(), line: located.line };
        match &located.value {
            Line::Label(name) => {
                if map.addresses.contains_key(name) {
                    return Err(AssembleError::DuplicateLabel { at, name: name.clone() });
                }
                map.addresses.insert(name.clone(), cursor);
            }
            Line::Instruction(_) => cursor += INSTRUCTION_WORDS,
            Line::Directive(Directive::Word(values)) => cursor += values.len() as u32,
            Line::Directive(Directive::Space(value)) => {
                cursor += literal_or_zero(value).max(0) as u32
            }
            Line::Directive(Directive::Str(text)) => cursor += text.chars().count() as u32 + 1,
            Line::Directive(Directive::Addr(value)) => {
                cursor = literal_or_zero(value).max(0) as u32
            }
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn labels_get_the_address_of_the_following_line() {
        let program = parse("nop\nloop: add 1, %a\n", "t.s").unwrap();
        let labels = build(&program, "t.s").unwrap();
        assert_eq!(labels.get("loop"), Some(2));
    }

    #[test]
    fn addr_directive_moves_the_cursor() {
        let program = parse(".addr 500\nhere: nop\n", "t.s").unwrap();
        let labels = build(&program, "t.s").unwrap();
        assert_eq!(labels.get("here"), Some(500));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let program = parse("a: nop\na: nop\n", "t.s").unwrap();
        assert!(matches!(
            build(&program, "t.s"),
            Err(AssembleError::DuplicateLabel { .. })
        ));
    }
}
