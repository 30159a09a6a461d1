//! Turns preprocessed assembly text into a [`ParsedProgram`] (spec §4.3
//! "Assembly Parser").

use crate::error::{ParseError, SourceLocation};
use pest::iterators::Pair;
use pest::Parser as _;
use pest_derive::Parser;
use z33::register::RegisterId;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct AssemblyParser;

/// A value that is either already known (a literal) or names a label to be
/// resolved once every label's address is known.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Value {
    Literal(i64),
    Label(String),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Operand {
    Immediate(Value),
    Register(RegisterId),
    Direct(Value),
    Indirect(RegisterId),
    IndexedIndirect(Value, RegisterId),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ParsedInstruction {
    pub mnemonic: String,
    pub operands: Vec<Operand>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Directive {
    Word(Vec<Value>),
    Addr(Value),
    Space(Value),
    Str(String),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Line {
    Label(String),
    Instruction(ParsedInstruction),
    Directive(Directive),
}

/// One parsed line, paired with its 1-based line number in the
/// preprocessed text (used to map back through the [`crate::code_map::CodeMap`]
/// on error).
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Located<T> {
    pub value: T,
    pub line: u32,
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ParsedProgram {
    pub lines: Vec<Located<Line>>,
}

fn parse_number(text: &str) -> i64 {
    if let Some(hex) = text.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).unwrap_or(0)
    } else if let Some(bin) = text.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).unwrap_or(0)
    } else if text.starts_with('\'') && text.ends_with('\'') && text.len() >= 3 {
        text.chars().nth(1).map(|c| c as i64).unwrap_or(0)
    } else {
        text.parse().unwrap_or(0)
    }
}

fn parse_value(pair: Pair<Rule>) -> Value {
    match pair.as_rule() {
        Rule::number => Value::Literal(parse_number(pair.as_str())),
        Rule::identifier => Value::Label(pair.as_str().to_string()),
        _ => Value::Literal(parse_number(pair.as_str())),
    }
}

fn parse_register(pair: Pair<Rule>) -> Result<RegisterId, String> {
    let name = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    use util::EnumFromStr;
    RegisterId::from_str(name).map_err(|e| e.to_string())
}

fn parse_operand(pair: Pair<Rule>, at: &SourceLocation) -> Result<Operand, ParseError> {
    let inner = pair.into_inner().next().ok_or_else(|| ParseError::Syntax {
        at: at.clone(),
        message: "empty operand".to_string(),
    })?;
    Ok(match inner.as_rule() {
        // Bare number/identifier, no brackets: immediate (spec §4.3/§6).
        Rule::immediate => {
            let value_pair = inner.into_inner().next().ok_or_else(|| ParseError::Syntax {
                at: at.clone(),
                message: "empty immediate".to_string(),
            })?;
            Operand::Immediate(parse_value(value_pair))
        }
        Rule::register => Operand::Register(
            parse_register(inner).map_err(|message| ParseError::Syntax { at: at.clone(), message })?,
        ),
        // `[%r]`: indirect.
        Rule::indirect => {
            let reg_pair = inner.into_inner().next().unwrap();
            Operand::Indirect(
                parse_register(reg_pair)
                    .map_err(|message| ParseError::Syntax { at: at.clone(), message })?,
            )
        }
        // `[%r + K]` / `[%r - K]`: indexed-indirect. Grammar order is
        // register, then sign, then the (always-unsigned) offset literal.
        Rule::indexed_indirect => {
            let mut parts = inner.into_inner();
            let reg_pair = parts.next().unwrap();
            let reg = parse_register(reg_pair)
                .map_err(|message| ParseError::Syntax { at: at.clone(), message })?;
            let sign_pair = parts.next().unwrap();
            let magnitude_pair = parts.next().unwrap();
            let magnitude = parse_number(magnitude_pair.as_str());
            let offset = if sign_pair.as_str() == "-" { -magnitude } else { magnitude };
            Operand::IndexedIndirect(Value::Literal(offset), reg)
        }
        // `[N]` / `[label]`: direct.
        Rule::direct => {
            let value_pair = inner.into_inner().next().ok_or_else(|| ParseError::Syntax {
                at: at.clone(),
                message: "empty direct operand".to_string(),
            })?;
            Operand::Direct(parse_value(value_pair))
        }
        rule => {
            return Err(ParseError::Syntax {
                at: at.clone(),
                message: format!("unexpected operand rule {rule:?}"),
            })
        }
    })
}

/// Decodes a `string_literal` token's escapes (spec §4.3: `\" \n \r \t \0`,
/// plus `\\`), stripping the surrounding quotes.
fn decode_string_literal(raw: &str) -> String {
    let inner = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(raw);
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('0') => result.push('\0'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some(other) => result.push(other),
                None => {}
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn parse_directive(pair: Pair<Rule>, at: &SourceLocation) -> Result<Directive, ParseError> {
    let mut parts = pair.into_inner();
    let name = parts.next().unwrap().as_str();
    let args: Vec<Pair<Rule>> = parts
        .next()
        .map(|list| list.into_inner().collect())
        .unwrap_or_default();

    match name {
        ".word" => {
            let values = args
                .into_iter()
                .map(|arg| parse_value(arg.into_inner().next().unwrap()))
                .collect();
            Ok(Directive::Word(values))
        }
        ".addr" => {
            let value = args
                .into_iter()
                .next()
                .map(|arg| parse_value(arg.into_inner().next().unwrap()))
                .ok_or_else(|| ParseError::Syntax {
                    at: at.clone(),
                    message: ".addr requires one argument".to_string(),
                })?;
            Ok(Directive::Addr(value))
        }
        ".space" => {
            let value = args
                .into_iter()
                .next()
                .map(|arg| parse_value(arg.into_inner().next().unwrap()))
                .ok_or_else(|| ParseError::Syntax {
                    at: at.clone(),
                    message: ".space requires one argument".to_string(),
                })?;
            Ok(Directive::Space(value))
        }
        ".string" => {
            let text = args
                .into_iter()
                .next()
                .map(|arg| decode_string_literal(arg.as_str()))
                .ok_or_else(|| ParseError::Syntax {
                    at: at.clone(),
                    message: ".string requires one argument".to_string(),
                })?;
            Ok(Directive::Str(text))
        }
        other => Err(ParseError::Syntax {
            at: at.clone(),
            message: format!("unknown directive `{other}`"),
        }),
    }
}

pub fn parse(source: &str, file: &str) -> Result<ParsedProgram, ParseError> {
    let pairs = AssemblyParser::parse(Rule::program, source).map_err(|err| ParseError::Syntax {
        at: SourceLocation { file: file.to_string(), line: 0 },
        message: err.to_string(),
    })?;

    let mut program = ParsedProgram::default();
    for program_pair in pairs {
        if program_pair.as_rule() != Rule::program {
            continue;
        }
        for line_pair in program_pair.into_inner() {
            if line_pair.as_rule() != Rule::line {
                continue;
            }
            let (line_number, _) = line_pair.as_span().start_pos().line_col();
            let at = SourceLocation { file: file.to_string(), line: line_number as u32 };

            for part in line_pair.into_inner() {
                match part.as_rule() {
                    Rule::label_def => {
                        let name = part.into_inner().next().unwrap().as_str().to_string();
                        program.lines.push(Located { value: Line::Label(name), line: line_number as u32 });
                    }
                    Rule::instruction => {
                        let mut inner = part.into_inner();
                        let mnemonic = inner.next().unwrap().as_str().to_string();
                        let operands = inner
                            .next()
                            .map(|list| {
                                list.into_inner()
                                    .map(|operand| parse_operand(operand, &at))
                                    .collect::<Result<Vec<_>, _>>()
                            })
                            .transpose()?
                            .unwrap_or_default();
                        program.lines.push(Located {
                            value: Line::Instruction(ParsedInstruction { mnemonic, operands }),
                            line: line_number as u32,
                        });
                    }
                    Rule::directive => {
                        let directive = parse_directive(part, &at)?;
                        program
                            .lines
                            .push(Located { value: Line::Directive(directive), line: line_number as u32 });
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_label_and_instruction() {
        let program = parse("loop: add 1, %a\n", "t.s").unwrap();
        assert_eq!(program.lines.len(), 2);
        assert_eq!(program.lines[0].value, Line::Label("loop".to_string()));
        match &program.lines[1].value {
            Line::Instruction(instr) => assert_eq!(instr.mnemonic, "add"),
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn parses_all_operand_forms() {
        let program = parse("st %a, [%b]\nld [%sp + 4], %a\nadd [%sp - 4], %a\n", "t.s").unwrap();
        match &program.lines[0].value {
            Line::Instruction(instr) => {
                assert_eq!(instr.operands[0], Operand::Register(RegisterId::A));
                assert_eq!(instr.operands[1], Operand::Indirect(RegisterId::B));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &program.lines[1].value {
            Line::Instruction(instr) => {
                assert_eq!(
                    instr.operands[0],
                    Operand::IndexedIndirect(Value::Literal(4), RegisterId::Sp)
                );
            }
            other => panic!("unexpected {other:?}"),
        }
        match &program.lines[2].value {
            Line::Instruction(instr) => {
                assert_eq!(
                    instr.operands[0],
                    Operand::IndexedIndirect(Value::Literal(-4), RegisterId::Sp)
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bare_number_is_immediate_and_bracketed_number_is_direct() {
        let program = parse("add 3, %a\nld [3], %a\n", "t.s").unwrap();
        match &program.lines[0].value {
            Line::Instruction(instr) => {
                assert_eq!(instr.operands[0], Operand::Immediate(Value::Literal(3)))
            }
            other => panic!("unexpected {other:?}"),
        }
        match &program.lines[1].value {
            Line::Instruction(instr) => {
                assert_eq!(instr.operands[0], Operand::Direct(Value::Literal(3)))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_directives() {
        let program = parse(".word 1, 2, 3\n.string \"hi\"\n", "t.s").unwrap();
        assert_eq!(
            program.lines[0].value,
            Line::Directive(Directive::Word(vec![
                Value::Literal(1),
                Value::Literal(2),
                Value::Literal(3)
            ]))
        );
        assert_eq!(
            program.lines[1].value,
            Line::Directive(Directive::Str("hi".to_string()))
        );
    }

    #[test]
    fn string_literal_decodes_escapes_and_tolerates_escaped_quotes() {
        let program = parse(".string \"a\\\"b\\nc\"\n", "t.s").unwrap();
        assert_eq!(
            program.lines[0].value,
            Line::Directive(Directive::Str("a\"b\nc".to_string()))
        );
    }

    #[test]
    fn unterminated_string_literal_is_a_parse_error() {
        assert!(parse(".string \"oops\n", "t.s").is_err());
    }
}
