//! Second assembly pass: resolves operands and emits the final word image
//! (spec §4.4 "encode to a binary image").

use crate::error::{AssembleError, SourceLocation};
use crate::labels::LabelMap;
use crate::parser::{Directive, Line, Operand, ParsedInstruction, ParsedProgram, Value};
use z33::instruction::AddressingMode;
use z33::{encode, Instruction, RegisterId};

/// Maps a memory address to the 1-based preprocessed-source line that
/// produced the word there, so a runtime fault can be reported against
/// source text; combine with [`crate::code_map::CodeMap`] to get back to
/// what the user actually wrote.
#[derive(Clone, Debug, Default)]
pub struct SourceMap {
    lines_by_address: Vec<(u32, u32)>,
}

impl SourceMap {
    pub fn line_for(&self, address: u32) -> Option<u32> {
        self.lines_by_address
            .iter()
            .rev()
            .find(|(addr, _)| *addr <= address)
            .map(|(_, line)| *line)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AssembledProgram {
    pub image: Vec<u32>,
    pub source_map: SourceMap,
    pub labels: LabelMap,
}

fn resolve_mode(
    operand: &Operand,
    labels: &LabelMap,
    at: &SourceLocation,
) -> Result<AddressingMode, AssembleError> {
    Ok(match operand {
        Operand::Immediate(v) => AddressingMode::Immediate(labels.resolve(v, at)? as u32),
        Operand::Register(r) => AddressingMode::Register(*r),
        Operand::Direct(v) => AddressingMode::Direct(labels.resolve(v, at)? as u32),
        Operand::Indirect(r) => AddressingMode::Indirect(*r),
        Operand::IndexedIndirect(v, r) => {
            AddressingMode::IndexedIndirect(*r, labels.resolve(v, at)? as i32)
        }
    })
}

fn as_register(mode: AddressingMode, at: &SourceLocation, mnemonic: &str) -> Result<RegisterId, AssembleError> {
    match mode {
        AddressingMode::Register(r) => Ok(r),
        _ => Err(AssembleError::Parse(crate::error::ParseError::IllegalOperand {
            at: at.clone(),
            mnemonic: mnemonic.to_string(),
        })),
    }
}

fn build_instruction(
    parsed: &ParsedInstruction,
    labels: &LabelMap,
    at: &SourceLocation,
) -> Result<Instruction, AssembleError> {
    let illegal = || {
        AssembleError::Parse(crate::error::ParseError::IllegalOperand {
            at: at.clone(),
            mnemonic: parsed.mnemonic.clone(),
        })
    };
    let modes: Vec<AddressingMode> = parsed
        .operands
        .iter()
        .map(|op| resolve_mode(op, labels, at))
        .collect::<Result<_, _>>()?;

    macro_rules! binary {
        ($variant:ident) => {{
            let [src, dst]: [AddressingMode; 2] = modes.clone().try_into().map_err(|_| illegal())?;
            Instruction::$variant { src, dst: as_register(dst, at, &parsed.mnemonic)? }
        }};
    }
    macro_rules! unary_target {
        ($variant:ident) => {{
            let [target]: [AddressingMode; 1] = modes.clone().try_into().map_err(|_| illegal())?;
            Instruction::$variant { target }
        }};
    }

    Ok(match parsed.mnemonic.as_str() {
        "add" => binary!(Add),
        "and" => binary!(And),
        "cmp" => binary!(Cmp),
        "div" => binary!(Div),
        "ld" => binary!(Ld),
        "or" => binary!(Or),
        "shl" => binary!(Shl),
        "shr" => binary!(Shr),
        "sub" => binary!(Sub),
        "xor" => binary!(Xor),
        "call" => unary_target!(Call),
        "jmp" => unary_target!(Jmp),
        "jeq" => unary_target!(Jeq),
        "jne" => unary_target!(Jne),
        "jle" => unary_target!(Jle),
        "jlt" => unary_target!(Jlt),
        "jge" => unary_target!(Jge),
        "jgt" => unary_target!(Jgt),
        "fas" => {
            let [mem, reg]: [AddressingMode; 2] = modes.clone().try_into().map_err(|_| illegal())?;
            Instruction::Fas { mem, reg: as_register(reg, at, &parsed.mnemonic)? }
        }
        "st" => {
            let [src, dst]: [AddressingMode; 2] = modes.clone().try_into().map_err(|_| illegal())?;
            Instruction::St { src: as_register(src, at, &parsed.mnemonic)?, dst }
        }
        "swap" => {
            let [lhs, rhs]: [AddressingMode; 2] = modes.clone().try_into().map_err(|_| illegal())?;
            Instruction::Swap { lhs, rhs: as_register(rhs, at, &parsed.mnemonic)? }
        }
        "not" => {
            let [dst]: [AddressingMode; 1] = modes.clone().try_into().map_err(|_| illegal())?;
            Instruction::Not { dst: as_register(dst, at, &parsed.mnemonic)? }
        }
        "pop" => {
            let [dst]: [AddressingMode; 1] = modes.clone().try_into().map_err(|_| illegal())?;
            Instruction::Pop { dst: as_register(dst, at, &parsed.mnemonic)? }
        }
        "push" => {
            let [src]: [AddressingMode; 1] = modes.clone().try_into().map_err(|_| illegal())?;
            Instruction::Push { src }
        }
        "nop" => Instruction::Nop,
        "reset" => Instruction::Reset,
        "rti" => Instruction::Rti,
        "rtn" => Instruction::Rtn,
        "trap" => Instruction::Trap,
        other => {
            return Err(AssembleError::Parse(crate::error::ParseError::Syntax {
                at: at.clone(),
                message: format!("unknown mnemonic `{other}`"),
            }))
        }
    })
}

/// Runs both assembly passes, producing the final word image.
pub fn assemble(program: &ParsedProgram, file: &str) -> Result<AssembledProgram, AssembleError> {
    let labels = crate::labels::build(program, file)?;
    let mut image = Vec::new();
    let mut lines_by_address = Vec::new();
    let mut cursor: u32 = 0;

    for located in &program.lines {
        let at = SourceLocation { file: file.to_string(), line: located.line };
        lines_by_address.push((cursor, located.line));
        match &located.value {
            Line::Label(_) => {}
            Line::Instruction(parsed) => {
                let instruction = build_instruction(parsed, &labels, &at)?;
                let word = encode(instruction)?;
                image.push((word >> 32) as u32);
                image.push(word as u32);
                cursor += z33::constants::INSTRUCTION_WORDS;
            }
            Line::Directive(Directive::Word(values)) => {
                for value in values {
                    image.push(labels.resolve(value, &at)? as u32);
                    cursor += 1;
                }
            }
            Line::Directive(Directive::Space(value)) => {
                let count = labels.resolve(value, &at)?.max(0) as u32;
                image.extend(std::iter::repeat(0).take(count as usize));
                cursor += count;
            }
            Line::Directive(Directive::Str(text)) => {
                for ch in text.chars() {
                    image.push(ch as u32);
                }
                image.push(0);
                cursor += text.chars().count() as u32 + 1;
            }
            Line::Directive(Directive::Addr(value)) => {
                let target = labels.resolve(value, &at)?.max(0) as u32;
                if target > cursor {
                    image.extend(std::iter::repeat(0).take((target - cursor) as usize));
                }
                cursor = target;
            }
        }
    }

    let available = z33::constants::MEMORY_SIZE;
    if cursor > available {
        return Err(AssembleError::ProgramTooLarge { needed: cursor, available });
    }

    Ok(AssembledProgram {
        image,
        source_map: SourceMap { lines_by_address },
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn assembles_a_small_loop() {
        let source = "\
            ld 10, %a\n\
            loop: cmp 0, %a\n\
            jeq done\n\
            add -1, %a\n\
            jmp loop\n\
            done: trap\n";
        let program = parse(source, "t.s").unwrap();
        let assembled = assemble(&program, "t.s").unwrap();
        assert_eq!(assembled.labels.get("loop"), Some(2));
        assert_eq!(assembled.labels.get("done"), Some(10));
        assert_eq!(assembled.image.len(), 12);
    }

    #[test]
    fn undefined_labels_are_rejected() {
        let program = parse("jmp nowhere\n", "t.s").unwrap();
        assert!(matches!(
            assemble(&program, "t.s"),
            Err(AssembleError::UndefinedLabel { .. })
        ));
    }

    #[test]
    fn word_and_string_directives_lay_out_data() {
        let program = parse(".word 1, 2\n.string \"hi\"\n", "t.s").unwrap();
        let assembled = assemble(&program, "t.s").unwrap();
        assert_eq!(assembled.image, vec![1, 2, 'h' as u32, 'i' as u32, 0]);
    }
}
