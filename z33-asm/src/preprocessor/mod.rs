//! Directive preprocessing: `#include`, `#define`, `#if`/`#elseif`/`#else`/`#endif`
//! (spec §4.1 "Preprocessor").

mod ast;
mod eval;
mod lexer;

use crate::code_map::{CodeMap, SegmentKind};
use crate::error::{PreprocessError, SourceLocation};
use std::collections::HashMap;

/// External collaborator that turns an `#include` path into file contents.
/// Kept abstract so tests can resolve includes from an in-memory map
/// instead of the real filesystem.
pub trait FileResolver {
    /// Resolves `path`, written from within `from` (`None` for the entry
    /// file), to a canonical name (used for cycle detection and in error
    /// locations) and the file's contents.
    fn resolve(&self, from: Option<&str>, path: &str) -> Result<(String, String), PreprocessError>;
}

/// A [`FileResolver`] backed by an in-memory map, for tests and for
/// embedding a fixed set of headers.
#[derive(Clone, Debug, Default)]
pub struct MapResolver {
    files: HashMap<String, String>,
}

impl MapResolver {
    pub fn new() -> MapResolver {
        MapResolver::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, contents: impl Into<String>) -> MapResolver {
        self.files.insert(name.into(), contents.into());
        self
    }
}

impl FileResolver for MapResolver {
    fn resolve(&self, _from: Option<&str>, path: &str) -> Result<(String, String), PreprocessError> {
        self.files
            .get(path)
            .map(|contents| (path.to_string(), contents.clone()))
            .ok_or_else(|| PreprocessError::UnresolvedInclude {
                at: SourceLocation { file: path.to_string(), line: 0 },
                path: path.to_string(),
            })
    }
}

struct ConditionalFrame {
    /// Whether the current branch's text should be emitted.
    active: bool,
    /// Whether any branch in this `#if`/`#elseif*`/`#else` chain has
    /// already been taken (so later `#elseif`/`#else` branches skip even
    /// if their own condition is true).
    taken: bool,
}

pub struct Preprocessor<'r> {
    resolver: &'r dyn FileResolver,
    defines: HashMap<String, String>,
}

impl<'r> Preprocessor<'r> {
    pub fn new(resolver: &'r dyn FileResolver) -> Preprocessor<'r> {
        Preprocessor {
            resolver,
            defines: HashMap::new(),
        }
    }

    /// Runs the preprocessor over `entry_path`, returning the emitted text
    /// and the [`CodeMap`] tracing it back to the files it came from.
    pub fn run(&mut self, entry_path: &str) -> Result<(String, CodeMap), PreprocessError> {
        let (canonical, contents) = self.resolver.resolve(None, entry_path)?;
        let mut output = String::new();
        let mut code_map = CodeMap::new();
        let mut include_stack = vec![canonical.clone()];
        self.process_file(&canonical, &contents, &mut include_stack, &mut output, &mut code_map)?;
        Ok((output, code_map))
    }

    fn process_file(
        &mut self,
        file_name: &str,
        contents: &str,
        include_stack: &mut Vec<String>,
        output: &mut String,
        code_map: &mut CodeMap,
    ) -> Result<(), PreprocessError> {
        let mut conditionals: Vec<ConditionalFrame> = Vec::new();
        let mut offset_in_file = 0usize;

        for (line_index, line) in contents.split('\n').enumerate() {
            let line_number = line_index as u32 + 1;
            let line_len = line.len() + 1; // account for the '\n' split away
            let active = conditionals.iter().all(|frame| frame.active);
            let trimmed = line.trim_start();

            if let Some(rest) = trimmed.strip_prefix('#') {
                self.handle_directive(
                    rest.trim(),
                    file_name,
                    line_number,
                    include_stack,
                    &mut conditionals,
                    output,
                    code_map,
                )?;
                offset_in_file += line_len;
                continue;
            }

            if active {
                let rewritten = self.expand_macros(line);
                let start = output.len();
                output.push_str(&rewritten);
                output.push('\n');
                let kind = if file_name == include_stack[0] {
                    SegmentKind::Direct
                } else {
                    SegmentKind::External { file: file_name.to_string() }
                };
                // A zero-width replace at the current tail is an append;
                // `output` only ever grows forward, so every line's text
                // lands at `start` and nothing before it ever shifts.
                code_map.replace_characters(start, start, output.len() - start, kind, offset_in_file);
            }
            offset_in_file += line_len;
        }

        if !conditionals.is_empty() {
            return Err(PreprocessError::UnterminatedConditional {
                at: SourceLocation { file: file_name.to_string(), line: contents.lines().count() as u32 },
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_directive(
        &mut self,
        directive: &str,
        file_name: &str,
        line_number: u32,
        include_stack: &mut Vec<String>,
        conditionals: &mut Vec<ConditionalFrame>,
        output: &mut String,
        code_map: &mut CodeMap,
    ) -> Result<(), PreprocessError> {
        let at = || SourceLocation { file: file_name.to_string(), line: line_number };
        let active_before = conditionals.iter().all(|frame| frame.active);

        let mut parts = directive.splitn(2, char::is_whitespace);
        let keyword = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match keyword {
            "include" if active_before => {
                let path = rest.trim_matches(|c| c == '"' || c == '<' || c == '>');
                let (canonical, contents) = self
                    .resolver
                    .resolve(Some(file_name), path)
                    .map_err(|_| PreprocessError::UnresolvedInclude {
                        at: at(),
                        path: path.to_string(),
                    })?;
                if include_stack.contains(&canonical) {
                    return Err(PreprocessError::IncludeCycle { at: at(), path: canonical });
                }
                include_stack.push(canonical.clone());
                self.process_file(&canonical, &contents, include_stack, output, code_map)?;
                include_stack.pop();
            }
            "define" if active_before => {
                let mut define_parts = rest.splitn(2, char::is_whitespace);
                let name = define_parts.next().unwrap_or("").to_string();
                let replacement = define_parts.next().unwrap_or("").trim().to_string();
                if let Some(existing) = self.defines.get(&name) {
                    if existing != &replacement {
                        return Err(PreprocessError::MacroRedefined { at: at(), name });
                    }
                } else {
                    self.defines.insert(name, replacement);
                }
            }
            "undef" if active_before => {
                self.defines.remove(rest);
            }
            "if" => {
                let taken = active_before && self.eval_condition(rest);
                conditionals.push(ConditionalFrame { active: taken, taken });
            }
            "elseif" => {
                let frame = conditionals
                    .last_mut()
                    .ok_or_else(|| PreprocessError::UnmatchedConditional { at: at() })?;
                let parent_active = conditionals.len() < 2
                    || conditionals[..conditionals.len() - 1].iter().all(|f| f.active);
                if frame.taken || !parent_active {
                    frame.active = false;
                } else {
                    frame.active = self.eval_condition(rest);
                    frame.taken |= frame.active;
                }
            }
            "else" => {
                let frame = conditionals
                    .last_mut()
                    .ok_or_else(|| PreprocessError::UnmatchedConditional { at: at() })?;
                frame.active = !frame.taken;
                frame.taken = true;
            }
            "endif" => {
                conditionals
                    .pop()
                    .ok_or_else(|| PreprocessError::UnmatchedConditional { at: at() })?;
            }
            _ if !active_before => {}
            other => {
                return Err(PreprocessError::MalformedDirective {
                    at: at(),
                    message: format!("unknown directive `#{other}`"),
                })
            }
        }
        Ok(())
    }

    fn eval_condition(&self, source: &str) -> bool {
        let (ast, root) = eval::parse(source);
        eval::evaluate(&ast, root, &self.defines) != 0
    }

    /// Replaces whole-word occurrences of defined macro names with their
    /// replacement text. Single pass, not recursive: a replacement that
    /// itself names another macro is left as-is, matching how the
    /// teaching material's object-like macros behave.
    fn expand_macros(&self, line: &str) -> String {
        if self.defines.is_empty() {
            return line.to_string();
        }
        let mut result = String::with_capacity(line.len());
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = line[i..].chars().next().unwrap();
            if c.is_alphabetic() || c == '_' {
                let start = i;
                let mut end = i;
                for (idx, ch) in line[start..].char_indices() {
                    if ch.is_alphanumeric() || ch == '_' {
                        end = start + idx + ch.len_utf8();
                    } else {
                        break;
                    }
                }
                let word = &line[start..end];
                if let Some(replacement) = self.defines.get(word) {
                    result.push_str(replacement);
                } else {
                    result.push_str(word);
                }
                i = end;
            } else {
                result.push(c);
                i += c.len_utf8();
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_are_spliced_in() {
        let resolver = MapResolver::new()
            .with_file("main.s", "#include \"macros.s\"\nadd 1, %a\n")
            .with_file("macros.s", "nop\n");
        let mut preprocessor = Preprocessor::new(&resolver);
        let (output, _map) = preprocessor.run("main.s").unwrap();
        assert_eq!(output, "nop\nadd 1, %a\n");
    }

    #[test]
    fn include_cycles_are_rejected() {
        let resolver = MapResolver::new()
            .with_file("a.s", "#include \"b.s\"\n")
            .with_file("b.s", "#include \"a.s\"\n");
        let mut preprocessor = Preprocessor::new(&resolver);
        assert!(matches::matches!(
            preprocessor.run("a.s"),
            Err(PreprocessError::IncludeCycle { .. })
        ));
    }

    #[test]
    fn redefining_a_macro_with_a_different_body_is_an_error() {
        let resolver = MapResolver::new()
            .with_file("main.s", "#define N 1\n#define N 2\n");
        let mut preprocessor = Preprocessor::new(&resolver);
        assert!(matches::matches!(
            preprocessor.run("main.s"),
            Err(PreprocessError::MacroRedefined { .. })
        ));
    }

    #[test]
    fn conditional_blocks_select_one_branch() {
        let resolver = MapResolver::new().with_file(
            "main.s",
            "#define DEBUG 1\n#if defined(DEBUG)\nnop\n#else\ntrap\n#endif\n",
        );
        let mut preprocessor = Preprocessor::new(&resolver);
        let (output, _map) = preprocessor.run("main.s").unwrap();
        assert_eq!(output, "nop\n");
    }

    #[test]
    fn macro_use_is_substituted() {
        let resolver = MapResolver::new().with_file("main.s", "#define COUNT 10\nld COUNT, %a\n");
        let mut preprocessor = Preprocessor::new(&resolver);
        let (output, _map) = preprocessor.run("main.s").unwrap();
        assert_eq!(output, "ld 10, %a\n");
    }
}
