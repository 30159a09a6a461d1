//! End-to-end preprocessor → parser → assembler scenarios (spec §8.5).

use z33_asm::preprocessor::MapResolver;
use z33_asm::{assemble_file, code_map::OriginalPosition, CodeMap, Segment, SegmentKind};

#[test]
fn program_spanning_an_include_assembles_to_one_image() {
    let resolver = MapResolver::new()
        .with_file("main.s", "#include \"lib.s\"\nld 1, %a\ntrap\n")
        .with_file("lib.s", "nop\n");
    let assembled = assemble_file(&resolver, "main.s").unwrap();
    // nop (2 words) + ld (2 words) + trap (2 words)
    assert_eq!(assembled.image.len(), 6);
}

#[test]
fn include_cycle_is_reported_as_an_error() {
    let resolver = MapResolver::new()
        .with_file("a.s", "#include \"b.s\"\ntrap\n")
        .with_file("b.s", "#include \"a.s\"\n");
    assert!(assemble_file(&resolver, "a.s").is_err());
}

#[test]
fn conditional_compilation_selects_the_active_branch() {
    let resolver = MapResolver::new().with_file(
        "main.s",
        "#define RELEASE 1\n#if defined(RELEASE)\ntrap\n#else\nnop\nnop\n#endif\n",
    );
    let assembled = assemble_file(&resolver, "main.s").unwrap();
    assert_eq!(assembled.image.len(), 2);
}

#[test]
fn code_map_traces_an_offset_back_to_the_file_it_came_from() {
    let mut map = CodeMap::new();
    map.push(Segment { start: 0, end: 4, kind: SegmentKind::Direct, original_offset: 0 });
    map.push(Segment {
        start: 4,
        end: 12,
        kind: SegmentKind::External { file: "lib.s".to_string() },
        original_offset: 0,
    });
    assert_eq!(
        map.convert_to_original(6),
        Some(OriginalPosition::OtherFile { file: "lib.s".to_string(), offset: 2 })
    );
}

#[test]
fn undefined_label_reference_fails_assembly() {
    let resolver = MapResolver::new().with_file("main.s", "jmp missing\n");
    assert!(assemble_file(&resolver, "main.s").is_err());
}
