//! Integration tests exercising the full pipeline: executable view, symbol
//! store, function disassembly, and stream alignment together.

use unasmdiff::{align, disassemble, Executable, Section, SectionKind, Strictness, Symbol, SymbolStore};

fn exec<'a>(bytes: &'a [u8], image_base: u64) -> Executable<'a> {
    let section = Section {
        name: ".text".to_string(),
        base_va: 0x1000,
        size: bytes.len() as u64,
        bytes,
        kind: SectionKind::Unknown,
    };
    Executable::new(image_base, vec![section], 0x1000)
}

#[test]
fn identical_functions_are_a_perfect_match() {
    let bytes = [0x90, 0x90, 0xC3]; // nop; nop; ret
    let e = exec(&bytes, 0x400000);
    let symbols = SymbolStore::new();
    let a = disassemble(&e, &symbols, 0x401000, 0x401003).unwrap();
    let b = disassemble(&e, &symbols, 0x401000, 0x401003).unwrap();

    let result = align(&a, &b, 20);
    assert_eq!(result.mismatch_count, 0);
    assert_eq!(result.maybe_match_count, 0);
    assert_eq!(result.similarity(Strictness::Strict), 1.0);
}

#[test]
fn inserted_instruction_resyncs_via_lookahead() {
    // mov eax,0; add eax,1; sub eax,1; ret
    let bytes_a = [0xB8, 0, 0, 0, 0, 0x83, 0xC0, 0x01, 0x83, 0xE8, 0x01, 0xC3];
    // mov eax,0; xor eax,eax; add eax,1; sub eax,1; ret
    let bytes_b = [0xB8, 0, 0, 0, 0, 0x31, 0xC0, 0x83, 0xC0, 0x01, 0x83, 0xE8, 0x01, 0xC3];
    let exec_a = exec(&bytes_a, 0x400000);
    let exec_b = exec(&bytes_b, 0x400000);
    let symbols = SymbolStore::new();
    let a = disassemble(&exec_a, &symbols, 0x401000, 0x40100C).unwrap();
    let b = disassemble(&exec_b, &symbols, 0x401000, 0x40100E).unwrap();

    let result = align(&a, &b, 20);
    assert_eq!(result.match_count, 4);
    assert_eq!(result.mismatch_count, 1);
}

#[test]
fn same_resolved_symbol_on_both_sides_is_an_exact_match() {
    // call rel32 to a symbol known by the same name on both sides.
    let bytes = [0xE8, 0x00, 0x00, 0x00, 0x00];
    let exec_a = exec(&bytes, 0x400000);
    let exec_b = exec(&bytes, 0x400000);

    let mut symbols_a = SymbolStore::new();
    symbols_a.insert(Symbol::new("helper", 0x1005, 0), false);
    let mut symbols_b = SymbolStore::new();
    symbols_b.insert(Symbol::new("helper", 0x1005, 0), false);

    let a = disassemble(&exec_a, &symbols_a, 0x401000, 0x401005).unwrap();
    let b = disassemble(&exec_b, &symbols_b, 0x401000, 0x401005).unwrap();

    let result = align(&a, &b, 20);
    assert_eq!(result.mismatch_count, 0);
}

#[test]
fn renamed_resolved_symbol_is_a_hard_mismatch() {
    let bytes = [0xE8, 0x00, 0x00, 0x00, 0x00];
    let exec_a = exec(&bytes, 0x400000);
    let exec_b = exec(&bytes, 0x400000);

    let mut symbols_a = SymbolStore::new();
    symbols_a.insert(Symbol::new("helper_v1", 0x1005, 0), false);
    let mut symbols_b = SymbolStore::new();
    symbols_b.insert(Symbol::new("helper_v2", 0x1005, 0), false);

    let a = disassemble(&exec_a, &symbols_a, 0x401000, 0x401005).unwrap();
    let b = disassemble(&exec_b, &symbols_b, 0x401000, 0x401005).unwrap();

    let result = align(&a, &b, 20);
    assert_eq!(result.mismatch_count, 1);
}

#[test]
fn unresolved_symbol_rename_is_a_maybe_match_not_strict() {
    let bytes = [0xE8, 0x00, 0x00, 0x00, 0x00];
    let exec_a = exec(&bytes, 0x400000);
    let exec_b = exec(&bytes, 0x400000);
    let symbols = SymbolStore::new();

    let a = disassemble(&exec_a, &symbols, 0x401000, 0x401005).unwrap();
    let b = disassemble(&exec_b, &symbols, 0x401000, 0x401005).unwrap();

    let result = align(&a, &b, 20);
    assert_eq!(result.mismatch_count, 0);
    assert_eq!(result.maybe_match_count, 1);
    assert_eq!(result.similarity(Strictness::Strict), 0.0);
    assert_eq!(result.similarity(Strictness::Lenient), 1.0);
}

#[test]
fn trailing_unilateral_instructions_count_as_mismatches() {
    let bytes_a = [0x90];
    let bytes_b = [0x90, 0x90, 0x90];
    let exec_a = exec(&bytes_a, 0x400000);
    let exec_b = exec(&bytes_b, 0x400000);
    let symbols = SymbolStore::new();

    let a = disassemble(&exec_a, &symbols, 0x401000, 0x401001).unwrap();
    let b = disassemble(&exec_b, &symbols, 0x401000, 0x401003).unwrap();

    let result = align(&a, &b, 20);
    assert_eq!(result.match_count, 1);
    assert_eq!(result.mismatch_count, 2);
}
