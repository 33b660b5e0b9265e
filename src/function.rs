//! Two-pass function disassembler (§4.5): labels intra-function branch
//! targets on the first pass, then emits a labeled instruction stream on
//! the second.
//!
//! `begin_va`/`end_va` and [`AsmInstruction::address`] are image-base
//! *inclusive* (the runtime address a caller would see in a loaded
//! process), unlike [`crate::executable::Section`] and [`crate::symbol::Symbol`]
//! which are image-base-relative. The two passes convert once at entry and
//! work in the relative domain internally, since that is what the section
//! table and symbol store use.

use crate::decoder::{
    decode, BranchForm, ControlFlowKind, DecodedInstruction, MachineMode, OperandKind,
    MAX_INSTRUCTION_LENGTH,
};
use crate::error::PreconditionError;
use crate::executable::{Executable, SectionKind};
use crate::formatter::{format_instruction, FormatterBounds, SymbolResolver, SymbolicatingHooks};
use crate::symbol::{pseudo_prefix, pseudo_symbol_name, Symbol, SymbolStore};

/// One instruction of a disassembled function (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct AsmInstruction {
    pub address: u64,
    pub bytes: [u8; MAX_INSTRUCTION_LENGTH],
    pub byte_len: u8,
    pub text: String,
    pub is_invalid: bool,
    pub is_jump: bool,
    pub jump_len: i16,
    pub line_number: u16,
}

impl AsmInstruction {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.byte_len as usize]
    }
}

/// A symbol whose address coincides with an instruction boundary (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmLabel {
    pub label: String,
}

/// One element of a [`Function`]'s instruction stream.
///
/// `Null` is never stored in [`Function::instructions`]; it is the value
/// [`Function::at`] returns for an out-of-range index, standing in for the
/// source's untagged-variant sentinel (§9).
#[derive(Debug, Clone, PartialEq)]
pub enum AsmInstructionVariant {
    Null,
    Label(AsmLabel),
    Instruction(AsmInstruction),
}

/// A disassembled `[begin_va, end_va)` address range (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub begin_va: u64,
    pub end_va: u64,
    pub source_file_name: String,
    instructions: Vec<AsmInstructionVariant>,
    pub instruction_count: u32,
    pub label_count: u32,
}

impl Function {
    pub fn instructions(&self) -> &[AsmInstructionVariant] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns a clone of the variant at `index`, or `Null` if out of range.
    pub fn at(&self, index: usize) -> AsmInstructionVariant {
        self.instructions.get(index).cloned().unwrap_or(AsmInstructionVariant::Null)
    }
}

/// Resolves an address against the per-function pseudo-symbol store,
/// falling back to the global store (§3 "shadows the global store").
struct FunctionResolver<'a> {
    pseudo: &'a SymbolStore,
    global: &'a SymbolStore,
    image_base: u64,
}

impl<'a> SymbolResolver for FunctionResolver<'a> {
    fn resolve(&self, address: u64) -> Option<String> {
        let relative = address.wrapping_sub(self.image_base);
        self.pseudo
            .lookup_by_address(relative)
            .or_else(|| self.global.lookup_by_address(relative))
            .map(|s| s.name.clone())
    }
}

/// The relative immediate of a decoded instruction, if it has one.
fn relative_immediate(instr: &DecodedInstruction) -> Option<i64> {
    instr.operands().iter().find_map(|op| match op.kind {
        OperandKind::Immediate(imm) if imm.is_relative => Some(imm.value),
        _ => None,
    })
}

fn validate_range<'e, 'x>(
    exec: &'e Executable<'x>,
    begin_va: u64,
    end_va: u64,
) -> Result<(&'e crate::executable::Section<'x>, u64, u64), PreconditionError> {
    if begin_va >= end_va {
        return Err(PreconditionError::EmptyRange { begin_va, end_va });
    }
    let image_base = exec.image_base();
    let rel_begin = begin_va.wrapping_sub(image_base);
    let rel_end = end_va.wrapping_sub(image_base);
    let section = exec
        .find_section(rel_begin)
        .filter(|s| rel_end <= s.end_va())
        .ok_or(PreconditionError::CrossesSectionBoundary { begin_va, end_va })?;
    if section.kind != SectionKind::Code {
        return Err(PreconditionError::NotCodeSection { begin_va, end_va });
    }
    Ok((section, rel_begin, rel_end))
}

/// Pass 1: synthesizes pseudo-symbols for intra-function branch targets.
fn label_pass(section: &crate::executable::Section, symbols: &SymbolStore, rel_begin: u64, rel_end: u64) -> (SymbolStore, u32) {
    let mut pseudo = SymbolStore::new();
    let mut va = rel_begin;
    let mut count = 0u32;
    while va < rel_end {
        let offset = (va - section.base_va) as usize;
        match decode(MachineMode::Legacy32, va, &section.bytes[offset..]) {
            Ok(instr) => {
                if instr.branch_form != BranchForm::None {
                    if let Some(rel) = relative_immediate(&instr) {
                        let target = (va as i64 + instr.length as i64 + rel) as u64;
                        if target >= rel_begin && target < rel_end && symbols.lookup_by_address(target).is_none() {
                            let prefix = if instr.control_flow == ControlFlowKind::Call {
                                pseudo_prefix::SUB
                            } else {
                                pseudo_prefix::LOC
                            };
                            pseudo.insert(Symbol::new(pseudo_symbol_name(prefix, target), target, 0), false);
                        }
                    }
                }
                va += instr.length as u64;
            }
            Err(_) => va += 1,
        }
        count += 1;
    }
    (pseudo, count)
}

/// The `(is_jump, jump_len)` pair for an instruction at relative address
/// `va` inside `[rel_begin, rel_end)` (§4.5 pass 2 bullets).
///
/// `call` is excluded outright: a `call` target diverging between two
/// builds is ordinary call-site divergence, not a jump mismatch. Of the
/// `ConditionalJump` mnemonics, `loop`/`loope`/`loopne` are excluded the
/// same way as `call` and only `jcxz`/`jcc`-style conditional jumps count.
fn jump_info(instr: &DecodedInstruction, va: u64, rel_begin: u64, rel_end: u64) -> (bool, i16) {
    if instr.control_flow == ControlFlowKind::Call {
        return (false, 0);
    }
    if matches!(instr.mnemonic, "loop" | "loope" | "loopne") {
        return (false, 0);
    }
    let Some(rel) = relative_immediate(instr) else { return (false, 0) };
    let offset = instr.length as i64 + rel;
    match instr.branch_form {
        BranchForm::ShortImmediate => (true, offset as i16),
        BranchForm::LongImmediate => {
            let target = (va as i64 + offset) as u64;
            if target >= rel_begin && target < rel_end {
                (true, offset as i16)
            } else {
                (false, 0)
            }
        }
        _ => (false, 0),
    }
}

/// Disassembles `[begin_va, end_va)` (image-base-inclusive addresses).
///
/// Preconditions (§4.5): `begin_va < end_va`; the range lies inside exactly
/// one section; that section is the code section. Violations return
/// `Err`, never panic.
pub fn disassemble(
    exec: &Executable,
    symbols: &SymbolStore,
    begin_va: u64,
    end_va: u64,
) -> Result<Function, PreconditionError> {
    let (section, rel_begin, rel_end) = validate_range(exec, begin_va, end_va)?;
    let image_base = exec.image_base();

    let (pseudo, pass1_count) = label_pass(section, symbols, rel_begin, rel_end);

    let resolver = FunctionResolver { pseudo: &pseudo, global: symbols, image_base };
    let bounds = FormatterBounds {
        code_section_bounds: exec.code_section_bounds_from_image_base(),
        all_sections_bounds: exec.all_sections_bounds_from_image_base(),
    };
    let hooks = SymbolicatingHooks::new(&resolver, bounds);

    let mut instructions = Vec::new();
    let mut instruction_count = 0u32;
    let mut label_count = 0u32;
    let mut va = rel_begin;

    while va < rel_end {
        let runtime_address = va.wrapping_add(image_base);
        if let Some(name) = resolver.resolve(runtime_address) {
            instructions.push(AsmInstructionVariant::Label(AsmLabel { label: name }));
            label_count += 1;
        }

        let offset = (va - section.base_va) as usize;
        let slice = &section.bytes[offset..];

        match decode(MachineMode::Legacy32, va, slice) {
            Ok(instr) => {
                let text = format_instruction(&instr, &hooks, va, image_base);
                let mut bytes = [0u8; MAX_INSTRUCTION_LENGTH];
                let len = instr.length as usize;
                bytes[..len].copy_from_slice(&slice[..len]);
                let (is_jump, jump_len) = jump_info(&instr, va, rel_begin, rel_end);
                instructions.push(AsmInstructionVariant::Instruction(AsmInstruction {
                    address: runtime_address,
                    bytes,
                    byte_len: instr.length,
                    text,
                    is_invalid: false,
                    is_jump,
                    jump_len,
                    line_number: 0,
                }));
                va += instr.length as u64;
            }
            Err(reason) => {
                log::debug!("decode failed at {runtime_address:#x}: {reason}");
                let raw = slice[0];
                let mut bytes = [0u8; MAX_INSTRUCTION_LENGTH];
                bytes[0] = raw;
                instructions.push(AsmInstructionVariant::Instruction(AsmInstruction {
                    address: runtime_address,
                    bytes,
                    byte_len: 1,
                    text: format!("{raw:02X}"),
                    is_invalid: true,
                    is_jump: false,
                    jump_len: 0,
                    line_number: 0,
                }));
                va += 1;
            }
        }
        instruction_count += 1;
    }

    debug_assert_eq!(pass1_count, instruction_count, "pass 1 and pass 2 must walk the same instruction boundaries");
    debug_assert_eq!(instructions.len(), (instruction_count + label_count) as usize);

    Ok(Function {
        begin_va,
        end_va,
        source_file_name: String::new(),
        instructions,
        instruction_count,
        label_count,
    })
}

/// Stamps each instruction's `line_number` from `(line, offset, length)`
/// records sorted by `offset`, relative to `function.begin_va` (§4.5).
///
/// Precondition: the last record ends exactly at `end_va - begin_va`.
pub fn attach_source_lines(
    function: &mut Function,
    source_file_name: impl Into<String>,
    lines: &[(u16, u32, u32)],
) -> Result<(), PreconditionError> {
    let span = (function.end_va - function.begin_va) as u32;
    let actual_end = lines.last().map(|&(_, offset, length)| offset + length).unwrap_or(0);
    if actual_end != span {
        return Err(PreconditionError::SourceLinesDoNotCoverRange {
            actual_end: actual_end as u64,
            expected_end: span as u64,
        });
    }

    function.source_file_name = source_file_name.into();

    let mut record_index = 0usize;
    for variant in &mut function.instructions {
        if let AsmInstructionVariant::Instruction(instr) = variant {
            let rel = (instr.address - function.begin_va) as u32;
            while record_index + 1 < lines.len() && lines[record_index + 1].1 <= rel {
                record_index += 1;
            }
            if let Some(&(line, offset, length)) = lines.get(record_index) {
                if rel >= offset && rel < offset + length {
                    instr.line_number = line;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executable::Section;

    fn exec_with<'a>(bytes: &'a [u8], image_base: u64) -> Executable<'a> {
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
    fn rejects_empty_range() {
        let bytes = [0x90u8; 4];
        let exec = exec_with(&bytes, 0x400000);
        let symbols = SymbolStore::new();
        let err = disassemble(&exec, &symbols, 0x401002, 0x401002).unwrap_err();
        assert!(matches!(err, PreconditionError::EmptyRange { .. }));
    }

    #[test]
    fn rejects_range_crossing_section_boundary() {
        let bytes = [0x90u8; 4];
        let exec = exec_with(&bytes, 0x400000);
        let symbols = SymbolStore::new();
        let err = disassemble(&exec, &symbols, 0x401000, 0x402000).unwrap_err();
        assert!(matches!(err, PreconditionError::CrossesSectionBoundary { .. }));
    }

    #[test]
    fn s1_identity_disassembles_three_instructions() {
        let bytes = [0x90, 0x90, 0xC3];
        let exec = exec_with(&bytes, 0x400000);
        let symbols = SymbolStore::new();
        let f = disassemble(&exec, &symbols, 0x401000, 0x401003).unwrap();
        assert_eq!(f.instruction_count, 3);
        assert_eq!(f.label_count, 0);
    }

    #[test]
    fn s2_symbol_rewrite() {
        let bytes = [0xE8, 0x00, 0x00, 0x00, 0x00];
        let exec = exec_with(&bytes, 0x400000);
        let mut symbols = SymbolStore::new();
        symbols.insert(Symbol::new("foo", 0x1005, 0), false);
        let f = disassemble(&exec, &symbols, 0x401000, 0x401005).unwrap();
        match f.at(0) {
            AsmInstructionVariant::Instruction(i) => assert_eq!(i.text, "call \"foo\""),
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn s3_loc_synthesis_on_self_jump() {
        let bytes = [0xEB, 0xFE]; // jmp $-2, a backward jump to its own address
        let exec = exec_with(&bytes, 0);
        let symbols = SymbolStore::new();
        let f = disassemble(&exec, &symbols, 0x1000, 0x1002).unwrap();
        assert_eq!(f.label_count, 1);
        match f.at(0) {
            AsmInstructionVariant::Label(l) => assert_eq!(l.label, "loc_1000"),
            other => panic!("expected label, got {other:?}"),
        }
        match f.at(1) {
            AsmInstructionVariant::Instruction(i) => assert_eq!(i.text, "jmp short \"loc_1000\""),
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn call_to_a_target_inside_the_function_is_not_marked_is_jump() {
        // call $+5 (calls the very next instruction, a nop); nop
        let bytes = [0xE8, 0x00, 0x00, 0x00, 0x00, 0x90];
        let exec = exec_with(&bytes, 0x400000);
        let symbols = SymbolStore::new();
        let f = disassemble(&exec, &symbols, 0x401000, 0x401006).unwrap();
        match f.at(0) {
            AsmInstructionVariant::Instruction(i) => assert!(!i.is_jump),
            other => panic!("expected instruction, got {other:?}"),
        }
        // the call target grows a sub_ label, not a jump mismatch
        match f.at(1) {
            AsmInstructionVariant::Label(l) => assert_eq!(l.label, "sub_401005"),
            other => panic!("expected label, got {other:?}"),
        }
    }

    #[test]
    fn loop_is_not_marked_is_jump() {
        let bytes = [0xE2, 0xFE]; // loop $-2
        let exec = exec_with(&bytes, 0);
        let symbols = SymbolStore::new();
        let f = disassemble(&exec, &symbols, 0x1000, 0x1002).unwrap();
        match f.at(0) {
            AsmInstructionVariant::Label(l) => assert_eq!(l.label, "loc_1000"),
            other => panic!("expected label, got {other:?}"),
        }
        match f.at(1) {
            AsmInstructionVariant::Instruction(i) => assert!(!i.is_jump),
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn invalid_opcodes_become_hex_dumps_and_advance_one_byte() {
        let bytes = [0x0F, 0xFF];
        let exec = exec_with(&bytes, 0x400000);
        let symbols = SymbolStore::new();
        let f = disassemble(&exec, &symbols, 0x401000, 0x401002).unwrap();
        assert_eq!(f.instruction_count, 2);
        match (f.at(0), f.at(1)) {
            (AsmInstructionVariant::Instruction(a), AsmInstructionVariant::Instruction(b)) => {
                assert!(a.is_invalid && b.is_invalid);
                assert_eq!(a.text, "0F");
                assert_eq!(b.text, "FF");
            }
            other => panic!("expected two instructions, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_index_returns_null() {
        let bytes = [0x90];
        let exec = exec_with(&bytes, 0x400000);
        let symbols = SymbolStore::new();
        let f = disassemble(&exec, &symbols, 0x401000, 0x401001).unwrap();
        assert_eq!(f.at(99), AsmInstructionVariant::Null);
    }

    #[test]
    fn attach_source_lines_requires_full_coverage() {
        let bytes = [0x90, 0x90];
        let exec = exec_with(&bytes, 0x400000);
        let symbols = SymbolStore::new();
        let mut f = disassemble(&exec, &symbols, 0x401000, 0x401002).unwrap();
        let err = attach_source_lines(&mut f, "main.c", &[(1, 0, 1)]).unwrap_err();
        assert!(matches!(err, PreconditionError::SourceLinesDoNotCoverRange { .. }));
    }

    #[test]
    fn attach_source_lines_stamps_matching_records() {
        let bytes = [0x90, 0x90];
        let exec = exec_with(&bytes, 0x400000);
        let symbols = SymbolStore::new();
        let mut f = disassemble(&exec, &symbols, 0x401000, 0x401002).unwrap();
        attach_source_lines(&mut f, "main.c", &[(10, 0, 1), (11, 1, 1)]).unwrap();
        match (f.at(0), f.at(1)) {
            (AsmInstructionVariant::Instruction(a), AsmInstructionVariant::Instruction(b)) => {
                assert_eq!(a.line_number, 10);
                assert_eq!(b.line_number, 11);
            }
            other => panic!("expected two instructions, got {other:?}"),
        }
        assert_eq!(f.source_file_name, "main.c");
    }
}
