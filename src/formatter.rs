//! Renders a [`DecodedInstruction`] to text, rewriting address-bearing
//! operands via the symbol store (§4.4).
//!
//! The underlying decoder/formatter pairing is a collaborator, not part of
//! the core's contract — what the core promises is the
//! seven named extension points on [`FormatterHooks`]. [`SymbolicatingHooks`]
//! is this crate's own implementation of that trait; [`PlainHooks`] is the
//! non-symbolicating counterpart used for round-trip tests and as a
//! reference for what "falling through to the default formatter" means.

use crate::decoder::{
    BranchForm, DecodedInstruction, ImmediateOperand, MemoryOperand, Operand, OperandKind,
    PointerOperand, Register, Segment,
};

/// Resolves an address to a symbol name. Implemented by the function
/// disassembler as "per-function pseudo-symbols, shadowing the global
/// store" (§3, §9).
pub trait SymbolResolver {
    fn resolve(&self, address: u64) -> Option<String>;
}

/// Image-base-inclusive bounds the formatter buckets unresolved addresses
/// against (§4.4 step 5).
#[derive(Debug, Clone, Copy)]
pub struct FormatterBounds {
    pub code_section_bounds: Option<(u64, u64)>,
    pub all_sections_bounds: Option<(u64, u64)>,
}

impl MemoryOperand {
    pub fn has_base_or_index(&self) -> bool {
        self.base.is_some() || self.index.is_some()
    }
}

fn has_irrelevant_segment(segment: Segment) -> bool {
    matches!(segment, Segment::Es | Segment::Ss | Segment::Fs | Segment::Gs)
}

/// Bucket of an unresolved address, per §4.4 step 5.
enum Bucket {
    /// Falls inside the primary code section: `sub_<hex>`.
    Code,
    /// Falls inside some other section: `off_<hex>` or `unk_<hex>` depending
    /// on the caller.
    OtherSection,
    /// Outside every section of interest: fall through to the default
    /// numeric formatter.
    None,
}

fn bucket(bounds: &FormatterBounds, address: u64) -> Bucket {
    if let Some((b, e)) = bounds.code_section_bounds {
        if address >= b && address < e {
            return Bucket::Code;
        }
    }
    if let Some((b, e)) = bounds.all_sections_bounds {
        if address >= b && address < e {
            return Bucket::OtherSection;
        }
    }
    Bucket::None
}

/// The seven hook points preserved as named extension points. A formatter
/// is built from a set of hooks plus a single
/// `format_instruction` driver (below) that decides, per operand, which
/// hook applies.
pub trait FormatterHooks {
    /// A non-relative branch target (e.g. a far absolute call).
    fn print_address_absolute(&self, address: u64) -> String;
    /// A relative branch target (`call`/`jmp`/`jcc`), already resolved to
    /// an image-base-inclusive address.
    fn print_address_relative(&self, address: u64, is_short: bool) -> String;
    /// The displacement sub-component of a memory operand that has a base
    /// or index register (e.g. the `+0x10` in `[eax+0x10]`).
    fn print_displacement(&self, mem: &MemoryOperand) -> String;
    /// A plain (non-branch) immediate operand.
    fn print_immediate(&self, imm: &ImmediateOperand) -> String;
    /// A far `segment:offset` pointer operand.
    fn format_operand_ptr(&self, ptr: &PointerOperand) -> String;
    /// A memory operand with no base/index (a bare `[address]`) or, more
    /// generally, the whole bracketed memory operand.
    fn format_operand_mem(&self, mem: &MemoryOperand) -> String;
    /// A register operand.
    fn print_register(&self, reg: Register) -> String;
}

/// The non-symbolicating baseline: every hook renders plain hexadecimal /
/// register text. Used for comparison and as the fallback the
/// symbolicating hooks defer to when an address does not resolve.
pub struct PlainHooks;

impl FormatterHooks for PlainHooks {
    fn print_address_absolute(&self, address: u64) -> String {
        format!("0x{address:x}")
    }

    fn print_address_relative(&self, address: u64, is_short: bool) -> String {
        if is_short {
            format!("short 0x{address:x}")
        } else {
            format!("0x{address:x}")
        }
    }

    fn print_displacement(&self, mem: &MemoryOperand) -> String {
        format_signed_hex(mem.disp)
    }

    fn print_immediate(&self, imm: &ImmediateOperand) -> String {
        if imm.is_signed {
            format_signed_hex(imm.value)
        } else {
            format!("0x{:x}", imm.value)
        }
    }

    fn format_operand_ptr(&self, ptr: &PointerOperand) -> String {
        format!("0x{:x}:0x{:x}", ptr.segment, ptr.offset)
    }

    fn format_operand_mem(&self, mem: &MemoryOperand) -> String {
        format_memory_numeric(mem)
    }

    fn print_register(&self, reg: Register) -> String {
        reg.name().to_string()
    }
}

fn format_signed_hex(value: i64) -> String {
    if value < 0 {
        format!("-0x{:x}", -value)
    } else {
        format!("0x{value:x}")
    }
}

fn format_memory_numeric(mem: &MemoryOperand) -> String {
    let mut s = String::from("[");
    let mut wrote = false;
    if let Some(base) = mem.base {
        s.push_str(base.name());
        wrote = true;
    }
    if let Some(index) = mem.index {
        if wrote {
            s.push('+');
        }
        s.push_str(index.name());
        if mem.scale > 1 {
            s.push('*');
            s.push_str(&mem.scale.to_string());
        }
        wrote = true;
    }
    if mem.has_disp {
        if wrote {
            if mem.disp < 0 {
                s.push('-');
                s.push_str(&format!("0x{:x}", -mem.disp));
            } else {
                s.push('+');
                s.push_str(&format!("0x{:x}", mem.disp));
            }
        } else {
            s.push_str(&format!("0x{:x}", mem.disp));
        }
    } else if !wrote {
        s.push('0');
    }
    s.push(']');
    s
}

/// The crate's symbolicating formatter: implements §4.4's decision
/// procedure on top of [`PlainHooks`] as the fallback.
pub struct SymbolicatingHooks<'a> {
    pub resolver: &'a dyn SymbolResolver,
    pub bounds: FormatterBounds,
}

impl<'a> SymbolicatingHooks<'a> {
    pub fn new(resolver: &'a dyn SymbolResolver, bounds: FormatterBounds) -> Self {
        Self { resolver, bounds }
    }

    fn symbolicate(&self, address: u64, is_ptr_or_mem: bool) -> Option<String> {
        if let Some(name) = self.resolver.resolve(address) {
            return Some(format!("\"{name}\""));
        }
        match bucket(&self.bounds, address) {
            Bucket::Code => Some(format!("\"{}\"", crate::symbol::pseudo_symbol_name(crate::symbol::pseudo_prefix::SUB, address))),
            Bucket::OtherSection => {
                let prefix = if is_ptr_or_mem { crate::symbol::pseudo_prefix::UNK } else { crate::symbol::pseudo_prefix::OFF };
                Some(format!("\"{}\"", crate::symbol::pseudo_symbol_name(prefix, address)))
            }
            Bucket::None => None,
        }
    }
}

impl<'a> FormatterHooks for SymbolicatingHooks<'a> {
    fn print_address_absolute(&self, address: u64) -> String {
        self.symbolicate(address, false).unwrap_or_else(|| PlainHooks.print_address_absolute(address))
    }

    fn print_address_relative(&self, address: u64, is_short: bool) -> String {
        match self.symbolicate(address, false) {
            Some(name) if is_short => format!("short {name}"),
            Some(name) => name,
            None => PlainHooks.print_address_relative(address, is_short),
        }
    }

    fn print_displacement(&self, mem: &MemoryOperand) -> String {
        if mem.has_base_or_index() || mem.disp < 0 {
            return PlainHooks.print_displacement(mem);
        }
        let address = mem.disp as u64;
        match self.symbolicate(address, false) {
            Some(name) => format!("+{name}"),
            None => PlainHooks.print_displacement(mem),
        }
    }

    fn print_immediate(&self, imm: &ImmediateOperand) -> String {
        if imm.value < 0 {
            return PlainHooks.print_immediate(imm);
        }
        match self.symbolicate(imm.value as u64, false) {
            Some(name) => format!("offset {name}"),
            None => PlainHooks.print_immediate(imm),
        }
    }

    fn format_operand_ptr(&self, ptr: &PointerOperand) -> String {
        match self.symbolicate(ptr.offset as u64, true) {
            Some(name) => name,
            None => PlainHooks.format_operand_ptr(ptr),
        }
    }

    fn format_operand_mem(&self, mem: &MemoryOperand) -> String {
        if mem.has_base_or_index() || !mem.has_disp || mem.disp < 0 {
            return PlainHooks.format_operand_mem(mem);
        }
        match self.symbolicate(mem.disp as u64, true) {
            Some(name) => format!("[{name}]"),
            None => PlainHooks.format_operand_mem(mem),
        }
    }

    fn print_register(&self, reg: Register) -> String {
        match reg.x87_index() {
            Some(_) => reg.name().to_string(),
            None => PlainHooks.print_register(reg),
        }
    }
}

fn format_operand(
    op: &Operand,
    hooks: &dyn FormatterHooks,
    instruction_address: u64,
    instruction_length: u8,
    image_base: u64,
    branch_form: BranchForm,
) -> String {
    if has_irrelevant_segment(op.segment) {
        return format_operand_plain(op);
    }
    match &op.kind {
        OperandKind::Unused => String::new(),
        OperandKind::Register(reg) => hooks.print_register(*reg),
        OperandKind::Pointer(ptr) => hooks.format_operand_ptr(ptr),
        OperandKind::Memory(mem) => format_memory_operand(mem, hooks),
        OperandKind::Immediate(imm) => {
            let is_branch_target = !matches!(branch_form, BranchForm::None);
            if is_branch_target {
                let is_short = matches!(branch_form, BranchForm::ShortImmediate);
                if imm.is_relative {
                    // Effective address (§4.4 step 1): EIP-relative target,
                    // still image-base-relative, then add the image base.
                    let target_relative =
                        (instruction_address as i64 + instruction_length as i64 + imm.value) as u64;
                    let address = target_relative.wrapping_add(image_base);
                    hooks.print_address_relative(address, is_short)
                } else {
                    hooks.print_address_absolute(imm.value as u64)
                }
            } else {
                hooks.print_immediate(imm)
            }
        }
    }
}

fn format_operand_plain(op: &Operand) -> String {
    match &op.kind {
        OperandKind::Unused => String::new(),
        OperandKind::Register(reg) => PlainHooks.print_register(*reg),
        OperandKind::Pointer(ptr) => PlainHooks.format_operand_ptr(ptr),
        OperandKind::Memory(mem) => format_memory_numeric(mem),
        OperandKind::Immediate(imm) => PlainHooks.print_immediate(imm),
    }
}

fn format_memory_operand(mem: &MemoryOperand, hooks: &dyn FormatterHooks) -> String {
    if !mem.has_base_or_index() {
        return hooks.format_operand_mem(mem);
    }
    let mut s = String::from("[");
    let mut wrote = false;
    if let Some(base) = mem.base {
        s.push_str(&hooks.print_register(base));
        wrote = true;
    }
    if let Some(index) = mem.index {
        if wrote {
            s.push('+');
        }
        s.push_str(&hooks.print_register(index));
        if mem.scale > 1 {
            s.push('*');
            s.push_str(&mem.scale.to_string());
        }
        wrote = true;
    }
    if mem.has_disp {
        let disp_text = hooks.print_displacement(mem);
        if !disp_text.starts_with('-') && !disp_text.starts_with('+') {
            s.push('+');
        } else if wrote && disp_text.starts_with('-') {
            // already carries its own sign
        }
        s.push_str(&disp_text);
    }
    s.push(']');
    s
}

/// Renders a full instruction: mnemonic, a space, then operands joined by
/// `", "` (§6 text format contract).
///
/// `instruction_address` is the image-base-relative address the instruction
/// was decoded at; relative branch targets are computed from it.
pub fn format_instruction(
    instr: &DecodedInstruction,
    hooks: &dyn FormatterHooks,
    instruction_address: u64,
    image_base: u64,
) -> String {
    if instr.operand_count == 0 {
        return instr.mnemonic.to_string();
    }
    let operands: Vec<String> = instr
        .operands()
        .iter()
        .map(|op| format_operand(op, hooks, instruction_address, instr.length, image_base, instr.branch_form))
        .collect();
    format!("{} {}", instr.mnemonic, operands.join(", "))
}
