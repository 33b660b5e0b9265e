//! A self-contained IA-32 instruction decoder (§4.3).
//!
//! `decode` is a pure function: given a byte slice and the runtime address it
//! starts at, it returns a [`DecodedInstruction`] or a [`DecodeError`]. It
//! never consults the symbol store — symbolication is entirely the
//! formatter's job (§4.4).
//!
//! Coverage is the common one- and two-byte opcode space produced by a
//! compiler targeting IA-32 (data movement, arithmetic/logic, shifts,
//! control flow, `nop`/`int3`/`leave`/`hlt`). This is a deliberate subset,
//! not full ISA coverage — bytes outside it decode as
//! [`DecodeError::UnsupportedOpcode`].

use crate::error::DecodeError;

/// Fixed upper bound on raw instruction length this decoder ever reports.
pub const MAX_INSTRUCTION_LENGTH: usize = 15;

/// The only mode this decoder supports (§4.3: "fixed to 32-bit legacy").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineMode {
    #[default]
    Legacy32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Eax, Ecx, Edx, Ebx, Esp, Ebp, Esi, Edi,
    Ax, Cx, Dx, Bx, Sp, Bp, Si, Di,
    Al, Cl, Dl, Bl, Ah, Ch, Dh, Bh,
    Es, Cs, Ss, Ds, Fs, Gs,
    St0, St1, St2, St3, St4, St5, St6, St7,
}

impl Register {
    pub fn is_x87_stack(self) -> bool {
        matches!(
            self,
            Register::St0 | Register::St1 | Register::St2 | Register::St3
                | Register::St4 | Register::St5 | Register::St6 | Register::St7
        )
    }

    /// Index `0..=7` for an x87 stack register, used to render `st(N)`.
    pub fn x87_index(self) -> Option<u8> {
        match self {
            Register::St0 => Some(0), Register::St1 => Some(1),
            Register::St2 => Some(2), Register::St3 => Some(3),
            Register::St4 => Some(4), Register::St5 => Some(5),
            Register::St6 => Some(6), Register::St7 => Some(7),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        use Register::*;
        match self {
            Eax => "eax", Ecx => "ecx", Edx => "edx", Ebx => "ebx",
            Esp => "esp", Ebp => "ebp", Esi => "esi", Edi => "edi",
            Ax => "ax", Cx => "cx", Dx => "dx", Bx => "bx",
            Sp => "sp", Bp => "bp", Si => "si", Di => "di",
            Al => "al", Cl => "cl", Dl => "dl", Bl => "bl",
            Ah => "ah", Ch => "ch", Dh => "dh", Bh => "bh",
            Es => "es", Cs => "cs", Ss => "ss", Ds => "ds", Fs => "fs", Gs => "gs",
            St0 => "st(0)", St1 => "st(1)", St2 => "st(2)", St3 => "st(3)",
            St4 => "st(4)", St5 => "st(5)", St6 => "st(6)", St7 => "st(7)",
        }
    }

    fn gp32(index: u8) -> Self {
        [Register::Eax, Register::Ecx, Register::Edx, Register::Ebx,
         Register::Esp, Register::Ebp, Register::Esi, Register::Edi][index as usize & 7]
    }

    fn gp16(index: u8) -> Self {
        [Register::Ax, Register::Cx, Register::Dx, Register::Bx,
         Register::Sp, Register::Bp, Register::Si, Register::Di][index as usize & 7]
    }

    fn gp8(index: u8) -> Self {
        [Register::Al, Register::Cl, Register::Dl, Register::Bl,
         Register::Ah, Register::Ch, Register::Dh, Register::Bh][index as usize & 7]
    }
}

/// A segment-override prefix, or the absence of one (§4.4 step 2 checks
/// this field against `{Es, Ss, Fs, Gs}` on every operand of the
/// instruction it decorates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Segment {
    #[default]
    None,
    Es,
    Cs,
    Ss,
    Ds,
    Fs,
    Gs,
}

/// An operand size, derived from the prefix bytes and the opcode's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Dword,
}

/// A decoded memory reference: `[base + index*scale + disp]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryOperand {
    pub base: Option<Register>,
    pub index: Option<Register>,
    pub scale: u8,
    pub disp: i64,
    pub has_disp: bool,
    pub width: Width,
}

/// A decoded immediate, or a relative branch displacement (§4.4: "operand
/// marked relative").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmediateOperand {
    pub value: i64,
    pub is_relative: bool,
    pub is_signed: bool,
}

/// A raw `segment:offset` far pointer (`ptr16:32`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerOperand {
    pub segment: u16,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Unused,
    Register(Register),
    Memory(MemoryOperand),
    Pointer(PointerOperand),
    Immediate(ImmediateOperand),
}

impl Default for OperandKind {
    fn default() -> Self {
        OperandKind::Unused
    }
}

/// One operand of a [`DecodedInstruction`], carrying the segment override
/// active for the whole instruction (§4.4 applies the segment check
/// uniformly across operand kinds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Operand {
    pub kind: OperandKind,
    pub segment: Segment,
}

impl Operand {
    fn unused() -> Self {
        Self::default()
    }
}

/// The shape of a branch target, used by the formatter to decide between
/// `short "name"` and the bare symbol, and by the function disassembler to
/// decide whether a relative target's distance fits the short encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchForm {
    None,
    ShortImmediate,
    LongImmediate,
    Indirect,
    FarPointer,
}

/// Whether a decoded instruction is a `call`, an unconditional `jmp`, a
/// conditional `jcc`/`loop`, or none of those (§4.5 needs this to choose the
/// pseudo-symbol prefix and to populate `is_jump`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlowKind {
    None,
    Call,
    UnconditionalJump,
    ConditionalJump,
}

/// Machine-decoded form of one instruction (§3 "Decoded instruction (raw)").
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedInstruction {
    pub mnemonic: &'static str,
    pub length: u8,
    pub operands: [Operand; 3],
    pub operand_count: u8,
    pub branch_form: BranchForm,
    pub control_flow: ControlFlowKind,
}

impl DecodedInstruction {
    pub fn operands(&self) -> &[Operand] {
        &self.operands[..self.operand_count as usize]
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Result<u8, DecodeError> {
        self.bytes.get(self.pos).copied().ok_or(DecodeError::NotEnoughBytes)
    }

    fn take_u8(&mut self) -> Result<u8, DecodeError> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn take_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.take_u8()? as i8)
    }

    fn take_u16(&mut self) -> Result<u16, DecodeError> {
        if self.pos + 2 > self.bytes.len() {
            return Err(DecodeError::NotEnoughBytes);
        }
        let v = u16::from_le_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn take_u32(&mut self) -> Result<u32, DecodeError> {
        if self.pos + 4 > self.bytes.len() {
            return Err(DecodeError::NotEnoughBytes);
        }
        let s = &self.bytes[self.pos..self.pos + 4];
        let v = u32::from_le_bytes([s[0], s[1], s[2], s[3]]);
        self.pos += 4;
        Ok(v)
    }

    fn take_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(self.take_u32()? as i32)
    }
}

struct ModRm {
    md: u8,
    reg: u8,
    rm: u8,
}

fn decode_modrm(cur: &mut Cursor) -> Result<ModRm, DecodeError> {
    let byte = cur.take_u8()?;
    Ok(ModRm { md: byte >> 6, reg: (byte >> 3) & 7, rm: byte & 7 })
}

/// Decodes the `r/m` field of a ModR/M byte into either a register or a
/// memory operand, consuming SIB and displacement bytes as needed.
fn decode_rm(cur: &mut Cursor, modrm: &ModRm, width: Width) -> Result<OperandKind, DecodeError> {
    if modrm.md == 0b11 {
        let reg = match width {
            Width::Byte => Register::gp8(modrm.rm),
            Width::Word => Register::gp16(modrm.rm),
            Width::Dword => Register::gp32(modrm.rm),
        };
        return Ok(OperandKind::Register(reg));
    }

    let (base, index, scale) = if modrm.rm == 0b100 {
        let sib = cur.take_u8()?;
        let scale = 1u8 << (sib >> 6);
        let index_bits = (sib >> 3) & 7;
        let base_bits = sib & 7;
        let index = if index_bits == 0b100 { None } else { Some(Register::gp32(index_bits)) };
        let base = if base_bits == 0b101 && modrm.md == 0b00 {
            None
        } else {
            Some(Register::gp32(base_bits))
        };
        (base, index, scale)
    } else if modrm.rm == 0b101 && modrm.md == 0b00 {
        (None, None, 1)
    } else {
        (Some(Register::gp32(modrm.rm)), None, 1)
    };

    let (disp, has_disp) = match modrm.md {
        0b00 => {
            if modrm.rm == 0b101 {
                (cur.take_i32()? as i64, true)
            } else {
                (0, false)
            }
        }
        0b01 => (cur.take_i8()? as i64, true),
        0b10 => (cur.take_i32()? as i64, true),
        _ => unreachable!("md == 0b11 handled above"),
    };

    Ok(OperandKind::Memory(MemoryOperand { base, index, scale, disp, has_disp, width }))
}

fn reg_operand(modrm: &ModRm, width: Width) -> OperandKind {
    let reg = match width {
        Width::Byte => Register::gp8(modrm.reg),
        Width::Word => Register::gp16(modrm.reg),
        Width::Dword => Register::gp32(modrm.reg),
    };
    OperandKind::Register(reg)
}

const ARITH_MNEMONICS: [&str; 8] = ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"];
const SHIFT_MNEMONICS: [&str; 8] = ["rol", "ror", "rcl", "rcr", "shl", "shr", "shl", "sar"];
const JCC_MNEMONICS: [&str; 16] = [
    "jo", "jno", "jb", "jae", "jz", "jnz", "jbe", "ja",
    "js", "jns", "jp", "jnp", "jl", "jge", "jle", "jg",
];

/// Decodes exactly one instruction starting at `bytes[0]`.
///
/// `runtime_address` is not used for decoding (the decoder is a pure
/// function of the bytes, §4.3) but is accepted for symmetry with the
/// higher-level `Function` API and future RIP-relative-style extensions.
pub fn decode(
    _mode: MachineMode,
    _runtime_address: u64,
    bytes: &[u8],
) -> Result<DecodedInstruction, DecodeError> {
    let mut cur = Cursor::new(bytes);
    let mut segment = Segment::None;
    let mut operand_size_override = false;

    // Prefix bytes: segment overrides and the operand-size override.
    loop {
        match cur.peek()? {
            0x26 => { segment = Segment::Es; cur.pos += 1; }
            0x2E => { segment = Segment::Cs; cur.pos += 1; }
            0x36 => { segment = Segment::Ss; cur.pos += 1; }
            0x3E => { segment = Segment::Ds; cur.pos += 1; }
            0x64 => { segment = Segment::Fs; cur.pos += 1; }
            0x65 => { segment = Segment::Gs; cur.pos += 1; }
            0x66 => { operand_size_override = true; cur.pos += 1; }
            0xF0 | 0xF2 | 0xF3 => { cur.pos += 1; } // lock / rep prefixes: consumed, not modeled
            _ => break,
        }
    }

    let word = |operand_size_override: bool| if operand_size_override { Width::Word } else { Width::Dword };

    let opcode = cur.take_u8()?;
    let mut ops = [Operand::unused(); 3];
    let mut n = 0usize;
    let mut push_op = |kind: OperandKind| {
        ops[n] = Operand { kind, segment };
        n += 1;
    };

    let mut mnemonic: &'static str = "";
    let mut branch_form = BranchForm::None;
    let mut control_flow = ControlFlowKind::None;

    match opcode {
        // The two-byte opcode escape; prefix bytes sharing this numeric range
        // (0x26/0x2E/0x36/0x3E/0x66) are stripped by the prefix loop above and
        // never reach here as an opcode.
        0x0F => return decode_0f(&mut cur, segment),

        // add/or/adc/sbb/and/sub/xor/cmp, forms Eb,Gb / Ev,Gv / Gb,Eb / Gv,Ev / AL,Ib / eAX,Iz
        0x00..=0x3D => {
            let group = (opcode >> 3) & 0x7;
            let form = opcode & 0x7;
            mnemonic = ARITH_MNEMONICS[group as usize];
            match form {
                0x0 => { let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, Width::Byte)?; push_op(rm); push_op(reg_operand(&m, Width::Byte)); }
                0x1 => { let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, word(operand_size_override))?; push_op(rm); push_op(reg_operand(&m, word(operand_size_override))); }
                0x2 => { let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, Width::Byte)?; push_op(reg_operand(&m, Width::Byte)); push_op(rm); }
                0x3 => { let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, word(operand_size_override))?; push_op(reg_operand(&m, word(operand_size_override))); push_op(rm); }
                0x4 => { push_op(OperandKind::Register(Register::Al)); let imm = cur.take_i8()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: true })); }
                0x5 => {
                    push_op(OperandKind::Register(Register::Eax));
                    let imm = if operand_size_override {
                        cur.take_u16()? as i16 as i64
                    } else {
                        cur.take_i32()? as i64
                    };
                    push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: true }));
                }
                _ => return Err(DecodeError::UnsupportedOpcode(opcode)),
            }
        }
        0x40..=0x47 => { mnemonic = "inc"; push_op(OperandKind::Register(Register::gp32(opcode - 0x40))); }
        0x48..=0x4F => { mnemonic = "dec"; push_op(OperandKind::Register(Register::gp32(opcode - 0x48))); }
        0x50..=0x57 => { mnemonic = "push"; push_op(OperandKind::Register(Register::gp32(opcode - 0x50))); }
        0x58..=0x5F => { mnemonic = "pop"; push_op(OperandKind::Register(Register::gp32(opcode - 0x58))); }
        0x68 => {
            mnemonic = "push";
            let imm = cur.take_i32()? as i64;
            push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: true }));
        }
        0x6A => {
            mnemonic = "push";
            let imm = cur.take_i8()? as i64;
            push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: true }));
        }
        0x70..=0x7F => {
            mnemonic = JCC_MNEMONICS[(opcode - 0x70) as usize];
            let rel = cur.take_i8()? as i64;
            push_op(OperandKind::Immediate(ImmediateOperand { value: rel, is_relative: true, is_signed: true }));
            branch_form = BranchForm::ShortImmediate;
            control_flow = ControlFlowKind::ConditionalJump;
        }
        0x80 | 0x81 | 0x83 => {
            let m = decode_modrm(&mut cur)?;
            mnemonic = ARITH_MNEMONICS[m.reg as usize];
            let width = if opcode == 0x80 { Width::Byte } else { word(operand_size_override) };
            let rm = decode_rm(&mut cur, &m, width)?;
            push_op(rm);
            let imm = match opcode {
                0x80 => cur.take_i8()? as i64,
                0x81 => if operand_size_override { cur.take_u16()? as i16 as i64 } else { cur.take_i32()? as i64 },
                0x83 => cur.take_i8()? as i64,
                _ => unreachable!(),
            };
            push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: true }));
        }
        0x84 => { mnemonic = "test"; let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, Width::Byte)?; push_op(rm); push_op(reg_operand(&m, Width::Byte)); }
        0x85 => { mnemonic = "test"; let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, word(operand_size_override))?; push_op(rm); push_op(reg_operand(&m, word(operand_size_override))); }
        0x86 => { mnemonic = "xchg"; let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, Width::Byte)?; push_op(rm); push_op(reg_operand(&m, Width::Byte)); }
        0x87 => { mnemonic = "xchg"; let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, word(operand_size_override))?; push_op(rm); push_op(reg_operand(&m, word(operand_size_override))); }
        0x88 => { mnemonic = "mov"; let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, Width::Byte)?; push_op(rm); push_op(reg_operand(&m, Width::Byte)); }
        0x89 => { mnemonic = "mov"; let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, word(operand_size_override))?; push_op(rm); push_op(reg_operand(&m, word(operand_size_override))); }
        0x8A => { mnemonic = "mov"; let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, Width::Byte)?; push_op(reg_operand(&m, Width::Byte)); push_op(rm); }
        0x8B => { mnemonic = "mov"; let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, word(operand_size_override))?; push_op(reg_operand(&m, word(operand_size_override))); push_op(rm); }
        0x8D => { mnemonic = "lea"; let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, Width::Dword)?; push_op(reg_operand(&m, Width::Dword)); push_op(rm); }
        0x90 => { mnemonic = "nop"; }
        0x91..=0x97 => { mnemonic = "xchg"; push_op(OperandKind::Register(Register::Eax)); push_op(OperandKind::Register(Register::gp32(opcode - 0x90))); }
        0x98 => { mnemonic = if operand_size_override { "cbw" } else { "cwde" }; }
        0x99 => { mnemonic = "cdq"; }
        0x9A => {
            mnemonic = "call";
            let offset = cur.take_u32()?;
            let seg = cur.take_u16()?;
            push_op(OperandKind::Pointer(PointerOperand { segment: seg, offset }));
            branch_form = BranchForm::FarPointer;
            control_flow = ControlFlowKind::Call;
        }
        0x9C => { mnemonic = "pushfd"; }
        0x9D => { mnemonic = "popfd"; }
        0xA8 => { mnemonic = "test"; push_op(OperandKind::Register(Register::Al)); let imm = cur.take_i8()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: true })); }
        0xA9 => { mnemonic = "test"; push_op(OperandKind::Register(Register::Eax)); let imm = cur.take_i32()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: true })); }
        0xB0..=0xB7 => { mnemonic = "mov"; push_op(OperandKind::Register(Register::gp8(opcode - 0xB0))); let imm = cur.take_u8()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: false })); }
        0xB8..=0xBF => { mnemonic = "mov"; push_op(OperandKind::Register(Register::gp32(opcode - 0xB8))); let imm = cur.take_u32()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: false })); }
        0xC0 | 0xC1 => {
            let m = decode_modrm(&mut cur)?;
            mnemonic = SHIFT_MNEMONICS[m.reg as usize];
            let width = if opcode == 0xC0 { Width::Byte } else { word(operand_size_override) };
            let rm = decode_rm(&mut cur, &m, width)?;
            push_op(rm);
            let imm = cur.take_u8()? as i64;
            push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: false }));
        }
        0xC2 => { mnemonic = "ret"; let imm = cur.take_u16()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: false })); }
        0xC3 => { mnemonic = "ret"; }
        0xC6 => { mnemonic = "mov"; let m = decode_modrm(&mut cur)?; let rm = decode_rm(&mut cur, &m, Width::Byte)?; push_op(rm); let imm = cur.take_u8()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: false })); }
        0xC7 => {
            mnemonic = "mov";
            let m = decode_modrm(&mut cur)?;
            let width = word(operand_size_override);
            let rm = decode_rm(&mut cur, &m, width)?;
            push_op(rm);
            let imm = if operand_size_override { cur.take_u16()? as i64 } else { cur.take_i32()? as i64 };
            push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: true }));
        }
        0xC9 => { mnemonic = "leave"; }
        0xCC => { mnemonic = "int3"; }
        0xCD => { mnemonic = "int"; let imm = cur.take_u8()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: false })); }
        0xD0 => { let m = decode_modrm(&mut cur)?; mnemonic = SHIFT_MNEMONICS[m.reg as usize]; let rm = decode_rm(&mut cur, &m, Width::Byte)?; push_op(rm); push_op(OperandKind::Immediate(ImmediateOperand { value: 1, is_relative: false, is_signed: false })); }
        0xD1 => { let m = decode_modrm(&mut cur)?; mnemonic = SHIFT_MNEMONICS[m.reg as usize]; let rm = decode_rm(&mut cur, &m, word(operand_size_override))?; push_op(rm); push_op(OperandKind::Immediate(ImmediateOperand { value: 1, is_relative: false, is_signed: false })); }
        0xD2 => { let m = decode_modrm(&mut cur)?; mnemonic = SHIFT_MNEMONICS[m.reg as usize]; let rm = decode_rm(&mut cur, &m, Width::Byte)?; push_op(rm); push_op(OperandKind::Register(Register::Cl)); }
        0xD3 => { let m = decode_modrm(&mut cur)?; mnemonic = SHIFT_MNEMONICS[m.reg as usize]; let rm = decode_rm(&mut cur, &m, word(operand_size_override))?; push_op(rm); push_op(OperandKind::Register(Register::Cl)); }
        0xE2 => { mnemonic = "loop"; let rel = cur.take_i8()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: rel, is_relative: true, is_signed: true })); branch_form = BranchForm::ShortImmediate; control_flow = ControlFlowKind::ConditionalJump; }
        0xE1 => { mnemonic = "loope"; let rel = cur.take_i8()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: rel, is_relative: true, is_signed: true })); branch_form = BranchForm::ShortImmediate; control_flow = ControlFlowKind::ConditionalJump; }
        0xE0 => { mnemonic = "loopne"; let rel = cur.take_i8()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: rel, is_relative: true, is_signed: true })); branch_form = BranchForm::ShortImmediate; control_flow = ControlFlowKind::ConditionalJump; }
        0xE3 => { mnemonic = "jcxz"; let rel = cur.take_i8()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: rel, is_relative: true, is_signed: true })); branch_form = BranchForm::ShortImmediate; control_flow = ControlFlowKind::ConditionalJump; }
        0xE8 => { mnemonic = "call"; let rel = cur.take_i32()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: rel, is_relative: true, is_signed: true })); branch_form = BranchForm::LongImmediate; control_flow = ControlFlowKind::Call; }
        0xE9 => { mnemonic = "jmp"; let rel = cur.take_i32()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: rel, is_relative: true, is_signed: true })); branch_form = BranchForm::LongImmediate; control_flow = ControlFlowKind::UnconditionalJump; }
        0xEA => {
            mnemonic = "jmp";
            let offset = cur.take_u32()?;
            let seg = cur.take_u16()?;
            push_op(OperandKind::Pointer(PointerOperand { segment: seg, offset }));
            branch_form = BranchForm::FarPointer;
            control_flow = ControlFlowKind::UnconditionalJump;
        }
        0xEB => { mnemonic = "jmp"; let rel = cur.take_i8()? as i64; push_op(OperandKind::Immediate(ImmediateOperand { value: rel, is_relative: true, is_signed: true })); branch_form = BranchForm::ShortImmediate; control_flow = ControlFlowKind::UnconditionalJump; }
        0xF4 => { mnemonic = "hlt"; }
        0xF6 | 0xF7 => {
            let m = decode_modrm(&mut cur)?;
            let width = if opcode == 0xF6 { Width::Byte } else { word(operand_size_override) };
            match m.reg {
                0 | 1 => {
                    mnemonic = "test";
                    let rm = decode_rm(&mut cur, &m, width)?;
                    push_op(rm);
                    let imm = if width == Width::Byte { cur.take_i8()? as i64 } else { cur.take_i32()? as i64 };
                    push_op(OperandKind::Immediate(ImmediateOperand { value: imm, is_relative: false, is_signed: true }));
                }
                2 => { mnemonic = "not"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); }
                3 => { mnemonic = "neg"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); }
                4 => { mnemonic = "mul"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); }
                5 => { mnemonic = "imul"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); }
                6 => { mnemonic = "div"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); }
                7 => { mnemonic = "idiv"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); }
                _ => unreachable!(),
            }
        }
        0xFE => {
            let m = decode_modrm(&mut cur)?;
            mnemonic = if m.reg == 0 { "inc" } else { "dec" };
            let rm = decode_rm(&mut cur, &m, Width::Byte)?;
            push_op(rm);
        }
        0xFF => {
            let m = decode_modrm(&mut cur)?;
            let width = word(operand_size_override);
            match m.reg {
                0 => { mnemonic = "inc"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); }
                1 => { mnemonic = "dec"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); }
                2 => { mnemonic = "call"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); branch_form = BranchForm::Indirect; control_flow = ControlFlowKind::Call; }
                4 => { mnemonic = "jmp"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); branch_form = BranchForm::Indirect; control_flow = ControlFlowKind::UnconditionalJump; }
                6 => { mnemonic = "push"; let rm = decode_rm(&mut cur, &m, width)?; push_op(rm); }
                _ => return Err(DecodeError::UnsupportedOpcode(opcode)),
            }
        }
        _ => return Err(DecodeError::UnsupportedOpcode(opcode)),
    }

    if cur.pos > MAX_INSTRUCTION_LENGTH {
        return Err(DecodeError::InvalidModRm);
    }

    Ok(DecodedInstruction {
        mnemonic,
        length: cur.pos as u8,
        operands: ops,
        operand_count: n as u8,
        branch_form,
        control_flow,
    })
}

/// Decodes the two-byte (`0F`) opcode map: `jcc rel32`, `movzx`, `movsx`,
/// `imul Gv,Ev`.
fn decode_0f(cur: &mut Cursor, segment: Segment) -> Result<DecodedInstruction, DecodeError> {
    let opcode = cur.take_u8()?;
    let mut ops = [Operand::unused(); 3];
    let mut n = 0usize;
    let mut push_op = |kind: OperandKind| {
        ops[n] = Operand { kind, segment };
        n += 1;
    };
    let mut mnemonic: &'static str = "";
    let mut branch_form = BranchForm::None;
    let mut control_flow = ControlFlowKind::None;

    match opcode {
        0x80..=0x8F => {
            mnemonic = JCC_MNEMONICS[(opcode - 0x80) as usize];
            let rel = cur.take_i32()? as i64;
            push_op(OperandKind::Immediate(ImmediateOperand { value: rel, is_relative: true, is_signed: true }));
            branch_form = BranchForm::LongImmediate;
            control_flow = ControlFlowKind::ConditionalJump;
        }
        0xAF => {
            mnemonic = "imul";
            let m = decode_modrm(cur)?;
            let rm = decode_rm(cur, &m, Width::Dword)?;
            push_op(reg_operand(&m, Width::Dword));
            push_op(rm);
        }
        0xB6 => { mnemonic = "movzx"; let m = decode_modrm(cur)?; let rm = decode_rm(cur, &m, Width::Byte)?; push_op(reg_operand(&m, Width::Dword)); push_op(rm); }
        0xB7 => { mnemonic = "movzx"; let m = decode_modrm(cur)?; let rm = decode_rm(cur, &m, Width::Word)?; push_op(reg_operand(&m, Width::Dword)); push_op(rm); }
        0xBE => { mnemonic = "movsx"; let m = decode_modrm(cur)?; let rm = decode_rm(cur, &m, Width::Byte)?; push_op(reg_operand(&m, Width::Dword)); push_op(rm); }
        0xBF => { mnemonic = "movsx"; let m = decode_modrm(cur)?; let rm = decode_rm(cur, &m, Width::Word)?; push_op(reg_operand(&m, Width::Dword)); push_op(rm); }
        _ => return Err(DecodeError::UnsupportedOpcode(opcode)),
    }

    if cur.pos > MAX_INSTRUCTION_LENGTH {
        return Err(DecodeError::InvalidModRm);
    }

    Ok(DecodedInstruction {
        mnemonic,
        length: cur.pos as u8,
        operands: ops,
        operand_count: n as u8,
        branch_form,
        control_flow,
    })
}
