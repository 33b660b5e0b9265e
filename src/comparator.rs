//! Token-by-token, character-by-character comparison of rendered
//! instruction text (§4.7), with quote-aware handling of pseudo-symbol
//! prefixes.

use crate::function::AsmInstruction;
use crate::tokenizer::{tokenize, TokenSet, MAX_TOKENS};

/// Reasons an instruction pair was flagged, orthogonal to the per-token
/// bitmasks (§4.7, §7).
pub mod mismatch_reason {
    pub const MISSING: u16 = 1 << 0;
    pub const INVALID: u16 = 1 << 1;
    pub const JUMP_LEN: u16 = 1 << 2;
}

const PSEUDO_PREFIXES: [&str; 4] = ["unk_", "loc_", "off_", "sub_"];
const LOC_PREFIX: &str = "loc_";

/// Per-position mismatch descriptor for one instruction pair (§3).
///
/// `mismatch_bits & maybe_mismatch_bits == 0` always holds: a token
/// position is never flagged both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AsmMismatchInfo {
    pub mismatch_bits: u16,
    pub maybe_mismatch_bits: u16,
    pub mismatch_reasons: u16,
}

const _: () = assert!(std::mem::size_of::<AsmMismatchInfo>() <= 8);
const _: () = assert!(MAX_TOKENS <= 16, "token cap must fit the u16 bitmask");

impl AsmMismatchInfo {
    pub fn is_match(&self) -> bool {
        self.mismatch_bits == 0 && self.maybe_mismatch_bits == 0 && self.mismatch_reasons == 0
    }
}

enum TokenVerdict {
    Match,
    Mismatch,
    MaybeMismatch,
}

enum QuotedVerdict {
    Equal,
    Maybe,
    Mismatch,
}

fn match_prefix(chars: &[char], at: usize) -> Option<&'static str> {
    PSEUDO_PREFIXES.iter().copied().find(|p| {
        p.chars()
            .enumerate()
            .all(|(i, pc)| chars.get(at + i).map(|c| c.to_ascii_lowercase() == pc).unwrap_or(false))
    })
}

fn skip_to_close_quote(chars: &[char], idx: &mut usize) {
    while let Some(&c) = chars.get(*idx) {
        *idx += 1;
        if c == '"' {
            break;
        }
    }
}

fn compare_quoted_chars(a: &[char], ia: &mut usize, b: &[char], ib: &mut usize) -> QuotedVerdict {
    loop {
        match (a.get(*ia).copied(), b.get(*ib).copied()) {
            (Some('"'), Some('"')) => {
                *ia += 1;
                *ib += 1;
                return QuotedVerdict::Equal;
            }
            (Some(x), Some(y)) if x == y => {
                *ia += 1;
                *ib += 1;
            }
            _ => return QuotedVerdict::Mismatch,
        }
    }
}

/// Compares one quoted run (§4.7 "Quoted mode"), with `ia`/`ib` positioned
/// just past the opening `"` on entry and left just past the closing `"`
/// on a non-mismatch return.
fn compare_quoted(a: &[char], ia: &mut usize, b: &[char], ib: &mut usize) -> QuotedVerdict {
    let a_prefix = match_prefix(a, *ia);
    let b_prefix = match_prefix(b, *ib);

    match (a_prefix, b_prefix) {
        (Some(pa), Some(pb)) if pa == pb => {
            skip_to_close_quote(a, ia);
            skip_to_close_quote(b, ib);
            if pa == LOC_PREFIX { QuotedVerdict::Equal } else { QuotedVerdict::Maybe }
        }
        (Some(pa), Some(pb)) => {
            if pa == LOC_PREFIX || pb == LOC_PREFIX {
                QuotedVerdict::Mismatch
            } else {
                compare_quoted_chars(a, ia, b, ib)
            }
        }
        (Some(p), None) | (None, Some(p)) => {
            if p == LOC_PREFIX {
                QuotedVerdict::Mismatch
            } else {
                skip_to_close_quote(a, ia);
                skip_to_close_quote(b, ib);
                QuotedVerdict::Maybe
            }
        }
        (None, None) => compare_quoted_chars(a, ia, b, ib),
    }
}

fn compare_token(a: &str, b: &str) -> TokenVerdict {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut ia = 0usize;
    let mut ib = 0usize;
    let mut maybe = false;

    loop {
        match (a.get(ia).copied(), b.get(ib).copied()) {
            (None, None) => break,
            (Some('"'), Some('"')) => {
                ia += 1;
                ib += 1;
                match compare_quoted(&a, &mut ia, &b, &mut ib) {
                    QuotedVerdict::Mismatch => return TokenVerdict::Mismatch,
                    QuotedVerdict::Maybe => maybe = true,
                    QuotedVerdict::Equal => {}
                }
            }
            (Some(x), Some(y)) if x == y => {
                ia += 1;
                ib += 1;
            }
            _ => return TokenVerdict::Mismatch,
        }
    }

    if maybe { TokenVerdict::MaybeMismatch } else { TokenVerdict::Match }
}

/// Compares two pre-tokenized instruction texts (§4.7).
pub fn compare_tokens(a: &TokenSet, b: &TokenSet) -> AsmMismatchInfo {
    let mut info = AsmMismatchInfo::default();
    let len = a.len().max(b.len()).min(16);
    for i in 0..len {
        match compare_token(a.get(i), b.get(i)) {
            TokenVerdict::Match => {}
            TokenVerdict::Mismatch => info.mismatch_bits |= 1 << i,
            TokenVerdict::MaybeMismatch => info.maybe_mismatch_bits |= 1 << i,
        }
    }
    info
}

/// Convenience overload that tokenizes both sides inline.
pub fn compare_texts(a: &str, b: &str) -> AsmMismatchInfo {
    compare_tokens(&tokenize(a), &tokenize(b))
}

/// Builds the full mismatch descriptor for one instruction-pair position,
/// folding in the `Missing`/`Invalid`/`JumpLen` reason flags (§4.7, §7).
pub fn create_mismatch_info(a: Option<&AsmInstruction>, b: Option<&AsmInstruction>) -> AsmMismatchInfo {
    match (a, b) {
        (None, None) => AsmMismatchInfo { mismatch_reasons: mismatch_reason::MISSING, ..Default::default() },
        (None, Some(_)) | (Some(_), None) => AsmMismatchInfo {
            mismatch_bits: u16::MAX,
            mismatch_reasons: mismatch_reason::MISSING,
            ..Default::default()
        },
        (Some(ia), Some(ib)) => {
            let mut info = compare_texts(&ia.text, &ib.text);
            if ia.is_invalid != ib.is_invalid {
                info.mismatch_reasons |= mismatch_reason::INVALID;
            }
            if ia.is_jump && ib.is_jump && ia.jump_len != ib.jump_len {
                info.mismatch_reasons |= mismatch_reason::JUMP_LEN;
            }
            info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l3_identity() {
        let a = "mov eax, \"foo\"";
        assert!(compare_texts(a, a).is_match());
    }

    #[test]
    fn l2_symmetry() {
        let a = "jmp short \"loc_401002\"";
        let b = "jmp short \"sub_401002\"";
        let fwd = compare_texts(a, b);
        let rev = compare_texts(b, a);
        assert_eq!(fwd.mismatch_bits, rev.mismatch_bits);
        assert_eq!(fwd.maybe_mismatch_bits, rev.maybe_mismatch_bits);
    }

    #[test]
    fn s5_loc_vs_sub_is_a_mismatch_not_a_maybe() {
        let info = compare_texts("jmp short \"loc_401002\"", "jmp short \"sub_401002\"");
        assert_ne!(info.mismatch_bits, 0);
        assert_eq!(info.maybe_mismatch_bits, 0);
    }

    #[test]
    fn s6_two_unresolved_symbols_are_a_maybe_match() {
        let info = compare_texts("call \"unk_AAA\"", "call \"unk_BBB\"");
        assert_eq!(info.mismatch_bits, 0);
        assert_ne!(info.maybe_mismatch_bits, 0);
    }

    #[test]
    fn same_resolved_symbol_is_an_exact_match() {
        let info = compare_texts("call \"foo\"", "call \"foo\"");
        assert!(info.is_match());
    }

    #[test]
    fn different_resolved_symbols_mismatch() {
        let info = compare_texts("call \"foo\"", "call \"bar\"");
        assert_ne!(info.mismatch_bits, 0);
    }

    #[test]
    fn loc_equivalence_between_matching_labels_has_no_bits_set() {
        let info = compare_texts("jmp short \"loc_401000\"", "jmp short \"loc_402000\"");
        assert!(info.is_match());
    }

    #[test]
    fn mnemonic_mismatch_sets_bit_zero() {
        let info = compare_texts("add eax, ebx", "sub eax, ebx");
        assert_eq!(info.mismatch_bits, 1);
    }

    fn instr(text: &str) -> AsmInstruction {
        AsmInstruction {
            address: 0x401000,
            bytes: [0; crate::decoder::MAX_INSTRUCTION_LENGTH],
            byte_len: 1,
            text: text.to_string(),
            is_invalid: false,
            is_jump: false,
            jump_len: 0,
            line_number: 0,
        }
    }

    #[test]
    fn missing_one_side_sets_missing_reason_and_full_mismatch() {
        let a = instr("nop");
        let info = create_mismatch_info(Some(&a), None);
        assert_eq!(info.mismatch_bits, u16::MAX);
        assert_eq!(info.mismatch_reasons & mismatch_reason::MISSING, mismatch_reason::MISSING);
    }

    #[test]
    fn differing_jump_lengths_set_the_jump_len_reason() {
        let mut a = instr("jmp short \"loc_401002\"");
        a.is_jump = true;
        a.jump_len = 2;
        let mut b = instr("jmp short \"loc_401002\"");
        b.is_jump = true;
        b.jump_len = 4;
        let info = create_mismatch_info(Some(&a), Some(&b));
        assert_eq!(info.mismatch_reasons & mismatch_reason::JUMP_LEN, mismatch_reason::JUMP_LEN);
    }
}
