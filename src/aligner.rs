//! Bounded bidirectional lookahead alignment of two instruction streams
//! (§4.8).
//!
//! The main sweep pairs positions greedily; when a pair mismatches, a
//! zigzag lookahead probes increasing offsets on alternating sides against
//! the other side's unmoved current instruction, trying to find a
//! resynchronization point before giving up and emitting the mismatch as
//! is.

use crate::comparator::{create_mismatch_info, mismatch_reason, AsmMismatchInfo};
use crate::function::{AsmInstruction, AsmInstructionVariant, AsmLabel, Function};
use crate::result::{ComparisonRecord, ComparisonResult, InstructionPair, LabelPair};

/// Default bound on how far the aligner looks ahead on either side before
/// giving up on resynchronizing (§4.8).
pub const DEFAULT_LOOKAHEAD_LIMIT: usize = 20;

fn get_instruction(s: &[AsmInstructionVariant], idx: usize) -> Option<&AsmInstruction> {
    match s.get(idx) {
        Some(AsmInstructionVariant::Instruction(i)) => Some(i),
        _ => None,
    }
}

fn get_label(s: &[AsmInstructionVariant], idx: usize) -> Option<&AsmLabel> {
    match s.get(idx) {
        Some(AsmInstructionVariant::Label(l)) => Some(l),
        _ => None,
    }
}

enum RecordKind {
    Match,
    Maybe,
    Mismatch,
}

fn classify(info: &AsmMismatchInfo) -> RecordKind {
    if info.mismatch_bits != 0 || info.mismatch_reasons != 0 {
        RecordKind::Mismatch
    } else if info.maybe_mismatch_bits != 0 {
        RecordKind::Maybe
    } else {
        RecordKind::Match
    }
}

fn record_pair<'f>(
    result: &mut ComparisonResult<'f>,
    side0: Option<&'f AsmInstruction>,
    side1: Option<&'f AsmInstruction>,
    info: AsmMismatchInfo,
) {
    match classify(&info) {
        RecordKind::Match => result.match_count += 1,
        RecordKind::Maybe => result.maybe_match_count += 1,
        RecordKind::Mismatch => result.mismatch_count += 1,
    }
    result.records.push(ComparisonRecord::Instruction(InstructionPair { side0, side1, info }));
}

/// Outcome of a successful lookahead resync: which side advanced and by
/// how many elements, plus the comparison info for the landed pair (always
/// a full match).
struct LookaheadOutcome {
    picked_side0: bool,
    k: usize,
    info: AsmMismatchInfo,
}

/// Probes increasing offsets on alternating sides (§4.8 "Lookahead
/// protocol") looking for a position where the probed side's instruction
/// matches the other side's current (unmoved) instruction.
fn try_lookahead(
    s0: &[AsmInstructionVariant],
    i0: usize,
    s1: &[AsmInstructionVariant],
    i1: usize,
    lookahead_limit: usize,
) -> Option<LookaheadOutcome> {
    let mut k0 = 1usize;
    let mut k1 = 0usize;
    let mut budget0 = lookahead_limit;
    let mut budget1 = lookahead_limit;

    loop {
        if k0 >= budget0 && k1 >= budget1 {
            return None;
        }

        let pick0 = if k0 >= budget0 {
            false
        } else if k1 >= budget1 {
            true
        } else {
            k0 > k1 // tie (k0 == k1) favors side 1
        };

        if pick0 {
            let mut idx = i0 + k0;
            while let Some(AsmInstructionVariant::Label(_)) = s0.get(idx) {
                k0 += 1;
                budget0 += 1;
                idx = i0 + k0;
            }
            let Some(probe) = get_instruction(s0, idx) else {
                return None; // end of stream while probing
            };
            let base = get_instruction(s1, i1);
            let info = create_mismatch_info(Some(probe), base);
            if info.mismatch_bits == 0 && info.maybe_mismatch_bits == 0 && info.mismatch_reasons == 0 {
                return Some(LookaheadOutcome { picked_side0: true, k: k0, info });
            }
            k1 += 1;
        } else {
            let mut idx = i1 + k1;
            while let Some(AsmInstructionVariant::Label(_)) = s1.get(idx) {
                k1 += 1;
                budget1 += 1;
                idx = i1 + k1;
            }
            let Some(probe) = get_instruction(s1, idx) else {
                return None;
            };
            let base = get_instruction(s0, i0);
            let info = create_mismatch_info(base, Some(probe));
            if info.mismatch_bits == 0 && info.maybe_mismatch_bits == 0 && info.mismatch_reasons == 0 {
                return Some(LookaheadOutcome { picked_side0: false, k: k1, info });
            }
            k0 += 1;
        }
    }
}

/// Commits a successful lookahead: the `k` skipped elements on the picked
/// side become unilateral records, then the landed match is emitted.
/// Returns the new `(i0, i1)` cursors.
fn commit_lookahead<'f>(
    result: &mut ComparisonResult<'f>,
    s0: &'f [AsmInstructionVariant],
    s1: &'f [AsmInstructionVariant],
    i0: usize,
    i1: usize,
    outcome: LookaheadOutcome,
) -> (usize, usize) {
    let (skipped, base_idx) = if outcome.picked_side0 { (s0, i0) } else { (s1, i1) };

    for variant in &skipped[base_idx..base_idx + outcome.k] {
        match variant {
            AsmInstructionVariant::Label(label) => {
                let pair = if outcome.picked_side0 {
                    LabelPair { side0: Some(label), side1: None }
                } else {
                    LabelPair { side0: None, side1: Some(label) }
                };
                result.records.push(ComparisonRecord::Label(pair));
                result.label_count += 1;
            }
            AsmInstructionVariant::Instruction(instr) => {
                let info = AsmMismatchInfo { mismatch_bits: u16::MAX, ..Default::default() };
                let pair = if outcome.picked_side0 {
                    InstructionPair { side0: Some(instr), side1: None, info }
                } else {
                    InstructionPair { side0: None, side1: Some(instr), info }
                };
                result.records.push(ComparisonRecord::Instruction(pair));
                result.mismatch_count += 1;
            }
            AsmInstructionVariant::Null => {}
        }
    }

    let landed0 = get_instruction(s0, if outcome.picked_side0 { i0 + outcome.k } else { i0 });
    let landed1 = get_instruction(s1, if outcome.picked_side0 { i1 } else { i1 + outcome.k });
    result.match_count += 1;
    result.records.push(ComparisonRecord::Instruction(InstructionPair { side0: landed0, side1: landed1, info: outcome.info }));

    if outcome.picked_side0 {
        (i0 + outcome.k + 1, i1 + 1)
    } else {
        (i0 + 1, i1 + outcome.k + 1)
    }
}

/// Aligns two disassembled functions into a [`ComparisonResult`] (§4.8).
pub fn align<'f>(function_a: &'f Function, function_b: &'f Function, lookahead_limit: usize) -> ComparisonResult<'f> {
    let s0 = function_a.instructions();
    let s1 = function_b.instructions();

    let reserve = ((s0.len().max(s1.len()) as f64) * 1.2) as usize + 1;
    let mut result = ComparisonResult { records: Vec::with_capacity(reserve), ..Default::default() };

    let mut i0 = 0usize;
    let mut i1 = 0usize;

    while i0 < s0.len() || i1 < s1.len() {
        let label0 = get_label(s0, i0);
        let label1 = get_label(s1, i1);
        if label0.is_some() || label1.is_some() {
            result.records.push(ComparisonRecord::Label(LabelPair { side0: label0, side1: label1 }));
            result.label_count += 1;
            if label0.is_some() {
                i0 += 1;
            }
            if label1.is_some() {
                i1 += 1;
            }
            continue;
        }

        let instr0 = get_instruction(s0, i0);
        let instr1 = get_instruction(s1, i1);
        let info = create_mismatch_info(instr0, instr1);
        let is_missing = info.mismatch_reasons & mismatch_reason::MISSING != 0;

        if !info.is_match() && !is_missing {
            if let Some(outcome) = try_lookahead(s0, i0, s1, i1, lookahead_limit) {
                let (new_i0, new_i1) = commit_lookahead(&mut result, s0, s1, i0, i1, outcome);
                i0 = new_i0;
                i1 = new_i1;
                continue;
            }
        }

        record_pair(&mut result, instr0, instr1, info);
        if instr0.is_some() {
            i0 += 1;
        }
        if instr1.is_some() {
            i1 += 1;
        }
    }

    result
}
