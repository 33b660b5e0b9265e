//! Property-based tests for the text comparator and similarity strictness.
//!
//! These tests verify the identity, symmetry, and strictness-monotonicity
//! laws the comparator and comparison result are expected to hold for any
//! input, not just the hand-picked scenarios covered by unit tests.

use proptest::prelude::*;
use unasmdiff::{compare_texts, ComparisonResult, Strictness};

fn mnemonic() -> impl Strategy<Value = String> {
    "[a-z]{2,6}"
}

fn operand() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9]{1,8}",
        "\"(loc|sub|off|unk)_[0-9a-f]{1,8}\"",
        "0x[0-9a-f]{1,4}",
    ]
}

fn instruction_text() -> impl Strategy<Value = String> {
    (mnemonic(), proptest::collection::vec(operand(), 0..3))
        .prop_map(|(mn, ops)| if ops.is_empty() { mn } else { format!("{mn} {}", ops.join(", ")) })
}

proptest! {
    /// Property: comparing any rendered text against itself never mismatches.
    #[test]
    fn prop_identity(text in instruction_text()) {
        let info = compare_texts(&text, &text);
        prop_assert!(info.is_match());
    }

    /// Property: comparison is symmetric regardless of argument order.
    #[test]
    fn prop_symmetry(a in instruction_text(), b in instruction_text()) {
        let forward = compare_texts(&a, &b);
        let reverse = compare_texts(&b, &a);
        prop_assert_eq!(forward.mismatch_bits, reverse.mismatch_bits);
        prop_assert_eq!(forward.maybe_mismatch_bits, reverse.maybe_mismatch_bits);
    }

    /// Property: a mismatch bit and a maybe-mismatch bit never overlap at
    /// the same token position.
    #[test]
    fn prop_bits_are_disjoint(a in instruction_text(), b in instruction_text()) {
        let info = compare_texts(&a, &b);
        prop_assert_eq!(info.mismatch_bits & info.maybe_mismatch_bits, 0);
    }

    /// Property: similarity under Strict <= Undecided <= Lenient for any
    /// combination of counts.
    #[test]
    fn prop_strictness_monotonicity(
        matches in 0u32..1000,
        maybe in 0u32..1000,
        mismatches in 0u32..1000,
    ) {
        let result: ComparisonResult<'static> = ComparisonResult {
            records: Vec::new(),
            label_count: 0,
            match_count: matches,
            maybe_match_count: maybe,
            mismatch_count: mismatches,
        };
        let strict = result.similarity(Strictness::Strict);
        let undecided = result.similarity(Strictness::Undecided);
        let lenient = result.similarity(Strictness::Lenient);
        prop_assert!(strict <= undecided + 1e-9);
        prop_assert!(undecided <= lenient + 1e-9);
    }
}
