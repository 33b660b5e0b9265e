//! Fuzz target for the text comparator.
//!
//! Feeds arbitrary pairs of rendered-instruction-shaped strings to
//! `compare_texts` to find panics (quote-matching off-by-ones, unbounded
//! token indices) and to check the mismatch/maybe-mismatch bitmasks never
//! overlap.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use unasmdiff::compare_texts;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    a: String,
    b: String,
}

fuzz_target!(|input: FuzzInput| {
    if input.a.len() > 4096 || input.b.len() > 4096 {
        return;
    }

    let info = compare_texts(&input.a, &input.b);
    assert_eq!(info.mismatch_bits & info.maybe_mismatch_bits, 0);

    let reverse = compare_texts(&input.b, &input.a);
    assert_eq!(info.mismatch_bits, reverse.mismatch_bits);
    assert_eq!(info.maybe_mismatch_bits, reverse.maybe_mismatch_bits);
});
