//! Property-based tests for the instruction decoder.
//!
//! These tests verify that `decode` never panics on arbitrary input and
//! that, whenever it succeeds, the reported instruction length is internally
//! consistent with the bytes it consumed.

use proptest::prelude::*;
use unasmdiff::decoder::MAX_INSTRUCTION_LENGTH;
use unasmdiff::{decode, MachineMode};

proptest! {
    /// Property: decoding arbitrary bytes never panics, and a successful
    /// decode never reports consuming more bytes than were available or
    /// more than the documented maximum instruction length.
    #[test]
    fn prop_decode_length_is_bounded(bytes in proptest::collection::vec(any::<u8>(), 1..32)) {
        if let Ok(instr) = decode(MachineMode::Legacy32, 0x401000, &bytes) {
            prop_assert!(instr.length as usize >= 1);
            prop_assert!((instr.length as usize) <= bytes.len());
            prop_assert!((instr.length as usize) <= MAX_INSTRUCTION_LENGTH);
        }
    }
}
