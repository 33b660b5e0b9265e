//! Fuzz target for the instruction decoder.
//!
//! Feeds arbitrary byte sequences to `decode` to find panics or
//! length-accounting bugs in instruction decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use unasmdiff::decoder::MAX_INSTRUCTION_LENGTH;
use unasmdiff::{decode, MachineMode};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 4096 {
        return;
    }

    if let Ok(instr) = decode(MachineMode::Legacy32, 0x401000, data) {
        assert!(instr.length >= 1);
        assert!((instr.length as usize) <= data.len());
        assert!((instr.length as usize) <= MAX_INSTRUCTION_LENGTH);
        assert!(instr.operand_count as usize <= 3);
    }
});
