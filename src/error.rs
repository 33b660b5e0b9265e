//! Error taxonomy for the core.
//!
//! Decode failures are recovered locally by the function disassembler and never
//! reach a caller as an `Err`; they are recorded as `AsmInstruction::is_invalid`
//! data instead. `DecodeError` therefore only escapes the decoder itself.
//! `PreconditionError` is the one error type that actually crosses the public
//! API boundary, returned by `disassemble` and `attach_source_lines`.

use thiserror::Error;

/// Failure to decode a single instruction at a given address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes remain than the shortest possible encoding requires.
    #[error("not enough bytes remaining to decode an instruction")]
    NotEnoughBytes,

    /// The opcode (or opcode + ModR/M reg extension) is not in the supported subset.
    #[error("unsupported opcode 0x{0:02X}")]
    UnsupportedOpcode(u8),

    /// A ModR/M or SIB byte encoded a combination the decoder does not accept.
    #[error("invalid ModR/M or SIB encoding")]
    InvalidModRm,
}

/// Violation of a precondition of [`crate::function::disassemble`] or
/// [`crate::function::attach_source_lines`].
///
/// These are programming errors, not data errors: callers are expected to
/// check the inputs before calling. The core refuses the operation and
/// reports the failure rather than panicking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// `begin_va >= end_va`.
    #[error("address range [{begin_va:#x}, {end_va:#x}) is empty or inverted")]
    EmptyRange { begin_va: u64, end_va: u64 },

    /// `[begin_va, end_va)` is not contained within a single section.
    #[error("address range [{begin_va:#x}, {end_va:#x}) does not lie inside a single section")]
    CrossesSectionBoundary { begin_va: u64, end_va: u64 },

    /// The section containing `[begin_va, end_va)` does not carry code bytes.
    #[error("section containing [{begin_va:#x}, {end_va:#x}) is not a code section")]
    NotCodeSection { begin_va: u64, end_va: u64 },

    /// The supplied source-line records do not cover the function's full length.
    #[error("source line records end at offset {actual_end:#x}, expected {expected_end:#x}")]
    SourceLinesDoNotCoverRange { actual_end: u64, expected_end: u64 },
}
