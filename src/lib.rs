//! # unasmdiff
//!
//! A differential disassembler for 32-bit x86 (IA-32) executables: given two
//! loaded images and an address range in each, it decodes, symbolicates, and
//! aligns the two instruction streams to report where two builds of the same
//! function diverge.
//!
//! ## Quick Start
//!
//! ```rust
//! use unasmdiff::{align, disassemble, Executable, Section, SectionKind, Strictness, SymbolStore};
//!
//! let bytes_a = [0x90, 0x90, 0xC3]; // nop; nop; ret
//! let bytes_b = [0x90, 0x90, 0xC3];
//!
//! let section_a = Section {
//!     name: ".text".to_string(),
//!     base_va: 0x1000,
//!     size: bytes_a.len() as u64,
//!     bytes: &bytes_a,
//!     kind: SectionKind::Unknown,
//! };
//! let exec_a = Executable::new(0x400000, vec![section_a], 0x1000);
//!
//! let section_b = Section {
//!     name: ".text".to_string(),
//!     base_va: 0x1000,
//!     size: bytes_b.len() as u64,
//!     bytes: &bytes_b,
//!     kind: SectionKind::Unknown,
//! };
//! let exec_b = Executable::new(0x400000, vec![section_b], 0x1000);
//!
//! let symbols = SymbolStore::new();
//! let function_a = disassemble(&exec_a, &symbols, 0x401000, 0x401003).unwrap();
//! let function_b = disassemble(&exec_b, &symbols, 0x401000, 0x401003).unwrap();
//!
//! let result = align(&function_a, &function_b, 20);
//! assert_eq!(result.similarity(Strictness::Undecided), 1.0);
//! ```
//!
//! ## Architecture
//!
//! The pipeline is a chain of small, independently testable stages:
//!
//! - **`symbol`** — address- and name-indexed storage for binary symbols and
//!   synthesized pseudo-symbols (`sub_`/`loc_`/`off_`/`unk_`).
//! - **`executable`** — a read-only view over a loaded image's sections and
//!   image base.
//! - **`decoder`** — a pure IA-32 instruction decoder, no symbol lookups.
//! - **`formatter`** — renders a decoded instruction to text, rewriting
//!   address-bearing operands through the symbol store via a small hook
//!   trait.
//! - **`function`** — the two-pass function disassembler: labels intra-function
//!   branch targets, then emits the labeled instruction stream.
//! - **`tokenizer`** — splits rendered instruction text into mnemonic and
//!   operand tokens, quote-aware.
//! - **`comparator`** — compares two instructions token by token, producing a
//!   per-position mismatch bitmask.
//! - **`aligner`** — bounded bidirectional lookahead alignment of two
//!   instruction streams.
//! - **`result`** — the aggregated, strictness-parameterized comparison
//!   output.
//! - **`error`** — the error taxonomy shared across the above.
//!
//! ## Modules
//!
//! - `symbol` - symbol storage and pseudo-symbol naming
//! - `executable` - loaded-image sections and bounds
//! - `decoder` - IA-32 instruction decoding
//! - `formatter` - symbolicating text rendering
//! - `function` - per-function two-pass disassembly
//! - `tokenizer` - instruction-text tokenization
//! - `comparator` - token-level instruction comparison
//! - `aligner` - instruction-stream alignment
//! - `result` - comparison output types
//! - `error` - error taxonomy

pub mod aligner;
pub mod comparator;
pub mod decoder;
pub mod error;
pub mod executable;
pub mod formatter;
pub mod function;
pub mod result;
pub mod symbol;
pub mod tokenizer;

pub use aligner::{align, DEFAULT_LOOKAHEAD_LIMIT};
pub use comparator::{compare_texts, compare_tokens, create_mismatch_info, AsmMismatchInfo};
pub use decoder::{decode, DecodedInstruction, MachineMode};
pub use error::{DecodeError, PreconditionError};
pub use executable::{Executable, Section, SectionKind};
pub use formatter::{format_instruction, FormatterBounds, FormatterHooks, SymbolResolver, SymbolicatingHooks};
pub use function::{attach_source_lines, disassemble, AsmInstruction, AsmInstructionVariant, AsmLabel, Function};
pub use result::{ComparisonRecord, ComparisonResult, InstructionPair, LabelPair, Strictness};
pub use symbol::{pseudo_symbol_name, Symbol, SymbolStore};
pub use tokenizer::{tokenize, TokenSet};
