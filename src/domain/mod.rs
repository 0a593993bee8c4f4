// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits for the concepts the rest of the
// system talks about: SQuAD records, the vocabulary, and the
// SQuAD answer metric.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, functions and traits
//
// Reference: Rajpurkar et al. (2016) SQuAD: 100,000+ Questions
//            for Machine Comprehension of Text

/// SQuAD v1.1 file layout and flattened question records
pub mod squad;

/// Token ↔ index mapping with the reserved pad/unk entries
pub mod vocabulary;

/// Official SQuAD v1.1 exact-match and F1 scoring
pub mod evaluation;

/// Core abstractions (traits) that other layers implement
pub mod traits;
