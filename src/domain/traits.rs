// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training pipeline only needs two narrow capabilities from
// the outside world: a restartable source of raw records and a
// way to answer a question from a context. Everything else talks
// to these traits, so a reader for another file layout or a
// different answering backend can be dropped in.

use anyhow::Result;

use crate::domain::squad::SquadRecord;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Any component that yields raw question/context/answer records.
///
/// Implementations:
///   - SquadReader → SQuAD v1.1 JSON files
///
/// `records()` may be called any number of times; every call
/// starts again from the first record.
pub trait RecordSource {
    fn records(&self) -> Result<Vec<SquadRecord>>;
}

// ─── QuestionAnswerer ─────────────────────────────────────────────────────────
/// Any component that can extract an answer span from a context.
///
/// Implementations:
///   - AskUseCase → uses a trained FastQA checkpoint
pub trait QuestionAnswerer {
    /// Returns the answer text, a substring of `context`.
    fn answer(&self, question: &str, context: &str) -> Result<String>;
}
