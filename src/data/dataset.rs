// ============================================================
// Layer 4 — Datasets
// ============================================================
// Converted SQuAD records ready for batching. Training samples
// carry the gold token span, evaluation samples carry the id,
// the raw context and the byte offsets needed to cut the
// predicted answer back out of the text.
//
// Reference: Burn Book §4 (Dataset)

use burn::data::dataset::Dataset;

use crate::domain::vocabulary::PAD_ID;

/// One training example, padded to the configured limits.
#[derive(Debug, Clone, PartialEq)]
pub struct QaSample {
    pub question_ids:   Vec<u32>,
    pub context_ids:    Vec<u32>,
    pub question_len:   usize,
    pub context_len:    usize,
    /// Token index of the first answer token
    pub start_position: usize,
    /// Token index of the last answer token (inclusive)
    pub end_position:   usize,
}

/// One evaluation example: the model inputs plus what is needed to
/// turn a predicted token span back into answer text.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalSample {
    pub id:           String,
    pub context:      String,
    /// Byte range of every context token inside `context`
    pub offsets:      Vec<(usize, usize)>,
    pub question_ids: Vec<u32>,
    pub context_ids:  Vec<u32>,
    pub question_len: usize,
    pub context_len:  usize,
}

impl EvalSample {
    /// Text covered by tokens `start..=end`.
    pub fn span_text(&self, start: usize, end: usize) -> &str {
        match (self.offsets.get(start), self.offsets.get(end)) {
            (Some(&(from, _)), Some(&(_, to))) if from <= to => &self.context[from..to],
            _ => "",
        }
    }
}

/// Right-pad `ids` with PAD_ID up to `len`.
pub fn pad_to(mut ids: Vec<u32>, len: usize) -> Vec<u32> {
    ids.resize(len.max(ids.len()), PAD_ID);
    ids
}

/// In-memory dataset of converted samples.
pub struct SampleDataset<I> {
    samples: Vec<I>,
}

impl<I> SampleDataset<I> {
    pub fn new(samples: Vec<I>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }
}

impl<I: Clone + Send + Sync> Dataset<I> for SampleDataset<I> {
    fn get(&self, index: usize) -> Option<I> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

pub type QaDataset = SampleDataset<QaSample>;
pub type EvalDataset = SampleDataset<EvalSample>;
