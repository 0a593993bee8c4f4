// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Turns the two boundary distributions back into answer text.
//
//   start  [.05 .70 .10 .10 .05 | 0 0]      context_len = 5
//   end    [.01 .09 .20 .60 .10 | 0 0]
//   s = argmax(start[..len])                 → 1
//   e = s + argmax(end[s..min(s+max, len)])  → 3
//   answer = context[offsets[1].0 .. offsets[3].1]
//
// The same decoding serves three callers: the F1-driven learning
// rate scheduler, the `evaluate` command and the `ask` command.

use anyhow::{anyhow, bail, Result};
use burn::{
    data::dataloader::{batcher::Batcher, DataLoader},
    prelude::*,
};
use std::{collections::HashMap, sync::Arc};
use tokenizers::Tokenizer;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{EvalBatch, QaBatcher},
    converter::SquadConverter,
};
use crate::domain::{
    evaluation::{evaluate, SquadScore},
    squad::SquadRecord,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::FastQa;

/// Index of the largest value in `values`; the first one on ties.
fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

/// Pick (start, end) token indices, end inclusive, with
/// `start <= end < start + max_answer_len` and both below `len`.
pub fn decode_span(start: &[f32], end: &[f32], len: usize, max_answer_len: usize) -> (usize, usize) {
    let len = len.min(start.len()).min(end.len());
    if len == 0 {
        return (0, 0);
    }
    let s = argmax(&start[..len]);
    let stop = (s + max_answer_len.max(1)).min(len);
    (s, s + argmax(&end[s..stop]))
}

fn rows<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| anyhow!("Cannot read model output: {e:?}"))
}

/// Predicted answer text for every sample of the batch, keyed by id.
pub fn predict_batch<B: Backend>(
    model: &FastQa<B>,
    batch: EvalBatch<B>,
    max_answer_len: usize,
) -> Result<Vec<(String, String)>> {
    let [_, width] = batch.context_ids.dims();
    let output = model.forward(batch.question_ids, batch.context_ids);
    let start = rows(output.start)?;
    let end = rows(output.end)?;

    Ok(batch
        .samples
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let row = i * width..(i + 1) * width;
            let (s, e) = decode_span(&start[row.clone()], &end[row], sample.context_len, max_answer_len);
            (sample.id.clone(), sample.span_text(s, e).to_string())
        })
        .collect())
}

/// Decode every batch of `loader` and score it against `answers`.
pub fn evaluate_model<B: Backend>(
    model: &FastQa<B>,
    loader: &Arc<dyn DataLoader<EvalBatch<B>>>,
    answers: &HashMap<String, Vec<String>>,
    max_answer_len: usize,
) -> Result<SquadScore> {
    let mut predictions = HashMap::new();
    for batch in loader.iter() {
        predictions.extend(predict_batch(model, batch, max_answer_len)?);
    }
    Ok(evaluate(&predictions, answers))
}

// ─── Inferencer ───────────────────────────────────────────────────────────────
/// A trained model plus everything needed to answer raw text.
pub struct Inferencer<B: Backend> {
    model:     FastQa<B>,
    tokenizer: Tokenizer,
    config:    TrainConfig,
    device:    B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: FastQa<B>, tokenizer: Tokenizer, config: TrainConfig, device: B::Device) -> Self {
        Self { model, tokenizer, config, device }
    }

    /// Rebuild the model from `train_config.json` and load the newest weights.
    pub fn from_checkpoint(ckpt: &CheckpointManager, tokenizer: Tokenizer, device: B::Device) -> Result<Self> {
        let config = ckpt.load_config()?;
        let vocab_size = tokenizer.get_vocab_size(true);
        if vocab_size != config.vocab_size {
            bail!(
                "Vocabulary has {} tokens but the checkpoint was trained with {}",
                vocab_size,
                config.vocab_size
            );
        }
        let model = config.model_config().init::<B>(&device);
        let (model, info) = ckpt.load_latest(model, &device)?;
        tracing::info!("Model loaded from {}", info.name);
        Ok(Self::new(model, tokenizer, config, device))
    }

    pub fn model(&self) -> &FastQa<B> {
        &self.model
    }

    pub fn converter(&self) -> SquadConverter<'_> {
        SquadConverter::new(&self.tokenizer, self.config.question_limit, self.config.context_limit)
    }

    pub fn batcher(&self) -> QaBatcher<B> {
        QaBatcher::new(self.device.clone())
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn max_answer_len(&self) -> usize {
        self.config.max_answer_len
    }

    /// Answer one question against one context.
    pub fn predict(&self, question: &str, context: &str) -> Result<String> {
        let record = SquadRecord {
            id:       "ask".into(),
            question: question.into(),
            context:  context.into(),
            answers:  Vec::new(),
        };
        let Some(sample) = self.converter().convert_eval(&record)? else {
            bail!("Question and context must both contain at least one token");
        };
        let batch: EvalBatch<B> = self.batcher().batch(vec![sample]);
        let mut predictions = predict_batch(&self.model, batch, self.max_answer_len())?;
        predictions
            .pop()
            .map(|(_, answer)| answer)
            .ok_or_else(|| anyhow!("Model returned no prediction"))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::EvalSample;
    use crate::ml::model::FastQaConfig;
    use burn::backend::NdArray;

    #[test]
    fn test_decode_span_respects_order_and_length() {
        let start = [0.05, 0.70, 0.10, 0.10, 0.05, 0.0, 0.0];
        let end = [0.60, 0.09, 0.20, 0.01, 0.10, 0.0, 0.0];
        // The best end overall (index 0) precedes the start and is ignored.
        assert_eq!(decode_span(&start, &end, 5, 30), (1, 2));
        // A one-token window forces end == start.
        assert_eq!(decode_span(&start, &end, 5, 1), (1, 1));
    }

    #[test]
    fn test_decode_span_ignores_padding() {
        let start = [0.1, 0.2, 0.9];
        let end = [0.1, 0.2, 0.9];
        assert_eq!(decode_span(&start, &end, 2, 30), (1, 1));
        assert_eq!(decode_span(&start, &end, 0, 30), (0, 0));
    }

    #[test]
    fn test_predict_batch_returns_substrings_of_context() {
        let device = Default::default();
        let model = FastQaConfig::new(10, 4, 3, 3, 5).init::<NdArray>(&device);
        let sample = EvalSample {
            id:           "q1".into(),
            context:      "a b c".into(),
            offsets:      vec![(0, 1), (2, 3), (4, 5)],
            question_ids: vec![2, 3, 0],
            context_ids:  vec![4, 2, 5, 0, 0],
            question_len: 2,
            context_len:  3,
        };
        let batch: EvalBatch<NdArray> = QaBatcher::new(device).batch(vec![sample.clone()]);
        let predictions = predict_batch(&model, batch, 30).unwrap();

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].0, "q1");
        assert!(!predictions[0].1.is_empty());
        assert!(sample.context.contains(&predictions[0].1));
    }
}
