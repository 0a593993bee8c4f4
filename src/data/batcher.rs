// ============================================================
// Layer 4 — Q&A Batchers
// ============================================================
// Implement Burn's Batcher trait to stack padded samples into
// tensors. Every sample is already padded to the configured
// limits, so batching is a flatten + reshape:
//
//   [s1_t1, …, s1_tN, s2_t1, …, sB_tN] → [B, N]
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::{EvalSample, QaSample};

// ─── QaBatch ──────────────────────────────────────────────────────────────────
/// A batch of training samples.
#[derive(Debug, Clone)]
pub struct QaBatch<B: Backend> {
    /// [batch, question_limit]
    pub question_ids:    Tensor<B, 2, Int>,
    /// [batch, context_limit]
    pub context_ids:     Tensor<B, 2, Int>,
    /// [batch]
    pub start_positions: Tensor<B, 1, Int>,
    /// [batch]
    pub end_positions:   Tensor<B, 1, Int>,
}

// ─── EvalBatch ────────────────────────────────────────────────────────────────
/// A batch of evaluation samples. The samples themselves ride along
/// so predicted spans can be turned back into text.
#[derive(Debug, Clone)]
pub struct EvalBatch<B: Backend> {
    pub samples:      Vec<EvalSample>,
    pub question_ids: Tensor<B, 2, Int>,
    pub context_ids:  Tensor<B, 2, Int>,
}

fn id_matrix<B: Backend>(rows: Vec<&[u32]>, device: &B::Device) -> Tensor<B, 2, Int> {
    let batch_size = rows.len();
    let width = rows.first().map_or(0, |r| r.len());
    let flat: Vec<i32> = rows
        .iter()
        .flat_map(|r| r.iter().map(|&x| x as i32))
        .collect();
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([batch_size, width])
}

fn index_vector<B: Backend>(values: impl Iterator<Item = usize>, device: &B::Device) -> Tensor<B, 1, Int> {
    let values: Vec<i32> = values.map(|v| v as i32).collect();
    Tensor::<B, 1, Int>::from_ints(values.as_slice(), device)
}

// ─── QaBatcher ────────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created where the model lives.
#[derive(Clone, Debug)]
pub struct QaBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> QaBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<QaSample, QaBatch<B>> for QaBatcher<B> {
    fn batch(&self, items: Vec<QaSample>) -> QaBatch<B> {
        QaBatch {
            question_ids:    id_matrix(items.iter().map(|s| s.question_ids.as_slice()).collect(), &self.device),
            context_ids:     id_matrix(items.iter().map(|s| s.context_ids.as_slice()).collect(), &self.device),
            start_positions: index_vector(items.iter().map(|s| s.start_position), &self.device),
            end_positions:   index_vector(items.iter().map(|s| s.end_position), &self.device),
        }
    }
}

impl<B: Backend> Batcher<EvalSample, EvalBatch<B>> for QaBatcher<B> {
    fn batch(&self, items: Vec<EvalSample>) -> EvalBatch<B> {
        let question_ids = id_matrix(items.iter().map(|s| s.question_ids.as_slice()).collect(), &self.device);
        let context_ids = id_matrix(items.iter().map(|s| s.context_ids.as_slice()).collect(), &self.device);
        EvalBatch { samples: items, question_ids, context_ids }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes_and_labels() {
        let sample = |start| QaSample {
            question_ids:   vec![3, 4, 0],
            context_ids:    vec![5, 6, 7, 0, 0],
            question_len:   2,
            context_len:    3,
            start_position: start,
            end_position:   2,
        };
        let batcher = QaBatcher::<NdArray>::new(Default::default());
        let batch: QaBatch<NdArray> = batcher.batch(vec![sample(0), sample(1)]);

        assert_eq!(batch.question_ids.dims(), [2, 3]);
        assert_eq!(batch.context_ids.dims(), [2, 5]);
        let starts: Vec<i64> = batch.start_positions.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(starts, vec![0, 1]);
        let ends: Vec<i64> = batch.end_positions.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(ends, vec![2, 2]);
    }
}
