// ============================================================
// Layer 5 — Masking Primitives
// ============================================================
// Every batch is right-padded to a fixed length, so each layer
// that normalises over a sequence axis needs to know which
// positions are real tokens.
//
//   ids      [[7, 3, 9, 0, 0],        pad_id = 0
//             [4, 0, 0, 0, 0]]
//   lengths  [3, 1]
//   mask     [[T, T, T, F, F],
//             [T, F, F, F, F]]
//   bias     [[0, 0, 0, MIN, MIN],
//             [0, MIN, MIN, MIN, MIN]]
//
// Masks are rebuilt on every call from (lengths, max_len).
// The bias is ADDED to logits before softmax; f32::MIN pushes the
// masked probabilities to exactly zero while their gradients stay
// finite, which zeroing after the softmax would not give us.

use burn::prelude::*;

/// Number of non-pad tokens per row: [batch, seq_len] → [batch]
pub fn sequence_length<B: Backend>(ids: Tensor<B, 2, Int>, pad_id: i64) -> Tensor<B, 1, Int> {
    ids.equal_elem(pad_id)
        .bool_not()
        .int()
        .sum_dim(1)
        .squeeze::<1>(1)
}

/// True for positions strictly below the length: [batch] → [batch, max_len]
pub fn sequence_mask<B: Backend>(lengths: Tensor<B, 1, Int>, max_len: usize) -> Tensor<B, 2, Bool> {
    let [batch] = lengths.dims();
    let device = lengths.device();

    let positions = Tensor::<B, 1, Int>::arange(0..max_len as i64, &device)
        .unsqueeze::<2>()
        .expand([batch, max_len]);
    let lengths = lengths.reshape([batch, 1]).expand([batch, max_len]);

    positions.lower(lengths)
}

/// Additive softmax bias: 0.0 where the mask is set, f32::MIN elsewhere.
pub fn mask_bias<B: Backend, const D: usize>(mask: Tensor<B, D, Bool>) -> Tensor<B, D> {
    mask.bool_not().float().mul_scalar(f32::MIN)
}

/// Softmax along `dim` restricted to the positions where `mask` is set.
pub fn masked_softmax<B: Backend, const D: usize>(
    logits: Tensor<B, D>,
    mask: Tensor<B, D, Bool>,
    dim: usize,
) -> Tensor<B, D> {
    burn::tensor::activation::softmax(logits + mask_bias(mask), dim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use proptest::prelude::*;

    type TestBackend = NdArray;

    fn ids(rows: &[&[i64]]) -> Tensor<TestBackend, 2, Int> {
        let device = Default::default();
        let width = rows[0].len();
        let flat: Vec<i64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &device)
            .reshape([rows.len(), width])
    }

    fn bools(mask: Tensor<TestBackend, 2, Bool>) -> Vec<bool> {
        mask.into_data().to_vec::<bool>().unwrap()
    }

    #[test]
    fn test_sequence_length_counts_non_pad() {
        let lengths = sequence_length(ids(&[&[7, 3, 9, 0, 0], &[4, 0, 0, 0, 0], &[1, 2, 3, 4, 5]]), 0);
        let lengths: Vec<i64> = lengths.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(lengths, vec![3, 1, 5]);
    }

    #[test]
    fn test_zero_length_gives_all_false_mask() {
        let device = Default::default();
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([0, 2], &device);
        let mask = bools(sequence_mask(lengths, 4));
        assert_eq!(mask, vec![false, false, false, false, true, true, false, false]);
    }

    #[test]
    fn test_masked_softmax_zero_outside_mask() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 50.0, -3.0]], &device);
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([2], &device);
        let probs = masked_softmax(logits, sequence_mask(lengths, 4), 1);
        let probs: Vec<f32> = probs.into_data().to_vec().unwrap();

        assert!((probs[0] + probs[1] - 1.0).abs() < 1e-5);
        assert_eq!(probs[2], 0.0);
        assert_eq!(probs[3], 0.0);
    }

    #[test]
    fn test_all_masked_row_stays_finite() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[0.3, -1.0, 2.0]], &device);
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([0], &device);
        let probs: Vec<f32> = masked_softmax(logits, sequence_mask(lengths, 3), 1)
            .into_data()
            .to_vec()
            .unwrap();
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    proptest! {
        #[test]
        fn prop_mask_has_length_true_prefix(len in 0usize..=12, extra in 0usize..6) {
            let device = Default::default();
            let max_len = len.max(1) + extra;
            let lengths = Tensor::<TestBackend, 1, Int>::from_ints([len as i64], &device);
            let mask = bools(sequence_mask(lengths, max_len));

            prop_assert_eq!(mask.iter().filter(|m| **m).count(), len);
            prop_assert!(mask[..len].iter().all(|m| *m));
            prop_assert!(mask[len..].iter().all(|m| !*m));
        }
    }
}
