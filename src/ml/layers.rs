// ============================================================
// Layer 5 — FastQA Building Blocks
// ============================================================
// Attention, lexical-overlap and pointer layers used by the
// FastQA model, plus the small selection helpers around them.
//
// Two families of layers live here:
//
//   Functional  — pure functions of their inputs, no weights
//                 (SequenceLength, WordInQuestionB, IndexSelect,
//                  Argmax, Backward)
//   Parametric  — Burn modules that own learned parameters
//                 (WeightedSum, WordInQuestionW, PositionPointer,
//                  LstmLayer)
//
// Both families implement `Transform`, so a caller can ask any
// layer what it produces before running it.
//
// Shapes use b = batch, q = question length, c = context length,
// s = generic sequence length, d = feature size.
//
// Reference: Weissenborn et al. (2017) Making Neural QA as Simple
//            as Possible but not Simpler (FastQA)
//            Vinyals et al. (2015) Pointer Networks

use burn::{
    module::Param,
    nn::{Initializer, Linear, LinearConfig, Lstm, LstmConfig},
    prelude::*,
    tensor::activation::{relu, softmax},
};

use crate::ml::masking::{mask_bias, masked_softmax, sequence_length, sequence_mask};

// ─── Layer contract ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// No learned parameters.
    Functional,
    /// Owns parameters that take part in optimisation.
    Parametric,
}

/// Common contract of every layer in this module.
pub trait Transform<B: Backend> {
    type Input;
    type Output;

    const KIND: LayerKind;

    fn transform(&self, input: Self::Input) -> Self::Output;

    /// Output dims given the dims of each input, in input order.
    fn output_shape(&self, input_shapes: &[&[usize]]) -> Vec<usize>;
}

// ─── SequenceLength ───────────────────────────────────────────────────────────

/// Derives lengths from padded ids.
#[derive(Debug, Clone, Copy)]
pub struct SequenceLength {
    pub pad_id: i64,
}

impl SequenceLength {
    pub fn forward<B: Backend>(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 1, Int> {
        sequence_length(ids, self.pad_id)
    }
}

impl<B: Backend> Transform<B> for SequenceLength {
    type Input = Tensor<B, 2, Int>;
    type Output = Tensor<B, 1, Int>;

    const KIND: LayerKind = LayerKind::Functional;

    fn transform(&self, ids: Self::Input) -> Self::Output {
        self.forward(ids)
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Vec<usize> {
        vec![input_shapes[0][0]]
    }
}

// ─── WeightedSum ──────────────────────────────────────────────────────────────

/// Additive attention pooling: one vector per example.
#[derive(Module, Debug)]
pub struct WeightedSum<B: Backend> {
    scorer: Linear<B>,
}

impl<B: Backend> WeightedSum<B> {
    pub fn new(device: &B::Device, d_input: usize) -> Self {
        let scorer = LinearConfig::new(d_input, 1)
            .with_bias(false)
            .with_initializer(Initializer::Ones)
            .init(device);
        Self { scorer }
    }

    /// Attention weights over positions: [b, s, d] → [b, s, 1]
    pub fn attention(&self, x: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Tensor<B, 3> {
        let [_, seq_len, _] = x.dims();
        let logits = self.scorer.forward(x);
        let mask = sequence_mask(lengths, seq_len).unsqueeze_dim::<3>(2);
        masked_softmax(logits, mask, 1)
    }

    /// [b, s, d] → [b, d]
    pub fn forward(&self, x: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        let [batch, _, dim] = x.dims();
        let alpha = self.attention(x.clone(), lengths);
        alpha.swap_dims(1, 2).matmul(x).reshape([batch, dim])
    }
}

impl<B: Backend> Transform<B> for WeightedSum<B> {
    type Input = (Tensor<B, 3>, Tensor<B, 1, Int>);
    type Output = Tensor<B, 2>;

    const KIND: LayerKind = LayerKind::Parametric;

    fn transform(&self, (x, lengths): Self::Input) -> Self::Output {
        self.forward(x, lengths)
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Vec<usize> {
        vec![input_shapes[0][0], input_shapes[0][2]]
    }
}

// ─── WordInQuestionB ──────────────────────────────────────────────────────────

/// Binary lexical overlap: 1.0 where a valid context token occurs in the question.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordInQuestionB;

impl WordInQuestionB {
    /// question [b, q], context [b, c], context_len [b] → [b, c, 1]
    pub fn forward<B: Backend>(
        &self,
        question:    Tensor<B, 2, Int>,
        context:     Tensor<B, 2, Int>,
        context_len: Tensor<B, 1, Int>,
    ) -> Tensor<B, 3> {
        let [batch, q_len] = question.dims();
        let [_, c_len] = context.dims();

        let question = question.unsqueeze_dim::<3>(1).expand([batch, c_len, q_len]);
        let context = context.unsqueeze_dim::<3>(2).expand([batch, c_len, q_len]);

        // any() over the question axis
        let in_question = context
            .equal(question)
            .int()
            .sum_dim(2)
            .greater_elem(0)
            .float();
        let mask = sequence_mask(context_len, c_len).float().unsqueeze_dim::<3>(2);

        in_question * mask
    }
}

impl<B: Backend> Transform<B> for WordInQuestionB {
    type Input = (Tensor<B, 2, Int>, Tensor<B, 2, Int>, Tensor<B, 1, Int>);
    type Output = Tensor<B, 3>;

    const KIND: LayerKind = LayerKind::Functional;

    fn transform(&self, (question, context, context_len): Self::Input) -> Self::Output {
        self.forward(question, context, context_len)
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Vec<usize> {
        vec![input_shapes[1][0], input_shapes[1][1], 1]
    }
}

// ─── WordInQuestionW ──────────────────────────────────────────────────────────

/// Weighted lexical overlap from embedding similarity.
#[derive(Module, Debug)]
pub struct WordInQuestionW<B: Backend> {
    similarity: Linear<B>,
}

impl<B: Backend> WordInQuestionW<B> {
    pub fn new(device: &B::Device, d_embed: usize) -> Self {
        let similarity = LinearConfig::new(d_embed, 1)
            .with_bias(false)
            .with_initializer(Initializer::Ones)
            .init(device);
        Self { similarity }
    }

    /// question [b, q, d], context [b, c, d] → [b, c, 1]
    pub fn forward(
        &self,
        question:     Tensor<B, 3>,
        context:      Tensor<B, 3>,
        question_len: Tensor<B, 1, Int>,
        context_len:  Tensor<B, 1, Int>,
    ) -> Tensor<B, 3> {
        let [batch, q_len, dim] = question.dims();
        let [_, c_len, _] = context.dims();

        let question = question.unsqueeze_dim::<4>(1).expand([batch, c_len, q_len, dim]);
        let context = context.unsqueeze_dim::<4>(2).expand([batch, c_len, q_len, dim]);
        let similarity = self
            .similarity
            .forward(context * question)
            .reshape([batch, c_len, q_len]);

        // A (context, question) pair counts only if both positions are valid.
        let context_mask = sequence_mask(context_len, c_len).float().unsqueeze_dim::<3>(2);
        let question_mask = sequence_mask(question_len, q_len).float().unsqueeze_dim::<3>(1);
        let pair_mask = context_mask.matmul(question_mask);

        // Normalised over context positions for each question word.
        let weights = softmax(similarity + mask_bias(pair_mask.clone().greater_elem(0.5)), 1);

        (weights * pair_mask).sum_dim(2)
    }
}

impl<B: Backend> Transform<B> for WordInQuestionW<B> {
    type Input = (Tensor<B, 3>, Tensor<B, 3>, Tensor<B, 1, Int>, Tensor<B, 1, Int>);
    type Output = Tensor<B, 3>;

    const KIND: LayerKind = LayerKind::Parametric;

    fn transform(&self, (question, context, question_len, context_len): Self::Input) -> Self::Output {
        self.forward(question, context, question_len, context_len)
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Vec<usize> {
        vec![input_shapes[1][0], input_shapes[1][1], 1]
    }
}

// ─── PositionPointer ──────────────────────────────────────────────────────────

/// Pointer head producing a distribution over sequence positions.
#[derive(Module, Debug)]
pub struct PositionPointer<B: Backend> {
    hidden: Linear<B>,
    score:  Linear<B>,
}

impl<B: Backend> PositionPointer<B> {
    pub fn new(device: &B::Device, d_input: usize, hidden_size: usize) -> Self {
        let mut hidden = LinearConfig::new(d_input, hidden_size)
            .with_initializer(Initializer::XavierUniform { gain: 1.0 })
            .init(device);
        hidden.bias = Some(Param::from_tensor(Tensor::zeros([hidden_size], device)));

        let score = LinearConfig::new(hidden_size, 1)
            .with_bias(false)
            .with_initializer(Initializer::XavierUniform { gain: 1.0 })
            .init(device);

        Self { hidden, score }
    }

    /// [b, s, d] → [b, s]
    pub fn forward(&self, x: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        let [batch, seq_len, _] = x.dims();
        let hidden = relu(self.hidden.forward(x));
        let logits = self.score.forward(hidden).reshape([batch, seq_len]);
        masked_softmax(logits, sequence_mask(lengths, seq_len), 1)
    }
}

impl<B: Backend> Transform<B> for PositionPointer<B> {
    type Input = (Tensor<B, 3>, Tensor<B, 1, Int>);
    type Output = Tensor<B, 2>;

    const KIND: LayerKind = LayerKind::Parametric;

    fn transform(&self, (x, lengths): Self::Input) -> Self::Output {
        self.forward(x, lengths)
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Vec<usize> {
        vec![input_shapes[0][0], input_shapes[0][1]]
    }
}

// ─── IndexSelect / Argmax ─────────────────────────────────────────────────────

/// Picks one position per example through a one-hot product,
/// so gradients still reach `x`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexSelect;

impl IndexSelect {
    /// x [b, s, d], indices [b, 1] → [b, d]
    pub fn forward<B: Backend>(&self, x: Tensor<B, 3>, indices: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch, seq_len, dim] = x.dims();
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &x.device())
            .unsqueeze::<2>()
            .expand([batch, seq_len]);
        let one_hot = positions
            .equal(indices.reshape([batch, 1]).expand([batch, seq_len]))
            .float();

        one_hot.unsqueeze_dim::<3>(1).matmul(x).reshape([batch, dim])
    }
}

impl<B: Backend> Transform<B> for IndexSelect {
    type Input = (Tensor<B, 3>, Tensor<B, 2, Int>);
    type Output = Tensor<B, 2>;

    const KIND: LayerKind = LayerKind::Functional;

    fn transform(&self, (x, indices): Self::Input) -> Self::Output {
        self.forward(x, indices)
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Vec<usize> {
        vec![input_shapes[0][0], input_shapes[0][2]]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Argmax;

impl Argmax {
    /// [b, s] → [b, 1]
    pub fn forward<B: Backend>(&self, distribution: Tensor<B, 2>) -> Tensor<B, 2, Int> {
        distribution.argmax(1)
    }
}

impl<B: Backend> Transform<B> for Argmax {
    type Input = Tensor<B, 2>;
    type Output = Tensor<B, 2, Int>;

    const KIND: LayerKind = LayerKind::Functional;

    fn transform(&self, distribution: Self::Input) -> Self::Output {
        self.forward(distribution)
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Vec<usize> {
        vec![input_shapes[0][0], 1]
    }
}

// ─── Recurrent layers ─────────────────────────────────────────────────────────

/// A left-to-right layer over [b, s, d_in] → [b, s, units].
pub trait SequenceLayer<B: Backend> {
    fn forward_sequence(&self, x: Tensor<B, 3>) -> Tensor<B, 3>;

    fn units(&self) -> usize;
}

#[derive(Module, Debug)]
pub struct LstmLayer<B: Backend> {
    lstm:  Lstm<B>,
    units: usize,
}

impl<B: Backend> LstmLayer<B> {
    pub fn new(device: &B::Device, d_input: usize, units: usize) -> Self {
        let lstm = LstmConfig::new(d_input, units, true).init(device);
        Self { lstm, units }
    }
}

impl<B: Backend> SequenceLayer<B> for LstmLayer<B> {
    fn forward_sequence(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let (output, _state) = self.lstm.forward(x, None);
        output
    }

    fn units(&self) -> usize {
        self.units
    }
}

// ─── Backward ─────────────────────────────────────────────────────────────────

/// Reverses the first `length` steps of every example, leaving the
/// padding where it is:
///
///   [a, b, c, PAD, PAD], len 3  →  [c, b, a, PAD, PAD]
///
/// Applying it twice with the same lengths is the identity.
pub fn reverse_sequence<B: Backend>(x: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Tensor<B, 3> {
    let [batch, seq_len, dim] = x.dims();
    let device = x.device();

    let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
        .unsqueeze::<2>()
        .expand([batch, seq_len]);
    let lengths = lengths.reshape([batch, 1]).expand([batch, seq_len]);

    // t < len → len - 1 - t, otherwise t
    let inside = positions.clone().lower(lengths.clone());
    let mirrored = (lengths - positions.clone()).sub_scalar(1);
    let index = positions.mask_where(inside, mirrored);

    x.gather(1, index.unsqueeze_dim::<3>(2).expand([batch, seq_len, dim]))
}

/// Runs the wrapped layer right-to-left over each example's valid prefix.
#[derive(Debug, Clone, Copy)]
pub struct Backward<'a, L> {
    layer: &'a L,
}

impl<'a, L> Backward<'a, L> {
    pub fn new(layer: &'a L) -> Self {
        Self { layer }
    }

    pub fn forward<B: Backend>(&self, x: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Tensor<B, 3>
    where
        L: SequenceLayer<B>,
    {
        let reversed = reverse_sequence(x, lengths.clone());
        let output = self.layer.forward_sequence(reversed);
        reverse_sequence(output, lengths)
    }
}

impl<'a, B: Backend, L: SequenceLayer<B>> Transform<B> for Backward<'a, L> {
    type Input = (Tensor<B, 3>, Tensor<B, 1, Int>);
    type Output = Tensor<B, 3>;

    // The wrapper itself holds no weights; the wrapped layer does.
    const KIND: LayerKind = LayerKind::Functional;

    fn transform(&self, (x, lengths): Self::Input) -> Self::Output {
        self.forward(x, lengths)
    }

    fn output_shape(&self, input_shapes: &[&[usize]]) -> Vec<usize> {
        vec![input_shapes[0][0], input_shapes[0][1], self.layer.units()]
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use proptest::prelude::*;

    type TB = NdArray;

    fn device() -> <TB as Backend>::Device {
        Default::default()
    }

    fn int_rows(rows: &[&[i64]]) -> Tensor<TB, 2, Int> {
        let flat: Vec<i64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::<TB, 1, Int>::from_ints(flat.as_slice(), &device()).reshape([rows.len(), rows[0].len()])
    }

    fn lengths(values: &[i64]) -> Tensor<TB, 1, Int> {
        Tensor::<TB, 1, Int>::from_ints(values, &device())
    }

    fn floats<const D: usize>(t: Tensor<TB, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    /// Running sum along the sequence axis, a stand-in for a recurrent layer
    /// whose output at t depends on every earlier step.
    struct RunningSum {
        units: usize,
    }

    impl SequenceLayer<TB> for RunningSum {
        fn forward_sequence(&self, x: Tensor<TB, 3>) -> Tensor<TB, 3> {
            let [batch, seq_len, _] = x.dims();
            let mut lower = Vec::with_capacity(seq_len * seq_len);
            for row in 0..seq_len {
                for col in 0..seq_len {
                    lower.push(if col <= row { 1.0f32 } else { 0.0 });
                }
            }
            let lower = Tensor::<TB, 1>::from_floats(lower.as_slice(), &device())
                .reshape([1, seq_len, seq_len])
                .expand([batch, seq_len, seq_len]);
            lower.matmul(x)
        }

        fn units(&self) -> usize {
            self.units
        }
    }

    struct Identity;

    impl SequenceLayer<TB> for Identity {
        fn forward_sequence(&self, x: Tensor<TB, 3>) -> Tensor<TB, 3> {
            x
        }

        fn units(&self) -> usize {
            1
        }
    }

    #[test]
    fn test_weighted_sum_attention_sums_to_one_over_valid() {
        let layer = WeightedSum::<TB>::new(&device(), 2);
        let x = Tensor::<TB, 3>::from_floats(
            [[[0.1, 0.2], [0.5, -0.3], [1.0, 1.0], [9.0, 9.0]]],
            &device(),
        );
        let alpha = floats(layer.attention(x, lengths(&[3])));

        let valid: f32 = alpha[..3].iter().sum();
        assert!((valid - 1.0).abs() < 1e-5);
        assert_eq!(alpha[3], 0.0);
    }

    #[test]
    fn test_weighted_sum_ignores_padded_content() {
        let layer = WeightedSum::<TB>::new(&device(), 2);
        let clean = Tensor::<TB, 3>::from_floats(
            [[[0.1, 0.2], [0.5, -0.3], [0.0, 0.0], [0.0, 0.0]]],
            &device(),
        );
        let noisy = Tensor::<TB, 3>::from_floats(
            [[[0.1, 0.2], [0.5, -0.3], [123.0, -7.0], [1e6, 3.0]]],
            &device(),
        );

        let a = floats(layer.forward(clean, lengths(&[2])));
        let b = floats(layer.forward(noisy, lengths(&[2])));
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_weighted_sum_invariant_to_pad_amount() {
        let layer = WeightedSum::<TB>::new(&device(), 1);
        let short = Tensor::<TB, 3>::from_floats([[[0.4], [0.9]]], &device());
        let long = Tensor::<TB, 3>::from_floats([[[0.4], [0.9], [0.0], [0.0], [0.0]]], &device());

        let a = floats(layer.forward(short, lengths(&[2])));
        let b = floats(layer.forward(long, lengths(&[2])));
        assert!((a[0] - b[0]).abs() < 1e-6);
    }

    #[test]
    fn test_wiq_b_marks_single_match() {
        // 5 valid context tokens + 3 pads; only token 42 is in the question.
        let question = int_rows(&[&[42, 17, 0, 0]]);
        let context = int_rows(&[&[5, 6, 42, 8, 9, 0, 0, 0]]);

        let wiq = floats(WordInQuestionB.forward(question, context, lengths(&[5])));
        assert_eq!(wiq, vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_wiq_b_zero_on_padded_context() {
        // Context pads are id 0 and so is question padding, yet the mask wins.
        let question = int_rows(&[&[3, 0]]);
        let context = int_rows(&[&[3, 4, 0]]);

        let wiq = floats(WordInQuestionB.forward(question, context, lengths(&[2])));
        assert_eq!(wiq, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_wiq_w_is_zero_on_padding() {
        let layer = WordInQuestionW::<TB>::new(&device(), 2);
        let question = Tensor::<TB, 3>::from_floats([[[1.0, 0.0], [0.5, 0.5], [3.0, 3.0]]], &device());
        let context = Tensor::<TB, 3>::from_floats(
            [[[1.0, 0.0], [0.0, 1.0], [0.2, 0.1], [4.0, 4.0]]],
            &device(),
        );

        let wiq = floats(layer.forward(question, context, lengths(&[2]), lengths(&[3])));
        assert_eq!(wiq.len(), 4);
        assert_eq!(wiq[3], 0.0);
        // Two valid question words each spread one unit of mass over the context.
        let total: f32 = wiq.iter().sum();
        assert!((total - 2.0).abs() < 1e-5);
        assert!(wiq[..3].iter().all(|w| *w > 0.0));
    }

    #[test]
    fn test_pointer_single_valid_position() {
        let layer = PositionPointer::<TB>::new(&device(), 3, 4);
        let x = Tensor::<TB, 3>::from_floats(
            [[[0.3, -0.2, 0.8], [5.0, 5.0, 5.0], [-4.0, 2.0, 1.0]]],
            &device(),
        );

        let dist = floats(layer.forward(x, lengths(&[1])));
        assert_eq!(dist, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pointer_rows_sum_to_one() {
        let layer = PositionPointer::<TB>::new(&device(), 2, 3);
        let x = Tensor::<TB, 3>::from_floats(
            [
                [[0.3, -0.2], [0.1, 0.9], [1.5, 0.5], [0.0, 0.0]],
                [[2.0, 1.0], [0.0, 0.0], [0.0, 0.0], [0.0, 0.0]],
            ],
            &device(),
        );

        let dist = floats(layer.forward(x, lengths(&[3, 1])));
        let first: f32 = dist[..3].iter().sum();
        assert!((first - 1.0).abs() < 1e-5);
        assert_eq!(dist[3], 0.0);
        assert_eq!(&dist[4..], &[1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_index_select_and_argmax() {
        let x = Tensor::<TB, 3>::from_floats(
            [[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]], [[7.0, 8.0], [9.0, 10.0], [11.0, 12.0]]],
            &device(),
        );
        let dist = Tensor::<TB, 2>::from_floats([[0.1, 0.7, 0.2], [0.6, 0.3, 0.1]], &device());

        let index = Argmax.forward(dist);
        let picked = floats(IndexSelect.forward(x, index.clone()));
        let index: Vec<i64> = index.into_data().convert::<i64>().to_vec().unwrap();

        assert_eq!(index, vec![1, 0]);
        assert_eq!(picked, vec![3.0, 4.0, 7.0, 8.0]);
    }

    #[test]
    fn test_reverse_sequence_keeps_padding_trailing() {
        let x = Tensor::<TB, 3>::from_floats([[[1.0], [2.0], [3.0], [0.0], [0.0]]], &device());
        let reversed = floats(reverse_sequence(x, lengths(&[3])));
        assert_eq!(reversed, vec![3.0, 2.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_backward_identity_restores_valid_region() {
        let x = Tensor::<TB, 3>::from_floats(
            [[[1.0], [2.0], [3.0], [8.0]], [[4.0], [5.0], [9.0], [9.0]]],
            &device(),
        );
        let out = floats(Backward::new(&Identity).forward(x, lengths(&[3, 2])));
        assert_eq!(&out[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&out[4..6], &[4.0, 5.0]);
    }

    #[test]
    fn test_backward_runs_right_to_left_without_padding() {
        // Suffix sums over the valid prefix only; the 9s must not leak in.
        let x = Tensor::<TB, 3>::from_floats([[[1.0], [2.0], [3.0], [9.0], [9.0]]], &device());
        let out = floats(Backward::new(&RunningSum { units: 1 }).forward(x, lengths(&[3])));
        assert_eq!(&out[..3], &[6.0, 5.0, 3.0]);
    }

    #[test]
    fn test_output_shapes_and_kinds() {
        let pointer = PositionPointer::<TB>::new(&device(), 6, 4);
        assert_eq!(Transform::<TB>::output_shape(&pointer, &[&[2, 9, 6], &[2]]), vec![2, 9]);
        assert_eq!(<PositionPointer<TB> as Transform<TB>>::KIND, LayerKind::Parametric);

        assert_eq!(Transform::<TB>::output_shape(&WordInQuestionB, &[&[2, 5], &[2, 9], &[2]]), vec![2, 9, 1]);
        assert_eq!(<WordInQuestionB as Transform<TB>>::KIND, LayerKind::Functional);

        let lstm = LstmLayer::<TB>::new(&device(), 6, 3);
        let backward = Backward::new(&lstm);
        assert_eq!(Transform::<TB>::output_shape(&backward, &[&[2, 9, 6], &[2]]), vec![2, 9, 3]);
    }

    #[test]
    fn test_lstm_backward_shape() {
        let lstm = LstmLayer::<TB>::new(&device(), 2, 3);
        let x = Tensor::<TB, 3>::ones([2, 4, 2], &device());
        let out = Transform::<TB>::transform(&Backward::new(&lstm), (x, lengths(&[4, 2])));
        assert_eq!(out.dims(), [2, 4, 3]);
    }

    const POOL_DIM: usize = 2;

    fn rows_tensor(values: &[f32], seq_len: usize) -> Tensor<TB, 3> {
        Tensor::<TB, 1>::from_floats(values, &device()).reshape([1, seq_len, POOL_DIM])
    }

    proptest! {
        #[test]
        fn prop_weighted_sum_ignores_padding(
            valid in prop::collection::vec(-3.0f32..3.0, POOL_DIM..=6 * POOL_DIM),
            garbage in prop::collection::vec(-1e3f32..1e3, 0..=5 * POOL_DIM),
        ) {
            let layer = WeightedSum::<TB>::new(&device(), POOL_DIM);
            let len = valid.len() / POOL_DIM;
            let pads = garbage.len() / POOL_DIM;
            let valid = &valid[..len * POOL_DIM];
            let garbage = &garbage[..pads * POOL_DIM];
            let padded: Vec<f32> = valid.iter().chain(garbage.iter()).copied().collect();

            let short = floats(layer.forward(rows_tensor(valid, len), lengths(&[len as i64])));
            let long = floats(layer.forward(rows_tensor(&padded, len + pads), lengths(&[len as i64])));
            for (a, b) in short.iter().zip(long.iter()) {
                prop_assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
            }

            let alpha = floats(layer.attention(rows_tensor(&padded, len + pads), lengths(&[len as i64])));
            let total: f32 = alpha[..len].iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-5);
            prop_assert!(alpha[len..].iter().all(|a| *a == 0.0));
        }
    }
}
