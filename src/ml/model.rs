// ============================================================
// Layer 5 — FastQA Model
// ============================================================
// Extractive QA model built from the layers in `layers.rs`:
//
//   question ids ─ Embedding ─┬──────────────── ⊕ [1, 1] ─┐
//                             │                           │
//   context ids ── Embedding ─┴─ WIQ_b, WIQ_w ─ ⊕ ────────┤
//                                                         ▼
//                      shared encoder: LSTM ⊕ Backward(LSTM) → tanh(W·)
//                                                         │
//          Q ─ WeightedSum ─ z ──────────┐                │ C
//                                        ▼                ▼
//                 start = Pointer([C; z; C⊙z])
//                 s     = Argmax(start), h_s = IndexSelect(C, s)
//                 end   = Pointer([C; z; C⊙z; h_s; C⊙h_s])
//
// The module returns the two boundary distributions together
// with the argmax indices. The indices are auxiliary outputs
// and carry a zero loss weight.

use burn::{
    module::Param,
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::domain::vocabulary::PAD_ID;
use crate::ml::layers::{
    Argmax, Backward, IndexSelect, LstmLayer, PositionPointer, SequenceLayer, SequenceLength,
    WeightedSum, WordInQuestionB, WordInQuestionW,
};

/// Loss weights for (start, end, start_index, end_index).
pub const LOSS_WEIGHTS: [f64; 4] = [1.0, 1.0, 0.0, 0.0];

/// Probability clipping used by the cross-entropy on softmax outputs.
const PROB_EPSILON: f64 = 1e-7;

/// Number of lexical features appended to each embedding.
const FEATURE_COUNT: usize = 2;

#[derive(Config, Debug)]
pub struct FastQaConfig {
    pub vocab_size:     usize,
    pub embed_size:     usize,
    pub hidden_size:    usize,
    pub question_limit: usize,
    pub context_limit:  usize,
    #[config(default = 0.5)]
    pub dropout:        f64,
    #[config(default = true)]
    pub features:       bool,
}

impl FastQaConfig {
    /// Build a model with randomly initialised embeddings.
    pub fn init<B: Backend>(&self, device: &B::Device) -> FastQa<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.embed_size).init(device);
        self.assemble(embedding, device)
    }

    /// Build a model whose embedding table starts from `weights` [vocab, embed].
    pub fn init_with_embeddings<B: Backend>(&self, weights: Tensor<B, 2>, device: &B::Device) -> FastQa<B> {
        let [rows, cols] = weights.dims();
        assert_eq!(
            [rows, cols],
            [self.vocab_size, self.embed_size],
            "pretrained embedding shape does not match the vocabulary"
        );
        let mut embedding = EmbeddingConfig::new(self.vocab_size, self.embed_size).init(device);
        embedding.weight = Param::from_tensor(weights);
        self.assemble(embedding, device)
    }

    fn assemble<B: Backend>(&self, embedding: Embedding<B>, device: &B::Device) -> FastQa<B> {
        let hidden = self.hidden_size;
        let d_input = if self.features {
            self.embed_size + FEATURE_COUNT
        } else {
            self.embed_size
        };

        let wiq_w = self
            .features
            .then(|| WordInQuestionW::new(device, self.embed_size));

        FastQa {
            embedding,
            wiq_w,
            forward_rnn:      LstmLayer::new(device, d_input, hidden),
            backward_rnn:     LstmLayer::new(device, d_input, hidden),
            projection:       LinearConfig::new(2 * hidden, hidden).init(device),
            question_summary: WeightedSum::new(device, hidden),
            start_pointer:    PositionPointer::new(device, 3 * hidden, hidden),
            end_pointer:      PositionPointer::new(device, 5 * hidden, hidden),
            dropout:          DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct FastQa<B: Backend> {
    embedding:        Embedding<B>,
    wiq_w:            Option<WordInQuestionW<B>>,
    forward_rnn:      LstmLayer<B>,
    backward_rnn:     LstmLayer<B>,
    projection:       Linear<B>,
    question_summary: WeightedSum<B>,
    start_pointer:    PositionPointer<B>,
    end_pointer:      PositionPointer<B>,
    dropout:          Dropout,
}

#[derive(Debug, Clone)]
pub struct FastQaOutput<B: Backend> {
    /// P(start = j): [batch, context_len]
    pub start: Tensor<B, 2>,
    /// P(end = j | argmax start): [batch, context_len]
    pub end: Tensor<B, 2>,
    /// Auxiliary, [batch, 1]
    pub start_index: Tensor<B, 2, Int>,
    /// Auxiliary, [batch, 1]
    pub end_index: Tensor<B, 2, Int>,
}

impl<B: Backend> FastQa<B> {
    /// question_ids: [batch, q_len], context_ids: [batch, c_len]
    pub fn forward(&self, question_ids: Tensor<B, 2, Int>, context_ids: Tensor<B, 2, Int>) -> FastQaOutput<B> {
        let [batch, q_len] = question_ids.dims();
        let [_, c_len] = context_ids.dims();
        let device = context_ids.device();

        let lengths = SequenceLength { pad_id: PAD_ID as i64 };
        let question_len = lengths.forward(question_ids.clone());
        let context_len = lengths.forward(context_ids.clone());

        let question_emb = self.embedding.forward(question_ids.clone());
        let context_emb = self.embedding.forward(context_ids.clone());

        let (question_in, context_in) = match &self.wiq_w {
            Some(wiq_w) => {
                let wiq_b = WordInQuestionB.forward(question_ids, context_ids, context_len.clone());
                let wiq_w = wiq_w.forward(
                    question_emb.clone(),
                    context_emb.clone(),
                    question_len.clone(),
                    context_len.clone(),
                );
                // Every question word trivially occurs in the question.
                let question_features = Tensor::ones([batch, q_len, FEATURE_COUNT], &device);
                (
                    Tensor::cat(vec![self.dropout.forward(question_emb), question_features], 2),
                    Tensor::cat(vec![self.dropout.forward(context_emb), wiq_b, wiq_w], 2),
                )
            }
            None => (self.dropout.forward(question_emb), self.dropout.forward(context_emb)),
        };

        let question = self.encode(question_in, question_len.clone());
        let context = self.encode(context_in, context_len.clone());
        let [_, _, hidden] = context.dims();

        let summary = self
            .question_summary
            .forward(question, question_len)
            .unsqueeze_dim::<3>(1)
            .expand([batch, c_len, hidden]);

        let start_input = Tensor::cat(
            vec![context.clone(), summary.clone(), context.clone() * summary.clone()],
            2,
        );
        let start = self.start_pointer.forward(start_input, context_len.clone());
        let start_index = Argmax.forward(start.clone());

        let at_start = IndexSelect
            .forward(context.clone(), start_index.clone())
            .unsqueeze_dim::<3>(1)
            .expand([batch, c_len, hidden]);
        let end_input = Tensor::cat(
            vec![
                context.clone(),
                summary.clone(),
                context.clone() * summary,
                at_start.clone(),
                context * at_start,
            ],
            2,
        );
        let end = self.end_pointer.forward(end_input, context_len);
        let end_index = Argmax.forward(end.clone());

        FastQaOutput { start, end, start_index, end_index }
    }

    /// Shared bidirectional encoder: [b, s, d_in] → [b, s, hidden]
    fn encode(&self, x: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Tensor<B, 3> {
        let left_to_right = self.forward_rnn.forward_sequence(x.clone());
        let right_to_left = Backward::new(&self.backward_rnn).forward(x, lengths);
        self.projection
            .forward(Tensor::cat(vec![left_to_right, right_to_left], 2))
            .tanh()
    }

    pub fn forward_loss(
        &self,
        question_ids:    Tensor<B, 2, Int>,
        context_ids:     Tensor<B, 2, Int>,
        start_positions: Tensor<B, 1, Int>,
        end_positions:   Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, FastQaOutput<B>) {
        let output = self.forward(question_ids, context_ids);
        let loss = span_cross_entropy(output.start.clone(), start_positions).mul_scalar(LOSS_WEIGHTS[0])
            + span_cross_entropy(output.end.clone(), end_positions).mul_scalar(LOSS_WEIGHTS[1]);
        (loss, output)
    }
}

/// Sparse categorical cross-entropy over an already normalised distribution.
pub fn span_cross_entropy<B: Backend>(probs: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    let [batch, _] = probs.dims();
    probs
        .gather(1, targets.reshape([batch, 1]))
        .clamp(PROB_EPSILON, 1.0 - PROB_EPSILON)
        .log()
        .neg()
        .mean()
}
