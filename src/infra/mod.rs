// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence shared by training, evaluation and inference:
//
//   vocab_store.rs — vocabulary as a WordLevel tokenizer file,
//                    optional pretrained embedding matrix, and
//                    token counting / GloVe import for prepare-vocab
//
//   checkpoint.rs  — model weights via CompactRecorder plus the
//                    TrainConfig needed to rebuild the model
//
//   metrics.rs     — per-epoch CSV log

pub mod checkpoint;
pub mod metrics;
pub mod vocab_store;
