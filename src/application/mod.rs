// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: each use case tells the data, ml
// and infra layers what to do, in order. No tensor math and no
// printing here.

pub mod ask_use_case;
pub mod evaluate_use_case;
pub mod prepare_vocab_use_case;
pub mod train_use_case;
