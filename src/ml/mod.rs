// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn-specific code lives here:
//
//   masking.rs    — lengths, masks and the additive softmax bias
//   layers.rs     — WeightedSum, word-in-question features, pointer,
//                   IndexSelect, Argmax, Backward
//   model.rs      — FastQA assembly and loss
//   context.rs    — device + optional numeric inspector for a run
//   trainer.rs    — step-driven training loop and its state machine
//   callbacks.rs  — F1-driven LR scheduler, step checkpoints
//   inferencer.rs — span decoding, dev-set scoring, single questions
//
// Reference: Weissenborn et al. (2017) Making Neural QA as Simple as
//            Possible but not Simpler

pub mod callbacks;
pub mod context;
pub mod inferencer;
pub mod layers;
pub mod masking;
pub mod model;
pub mod trainer;
