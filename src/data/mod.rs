// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a SQuAD JSON file and a tensor batch:
//
//   SQuAD JSON
//       │
//       ▼
//   SquadReader       → flat SquadRecords (restartable)
//       │
//       ▼
//   split_train_dev   → optional held-out dev records
//       │
//       ▼
//   SquadConverter    → padded QaSample / EvalSample
//       │
//       ▼
//   SampleDataset     → implements Burn's Dataset trait
//       │
//       ▼
//   QaBatcher         → QaBatch / EvalBatch tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads SQuAD v1.1 JSON files
pub mod reader;

/// Tokenises, aligns answers and pads records
pub mod converter;

/// Implements Burn's Dataset trait for converted samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded train/dev split of records
pub mod splitter;
