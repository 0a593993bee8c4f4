// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores the newest checkpoint on a SQuAD file:
//
//   Step 1: Load vocabulary + checkpoint   (Layer 6 / Layer 5)
//   Step 2: Convert every question         (Layer 4 - data)
//   Step 3: Decode spans, compute EM / F1  (Layer 5 / Layer 3)

use anyhow::Result;
use burn::{
    backend::{NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    prelude::*,
};

use crate::data::{dataset::EvalDataset, reader::SquadReader};
use crate::domain::evaluation::SquadScore;
use crate::infra::{checkpoint::CheckpointManager, vocab_store::VocabStore};
use crate::ml::inferencer::{evaluate_model, Inferencer};

pub struct EvaluateUseCase {
    pub data_path:      String,
    pub vocab_path:     String,
    pub checkpoint_dir: String,
    pub cpu:            bool,
}

impl EvaluateUseCase {
    pub fn execute(&self) -> Result<SquadScore> {
        if self.cpu {
            self.run::<NdArray>(Default::default())
        } else {
            self.run::<Wgpu>(burn::backend::wgpu::WgpuDevice::default())
        }
    }

    fn run<B: Backend>(&self, device: B::Device) -> Result<SquadScore> {
        let (tokenizer, _) = VocabStore::new(&self.vocab_path).load()?;
        let ckpt = CheckpointManager::new(&self.checkpoint_dir)?;
        let inferencer = Inferencer::<B>::from_checkpoint(&ckpt, tokenizer, device)?;

        let squad = SquadReader::new(&self.data_path).load()?;
        let samples = inferencer.converter().convert_eval_all(&squad.records())?;
        tracing::info!("Evaluating {} questions from '{}'", samples.len(), self.data_path);

        let loader = DataLoaderBuilder::new(inferencer.batcher())
            .batch_size(inferencer.config().batch_size)
            .num_workers(1)
            .build(EvalDataset::new(samples));

        evaluate_model(inferencer.model(), &loader, &squad.answer_texts(), inferencer.max_answer_len())
    }
}
