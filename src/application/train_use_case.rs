// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Load vocabulary + tokenizer       (Layer 6 - infra)
//   Step 2: Load optional embeddings          (Layer 6 - infra)
//   Step 3: Read train / dev records          (Layer 4 - data)
//   Step 4: Convert to padded samples         (Layer 4 - data)
//   Step 5: Build or resume the model         (Layer 5 - ml)
//   Step 6: Save config for evaluate / ask    (Layer 6 - infra)
//   Step 7: Attach callbacks and train        (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::{
    backend::{Autodiff, NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    optim::AdamConfig,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

use crate::data::{
    batcher::QaBatcher,
    converter::SquadConverter,
    dataset::{EvalDataset, QaDataset},
    reader::SquadReader,
    splitter::split_train_dev,
};
use crate::domain::{squad::SquadRecord, traits::RecordSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    vocab_store::VocabStore,
};
use crate::ml::{
    callbacks::{LrScheduler, Plateau, StepCheckpoint},
    context::ExecutionContext,
    model::{FastQa, FastQaConfig},
    trainer::{TrainPlan, Trainer},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings of a run. Saved next to the checkpoints so evaluate,
// ask and resume can rebuild exactly the same model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_path:     String,
    /// Separate dev file; without one `train_fraction` of train is held out
    pub dev_path:       Option<String>,
    /// Reference answers for dev F1; defaults to the dev file itself
    pub answer_path:    Option<String>,
    pub vocab_path:     String,
    pub checkpoint_dir: String,
    pub epochs:         usize,
    pub batch_size:     usize,
    pub embed_size:     usize,
    pub hidden_size:    usize,
    pub dropout:        f64,
    pub question_limit: usize,
    pub context_limit:  usize,
    /// Interval (in steps) for dev F1 evaluation and step checkpoints
    pub steps:          usize,
    pub learning_rate:  f64,
    pub min_lr:         f64,
    pub patience:       usize,
    pub max_answer_len: usize,
    pub train_fraction: f64,
    pub seed:           u64,
    pub features:       bool,
    pub debug:          bool,
    pub resume:         bool,
    pub cpu:            bool,
    /// Filled in from the vocabulary file at the start of a run
    #[serde(default)]
    pub vocab_size:     usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_path:     "data/train-v1.1.json".to_string(),
            dev_path:       None,
            answer_path:    None,
            vocab_path:     "data/vocab_squad.json".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            epochs:         100,
            batch_size:     32,
            embed_size:     300,
            hidden_size:    300,
            dropout:        0.5,
            question_limit: 50,
            context_limit:  650,
            steps:          1000,
            learning_rate:  1e-3,
            min_lr:         1e-5,
            patience:       1,
            max_answer_len: 30,
            train_fraction: 0.9,
            seed:           42,
            features:       true,
            debug:          false,
            resume:         false,
            cpu:            false,
            vocab_size:     0,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> FastQaConfig {
        FastQaConfig::new(
            self.vocab_size,
            self.embed_size,
            self.hidden_size,
            self.question_limit,
            self.context_limit,
        )
        .with_dropout(self.dropout)
        .with_features(self.features)
    }

    /// True when a checkpoint written under `other` fits a model built from `self`.
    pub fn same_architecture(&self, other: &TrainConfig) -> bool {
        self.vocab_size == other.vocab_size
            && self.embed_size == other.embed_size
            && self.hidden_size == other.hidden_size
            && self.features == other.features
    }
}

/// Reference answers of in-memory records, keyed by question id.
fn answer_texts(records: &[SquadRecord]) -> HashMap<String, Vec<String>> {
    records
        .iter()
        .map(|r| (r.id.clone(), r.answers.iter().map(|a| a.text.clone()).collect()))
        .collect()
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&mut self) -> Result<()> {
        if self.config.cpu {
            tracing::info!("Using NdArray CPU backend");
            self.run::<Autodiff<NdArray>>(Default::default())
        } else {
            let device = burn::backend::wgpu::WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            self.run::<Autodiff<Wgpu>>(device)
        }
    }

    fn run<B: AutodiffBackend>(&mut self, device: B::Device) -> Result<()> {
        // ── Step 1: Vocabulary ────────────────────────────────────────────────
        let store = VocabStore::new(&self.config.vocab_path);
        let (tokenizer, vocab) = store.load()?;
        self.config.vocab_size = vocab.len();
        let cfg = &self.config;

        // ── Step 2: Pretrained embeddings ─────────────────────────────────────
        let embeddings = store.load_embeddings(vocab.len())?;
        if let Some(e) = &embeddings {
            if e.dim != cfg.embed_size {
                bail!(
                    "Pretrained embeddings have dimension {} but --embed is {}",
                    e.dim,
                    cfg.embed_size
                );
            }
        }

        // ── Step 3: Records ───────────────────────────────────────────────────
        let train_records = SquadReader::new(&cfg.train_path).records()?;
        let (train_records, dev_records, answers) = match &cfg.dev_path {
            Some(dev_path) => {
                let dev_records = SquadReader::new(dev_path).records()?;
                let answer_path = cfg.answer_path.as_deref().unwrap_or(dev_path);
                let answers = SquadReader::new(answer_path).answer_texts()?;
                (train_records, dev_records, answers)
            }
            None => {
                let (train, dev) = split_train_dev(train_records, cfg.train_fraction, cfg.seed);
                let answers = answer_texts(&dev);
                (train, dev, answers)
            }
        };
        tracing::info!("{} train records, {} dev records", train_records.len(), dev_records.len());

        // ── Step 4: Samples ───────────────────────────────────────────────────
        let converter = SquadConverter::new(&tokenizer, cfg.question_limit, cfg.context_limit);
        let train_samples = converter.convert_all(&train_records)?;
        let dev_samples = converter.convert_all(&dev_records)?;
        let eval_samples = converter.convert_eval_all(&dev_records)?;

        // ── Step 5: Model ─────────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;
        let model_cfg = cfg.model_config();
        let model: FastQa<B> = match embeddings {
            Some(e) => {
                let weights = Tensor::<B, 1>::from_floats(e.values.as_slice(), &device).reshape([e.rows, e.dim]);
                model_cfg.init_with_embeddings(weights, &device)
            }
            None => model_cfg.init(&device),
        };

        let (model, start_epoch, start_step) = if cfg.resume {
            let saved = ckpt.load_config()?;
            if !saved.same_architecture(cfg) {
                bail!(
                    "Cannot resume: '{}' was trained with a different architecture",
                    cfg.checkpoint_dir
                );
            }
            let (model, info) = ckpt.load_latest(model, &device)?;
            (model, info.epoch, info.step)
        } else {
            (model, 0, 0)
        };

        // ── Step 6: Config ────────────────────────────────────────────────────
        ckpt.save_config(cfg)?;

        // ── Step 7: Train ─────────────────────────────────────────────────────
        let eval_loader = DataLoaderBuilder::new(QaBatcher::<B::InnerBackend>::new(device.clone()))
            .batch_size(cfg.batch_size)
            .num_workers(1)
            .build(EvalDataset::new(eval_samples));

        let mut trainer = Trainer::new(
            ExecutionContext::new(device).with_inspector(cfg.debug),
            AdamConfig::new().with_epsilon(1e-8).init(),
            ckpt,
            MetricsLogger::new(Path::new(&cfg.checkpoint_dir))?,
        );
        trainer.add_callback(LrScheduler::<B>::new(
            cfg.steps,
            Plateau::new(cfg.patience, cfg.min_lr),
            eval_loader,
            answers,
            cfg.max_answer_len,
        ));
        trainer.add_callback(StepCheckpoint::new(CheckpointManager::new(&cfg.checkpoint_dir)?, cfg.steps));

        let plan = TrainPlan {
            epochs: cfg.epochs,
            batch_size: cfg.batch_size,
            learning_rate: cfg.learning_rate,
            seed: cfg.seed,
            start_epoch,
            start_step,
        };
        trainer.fit(model, QaDataset::new(train_samples), QaDataset::new(dev_samples), &plan)?;
        Ok(())
    }
}
