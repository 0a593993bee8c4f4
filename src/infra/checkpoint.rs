// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores FastQA weights with Burn's CompactRecorder.
//
// Two kinds of checkpoint share one directory:
//
//   checkpoints/
//     fastqa.000500.mpk          ← every N optimisation steps
//     fastqa.03-4.12.mpk         ← end of epoch 3, dev loss 4.12
//     latest_checkpoint.json     ← {name, epoch, step} of the newest
//     train_config.json          ← hyperparameters to rebuild the model
//     metrics.csv
//
// The config is written before the first step so `evaluate`, `ask`
// and `train --resume` can rebuild the exact architecture before
// loading weights into it.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::FastQa;

const LATEST_FILE: &str = "latest_checkpoint.json";
const CONFIG_FILE: &str = "train_config.json";

/// Pointer to the newest checkpoint on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub name:  String,
    /// Epochs fully completed when the weights were written
    pub epoch: usize,
    pub step:  usize,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// `fastqa.{step:06}`
    pub fn step_name(step: usize) -> String {
        format!("fastqa.{step:06}")
    }

    /// `fastqa.{epoch:02}-{val_loss:.2}`
    pub fn epoch_name(epoch: usize, val_loss: f64) -> String {
        format!("fastqa.{epoch:02}-{val_loss:.2}")
    }

    pub fn save_step<B: Backend>(&self, model: &FastQa<B>, epoch: usize, step: usize) -> Result<CheckpointInfo> {
        self.save(model, CheckpointInfo { name: Self::step_name(step), epoch, step })
    }

    pub fn save_epoch<B: Backend>(
        &self,
        model: &FastQa<B>,
        epoch: usize,
        step: usize,
        val_loss: f64,
    ) -> Result<CheckpointInfo> {
        self.save(model, CheckpointInfo { name: Self::epoch_name(epoch, val_loss), epoch, step })
    }

    /// The recorder replaces everything after the last dot with its own
    /// extension, so the names (which contain dots) get it appended here.
    fn weights_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.mpk"))
    }

    fn save<B: Backend>(&self, model: &FastQa<B>, info: CheckpointInfo) -> Result<CheckpointInfo> {
        let path = self.weights_path(&info.name);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join(LATEST_FILE), serde_json::to_string(&info)?)
            .with_context(|| format!("Failed to write {LATEST_FILE}"))?;

        tracing::debug!("Saved checkpoint {}", info.name);
        Ok(info)
    }

    pub fn latest(&self) -> Result<CheckpointInfo> {
        let path = self.dir.join(LATEST_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Have you run 'train' first?", path.display())
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Restore the newest checkpoint into `model`, which must have the
    /// architecture the checkpoint was trained with.
    pub fn load_latest<B: Backend>(&self, model: FastQa<B>, device: &B::Device) -> Result<(FastQa<B>, CheckpointInfo)> {
        let info = self.latest()?;
        let path = self.weights_path(&info.name);
        tracing::info!("Loading checkpoint {} (epoch {}, step {})", info.name, info.epoch, info.step);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;
        Ok((model.load_record(record), info))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}
