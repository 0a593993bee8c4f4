// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to checkpoints/metrics.csv:
//
//   epoch,step,train_loss,val_loss,learning_rate
//   1,1250,5.812000,5.431000,0.001000
//   2,2500,4.976000,4.802000,0.000500
//
// The header is written only when the file is new, so a resumed
// run keeps appending to the same log.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const HEADER: &str = "epoch,step,train_loss,val_loss,learning_rate";

#[derive(Debug, Clone)]
pub struct EpochMetrics {
    pub epoch:         usize,
    /// Global optimisation step at the end of the epoch
    pub step:          usize,
    pub train_loss:    f64,
    pub val_loss:      f64,
    pub learning_rate: f64,
}

impl EpochMetrics {
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }
        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6}",
            m.epoch, m.step, m.train_loss, m.val_loss, m.learning_rate,
        )?;
        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(epoch: usize, val_loss: f64) -> EpochMetrics {
        EpochMetrics { epoch, step: epoch * 10, train_loss: 2.5, val_loss, learning_rate: 1e-3 }
    }

    #[test]
    fn test_is_improvement() {
        let m = metrics(2, 2.3);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn test_rows_append_under_single_header() {
        let dir = std::env::temp_dir().join(format!("fastqa-metrics-{}", std::process::id()));
        let logger = MetricsLogger::new(&dir).unwrap();
        logger.log(&metrics(1, 3.0)).unwrap();
        // A second logger on the same directory must not repeat the header.
        MetricsLogger::new(&dir).unwrap().log(&metrics(2, 2.0)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("2,20,2.500000,2.000000,"));
        fs::remove_dir_all(dir).ok();
    }
}
