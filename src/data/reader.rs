// ============================================================
// Layer 4 — SQuAD Reader
// ============================================================
// Reads a SQuAD v1.1 JSON file and hands out flat records.
// The file is re-read on every `records()` call so the source is
// restartable without keeping two copies of the corpus around.

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::domain::squad::{SquadFile, SquadRecord};
use crate::domain::traits::RecordSource;

pub struct SquadReader {
    path: PathBuf,
}

impl SquadReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<SquadFile> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read SQuAD file '{}'", self.path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed SQuAD file '{}'", self.path.display()))
    }

    /// Reference answers keyed by question id.
    pub fn answer_texts(&self) -> Result<HashMap<String, Vec<String>>> {
        Ok(self.load()?.answer_texts())
    }
}

impl RecordSource for SquadReader {
    fn records(&self) -> Result<Vec<SquadRecord>> {
        let records = self.load()?.records();
        tracing::debug!("Read {} records from '{}'", records.len(), self.path.display());
        Ok(records)
    }
}
