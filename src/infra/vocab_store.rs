// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// The vocabulary is persisted as a HuggingFace tokenizer file with
// a WordLevel model, so one artifact gives us both the token ↔ id
// mapping and a tokenizer that reports byte offsets for each token
// (needed to map SQuAD character answers onto token spans).
//
// Layout next to the vocabulary file:
//
//   data/
//     vocab_squad.json             ← tokenizer.json format
//     embedding_vocab_squad.json   ← optional [vocab][dim] matrix
//
// A missing vocabulary is a configuration error: training never
// starts without one. Build it first with `prepare-vocab`.

use anyhow::{anyhow, bail, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::HashMap,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    str::FromStr,
};
use tokenizers::Tokenizer;

use crate::domain::squad::SquadRecord;
use crate::domain::vocabulary::{Vocabulary, PAD_ID, PAD_TOKEN, UNK_ID, UNK_TOKEN};

/// Half-width of the uniform range for words without a GloVe vector
const OOV_INIT_RANGE: f32 = 0.1;

/// Row-major [rows, dim] embedding matrix aligned with vocabulary ids.
#[derive(Debug, Clone, PartialEq)]
pub struct PretrainedEmbeddings {
    pub rows:   usize,
    pub dim:    usize,
    pub values: Vec<f32>,
}

impl PretrainedEmbeddings {
    fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map_or(0, Vec::len);
        if dim == 0 {
            bail!("Embedding matrix is empty");
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != dim) {
            bail!("Embedding row {} has {} values, expected {}", bad, rows[bad].len(), dim);
        }
        Ok(Self {
            rows:   rows.len(),
            dim,
            values: rows.into_iter().flatten().collect(),
        })
    }

    fn to_rows(&self) -> Vec<Vec<f32>> {
        self.values.chunks(self.dim).map(<[f32]>::to_vec).collect()
    }
}

/// Tokenizer JSON with a WordLevel model over `vocab`.
pub fn tokenizer_json(vocab: &Vocabulary, lowercase: bool) -> serde_json::Value {
    let normalizer = if lowercase {
        serde_json::json!({ "type": "Lowercase" })
    } else {
        serde_json::Value::Null
    };

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        // <pad>/<unk> live only in the model vocab: as added tokens they
        // would be matched in raw text and put a pad id mid-sequence.
        "added_tokens": [],
        "normalizer": normalizer,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab.token_to_index(),
            "unk_token": UNK_TOKEN
        }
    })
}

pub fn build_tokenizer(vocab: &Vocabulary, lowercase: bool) -> Result<Tokenizer> {
    let json = tokenizer_json(vocab, lowercase).to_string();
    Tokenizer::from_str(&json).map_err(|e| anyhow!("Cannot build tokenizer: {e}"))
}

/// Count question + context tokens over `records` using the same
/// pre-tokenisation the trained tokenizer will apply.
pub fn count_tokens(records: &[SquadRecord], lowercase: bool) -> Result<HashMap<String, usize>> {
    // With an empty vocabulary every pre-token becomes <unk>, but the
    // offsets still tell us where each word is.
    let splitter = build_tokenizer(&Vocabulary::from_tokens(Vec::<String>::new()), false)?;
    let mut counts: HashMap<String, usize> = HashMap::new();

    for record in records {
        for text in [&record.question, &record.context] {
            let encoding = splitter
                .encode(text.as_str(), false)
                .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
            for &(from, to) in encoding.get_offsets() {
                let word = &text[from..to];
                let word = if lowercase { word.to_lowercase() } else { word.to_string() };
                *counts.entry(word).or_insert(0) += 1;
            }
        }
    }
    Ok(counts)
}

pub struct VocabStore {
    path: PathBuf,
}

impl VocabStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the tokenizer and the vocabulary it carries.
    pub fn load(&self) -> Result<(Tokenizer, Vocabulary)> {
        if !self.path.exists() {
            bail!(
                "Vocabulary file '{}' not found. Run 'prepare-vocab' first.",
                self.path.display()
            );
        }
        let tokenizer = Tokenizer::from_file(&self.path)
            .map_err(|e| anyhow!("Cannot load vocabulary from '{}': {}", self.path.display(), e))?;
        let vocab = Vocabulary::from_index_map(tokenizer.get_vocab(true));
        if vocab.index(PAD_TOKEN) != PAD_ID || vocab.index(UNK_TOKEN) != UNK_ID {
            bail!("Vocabulary '{}' does not reserve ids 0/1 for pad/unk", self.path.display());
        }
        tracing::info!("Loaded vocabulary of {} tokens", vocab.len());
        Ok((tokenizer, vocab))
    }

    pub fn save(&self, vocab: &Vocabulary, lowercase: bool) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&tokenizer_json(vocab, lowercase))?)
            .with_context(|| format!("Cannot write vocabulary to '{}'", self.path.display()))?;
        tracing::info!("Vocabulary of {} tokens saved to '{}'", vocab.len(), self.path.display());
        Ok(())
    }

    /// `<dir>/embedding_<vocab stem>.json`
    pub fn embedding_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        dir.join(format!("embedding_{stem}.json"))
    }

    /// Pretrained embeddings, if the file exists. A matrix whose row
    /// count differs from the vocabulary is a configuration error.
    pub fn load_embeddings(&self, vocab_size: usize) -> Result<Option<PretrainedEmbeddings>> {
        let path = self.embedding_path();
        if !path.exists() {
            tracing::info!("No pretrained embeddings at '{}'; learning from scratch", path.display());
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read embeddings '{}'", path.display()))?;
        let rows: Vec<Vec<f32>> = serde_json::from_str(&json)
            .with_context(|| format!("Malformed embeddings '{}'", path.display()))?;
        let embeddings = PretrainedEmbeddings::from_rows(rows)?;
        if embeddings.rows != vocab_size {
            bail!(
                "Embeddings '{}' have {} rows but the vocabulary has {} tokens",
                path.display(),
                embeddings.rows,
                vocab_size
            );
        }
        tracing::info!("Loaded pretrained embeddings [{} x {}]", embeddings.rows, embeddings.dim);
        Ok(Some(embeddings))
    }

    pub fn save_embeddings(&self, embeddings: &PretrainedEmbeddings) -> Result<()> {
        let path = self.embedding_path();
        fs::write(&path, serde_json::to_string(&embeddings.to_rows())?)
            .with_context(|| format!("Cannot write embeddings to '{}'", path.display()))?;
        tracing::info!("Embeddings saved to '{}'", path.display());
        Ok(())
    }
}

/// Build an embedding matrix for `vocab` from a GloVe text file
/// (`word v1 v2 …` per line). Words without a vector get small
/// uniform random values; the pad row stays zero.
pub fn embeddings_from_glove(path: &Path, vocab: &Vocabulary, seed: u64) -> Result<PretrainedEmbeddings> {
    let file = fs::File::open(path).with_context(|| format!("Cannot open GloVe file '{}'", path.display()))?;

    let mut found: HashMap<u32, Vec<f32>> = HashMap::new();
    let mut dim = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line?;
        let mut parts = line.split(' ');
        let Some(word) = parts.next() else { continue };
        let index = vocab.index(word);
        if index == UNK_ID && word != UNK_TOKEN {
            continue;
        }
        let vector = parts
            .map(f32::from_str)
            .collect::<std::result::Result<Vec<f32>, _>>()
            .with_context(|| format!("Bad vector for '{word}' in '{}'", path.display()))?;
        if dim == 0 {
            dim = vector.len();
        }
        if vector.len() == dim {
            found.insert(index, vector);
        }
    }
    if dim == 0 {
        bail!("GloVe file '{}' contains no vectors for this vocabulary", path.display());
    }

    let covered = found.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let rows: Vec<Vec<f32>> = (0..vocab.len() as u32)
        .map(|index| match found.remove(&index) {
            Some(vector) => vector,
            None if index == PAD_ID => vec![0.0; dim],
            None => (0..dim).map(|_| rng.gen_range(-OOV_INIT_RANGE..OOV_INIT_RANGE)).collect(),
        })
        .collect();

    tracing::info!("GloVe covered {} of {} vocabulary entries", covered, vocab.len());
    PretrainedEmbeddings::from_rows(rows)
}
