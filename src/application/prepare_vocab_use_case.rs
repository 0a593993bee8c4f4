// ============================================================
// Layer 2 — PrepareVocabUseCase
// ============================================================
// Builds the vocabulary every other command depends on:
//
//   Step 1: Read the SQuAD training file            (Layer 4 - data)
//   Step 2: Count question + context tokens         (Layer 6 - infra)
//   Step 3: Keep frequent tokens, write tokenizer   (Layer 3 / 6)
//   Step 4: Optionally align GloVe vectors          (Layer 6 - infra)

use anyhow::Result;
use std::path::Path;

use crate::data::reader::SquadReader;
use crate::domain::{traits::RecordSource, vocabulary::Vocabulary};
use crate::infra::vocab_store::{count_tokens, embeddings_from_glove, VocabStore};

#[derive(Debug, Clone)]
pub struct PrepareVocabConfig {
    pub train_path: String,
    pub vocab_path: String,
    pub min_freq:   usize,
    pub max_size:   Option<usize>,
    pub lowercase:  bool,
    pub glove_path: Option<String>,
    pub seed:       u64,
}

pub struct PrepareVocabUseCase {
    config: PrepareVocabConfig,
}

impl PrepareVocabUseCase {
    pub fn new(config: PrepareVocabConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vocabulary> {
        let cfg = &self.config;
        let records = SquadReader::new(&cfg.train_path).records()?;
        let counts = count_tokens(&records, cfg.lowercase)?;
        tracing::info!("Counted {} distinct tokens over {} records", counts.len(), records.len());

        let vocab = Vocabulary::from_counts(&counts, cfg.min_freq, cfg.max_size);
        let store = VocabStore::new(&cfg.vocab_path);
        store.save(&vocab, cfg.lowercase)?;

        if let Some(glove) = &cfg.glove_path {
            let embeddings = embeddings_from_glove(Path::new(glove), &vocab, cfg.seed)?;
            store.save_embeddings(&embeddings)?;
        }
        Ok(vocab)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocabulary::{PAD_ID, UNK_ID};
    use std::fs;

    #[test]
    fn test_vocab_and_glove_written_next_to_each_other() {
        let dir = std::env::temp_dir().join(format!("fastqa-prepare-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let squad = serde_json::json!({
            "version": "1.1",
            "data": [{ "title": "Rust", "paragraphs": [{
                "context": "Rust was released in 2015. Rust is fast.",
                "qas": [{ "id": "q1", "question": "When was Rust released?",
                          "answers": [{ "text": "2015", "answer_start": 21 }] }]
            }]}]
        });
        let train_path = dir.join("train.json");
        fs::write(&train_path, squad.to_string()).unwrap();
        let glove_path = dir.join("glove.txt");
        fs::write(&glove_path, "rust 0.5 -0.5 1.0\nunrelated 1 1 1\n").unwrap();

        let vocab_path = dir.join("vocab_test.json");
        let vocab = PrepareVocabUseCase::new(PrepareVocabConfig {
            train_path: train_path.to_string_lossy().into_owned(),
            vocab_path: vocab_path.to_string_lossy().into_owned(),
            min_freq:   2,
            max_size:   None,
            lowercase:  true,
            glove_path: Some(glove_path.to_string_lossy().into_owned()),
            seed:       1,
        })
        .execute()
        .unwrap();

        // rust ×3, was ×2, released ×2, . ×2 survive min_freq = 2
        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.index("rust"), 2);
        assert_eq!(vocab.index("2015"), UNK_ID);

        let store = VocabStore::new(&vocab_path);
        let (_, loaded) = store.load().unwrap();
        assert_eq!(loaded, vocab);

        let embeddings = store.load_embeddings(vocab.len()).unwrap().unwrap();
        assert_eq!((embeddings.rows, embeddings.dim), (6, 3));
        let pad = PAD_ID as usize * 3;
        assert_eq!(&embeddings.values[pad..pad + 3], &[0.0, 0.0, 0.0][..]);
        let rust = vocab.index("rust") as usize * 3;
        assert_eq!(&embeddings.values[rust..rust + 3], &[0.5, -0.5, 1.0][..]);

        fs::remove_dir_all(dir).ok();
    }
}
