// ============================================================
// Layer 2 — AskUseCase
// ============================================================
// Answers a single question against a context passage with the
// newest checkpoint. The answer is always a substring of the
// context.

use anyhow::Result;
use burn::prelude::*;

use crate::domain::traits::QuestionAnswerer;
use crate::infra::{checkpoint::CheckpointManager, vocab_store::VocabStore};
use crate::ml::inferencer::Inferencer;

pub struct AskUseCase<B: Backend> {
    inferencer: Inferencer<B>,
}

impl<B: Backend> AskUseCase<B> {
    pub fn new(checkpoint_dir: &str, vocab_path: &str, device: B::Device) -> Result<Self> {
        let (tokenizer, _) = VocabStore::new(vocab_path).load()?;
        let ckpt = CheckpointManager::new(checkpoint_dir)?;
        let inferencer = Inferencer::from_checkpoint(&ckpt, tokenizer, device)?;
        Ok(Self { inferencer })
    }
}

impl<B: Backend> QuestionAnswerer for AskUseCase<B> {
    fn answer(&self, question: &str, context: &str) -> Result<String> {
        let answer = self.inferencer.predict(question, context)?;
        tracing::debug!("Q: '{}' → '{}'", question, answer);
        Ok(answer)
    }
}
