// ============================================================
// Layer 4 — SQuAD Converter
// ============================================================
// Turns a raw SquadRecord into fixed-length integer sequences.
//
//   context  "Rust was released in 2015."
//   tokens   [Rust] [was] [released] [in] [2015] [.]
//   offsets  (0,4) (5,8) (9,17)      (18,20) (21,25) (25,26)
//   answer   "2015" @ char 21  → bytes 21..25 → tokens 4..=4
//
// Training conversion is strict: records that are empty, longer
// than the configured limits, or whose answer cannot be mapped
// onto token boundaries are rejected and counted. Evaluation
// conversion keeps every record it can (truncating long inputs)
// so every question still receives a prediction.

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use tokenizers::Tokenizer;

use crate::data::dataset::{pad_to, EvalSample, QaSample};
use crate::domain::squad::{Answer, SquadRecord};

/// Token ids with the byte range each token covers in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenized {
    pub ids:     Vec<u32>,
    pub offsets: Vec<(usize, usize)>,
}

impl Tokenized {
    fn truncate(&mut self, len: usize) {
        self.ids.truncate(len);
        self.offsets.truncate(len);
    }
}

/// Why a record did not become a training sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rejection {
    EmptyQuestion,
    EmptyContext,
    QuestionTooLong,
    ContextTooLong,
    NoAnswer,
    UnalignedAnswer,
}

pub struct SquadConverter<'a> {
    tokenizer:        &'a Tokenizer,
    question_max_len: usize,
    context_max_len:  usize,
}

impl<'a> SquadConverter<'a> {
    pub fn new(tokenizer: &'a Tokenizer, question_max_len: usize, context_max_len: usize) -> Self {
        Self { tokenizer, question_max_len, context_max_len }
    }

    pub fn tokenize(&self, text: &str) -> Result<Tokenized> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
        Ok(Tokenized {
            ids:     encoding.get_ids().to_vec(),
            offsets: encoding.get_offsets().to_vec(),
        })
    }

    /// Strict conversion for training.
    pub fn convert(&self, record: &SquadRecord) -> Result<std::result::Result<QaSample, Rejection>> {
        let question = self.tokenize(&record.question)?;
        let context = self.tokenize(&record.context)?;

        if question.ids.is_empty() {
            return Ok(Err(Rejection::EmptyQuestion));
        }
        if context.ids.is_empty() {
            return Ok(Err(Rejection::EmptyContext));
        }
        if question.ids.len() > self.question_max_len {
            return Ok(Err(Rejection::QuestionTooLong));
        }
        if context.ids.len() > self.context_max_len {
            return Ok(Err(Rejection::ContextTooLong));
        }
        let Some(answer) = record.primary_answer() else {
            return Ok(Err(Rejection::NoAnswer));
        };
        let Some((start, end)) = align_answer(&record.context, &context.offsets, answer) else {
            return Ok(Err(Rejection::UnalignedAnswer));
        };

        Ok(Ok(QaSample {
            question_len:   question.ids.len(),
            context_len:    context.ids.len(),
            question_ids:   pad_to(question.ids, self.question_max_len),
            context_ids:    pad_to(context.ids, self.context_max_len),
            start_position: start,
            end_position:   end,
        }))
    }

    /// Convert every record, logging how many were rejected and why.
    pub fn convert_all(&self, records: &[SquadRecord]) -> Result<Vec<QaSample>> {
        let mut samples = Vec::with_capacity(records.len());
        let mut rejected: BTreeMap<Rejection, usize> = BTreeMap::new();

        for record in records {
            match self.convert(record)? {
                Ok(sample) => samples.push(sample),
                Err(reason) => *rejected.entry(reason).or_insert(0) += 1,
            }
        }

        if !rejected.is_empty() {
            tracing::warn!(
                "Kept {} of {} records; rejected {:?}",
                samples.len(),
                records.len(),
                rejected
            );
        }
        Ok(samples)
    }

    /// Lenient conversion for evaluation: long inputs are truncated,
    /// only records with an empty question or context are skipped.
    pub fn convert_eval(&self, record: &SquadRecord) -> Result<Option<EvalSample>> {
        let mut question = self.tokenize(&record.question)?;
        let mut context = self.tokenize(&record.context)?;
        if question.ids.is_empty() || context.ids.is_empty() {
            return Ok(None);
        }
        question.truncate(self.question_max_len);
        context.truncate(self.context_max_len);

        Ok(Some(EvalSample {
            id:           record.id.clone(),
            context:      record.context.clone(),
            offsets:      context.offsets,
            question_len: question.ids.len(),
            context_len:  context.ids.len(),
            question_ids: pad_to(question.ids, self.question_max_len),
            context_ids:  pad_to(context.ids, self.context_max_len),
        }))
    }

    pub fn convert_eval_all(&self, records: &[SquadRecord]) -> Result<Vec<EvalSample>> {
        let mut samples = Vec::with_capacity(records.len());
        for record in records {
            match self.convert_eval(record)? {
                Some(sample) => samples.push(sample),
                None => tracing::warn!("Skipping empty question or context for {}", record.id),
            }
        }
        Ok(samples)
    }
}

fn char_to_byte(text: &str, char_index: usize) -> Option<usize> {
    text.char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .nth(char_index)
}

/// Map an answer's character span onto (first, last) token indices.
pub fn align_answer(context: &str, offsets: &[(usize, usize)], answer: &Answer) -> Option<(usize, usize)> {
    let from = char_to_byte(context, answer.answer_start)?;
    let to = from + answer.text.len();
    if context.get(from..to)? != answer.text {
        return None;
    }

    let start = offsets.iter().position(|&(_, end)| end > from)?;
    let end = offsets.iter().rposition(|&(begin, _)| begin < to)?;
    (start <= end).then_some((start, end))
}
