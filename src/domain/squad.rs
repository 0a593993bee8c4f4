// ============================================================
// Layer 3 — SQuAD Domain Types
// ============================================================
// The SQuAD v1.1 JSON layout nests questions three levels deep:
//
//   { "version": "1.1",
//     "data": [ { "title": ...,
//                 "paragraphs": [ { "context": "...",
//                                   "qas": [ { "id": "...",
//                                              "question": "...",
//                                              "answers": [ { "text": "...",
//                                                             "answer_start": 42 } ] } ] } ] } ] }
//
// Training and evaluation both want one flat record per question,
// which is what `SquadFile::records` produces. `answer_start` is a
// CHARACTER offset into the context, not a byte or token offset.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadFile {
    #[serde(default)]
    pub version: String,
    pub data:    Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title:      String,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub context: String,
    pub qas:     Vec<QuestionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub id:       String,
    pub question: String,
    #[serde(default)]
    pub answers:  Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text:         String,
    /// Character offset of the answer inside the context
    pub answer_start: usize,
}

/// One question with its context and reference answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadRecord {
    pub id:       String,
    pub question: String,
    pub context:  String,
    pub answers:  Vec<Answer>,
}

impl SquadRecord {
    /// The answer used as the training label (SQuAD train has exactly one).
    pub fn primary_answer(&self) -> Option<&Answer> {
        self.answers.first()
    }
}

impl SquadFile {
    /// Flatten articles → paragraphs → questions, in file order.
    pub fn records(&self) -> Vec<SquadRecord> {
        self.data
            .iter()
            .flat_map(|article| article.paragraphs.iter())
            .flat_map(|paragraph| {
                paragraph.qas.iter().map(move |qa| SquadRecord {
                    id:       qa.id.clone(),
                    question: qa.question.clone(),
                    context:  paragraph.context.clone(),
                    answers:  qa.answers.clone(),
                })
            })
            .collect()
    }

    /// Reference answer texts keyed by question id.
    pub fn answer_texts(&self) -> HashMap<String, Vec<String>> {
        self.data
            .iter()
            .flat_map(|article| article.paragraphs.iter())
            .flat_map(|paragraph| paragraph.qas.iter())
            .map(|qa| {
                let texts = qa.answers.iter().map(|a| a.text.clone()).collect();
                (qa.id.clone(), texts)
            })
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "1.1",
        "data": [{
            "title": "Rust",
            "paragraphs": [{
                "context": "Rust was first released in 2015.",
                "qas": [
                    {"id": "q1", "question": "When was Rust released?",
                     "answers": [{"text": "2015", "answer_start": 27}]},
                    {"id": "q2", "question": "What was released?",
                     "answers": [{"text": "Rust", "answer_start": 0},
                                 {"text": "Rust", "answer_start": 0}]}
                ]
            }]
        }]
    }"#;

    #[test]
    fn test_records_are_flattened_in_order() {
        let file: SquadFile = serde_json::from_str(SAMPLE).unwrap();
        let records = file.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "q1");
        assert_eq!(records[1].context, "Rust was first released in 2015.");

        let answer = records[0].primary_answer().unwrap();
        let start: String = records[0].context.chars().skip(answer.answer_start).take(4).collect();
        assert_eq!(start, "2015");
    }

    #[test]
    fn test_answer_texts_keep_duplicates() {
        let file: SquadFile = serde_json::from_str(SAMPLE).unwrap();
        let answers = file.answer_texts();
        assert_eq!(answers["q2"], vec!["Rust".to_string(), "Rust".to_string()]);
    }
}
