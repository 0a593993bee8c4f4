// ============================================================
// Layer 3 — SQuAD v1.1 Metric
// ============================================================
// Reimplements the official evaluation script:
//
//   normalise(s) = collapse_ws(drop_articles(drop_punct(lower(s))))
//   EM(p, g)     = normalise(p) == normalise(g)
//   F1(p, g)     = harmonic mean of token precision / recall on
//                  the normalised, whitespace-split strings
//
// Each prediction is scored against every reference answer and
// the best score is kept; the totals are averaged and scaled to
// percentages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const ARTICLES: [&str; 3] = ["a", "an", "the"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SquadScore {
    pub exact_match: f64,
    pub f1:          f64,
    pub count:       usize,
}

pub fn normalize_answer(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_punct: String = lowered.chars().filter(|c| !c.is_ascii_punctuation()).collect();
    without_punct
        .split_whitespace()
        .filter(|word| !ARTICLES.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn exact_match_score(prediction: &str, ground_truth: &str) -> f64 {
    if normalize_answer(prediction) == normalize_answer(ground_truth) {
        1.0
    } else {
        0.0
    }
}

pub fn f1_score(prediction: &str, ground_truth: &str) -> f64 {
    let prediction = normalize_answer(prediction);
    let ground_truth = normalize_answer(ground_truth);
    let predicted: Vec<&str> = prediction.split_whitespace().collect();
    let reference: Vec<&str> = ground_truth.split_whitespace().collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &reference {
        *counts.entry(*token).or_insert(0) += 1;
    }
    let mut common = 0usize;
    for token in &predicted {
        if let Some(n) = counts.get_mut(token) {
            if *n > 0 {
                *n -= 1;
                common += 1;
            }
        }
    }

    if common == 0 {
        return 0.0;
    }
    let precision = common as f64 / predicted.len() as f64;
    let recall = common as f64 / reference.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

fn best_over<F>(metric: F, prediction: &str, ground_truths: &[String]) -> f64
where
    F: Fn(&str, &str) -> f64,
{
    ground_truths
        .iter()
        .map(|truth| metric(prediction, truth))
        .fold(0.0, f64::max)
}

/// Scores every question in `answers`; a missing prediction scores zero.
pub fn evaluate(predictions: &HashMap<String, String>, answers: &HashMap<String, Vec<String>>) -> SquadScore {
    let mut exact_match = 0.0;
    let mut f1 = 0.0;

    for (id, truths) in answers {
        let Some(prediction) = predictions.get(id) else {
            tracing::debug!("No prediction for question {}", id);
            continue;
        };
        exact_match += best_over(exact_match_score, prediction, truths);
        f1 += best_over(f1_score, prediction, truths);
    }

    let count = answers.len();
    let scale = if count > 0 { 100.0 / count as f64 } else { 0.0 };
    SquadScore {
        exact_match: exact_match * scale,
        f1:          f1 * scale,
        count,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_articles_and_punctuation() {
        assert_eq!(normalize_answer("The  Eiffel Tower!"), "eiffel tower");
        assert_eq!(normalize_answer("a U.S. state"), "us state");
    }

    #[test]
    fn test_f1_partial_overlap() {
        // 1 common token, precision 1/2, recall 1/1
        let f1 = f1_score("Denver Broncos", "Broncos");
        assert!((f1 - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(f1_score("Paris", "London"), 0.0);
    }

    #[test]
    fn test_evaluate_takes_best_reference_and_counts_missing() {
        let predictions: HashMap<String, String> =
            [("q1".to_string(), "the Broncos".to_string())].into_iter().collect();
        let answers: HashMap<String, Vec<String>> = [
            ("q1".to_string(), vec!["Denver Broncos".to_string(), "Broncos".to_string()]),
            ("q2".to_string(), vec!["Santa Clara".to_string()]),
        ]
        .into_iter()
        .collect();

        let score = evaluate(&predictions, &answers);
        assert_eq!(score.count, 2);
        assert!((score.exact_match - 50.0).abs() < 1e-9);
        assert!((score.f1 - 50.0).abs() < 1e-9);
    }
}
