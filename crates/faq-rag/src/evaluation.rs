//! Offline answer-quality metrics
//!
//! Lexical scores only: fluency heuristic, ROUGE-1/2/L F1, word overlap and
//! length ratio between a reference answer and a generated one.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Sentence terminator, whitespace, then an uppercase letter
static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+[A-Z]").expect("valid sentence boundary regex"));

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("valid word regex"));

/// Metrics for one reference/prediction pair
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub reference: String,
    pub prediction: String,
    pub rouge1: f64,
    pub rouge2: f64,
    #[serde(rename = "rougeL")]
    pub rouge_l: f64,
    /// 1.0 to 5.0
    pub fluency_score: f64,
    pub length_ratio: f64,
    pub word_overlap: f64,
}

impl EvaluationReport {
    pub fn compute(reference: &str, prediction: &str) -> Self {
        let ref_tokens = tokenize_words(reference);
        let pred_tokens = tokenize_words(prediction);

        Self {
            reference: reference.to_string(),
            prediction: prediction.to_string(),
            rouge1: round3(rouge_n(&ref_tokens, &pred_tokens, 1)),
            rouge2: round3(rouge_n(&ref_tokens, &pred_tokens, 2)),
            rouge_l: round3(rouge_l(&ref_tokens, &pred_tokens)),
            fluency_score: fluency_score(prediction),
            length_ratio: length_ratio(reference, prediction),
            word_overlap: word_overlap(reference, prediction),
        }
    }
}

/// Split on `.`, `!` or `?` followed by whitespace and a capital letter
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // keep the terminator, drop the whitespace, start at the capital
        let end = boundary.start() + 1;
        sentences.push(&text[start..end]);
        start = boundary.end() - 1;
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lowercased word tokens
pub fn tokenize_words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Heuristic fluency on a 1-5 scale
///
/// Starts at 5. Average sentence length under 5 words costs 1.5, over 25
/// costs 1. Distinct-word ratio under 0.5 costs 1, over 0.8 earns 0.5.
pub fn fluency_score(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 1.0;
    }

    let sentences = split_into_sentences(text);
    let words = tokenize_words(text);
    if sentences.is_empty() || words.is_empty() {
        return 1.0;
    }

    let avg_sentence_length = words.len() as f64 / sentences.len() as f64;
    let distinct: HashSet<&String> = words.iter().collect();
    let variety = distinct.len() as f64 / words.len() as f64;

    let mut score: f64 = 5.0;
    if avg_sentence_length < 5.0 {
        score -= 1.5;
    } else if avg_sentence_length > 25.0 {
        score -= 1.0;
    }

    if variety < 0.5 {
        score -= 1.0;
    } else if variety > 0.8 {
        score += 0.5;
    }

    score.clamp(1.0, 5.0)
}

/// Share of distinct reference words that also appear in the prediction
pub fn word_overlap(reference: &str, prediction: &str) -> f64 {
    let ref_words: HashSet<String> = tokenize_words(reference).into_iter().collect();
    if ref_words.is_empty() {
        return 0.0;
    }
    let pred_words: HashSet<String> = tokenize_words(prediction).into_iter().collect();
    let overlap = ref_words.intersection(&pred_words).count();
    round3(overlap as f64 / ref_words.len() as f64)
}

/// Prediction length over reference length, in characters
pub fn length_ratio(reference: &str, prediction: &str) -> f64 {
    let reference_len = reference.chars().count().max(1);
    round3(prediction.chars().count() as f64 / reference_len as f64)
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

fn f1(overlap: usize, reference_total: usize, prediction_total: usize) -> f64 {
    if overlap == 0 || reference_total == 0 || prediction_total == 0 {
        return 0.0;
    }
    let precision = overlap as f64 / prediction_total as f64;
    let recall = overlap as f64 / reference_total as f64;
    2.0 * precision * recall / (precision + recall)
}

/// ROUGE-N F1 over clipped n-gram counts
pub fn rouge_n(reference: &[String], prediction: &[String], n: usize) -> f64 {
    let ref_counts = ngram_counts(reference, n);
    let pred_counts = ngram_counts(prediction, n);

    let overlap: usize = pred_counts
        .iter()
        .map(|(gram, count)| (*count).min(ref_counts.get(gram).copied().unwrap_or(0)))
        .sum();

    f1(
        overlap,
        ref_counts.values().sum(),
        pred_counts.values().sum(),
    )
}

/// ROUGE-L F1 from the longest common subsequence
pub fn rouge_l(reference: &[String], prediction: &[String]) -> f64 {
    f1(
        lcs_len(reference, prediction),
        reference.len(),
        prediction.len(),
    )
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        tokenize_words(text)
    }

    #[test]
    fn test_sentence_split() {
        let sentences = split_into_sentences("Roads are plowed daily. Call us! Is it open? yes it is.");
        assert_eq!(
            sentences,
            vec!["Roads are plowed daily.", "Call us!", "Is it open? yes it is."]
        );
        assert!(split_into_sentences("   ").is_empty());
    }

    #[test]
    fn test_fluency_high() {
        let text = "The Alaska Snow Department provides comprehensive snow removal services throughout the state.";
        assert!(fluency_score(text) >= 4.0);
    }

    #[test]
    fn test_fluency_low() {
        assert!(fluency_score("Snow snow snow. Snow snow snow.") <= 3.0);
        assert_eq!(fluency_score(""), 1.0);
    }

    #[test]
    fn test_word_overlap_and_length_ratio() {
        let reference = "Contact the Alaska Snow Department for road issues.";
        let prediction = "Contact the department.";
        // contact, the, department out of 8 distinct reference words
        assert_eq!(word_overlap(reference, prediction), 0.375);
        assert_eq!(word_overlap("", prediction), 0.0);
        assert_eq!(length_ratio("abcd", "ab"), 0.5);
        assert_eq!(length_ratio("", "ab"), 2.0);
    }

    #[test]
    fn test_rouge_scores() {
        let reference = tokens("the cat sat on the mat");
        let prediction = tokens("the cat sat on the mat");
        assert!((rouge_n(&reference, &prediction, 1) - 1.0).abs() < 1e-9);
        assert!((rouge_l(&reference, &prediction) - 1.0).abs() < 1e-9);

        let prediction = tokens("a dog ran");
        assert_eq!(rouge_n(&reference, &prediction, 1), 0.0);
        assert_eq!(rouge_l(&reference, &prediction), 0.0);

        // lcs("the cat sat", "the sat") = 2; p = 1, r = 2/3
        let reference = tokens("the cat sat");
        let prediction = tokens("the sat");
        assert!((rouge_l(&reference, &prediction) - 0.8).abs() < 1e-9);
        assert_eq!(rouge_n(&reference, &prediction, 2), 0.0);
    }

    #[test]
    fn test_report() {
        let report = EvaluationReport::compute(
            "Aurora Bay was founded in 1901.",
            "Aurora Bay was founded in 1901.",
        );
        assert_eq!(report.rouge1, 1.0);
        assert_eq!(report.rouge_l, 1.0);
        assert_eq!(report.word_overlap, 1.0);
        assert_eq!(report.length_ratio, 1.0);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("rougeL").is_some());
    }
}
