//! Pulls structured data out of free-text model output.
//!
//! Models are asked for JSON but routinely wrap it in prose or markdown
//! fences. The scanner here finds balanced `[...]` / `{...}` spans with a
//! bracket stack that understands JSON string literals, so nested payloads
//! are never cut short at the first closing bracket.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::errors::AiError;
use crate::models::{EvaluationVerdict, ExtractedWord, TranslationVerdict};

pub const GENERIC_EVALUATION_FEEDBACK: &str =
    "Unable to evaluate this answer automatically. Please try again.";

const SNIPPET_LIMIT: usize = 200;

/// Outcome of interpreting model output as JSON
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation<T> {
    Parsed(T),
    /// No bracketed span anywhere in the text
    Missing,
    /// A span was found but none of the candidates decoded as `T`
    Malformed { error: String, span: String },
}

impl<T> Interpretation<T> {
    /// Missing payloads fall back to `fallback`; malformed ones become an error
    pub fn or_fallback(self, fallback: T) -> Result<T, AiError> {
        match self {
            Interpretation::Parsed(value) => Ok(value),
            Interpretation::Missing => Ok(fallback),
            Interpretation::Malformed { error, span } => Err(AiError::MalformedOutput {
                reason: error,
                snippet: span.chars().take(SNIPPET_LIMIT).collect(),
            }),
        }
    }
}

/// First balanced bracket span, preferring the contents of a ```json fence
pub fn find_structured_span(text: &str) -> Option<&str> {
    candidate_spans(text).into_iter().next()
}

/// Every balanced top-level span, in order of appearance
pub fn candidate_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    if let Some(fenced) = fenced_block(text) {
        spans.extend(balanced_spans(fenced));
    }
    for span in balanced_spans(text) {
        if !spans.contains(&span) {
            spans.push(span);
        }
    }
    spans
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let end = text[start..].find("```")?;
    Some(text[start..start + end].trim())
}

fn closing_for(open: u8) -> u8 {
    if open == b'[' { b']' } else { b'}' }
}

/// Tries to close the span opened at `start`; returns its end index (inclusive)
fn match_span(bytes: &[u8], start: usize) -> Option<usize> {
    let mut stack = vec![closing_for(bytes[start])];
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start + 1..].iter().enumerate() {
        let index = start + 1 + offset;

        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => stack.push(closing_for(byte)),
            b']' | b'}' => {
                if stack.pop() != Some(byte) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(index);
                }
            }
            _ => {}
        }
    }

    None
}

fn balanced_spans(text: &str) -> Vec<&str> {
    // Brackets are ASCII, so byte offsets always land on char boundaries.
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut position = 0;

    while position < bytes.len() {
        if bytes[position] == b'[' || bytes[position] == b'{' {
            if let Some(end) = match_span(bytes, position) {
                spans.push(&text[position..=end]);
                position = end + 1;
                continue;
            }
        }
        position += 1;
    }

    spans
}

/// Decode the first candidate span that parses as `T`
pub fn interpret_json<T: DeserializeOwned>(text: &str) -> Interpretation<T> {
    let spans = candidate_spans(text);
    if spans.is_empty() {
        debug!(response_length = text.len(), "No structured span in model output");
        return Interpretation::Missing;
    }

    let mut first_failure: Option<(String, &str)> = None;
    for span in &spans {
        match serde_json::from_str::<T>(span) {
            Ok(value) => return Interpretation::Parsed(value),
            Err(e) => {
                if first_failure.is_none() {
                    first_failure = Some((e.to_string(), span));
                }
            }
        }
    }

    let (error, span) = first_failure.unwrap_or_default();
    warn!(
        candidate_count = spans.len(),
        error = %error,
        "Model output contained brackets but no decodable payload"
    );
    Interpretation::Malformed {
        error,
        span: span.to_string(),
    }
}

/// Vocabulary extraction: an array of word objects, empty when absent
pub fn parse_extracted_words(text: &str) -> Result<Vec<ExtractedWord>, AiError> {
    let words = interpret_json::<Vec<ExtractedWord>>(text).or_fallback(Vec::new())?;

    Ok(words
        .into_iter()
        .filter(|w| !w.word.trim().is_empty())
        .map(|mut w| {
            w.word = w.word.trim().to_string();
            w.level = w.level.trim().to_uppercase();
            w
        })
        .collect())
}

pub fn default_verdict() -> EvaluationVerdict {
    EvaluationVerdict {
        is_correct: false,
        score: 0,
        feedback: GENERIC_EVALUATION_FEEDBACK.to_string(),
    }
}

/// Fill-in-blank evaluation: `{isCorrect, score, feedback}`
pub fn parse_evaluation(text: &str) -> Result<EvaluationVerdict, AiError> {
    let mut verdict = interpret_json::<EvaluationVerdict>(text).or_fallback(default_verdict())?;
    if verdict.feedback.trim().is_empty() {
        verdict.feedback = GENERIC_EVALUATION_FEEDBACK.to_string();
    }
    Ok(verdict)
}

static SCORE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*\**score\**\s*[:：]\s*(\d{1,3})(?:\.\d+)?\s*/\s*100").unwrap()
});
static CORRECT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?mi)^\s*\**correct\**\s*[:：]\s*["“](.*?)["”]\s*$"#).unwrap()
});
static REASON_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*\**reason\**\s*[:：]\s*(.+?)\s*$").unwrap());

/// Free-translation evaluation: the `Score` / `Correct` / `Reason` template.
///
/// Each field is matched on its own; a missing field takes its default
/// rather than failing the whole parse.
pub fn parse_translation_verdict(text: &str, pass_threshold: u32) -> TranslationVerdict {
    let score = SCORE_LINE
        .captures(text)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map(|score| score.min(100))
        .unwrap_or(0);

    let correct_answer = CORRECT_LINE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default();

    let feedback = REASON_LINE
        .captures(text)
        .map(|caps| caps[1].to_string())
        .filter(|reason| !reason.is_empty())
        .unwrap_or_else(|| GENERIC_EVALUATION_FEEDBACK.to_string());

    TranslationVerdict {
        is_correct: score >= pass_threshold,
        score,
        correct_answer,
        feedback,
    }
}
