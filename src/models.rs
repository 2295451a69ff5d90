use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::ai_providers::ProviderId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: Uuid,
    pub word: String,
    pub meaning: String,
    #[serde(default)]
    pub part_of_speech: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub example_translation: String,
    pub level: String, // B2, C1, C2
    #[serde(default)]
    pub mastered: bool,
    pub created_at: DateTime<Utc>,
}

impl Word {
    /// Case-insensitive key used to match the same surface form across songs
    pub fn normalized(&self) -> String {
        normalize_surface_form(&self.word)
    }
}

pub fn normalize_surface_form(word: &str) -> String {
    word.trim().to_lowercase()
}

/// One lyric line that produced or reinforced a word
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: Uuid,
    pub word_id: Uuid,
    pub song_title: String,
    pub sentence: String,
    pub translation: String,
    pub highlight: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SongStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: Uuid,
    pub title: String,
    pub lyrics: String,
    pub status: SongStatus,
    #[serde(default)]
    pub word_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlacklistItem {
    pub id: Uuid,
    pub word: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QuizType {
    Choice,
    Fill,
    Translate,
}

impl QuizType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizType::Choice => "choice",
            QuizType::Fill => "fill",
            QuizType::Translate => "translate",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WrongAnswer {
    pub id: Uuid,
    pub word_id: Uuid,
    pub user_answer: String,
    pub correct_answer: String,
    pub prompt: String,
    pub score: u32,
    pub feedback: String,
    pub quiz_type: QuizType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStyle {
    #[default]
    Natural,
    Literal,
    Poetic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiCredential {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
}

impl ApiCredential {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

/// Singleton settings object, always saved wholesale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub api_provider: Option<ProviderId>,
    #[serde(default)]
    pub deepseek: ApiCredential,
    #[serde(default)]
    pub openai: ApiCredential,
    #[serde(default)]
    pub gemini: ApiCredential,
    #[serde(default)]
    pub translation_style: TranslationStyle,
}

impl UserSettings {
    pub fn credential(&self, provider: ProviderId) -> &ApiCredential {
        match provider {
            ProviderId::DeepSeek => &self.deepseek,
            ProviderId::OpenAi => &self.openai,
            ProviderId::Gemini => &self.gemini,
        }
    }

    pub fn credential_mut(&mut self, provider: ProviderId) -> &mut ApiCredential {
        match provider {
            ProviderId::DeepSeek => &mut self.deepseek,
            ProviderId::OpenAi => &mut self.openai,
            ProviderId::Gemini => &mut self.gemini,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PracticeStats {
    pub total_answered: u64,
    pub total_correct: u64,
    pub sessions_completed: u64,
    pub last_practiced_at: Option<DateTime<Utc>>,
}

/// One vocabulary item as returned by the extraction prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedWord {
    pub word: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub level: String,
    /// Translation of the lyric line
    #[serde(default)]
    pub sentence: String,
    /// The lyric line as it appears in the song
    #[serde(default)]
    pub sentence_en: String,
    #[serde(default)]
    pub replace_word: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub example_zh: String,
}

impl ExtractedWord {
    pub fn normalized(&self) -> String {
        normalize_surface_form(&self.word)
    }
}

/// Verdict returned by the fill-in-blank evaluator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationVerdict {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_correct: bool,
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: u32,
    #[serde(default)]
    pub feedback: String,
}

/// Verdict parsed from the free-translation evaluator's text template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationVerdict {
    pub is_correct: bool,
    pub score: u32,
    pub correct_answer: String,
    pub feedback: String,
}

/// Sentence produced by the practice-sentence and reverse-question prompts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedSentence {
    pub sentence: String,
    #[serde(default)]
    pub translation: String,
}

/// Accepts `85`, `85.0` or `"85"` and clamps to 0..=100
fn lenient_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let score = match &value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => {
            s.trim().trim_end_matches("/100").trim().parse::<f64>().unwrap_or(0.0)
        }
        _ => 0.0,
    };
    Ok(score.round().clamp(0.0, 100.0) as u32)
}

/// Accepts `true`, `"true"`, `"yes"` or `1`; anything else reads as false
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match &value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        serde_json::Value::String(s) => {
            matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1")
        }
        _ => false,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub title: String,
    pub lyrics: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub lyrics: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistRequest {
    pub word: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub quiz_type: QuizType,
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordDetail {
    pub word: Word,
    pub sources: Vec<Source>,
}
