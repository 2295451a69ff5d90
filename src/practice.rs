use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ai_providers::GenerationOptions;
use crate::config::PracticeConfig;
use crate::errors::{AiError, DomainError};
use crate::gateway::CompletionGateway;
use crate::interpreter::{self, Interpretation};
use crate::models::{GeneratedSentence, QuizType, UserSettings, Word};
use crate::prompts::{self, FillEvaluationParams};
use crate::vocab_store::{PracticeAttempt, VocabularyStore};

pub const BLANK: &str = "____";

const CHOICE_OPTION_COUNT: usize = 4;

/// Lifecycle of a single question. Only ever moves forward.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum QuestionState {
    Unanswered,
    AwaitingEvaluation,
    Evaluated,
    Advanced,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub is_correct: bool,
    pub score: u32,
    pub feedback: String,
    pub correct_answer: String,
    pub user_answer: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub word_id: Uuid,
    pub quiz_type: QuizType,
    /// What the learner sees: the word, a blanked sentence, or a sentence to translate
    pub prompt: String,
    pub hint: Option<String>,
    /// Multiple-choice meanings; empty for the other quiz types
    pub options: Vec<String>,
    pub state: QuestionState,
    pub result: Option<AnswerResult>,
    #[serde(skip_serializing)]
    pub target_word: String,
    #[serde(skip_serializing)]
    pub meaning: String,
    #[serde(skip_serializing)]
    pub expected_answer: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub score: usize,
    pub total: usize,
    pub answered: usize,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub summary: SessionSummary,
    pub next_question: Option<QuizQuestion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    pub id: Uuid,
    pub quiz_type: QuizType,
    pub questions: Vec<QuizQuestion>,
    pub current_index: usize,
    pub score: usize,
    pub finished: bool,
    pub created_at: DateTime<Utc>,
}

impl QuizSession {
    pub fn new(quiz_type: QuizType, questions: Vec<QuizQuestion>) -> Self {
        let finished = questions.is_empty();
        Self {
            id: Uuid::new_v4(),
            quiz_type,
            questions,
            current_index: 0,
            score: 0,
            finished,
            created_at: Utc::now(),
        }
    }

    pub fn current(&self) -> Option<&QuizQuestion> {
        if self.finished {
            return None;
        }
        self.questions.get(self.current_index)
    }

    fn current_mut(&mut self) -> Result<&mut QuizQuestion, DomainError> {
        if self.finished {
            return Err(DomainError::InvalidState(
                "Practice session is already finished".to_string(),
            ));
        }
        self.questions
            .get_mut(self.current_index)
            .ok_or_else(|| {
                DomainError::InvalidState("Practice session has no current question".to_string())
            })
    }

    /// `Unanswered -> AwaitingEvaluation`; any other state rejects the submission
    pub fn begin_evaluation(&mut self) -> Result<QuizQuestion, DomainError> {
        let question = self.current_mut()?;
        match question.state {
            QuestionState::Unanswered => {
                question.state = QuestionState::AwaitingEvaluation;
                Ok(question.clone())
            }
            QuestionState::AwaitingEvaluation => Err(DomainError::InvalidState(
                "This answer is still being evaluated".to_string(),
            )),
            QuestionState::Evaluated | QuestionState::Advanced => Err(DomainError::InvalidState(
                "This question has already been answered".to_string(),
            )),
        }
    }

    /// `AwaitingEvaluation -> Evaluated`, counting the point when the answer passed
    pub fn complete_evaluation(&mut self, result: AnswerResult) -> Result<(), DomainError> {
        let question = self.current_mut()?;
        if question.state != QuestionState::AwaitingEvaluation {
            return Err(DomainError::InvalidState("No evaluation in progress".to_string()));
        }

        let passed = result.is_correct;
        question.state = QuestionState::Evaluated;
        question.result = Some(result);
        if passed {
            self.score += 1;
        }
        Ok(())
    }

    /// Evaluation produced no verdict; the learner may submit again
    pub fn abort_evaluation(&mut self) {
        if let Ok(question) = self.current_mut() {
            if question.state == QuestionState::AwaitingEvaluation {
                question.state = QuestionState::Unanswered;
            }
        }
    }

    /// `Evaluated -> Advanced`, then step to the next question or finish
    pub fn advance(&mut self) -> Result<SessionProgress, DomainError> {
        let question = self.current_mut()?;
        if question.state != QuestionState::Evaluated {
            return Err(DomainError::InvalidState(
                "Answer the current question before moving on".to_string(),
            ));
        }
        question.state = QuestionState::Advanced;

        self.current_index += 1;
        if self.current_index >= self.questions.len() {
            self.finished = true;
        }

        Ok(SessionProgress {
            summary: self.summary(),
            next_question: self.current().cloned(),
        })
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            score: self.score,
            total: self.questions.len(),
            answered: self.questions.iter().filter(|q| q.result.is_some()).count(),
            finished: self.finished,
        }
    }
}

/// Case-insensitive patterns for `word`, tightest first: the exact form,
/// its regular inflections, then any longer word built on it.
fn word_patterns(word: &str) -> Vec<Regex> {
    let word = word.trim();
    if word.is_empty() {
        return Vec::new();
    }

    let escaped = regex::escape(word);
    let mut inflected = format!(r"{}(?:s|es|d|ed|ing|ly)", escaped);
    if let Some(stem) = word.strip_suffix('e').filter(|stem| !stem.is_empty()) {
        inflected = format!(r"(?:{}|{}ing)", inflected, regex::escape(stem));
    }

    [
        format!(r"\b{}\b", escaped),
        format!(r"\b{}\b", inflected),
        format!(r"\b{}\w*\b", escaped),
    ]
    .iter()
    .filter_map(|pattern| RegexBuilder::new(pattern).case_insensitive(true).build().ok())
    .collect()
}

/// Replace one occurrence of `word` in `sentence` with the blank marker
pub fn blank_out(sentence: &str, word: &str) -> Option<String> {
    word_patterns(word)
        .into_iter()
        .find(|pattern| pattern.is_match(sentence))
        .map(|pattern| pattern.replace(sentence, BLANK).into_owned())
}

pub fn choice_question(word: &Word, all_words: &[Word]) -> QuizQuestion {
    let mut distractors: Vec<String> = Vec::new();
    for other in all_words {
        let meaning = other.meaning.trim();
        if other.id == word.id || meaning.is_empty() || meaning == word.meaning.trim() {
            continue;
        }
        if !distractors.iter().any(|d| d == meaning) {
            distractors.push(meaning.to_string());
        }
    }

    let mut rng = rand::thread_rng();
    distractors.shuffle(&mut rng);
    distractors.truncate(CHOICE_OPTION_COUNT - 1);

    let mut options = distractors;
    options.push(word.meaning.trim().to_string());
    options.shuffle(&mut rng);

    QuizQuestion {
        word_id: word.id,
        quiz_type: QuizType::Choice,
        prompt: word.word.clone(),
        hint: Some(word.part_of_speech.clone()).filter(|pos| !pos.is_empty()),
        options,
        state: QuestionState::Unanswered,
        result: None,
        target_word: word.word.clone(),
        meaning: word.meaning.clone(),
        expected_answer: word.meaning.trim().to_string(),
    }
}

pub fn grade_choice(question: &QuizQuestion, answer: &str) -> AnswerResult {
    let is_correct = answer.trim() == question.expected_answer;
    AnswerResult {
        is_correct,
        score: if is_correct { 100 } else { 0 },
        feedback: if is_correct {
            "Correct!".to_string()
        } else {
            format!("\"{}\" means: {}", question.target_word, question.expected_answer)
        },
        correct_answer: question.expected_answer.clone(),
        user_answer: answer.trim().to_string(),
    }
}

/// Quiz sessions over the word bank, graded locally or by the model
#[derive(Clone)]
pub struct PracticeService {
    gateway: CompletionGateway,
    store: VocabularyStore,
    sessions: Arc<Mutex<HashMap<Uuid, QuizSession>>>,
    config: PracticeConfig,
}

impl PracticeService {
    pub fn new(gateway: CompletionGateway, store: VocabularyStore, config: PracticeConfig) -> Self {
        Self {
            gateway,
            store,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> PracticeConfig {
        self.config
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<Uuid, QuizSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_session<R>(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut QuizSession) -> Result<R, DomainError>,
    ) -> Result<R> {
        let mut sessions = self.lock_sessions();
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("practice session", id))?;
        Ok(apply(session)?)
    }

    pub fn session(&self, id: Uuid) -> Option<QuizSession> {
        self.lock_sessions().get(&id).cloned()
    }

    /// Pick words (unmastered first) and prepare one question for each
    pub async fn start_session(
        &self,
        quiz_type: QuizType,
        count: Option<usize>,
        settings: &UserSettings,
    ) -> Result<QuizSession> {
        let count = count.unwrap_or(self.config.default_question_count);
        if count == 0 {
            return Err(
                DomainError::Validation("Question count must be greater than 0".to_string()).into()
            );
        }

        let words = self.store.words().await;
        if words.is_empty() {
            return Err(DomainError::Validation(
                "The word bank is empty. Extract words from a song first.".to_string(),
            )
            .into());
        }
        if quiz_type == QuizType::Choice && words.len() < 2 {
            return Err(DomainError::Validation(
                "Multiple choice needs at least two words".to_string(),
            )
            .into());
        }

        let mut pool: Vec<&Word> = words.iter().filter(|w| !w.mastered).collect();
        if pool.is_empty() {
            pool = words.iter().collect();
        }
        pool.shuffle(&mut rand::thread_rng());
        pool.truncate(count);

        let mut questions = Vec::with_capacity(pool.len());
        for word in pool {
            let question = match quiz_type {
                QuizType::Choice => choice_question(word, &words),
                QuizType::Fill => self.fill_question(word, settings).await,
                QuizType::Translate => self.translate_question(word, settings).await,
            };
            questions.push(question);
        }

        let session = QuizSession::new(quiz_type, questions);
        self.lock_sessions().insert(session.id, session.clone());

        info!(
            session_id = %session.id,
            quiz_type = quiz_type.as_str(),
            question_count = session.questions.len(),
            "Practice session started"
        );

        Ok(session)
    }

    async fn generate_sentence(
        &self,
        prompt: &str,
        settings: &UserSettings,
    ) -> Option<GeneratedSentence> {
        let options = GenerationOptions::new()
            .with_system(prompts::GENERATION_SYSTEM_PROMPT)
            .with_temperature(0.8);

        match self.gateway.complete(prompt, Some(settings), &options).await {
            Ok(text) => match interpreter::interpret_json::<GeneratedSentence>(&text) {
                Interpretation::Parsed(sentence) if !sentence.sentence.trim().is_empty() => {
                    Some(sentence)
                }
                _ => None,
            },
            Err(e) => {
                warn!(error = %e, "Question generation failed, using stored material");
                None
            }
        }
    }

    async fn fill_question(&self, word: &Word, settings: &UserSettings) -> QuizQuestion {
        let prompt = prompts::practice_sentence(&word.word, &word.meaning, &word.level);

        let generated = self
            .generate_sentence(&prompt, settings)
            .await
            .and_then(|g| {
                blank_out(&g.sentence, &word.word).map(|blanked| (blanked, g.translation))
            });

        let (sentence, translation) = match generated {
            Some(pair) => pair,
            None => {
                debug!(word_id = %word.id, "Falling back to the stored example sentence");
                let blanked = blank_out(&word.example, &word.word)
                    .unwrap_or_else(|| format!("{} ({})", BLANK, word.meaning));
                (blanked, word.example_translation.clone())
            }
        };

        QuizQuestion {
            word_id: word.id,
            quiz_type: QuizType::Fill,
            prompt: sentence,
            hint: Some(translation).filter(|t| !t.trim().is_empty()),
            options: Vec::new(),
            state: QuestionState::Unanswered,
            result: None,
            target_word: word.word.clone(),
            meaning: word.meaning.clone(),
            expected_answer: word.word.clone(),
        }
    }

    async fn translate_question(&self, word: &Word, settings: &UserSettings) -> QuizQuestion {
        let prompt = prompts::reverse_question(&word.word, &word.meaning);

        // The reference answer is only known when the question is stored material.
        let (sentence, expected_answer) = match self.generate_sentence(&prompt, settings).await {
            Some(generated) => (generated.sentence.trim().to_string(), String::new()),
            None if !word.example_translation.trim().is_empty() => {
                (word.example_translation.clone(), word.example.clone())
            }
            None => (word.meaning.clone(), word.word.clone()),
        };

        QuizQuestion {
            word_id: word.id,
            quiz_type: QuizType::Translate,
            prompt: sentence,
            hint: Some(word.word.clone()),
            options: Vec::new(),
            state: QuestionState::Unanswered,
            result: None,
            target_word: word.word.clone(),
            meaning: word.meaning.clone(),
            expected_answer,
        }
    }

    async fn evaluate(
        &self,
        question: &QuizQuestion,
        answer: &str,
        settings: &UserSettings,
    ) -> Result<AnswerResult, AiError> {
        let threshold = self.config.pass_threshold;

        let mut result = match question.quiz_type {
            QuizType::Choice => grade_choice(question, answer),
            QuizType::Fill => {
                let prompt = prompts::fill_blank_evaluation(&FillEvaluationParams {
                    sentence: &question.prompt,
                    translation: question.hint.as_deref().unwrap_or_default(),
                    expected: &question.target_word,
                    meaning: &question.meaning,
                    answer,
                });
                let options = GenerationOptions::new()
                    .with_system(prompts::EVALUATION_SYSTEM_PROMPT)
                    .with_temperature(0.1);
                let text = self.gateway.complete(&prompt, Some(settings), &options).await?;

                let verdict = interpreter::parse_evaluation(&text).unwrap_or_else(|e| {
                    warn!(
                        word_id = %question.word_id,
                        error = %e,
                        "Unreadable evaluation, scoring as a miss"
                    );
                    interpreter::default_verdict()
                });

                AnswerResult {
                    is_correct: verdict.is_correct,
                    score: verdict.score,
                    feedback: verdict.feedback,
                    correct_answer: question.expected_answer.clone(),
                    user_answer: answer.to_string(),
                }
            }
            QuizType::Translate => {
                let prompt = prompts::translation_evaluation(
                    &question.prompt,
                    &question.target_word,
                    answer,
                );
                let options = GenerationOptions::new()
                    .with_system(prompts::TRANSLATION_EVALUATION_SYSTEM_PROMPT)
                    .with_temperature(0.1);
                let text = self.gateway.complete(&prompt, Some(settings), &options).await?;

                let verdict = interpreter::parse_translation_verdict(&text, threshold);
                let correct_answer = if verdict.correct_answer.is_empty() {
                    question.expected_answer.clone()
                } else {
                    verdict.correct_answer
                };

                AnswerResult {
                    is_correct: verdict.is_correct,
                    score: verdict.score,
                    feedback: verdict.feedback,
                    correct_answer,
                    user_answer: answer.to_string(),
                }
            }
        };

        // The score decides, whatever the model claimed.
        result.is_correct = result.score >= threshold;
        Ok(result)
    }

    /// Grade the current question, record the attempt, and mark it evaluated
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        answer: &str,
        settings: &UserSettings,
    ) -> Result<AnswerResult> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(DomainError::Validation("Answer must not be empty".to_string()).into());
        }

        let question = self.with_session(session_id, |session| session.begin_evaluation())?;
        let pending = PendingEvaluation {
            service: self,
            session_id,
            settled: false,
        };

        let result = self.evaluate(&question, answer, settings).await?;

        let attempt = PracticeAttempt {
            word_id: question.word_id,
            quiz_type: question.quiz_type,
            passed: result.is_correct,
            prompt: question.prompt.clone(),
            user_answer: result.user_answer.clone(),
            correct_answer: result.correct_answer.clone(),
            score: result.score,
            feedback: result.feedback.clone(),
        };

        self.store.record_attempt(attempt).await?;
        self.with_session(session_id, |session| session.complete_evaluation(result.clone()))?;
        pending.settle();

        debug!(
            session_id = %session_id,
            word_id = %question.word_id,
            score = result.score,
            passed = result.is_correct,
            "Answer evaluated"
        );

        Ok(result)
    }

    pub async fn advance(&self, session_id: Uuid) -> Result<SessionProgress> {
        let progress = self.with_session(session_id, |session| session.advance())?;

        if progress.summary.finished {
            self.lock_sessions().remove(&session_id);
            self.store.record_session_completed().await?;
            info!(
                session_id = %session_id,
                score = progress.summary.score,
                total = progress.summary.total,
                "Practice session finished"
            );
        }

        Ok(progress)
    }
}

/// Holds a question in `AwaitingEvaluation`. Dropping it unsettled (an
/// evaluator error, or the request future being cancelled) hands the question
/// back to the learner.
struct PendingEvaluation<'a> {
    service: &'a PracticeService,
    session_id: Uuid,
    settled: bool,
}

impl PendingEvaluation<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingEvaluation<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(session) = self.service.lock_sessions().get_mut(&self.session_id) {
            session.abort_evaluation();
            debug!(session_id = %self.session_id, "Evaluation abandoned, question reopened");
        }
    }
}
