use anyhow::{Context, Result};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::database::Database;
use crate::errors::DomainError;
use crate::models::*;

// Import logging macros
use crate::log_store_operation;

/// Persisted collections, one key-value entry each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Words,
    Sources,
    Songs,
    Blacklist,
    WrongAnswers,
    Settings,
    Stats,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Words,
        Collection::Sources,
        Collection::Songs,
        Collection::Blacklist,
        Collection::WrongAnswers,
        Collection::Settings,
        Collection::Stats,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Collection::Words => "words",
            Collection::Sources => "sources",
            Collection::Songs => "songs",
            Collection::Blacklist => "blacklist",
            Collection::WrongAnswers => "wrong_answers",
            Collection::Settings => "settings",
            Collection::Stats => "stats",
        }
    }
}

/// In-memory mirror of everything in storage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub words: Vec<Word>,
    pub sources: Vec<Source>,
    pub songs: Vec<Song>,
    pub blacklist: Vec<BlacklistItem>,
    pub wrong_answers: Vec<WrongAnswer>,
    pub settings: UserSettings,
    pub stats: PracticeStats,
}

impl StoreSnapshot {
    fn encode(&self, collection: Collection) -> Result<String> {
        let raw = match collection {
            Collection::Words => serde_json::to_string(&self.words),
            Collection::Sources => serde_json::to_string(&self.sources),
            Collection::Songs => serde_json::to_string(&self.songs),
            Collection::Blacklist => serde_json::to_string(&self.blacklist),
            Collection::WrongAnswers => serde_json::to_string(&self.wrong_answers),
            Collection::Settings => serde_json::to_string(&self.settings),
            Collection::Stats => serde_json::to_string(&self.stats),
        };
        raw.with_context(|| format!("encoding '{}'", collection.key()))
    }

    fn decode(values: &HashMap<String, Option<String>>) -> Result<Self> {
        Ok(Self {
            words: decode_entry(values, Collection::Words)?,
            sources: decode_entry(values, Collection::Sources)?,
            songs: decode_entry(values, Collection::Songs)?,
            blacklist: decode_entry(values, Collection::Blacklist)?,
            wrong_answers: decode_entry(values, Collection::WrongAnswers)?,
            settings: decode_entry(values, Collection::Settings)?,
            stats: decode_entry(values, Collection::Stats)?,
        })
    }

    fn count_answer(&mut self, passed: bool) {
        self.stats.total_answered += 1;
        if passed {
            self.stats.total_correct += 1;
        }
        self.stats.last_practiced_at = Some(Utc::now());
    }

    fn resolve_wrong_answers(&mut self, word_id: Uuid, quiz_type: QuizType) -> usize {
        let before = self.wrong_answers.len();
        self.wrong_answers
            .retain(|w| !(w.word_id == word_id && w.quiz_type == quiz_type));
        before - self.wrong_answers.len()
    }

    fn append_wrong_answer(&mut self, attempt: PracticeAttempt) -> WrongAnswer {
        let entry = WrongAnswer {
            id: Uuid::new_v4(),
            word_id: attempt.word_id,
            user_answer: attempt.user_answer,
            correct_answer: attempt.correct_answer,
            prompt: attempt.prompt,
            score: attempt.score,
            feedback: attempt.feedback,
            quiz_type: attempt.quiz_type,
            created_at: Utc::now(),
        };
        self.wrong_answers.push(entry.clone());
        entry
    }
}

/// A missing key decodes to the type's default (empty collection, default settings)
fn decode_entry<T: DeserializeOwned + Default>(
    values: &HashMap<String, Option<String>>,
    collection: Collection,
) -> Result<T> {
    match values.get(collection.key()).and_then(|v| v.as_deref()) {
        Some(raw) => {
            serde_json::from_str(raw).with_context(|| format!("decoding '{}'", collection.key()))
        }
        None => Ok(T::default()),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    pub song: Song,
    pub new_words: Vec<Word>,
    pub reinforced_words: usize,
    pub sources_added: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDeletion {
    pub song: Song,
    pub sources_removed: usize,
    pub words_removed: Vec<Uuid>,
}

/// One graded quiz submission
#[derive(Debug, Clone)]
pub struct PracticeAttempt {
    pub word_id: Uuid,
    pub quiz_type: QuizType,
    pub passed: bool,
    pub prompt: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub score: u32,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub wrong_answer: Option<WrongAnswer>,
    pub resolved: usize,
    pub stats: PracticeStats,
}

/// Application state: typed collections mirrored to the key-value database.
///
/// Every mutation runs read-modify-write on a copy of the snapshot under a
/// single write lock, persists the touched collections in one transaction,
/// and only then publishes the new snapshot.
#[derive(Clone)]
pub struct VocabularyStore {
    db: Database,
    state: Arc<RwLock<StoreSnapshot>>,
    write_lock: Arc<Mutex<()>>,
}

impl VocabularyStore {
    /// Bulk-load every collection in one fan-out/fan-in wait
    pub async fn load(db: Database) -> Result<Self> {
        let keys: Vec<&str> = Collection::ALL.iter().map(|c| c.key()).collect();
        let values = db.get_many(&keys).await?;
        let snapshot = StoreSnapshot::decode(&values)?;

        log_store_operation!(debug, "load", count = snapshot.words.len());

        Ok(Self {
            db,
            state: Arc::new(RwLock::new(snapshot)),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn commit<R>(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&mut StoreSnapshot) -> Result<(R, Vec<Collection>)>,
    ) -> Result<R> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.state.read().await.clone();
        let (result, touched) = apply(&mut next)?;
        if touched.is_empty() {
            return Ok(result);
        }

        let started = Instant::now();
        let entries = touched
            .iter()
            .map(|collection| Ok((collection.key(), next.encode(*collection)?)))
            .collect::<Result<Vec<_>>>()?;

        if let Err(e) = self.db.put_many(&entries).await {
            log_store_operation!(error, operation, error = e);
            return Err(e);
        }

        *self.state.write().await = next;

        log_store_operation!(
            debug,
            operation,
            keys = touched.iter().map(|c| c.key()).collect::<Vec<_>>(),
            duration_ms = started.elapsed().as_millis() as u64
        );

        Ok(result)
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    // Words

    pub async fn words(&self) -> Vec<Word> {
        self.state.read().await.words.clone()
    }

    pub async fn word(&self, id: Uuid) -> Option<Word> {
        self.state.read().await.words.iter().find(|w| w.id == id).cloned()
    }

    pub async fn sources_for_word(&self, word_id: Uuid) -> Vec<Source> {
        self.state
            .read()
            .await
            .sources
            .iter()
            .filter(|s| s.word_id == word_id)
            .cloned()
            .collect()
    }

    pub async fn word_detail(&self, id: Uuid) -> Option<WordDetail> {
        let state = self.state.read().await;
        let word = state.words.iter().find(|w| w.id == id)?.clone();
        let sources = state.sources.iter().filter(|s| s.word_id == id).cloned().collect();
        Some(WordDetail { word, sources })
    }

    pub async fn toggle_mastered(&self, id: Uuid) -> Result<Word> {
        self.commit("toggle_mastered", |state| {
            let word = state
                .words
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or_else(|| DomainError::not_found("word", id))?;
            word.mastered = !word.mastered;
            Ok((word.clone(), vec![Collection::Words]))
        })
        .await
    }

    /// Remove a word together with its sources
    pub async fn delete_word(&self, id: Uuid) -> Result<Word> {
        self.commit("delete_word", |state| {
            let index = state
                .words
                .iter()
                .position(|w| w.id == id)
                .ok_or_else(|| DomainError::not_found("word", id))?;
            let word = state.words.remove(index);
            state.sources.retain(|s| s.word_id != id);
            Ok((word, vec![Collection::Words, Collection::Sources]))
        })
        .await
    }

    // Songs

    pub async fn songs(&self) -> Vec<Song> {
        self.state.read().await.songs.clone()
    }

    /// Store one extraction run: the song, new words, and sources for new and recurring words
    pub async fn record_extraction(
        &self,
        title: &str,
        lyrics: &str,
        extracted: &[ExtractedWord],
    ) -> Result<ExtractionRecord> {
        let title = title.trim().to_string();
        let lyrics = lyrics.to_string();

        self.commit("record_extraction", move |state| {
            let now = Utc::now();
            let song = Song {
                id: Uuid::new_v4(),
                title,
                lyrics,
                status: SongStatus::Completed,
                word_count: extracted.len(),
                created_at: now,
            };

            let mut new_words = Vec::new();
            let mut reinforced_words = 0;
            let mut sources_added = 0;

            for item in extracted {
                let key = item.normalized();
                if key.is_empty() {
                    continue;
                }

                let word_id = match state.words.iter().find(|w| w.normalized() == key) {
                    Some(existing) => {
                        reinforced_words += 1;
                        existing.id
                    }
                    None => {
                        let word = Word {
                            id: Uuid::new_v4(),
                            word: item.word.trim().to_string(),
                            meaning: item.meaning.trim().to_string(),
                            part_of_speech: item.pos.trim().to_string(),
                            example: item.example.trim().to_string(),
                            example_translation: item.example_zh.trim().to_string(),
                            level: item.level.trim().to_string(),
                            mastered: false,
                            created_at: now,
                        };
                        let id = word.id;
                        state.words.push(word.clone());
                        new_words.push(word);
                        id
                    }
                };

                let sentence = item.sentence_en.trim().to_string();
                let already_linked = state.sources.iter().any(|s| {
                    s.word_id == word_id && s.song_title == song.title && s.sentence == sentence
                });
                if already_linked {
                    continue;
                }

                let highlight = if item.replace_word.trim().is_empty() {
                    item.word.trim().to_string()
                } else {
                    item.replace_word.trim().to_string()
                };

                state.sources.push(Source {
                    id: Uuid::new_v4(),
                    word_id,
                    song_title: song.title.clone(),
                    sentence,
                    translation: item.sentence.trim().to_string(),
                    highlight,
                });
                sources_added += 1;
            }

            state.songs.push(song.clone());

            let record = ExtractionRecord {
                song,
                new_words,
                reinforced_words,
                sources_added,
            };
            Ok((record, vec![Collection::Songs, Collection::Words, Collection::Sources]))
        })
        .await
    }

    /// Delete a song, its sources (matched by title), and every word left without a source
    pub async fn delete_song(&self, id: Uuid) -> Result<SongDeletion> {
        self.commit("delete_song", |state| {
            let index = state
                .songs
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| DomainError::not_found("song", id))?;
            let song = state.songs.remove(index);

            let before = state.sources.len();
            state.sources.retain(|s| s.song_title != song.title);
            let sources_removed = before - state.sources.len();

            let referenced: HashSet<Uuid> = state.sources.iter().map(|s| s.word_id).collect();
            let words_removed: Vec<Uuid> = state
                .words
                .iter()
                .filter(|w| !referenced.contains(&w.id))
                .map(|w| w.id)
                .collect();
            state.words.retain(|w| referenced.contains(&w.id));

            let deletion = SongDeletion {
                song,
                sources_removed,
                words_removed,
            };
            Ok((deletion, vec![Collection::Songs, Collection::Sources, Collection::Words]))
        })
        .await
    }

    // Blacklist

    pub async fn blacklist(&self) -> Vec<BlacklistItem> {
        self.state.read().await.blacklist.clone()
    }

    pub async fn add_blacklist_word(&self, word: &str) -> Result<BlacklistItem> {
        let normalized = normalize_surface_form(word);
        if normalized.is_empty() {
            return Err(
                DomainError::Validation("Blacklist word must not be empty".to_string()).into()
            );
        }

        self.commit("add_blacklist_word", move |state| {
            if let Some(existing) = state.blacklist.iter().find(|b| b.word == normalized) {
                return Ok((existing.clone(), vec![]));
            }

            let item = BlacklistItem {
                id: Uuid::new_v4(),
                word: normalized,
            };
            state.blacklist.push(item.clone());
            Ok((item, vec![Collection::Blacklist]))
        })
        .await
    }

    pub async fn remove_blacklist_item(&self, id: Uuid) -> Result<BlacklistItem> {
        self.commit("remove_blacklist_item", |state| {
            let index = state
                .blacklist
                .iter()
                .position(|b| b.id == id)
                .ok_or_else(|| DomainError::not_found("blacklist item", id))?;
            Ok((state.blacklist.remove(index), vec![Collection::Blacklist]))
        })
        .await
    }

    // Practice

    pub async fn wrong_answers(&self) -> Vec<WrongAnswer> {
        self.state.read().await.wrong_answers.clone()
    }

    pub async fn record_wrong_answer(&self, attempt: PracticeAttempt) -> Result<WrongAnswer> {
        self.commit("record_wrong_answer", move |state| {
            let entry = state.append_wrong_answer(attempt);
            Ok((entry, vec![Collection::WrongAnswers]))
        })
        .await
    }

    /// Drop every logged miss for `word_id` under `quiz_type`
    pub async fn resolve_wrong_answers(&self, word_id: Uuid, quiz_type: QuizType) -> Result<usize> {
        self.commit("resolve_wrong_answers", |state| {
            let resolved = state.resolve_wrong_answers(word_id, quiz_type);
            let touched = if resolved > 0 { vec![Collection::WrongAnswers] } else { vec![] };
            Ok((resolved, touched))
        })
        .await
    }

    pub async fn record_practice_result(&self, passed: bool) -> Result<PracticeStats> {
        self.commit("record_practice_result", |state| {
            state.count_answer(passed);
            Ok((state.stats.clone(), vec![Collection::Stats]))
        })
        .await
    }

    /// Stats and the wrong-answer log for one submission, written together
    pub async fn record_attempt(&self, attempt: PracticeAttempt) -> Result<AttemptRecord> {
        self.commit("record_attempt", move |state| {
            state.count_answer(attempt.passed);

            let mut touched = vec![Collection::Stats];
            let mut wrong_answer = None;
            let mut resolved = 0;

            if attempt.passed {
                resolved = state.resolve_wrong_answers(attempt.word_id, attempt.quiz_type);
                if resolved > 0 {
                    touched.push(Collection::WrongAnswers);
                }
            } else {
                wrong_answer = Some(state.append_wrong_answer(attempt));
                touched.push(Collection::WrongAnswers);
            }

            let record = AttemptRecord {
                wrong_answer,
                resolved,
                stats: state.stats.clone(),
            };
            Ok((record, touched))
        })
        .await
    }

    pub async fn clear_wrong_answers(&self) -> Result<usize> {
        self.commit("clear_wrong_answers", |state| {
            let cleared = state.wrong_answers.len();
            state.wrong_answers.clear();
            Ok((cleared, vec![Collection::WrongAnswers]))
        })
        .await
    }

    pub async fn stats(&self) -> PracticeStats {
        self.state.read().await.stats.clone()
    }

    pub async fn record_session_completed(&self) -> Result<PracticeStats> {
        self.commit("record_session_completed", |state| {
            state.stats.sessions_completed += 1;
            Ok((state.stats.clone(), vec![Collection::Stats]))
        })
        .await
    }

    // Settings

    pub async fn settings(&self) -> UserSettings {
        self.state.read().await.settings.clone()
    }

    /// Replace the settings object wholesale
    pub async fn save_settings(&self, settings: UserSettings) -> Result<UserSettings> {
        self.commit("save_settings", move |state| {
            state.settings = settings;
            Ok((state.settings.clone(), vec![Collection::Settings]))
        })
        .await
    }
}
