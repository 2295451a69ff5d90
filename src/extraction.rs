use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::ai_providers::GenerationOptions;
use crate::errors::DomainError;
use crate::gateway::{CompletionGateway, CompletionOutcome};
use crate::interpreter;
use crate::models::{ExtractedWord, Song, UserSettings, Word};
use crate::prompts::{self, ExtractionPromptParams};
use crate::vocab_store::VocabularyStore;

/// Output budget for one extraction round; a full batch of word entries is long
const EXTRACTION_MAX_TOKENS: u32 = 4096;

/// When the multi-round extraction loop stops asking for more words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionPolicy {
    pub max_rounds: usize,
    /// Items requested from the model per round
    pub batch_size: usize,
    /// A round yielding fewer new words than this ends the loop
    pub min_new_per_round: usize,
    pub max_total: usize,
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            batch_size: 20,
            min_new_per_round: 10,
            max_total: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub song: Song,
    pub words_added: Vec<Word>,
    pub words_reinforced: usize,
    pub sources_added: usize,
    pub rounds: usize,
}

#[derive(Clone)]
pub struct ExtractionService {
    gateway: CompletionGateway,
    store: VocabularyStore,
    policy: ExtractionPolicy,
}

impl ExtractionService {
    pub fn new(
        gateway: CompletionGateway,
        store: VocabularyStore,
        policy: ExtractionPolicy,
    ) -> Self {
        Self { gateway, store, policy }
    }

    pub fn policy(&self) -> ExtractionPolicy {
        self.policy
    }

    /// Run the extraction loop for one song and persist the result as a single write
    pub async fn extract(
        &self,
        title: &str,
        lyrics: &str,
        settings: &UserSettings,
    ) -> Result<ExtractionReport> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::Validation("Song title is required".to_string()).into());
        }
        if lyrics.trim().is_empty() {
            return Err(DomainError::Validation("Lyrics are required".to_string()).into());
        }

        let blacklist: Vec<String> = self
            .store
            .blacklist()
            .await
            .into_iter()
            .map(|item| item.word)
            .collect();

        let (collected, rounds) = self.collect_words(title, lyrics, settings, &blacklist).await?;
        let record = self.store.record_extraction(title, lyrics, &collected).await?;

        info!(
            song_id = %record.song.id,
            rounds = rounds,
            words_added = record.new_words.len(),
            words_reinforced = record.reinforced_words,
            sources_added = record.sources_added,
            "Extraction finished"
        );

        Ok(ExtractionReport {
            song: record.song,
            words_added: record.new_words,
            words_reinforced: record.reinforced_words,
            sources_added: record.sources_added,
            rounds,
        })
    }

    async fn collect_words(
        &self,
        title: &str,
        lyrics: &str,
        settings: &UserSettings,
        blacklist: &[String],
    ) -> Result<(Vec<ExtractedWord>, usize)> {
        let banned: HashSet<&str> = blacklist.iter().map(String::as_str).collect();
        let options = GenerationOptions::new()
            .with_system(prompts::EXTRACTION_SYSTEM_PROMPT)
            .with_temperature(0.3)
            .with_max_tokens(EXTRACTION_MAX_TOKENS);

        let mut collected: Vec<ExtractedWord> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut rounds = 0;

        while rounds < self.policy.max_rounds {
            rounds += 1;

            let exclude: Vec<String> = collected.iter().map(|w| w.word.clone()).collect();
            let prompt = prompts::vocabulary_extraction(&ExtractionPromptParams {
                lyrics,
                song_title: title,
                style: settings.translation_style,
                blacklist,
                exclude: &exclude,
                max_items: self.policy.batch_size,
            });

            let batch = match self.run_round(&prompt, settings, &options).await {
                Ok(batch) => batch,
                Err(e) if rounds == 1 => return Err(e),
                Err(e) => {
                    warn!(
                        round = rounds,
                        collected = collected.len(),
                        error = %e,
                        "Extraction round failed, keeping earlier rounds"
                    );
                    break;
                }
            };

            let mut fresh = 0;
            for word in batch {
                let key = word.normalized();
                if banned.contains(key.as_str()) || !seen.insert(key) {
                    continue;
                }
                collected.push(word);
                fresh += 1;
            }

            debug!(
                round = rounds,
                fresh = fresh,
                total = collected.len(),
                "Extraction round finished"
            );

            if fresh < self.policy.min_new_per_round || collected.len() >= self.policy.max_total {
                break;
            }
        }

        collected.truncate(self.policy.max_total);
        Ok((collected, rounds))
    }

    async fn run_round(
        &self,
        prompt: &str,
        settings: &UserSettings,
        options: &GenerationOptions,
    ) -> Result<Vec<ExtractedWord>> {
        let text = self.gateway.complete(prompt, Some(settings), options).await?;
        Ok(interpreter::parse_extracted_words(&text)?)
    }

    /// Whole-lyric translation in the user's preferred style
    pub async fn translate_lyrics(
        &self,
        lyrics: &str,
        settings: &UserSettings,
    ) -> Result<CompletionOutcome> {
        if lyrics.trim().is_empty() {
            return Err(DomainError::Validation("Lyrics are required".to_string()).into());
        }

        let prompt = prompts::lyric_translation(lyrics, settings.translation_style);
        let options = GenerationOptions::new().with_system(prompts::TRANSLATION_SYSTEM_PROMPT);

        let mut outcome = self.gateway.call_ai(&prompt, Some(settings), &options).await;
        outcome.text = outcome.text.trim().to_string();
        Ok(outcome)
    }
}
