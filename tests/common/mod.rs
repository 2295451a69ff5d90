#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lyric_vocab::{
    ClientFactory, CompletionClient, CompletionGateway, Database, ExtractedWord, GenerationOptions,
    ProviderId, UserSettings, VocabularyStore,
};

/// One recorded completion request
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub provider: ProviderId,
    pub api_key: String,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
}

enum Reply {
    Text(String),
    Fail(String),
    /// Never answers, like a provider that stopped responding
    Hang,
}

#[derive(Default)]
struct Script {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
    created: AtomicUsize,
}

/// Client factory that answers from a queue of canned replies and counts everything
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    script: Arc<Script>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, text: impl Into<String>) -> &Self {
        self.script.replies.lock().unwrap().push_back(Reply::Text(text.into()));
        self
    }

    pub fn fail(&self, message: impl Into<String>) -> &Self {
        self.script.replies.lock().unwrap().push_back(Reply::Fail(message.into()));
        self
    }

    pub fn hang(&self) -> &Self {
        self.script.replies.lock().unwrap().push_back(Reply::Hang);
        self
    }

    /// Clients handed out so far
    pub fn created(&self) -> usize {
        self.script.created.load(Ordering::SeqCst)
    }

    /// Completion requests actually sent
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.script.calls.lock().unwrap().len()
    }
}

struct ScriptedClient {
    script: Arc<Script>,
    provider: ProviderId,
    api_key: String,
    model: String,
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn generate_with(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        self.script.calls.lock().unwrap().push(RecordedCall {
            provider: self.provider,
            api_key: self.api_key.clone(),
            prompt: prompt.to_string(),
            system_prompt: options.system_prompt.clone(),
            max_tokens: options.max_tokens,
        });

        let next = self.script.replies.lock().unwrap().pop_front();
        match next {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(anyhow!(message)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(anyhow!("no scripted reply left")),
        }
    }

    fn provider_name(&self) -> &'static str {
        self.provider.as_str()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

impl ClientFactory for ScriptedFactory {
    fn create(
        &self,
        provider: ProviderId,
        api_key: &str,
        model: Option<&str>,
    ) -> Box<dyn CompletionClient> {
        self.script.created.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedClient {
            script: self.script.clone(),
            provider,
            api_key: api_key.to_string(),
            model: model.unwrap_or(provider.default_model()).to_string(),
        })
    }
}

/// Gateway over `factory` with an operator key for the default provider
pub fn gateway(factory: &ScriptedFactory) -> CompletionGateway {
    CompletionGateway::new(Arc::new(factory.clone()), ProviderId::DeepSeek)
        .with_fallback_api_key("operator-key")
}

pub fn settings() -> UserSettings {
    UserSettings::default()
}

pub async fn test_store() -> VocabularyStore {
    let db = Database::new("sqlite::memory:").await.unwrap();
    VocabularyStore::load(db).await.unwrap()
}

pub fn extracted(word: &str) -> ExtractedWord {
    ExtractedWord {
        word: word.to_string(),
        pos: "adj.".to_string(),
        meaning: format!("{}的含义", word),
        level: "C1".to_string(),
        sentence: format!("含有{}的歌词", word),
        sentence_en: format!("A lyric line with {} in it", word),
        replace_word: word.to_string(),
        example: format!("This example uses {} once.", word),
        example_zh: "这个例句用了它一次。".to_string(),
    }
}

/// Model reply for the extraction prompt, wrapped in chatter like real output
pub fn extraction_reply(words: &[String]) -> String {
    let items: Vec<ExtractedWord> = words.iter().map(|w| extracted(w)).collect();
    format!(
        "Here are the words I found:\n```json\n{}\n```\nLet me know if you need more.",
        serde_json::to_string_pretty(&items).unwrap()
    )
}

pub fn numbered(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("{}{}", prefix, i)).collect()
}

/// Store pre-filled with `words`, all from one song
pub async fn seeded_store(words: &[&str]) -> VocabularyStore {
    let store = test_store().await;
    let items: Vec<ExtractedWord> = words.iter().map(|w| extracted(w)).collect();
    store.record_extraction("Seed Song", "seed lyrics", &items).await.unwrap();
    store
}
