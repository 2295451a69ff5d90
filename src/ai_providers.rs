use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

/// Supported remote completion backends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Cloud chat-completion API
    DeepSeek,
    /// Alternate chat-completion-compatible API
    OpenAi,
    /// Generative content API
    Gemini,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::DeepSeek, ProviderId::OpenAi, ProviderId::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::DeepSeek => "deepseek",
            ProviderId::OpenAi => "openai",
            ProviderId::Gemini => "gemini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::DeepSeek => "https://api.deepseek.com/v1",
            ProviderId::OpenAi => "https://api.openai.com/v1",
            ProviderId::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::DeepSeek => "deepseek-chat",
            ProviderId::OpenAi => "gpt-4o-mini",
            ProviderId::Gemini => "gemini-2.0-flash",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "deepseek" => Ok(ProviderId::DeepSeek),
            "openai" | "chatgpt" | "gpt" => Ok(ProviderId::OpenAi),
            "gemini" | "google" => Ok(ProviderId::Gemini),
            other => Err(anyhow!("Unknown AI provider '{}'", other)),
        }
    }
}

/// Tunable generation options shared by every provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// True when nothing beyond the bare prompt was requested
    pub fn is_plain(&self) -> bool {
        self.system_prompt.is_none() && self.temperature.is_none() && self.max_tokens.is_none()
    }
}

/// The two operations the gateway needs from a provider
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate from a single prompt
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with(prompt, &GenerationOptions::default()).await
    }

    /// Generate from a system+user pair with temperature and token limits
    async fn generate_with(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

/// Builds a client bound to the right endpoint and credential
pub trait ClientFactory: Send + Sync {
    fn create(
        &self,
        provider: ProviderId,
        api_key: &str,
        model: Option<&str>,
    ) -> Box<dyn CompletionClient>;
}

/// Common message structure for chat-completion requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Enum-based provider so the factory can hand out one concrete type
#[derive(Debug, Clone)]
pub enum AiProvider {
    ChatCompletion(ChatCompletionProvider),
    Gemini(GeminiProvider),
}

#[async_trait]
impl CompletionClient for AiProvider {
    async fn generate_with(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        match self {
            AiProvider::ChatCompletion(provider) => provider.make_request(prompt, options).await,
            AiProvider::Gemini(provider) => provider.make_request(prompt, options).await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            AiProvider::ChatCompletion(provider) => provider.provider.as_str(),
            AiProvider::Gemini(_) => ProviderId::Gemini.as_str(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            AiProvider::ChatCompletion(provider) => &provider.model,
            AiProvider::Gemini(provider) => &provider.model,
        }
    }
}

/// OpenAI-style chat-completion provider, used for both compatible backends
#[derive(Debug, Clone)]
pub struct ChatCompletionProvider {
    client: Client,
    provider: ProviderId,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatCompletionResponse {
    /// Text of the first choice; an empty choice list is an error
    fn into_content(self, provider: ProviderId) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in {} response", provider))
    }
}

impl ChatCompletionProvider {
    pub fn new(
        client: Client,
        provider: ProviderId,
        api_key: String,
        base_url: String,
        model: String,
    ) -> Self {
        Self {
            client,
            provider,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub async fn make_request(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let mut messages = Vec::new();

        if let Some(system) = &options.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request_body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        info!(
            provider = self.provider.as_str(),
            model = %self.model,
            base_url = %self.base_url,
            prompt_length = prompt.len(),
            "Making completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                provider = self.provider.as_str(),
                status = %status,
                error = %error_text,
                "Completion request failed"
            );
            return Err(anyhow!(
                "{} API request failed ({}): {}",
                self.provider,
                status,
                error_text
            ));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion.into_content(self.provider)?;

        info!(
            provider = self.provider.as_str(),
            response_length = content.len(),
            "Received completion response"
        );

        Ok(content)
    }
}

/// Gemini generateContent provider
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl GeminiRequest {
    /// Gemini has no system role, so the system prompt is prepended to the user text
    fn build(prompt: &str, options: &GenerationOptions) -> Self {
        let full_prompt = match &options.system_prompt {
            Some(system) => format!("{}\n\n{}", system, prompt),
            None => prompt.to_string(),
        };

        let tuned = options.temperature.is_some() || options.max_tokens.is_some();
        let generation_config = tuned.then(|| GeminiGenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
        });

        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: full_prompt }],
            }],
            generation_config,
        }
    }
}

impl GeminiResponse {
    /// Joined text parts of the first candidate
    fn into_text(self) -> Result<String> {
        let content = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No candidates in gemini response"))?
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(anyhow!("No text parts in gemini response"));
        }
        Ok(content)
    }
}

impl GeminiProvider {
    pub fn new(client: Client, api_key: String, base_url: String, model: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub async fn make_request(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let request_body = GeminiRequest::build(prompt, options);

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        info!(
            provider = "gemini",
            model = %self.model,
            base_url = %self.base_url,
            prompt_length = prompt.len(),
            "Making completion request"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                provider = "gemini",
                status = %status,
                error = %error_text,
                "Completion request failed"
            );
            return Err(anyhow!("gemini API request failed ({}): {}", status, error_text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let content = gemini_response.into_text()?;

        info!(
            provider = "gemini",
            response_length = content.len(),
            "Received completion response"
        );

        Ok(content)
    }
}

/// Production factory sharing one HTTP client across providers
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    client: Client,
    deepseek_base_url: String,
    openai_base_url: String,
    gemini_base_url: String,
}

impl HttpClientFactory {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            deepseek_base_url: ProviderId::DeepSeek.default_base_url().to_string(),
            openai_base_url: ProviderId::OpenAi.default_base_url().to_string(),
            gemini_base_url: ProviderId::Gemini.default_base_url().to_string(),
        })
    }

    pub fn with_base_url(mut self, provider: ProviderId, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        match provider {
            ProviderId::DeepSeek => self.deepseek_base_url = base_url,
            ProviderId::OpenAi => self.openai_base_url = base_url,
            ProviderId::Gemini => self.gemini_base_url = base_url,
        }
        self
    }

    pub fn base_url(&self, provider: ProviderId) -> &str {
        match provider {
            ProviderId::DeepSeek => &self.deepseek_base_url,
            ProviderId::OpenAi => &self.openai_base_url,
            ProviderId::Gemini => &self.gemini_base_url,
        }
    }

    pub fn create_provider(
        &self,
        provider: ProviderId,
        api_key: &str,
        model: Option<&str>,
    ) -> AiProvider {
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(provider.default_model())
            .to_string();
        let base_url = self.base_url(provider).to_string();

        match provider {
            ProviderId::DeepSeek | ProviderId::OpenAi => {
                AiProvider::ChatCompletion(ChatCompletionProvider::new(
                    self.client.clone(),
                    provider,
                    api_key.to_string(),
                    base_url,
                    model,
                ))
            }
            ProviderId::Gemini => AiProvider::Gemini(GeminiProvider::new(
                self.client.clone(),
                api_key.to_string(),
                base_url,
                model,
            )),
        }
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(
        &self,
        provider: ProviderId,
        api_key: &str,
        model: Option<&str>,
    ) -> Box<dyn CompletionClient> {
        Box::new(self.create_provider(provider, api_key, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        let cases = vec![
            ("deepseek", ProviderId::DeepSeek),
            ("DeepSeek", ProviderId::DeepSeek),
            ("openai", ProviderId::OpenAi),
            ("ChatGPT", ProviderId::OpenAi),
            ("gpt", ProviderId::OpenAi),
            ("gemini", ProviderId::Gemini),
            ("Google", ProviderId::Gemini),
        ];

        for (input, expected) in cases {
            assert_eq!(input.parse::<ProviderId>().unwrap(), expected, "input '{}'", input);
        }
        assert!("claude".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_provider_serde_names_match_display() {
        for provider in ProviderId::ALL {
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider));
        }
    }

    #[test]
    fn test_factory_applies_defaults_and_overrides() {
        let factory = HttpClientFactory::new(None)
            .unwrap()
            .with_base_url(ProviderId::OpenAi, "http://localhost:8080/v1/");

        let openai = factory.create_provider(ProviderId::OpenAi, "sk-test", None);
        assert_eq!(openai.provider_name(), "openai");
        assert_eq!(openai.model_name(), "gpt-4o-mini");
        match &openai {
            AiProvider::ChatCompletion(p) => assert_eq!(p.base_url, "http://localhost:8080/v1"),
            AiProvider::Gemini(_) => panic!("openai should be a chat-completion provider"),
        }

        let gemini =
            factory.create_provider(ProviderId::Gemini, "AIza-test", Some("gemini-1.5-pro"));
        assert_eq!(gemini.provider_name(), "gemini");
        assert_eq!(gemini.model_name(), "gemini-1.5-pro");

        let deepseek = factory.create_provider(ProviderId::DeepSeek, "key", Some("  "));
        assert_eq!(deepseek.model_name(), "deepseek-chat");
    }

    #[test]
    fn test_generation_options_builder() {
        assert!(GenerationOptions::new().is_plain());

        let options = GenerationOptions::new()
            .with_system("You are a teacher.")
            .with_temperature(0.3)
            .with_max_tokens(512);
        assert!(!options.is_plain());
        assert_eq!(options.system_prompt.as_deref(), Some("You are a teacher."));
        assert_eq!(options.max_tokens, Some(512));
    }

    #[test]
    fn test_chat_request_omits_unset_options() {
        let request = ChatCompletionRequest {
            model: "deepseek-chat".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            temperature: None,
            max_tokens: Some(100),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("temperature").is_none());
        assert_eq!(json["max_tokens"], 100);
    }

    #[test]
    fn test_chat_response_reads_first_choice() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {
                    "role": "assistant",
                    "content": "[{\"word\": \"serene\"}]"
                }},
                {"index": 1, "message": {"role": "assistant", "content": "second"}}
            ],
            "usage": {"total_tokens": 42}
        }"#;

        let response: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        let content = response.into_content(ProviderId::DeepSeek).unwrap();
        assert_eq!(content, r#"[{"word": "serene"}]"#);
    }

    #[test]
    fn test_chat_response_without_choices_is_an_error() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let error = response.into_content(ProviderId::OpenAi).unwrap_err();
        assert!(error.to_string().contains("No choices in openai response"));
    }

    #[test]
    fn test_gemini_response_joins_parts_of_first_candidate() {
        let body = r#"{
            "candidates": [
                {"content": {
                    "role": "model",
                    "parts": [{"text": "Score: 80/100\n"}, {"text": "Reason: ok"}]
                }},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }"#;

        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.into_text().unwrap(), "Score: 80/100\nReason: ok");
    }

    #[test]
    fn test_gemini_response_without_text_is_an_error() {
        let empty: GeminiResponse = serde_json::from_str(r#"{"promptFeedback": {}}"#).unwrap();
        assert!(empty.into_text().unwrap_err().to_string().contains("No candidates"));

        let blank: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"content": {"parts": []}}]}"#).unwrap();
        assert!(blank.into_text().unwrap_err().to_string().contains("No text parts"));
    }

    #[test]
    fn test_gemini_request_prepends_system_prompt() {
        let options = GenerationOptions::new()
            .with_system("You grade answers.")
            .with_temperature(0.1)
            .with_max_tokens(256);

        let json = serde_json::to_value(GeminiRequest::build("Grade this.", &options)).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "You grade answers.\n\nGrade this.");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
        let temperature = json["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_gemini_request_plain_prompt_has_no_generation_config() {
        let request = GeminiRequest::build("Hello", &GenerationOptions::new());
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
        assert!(json.get("generationConfig").is_none());
    }
}
