use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::ai_providers::{ClientFactory, GenerationOptions, HttpClientFactory, ProviderId};
use crate::config::AiConfig;
use crate::errors::AiError;
use crate::models::UserSettings;

// Import logging macros
use crate::log_ai_operation;

/// Normalised result of one completion call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompletionOutcome {
    pub text: String,
    pub error: Option<String>,
}

impl CompletionOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Single entry point for every AI call in the application
#[derive(Clone)]
pub struct CompletionGateway {
    factory: Arc<dyn ClientFactory>,
    default_provider: ProviderId,
    fallback_api_key: Option<String>,
}

impl CompletionGateway {
    pub fn new(factory: Arc<dyn ClientFactory>, default_provider: ProviderId) -> Self {
        Self {
            factory,
            default_provider,
            fallback_api_key: None,
        }
    }

    /// Operator key used for the default provider when the user has none
    pub fn with_fallback_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.fallback_api_key = if api_key.trim().is_empty() { None } else { Some(api_key) };
        self
    }

    /// Gateway over real HTTP providers, configured from the environment
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let mut factory = HttpClientFactory::new(config.request_timeout)?;
        for provider in ProviderId::ALL {
            if let Some(base_url) = config.base_url_override(provider) {
                factory = factory.with_base_url(provider, base_url);
            }
        }

        let gateway = Self::new(Arc::new(factory), config.default_provider);
        Ok(match &config.default_api_key {
            Some(key) => gateway.with_fallback_api_key(key.clone()),
            None => gateway,
        })
    }

    pub fn default_provider(&self) -> ProviderId {
        self.default_provider
    }

    pub fn resolve_provider(&self, settings: Option<&UserSettings>) -> ProviderId {
        settings
            .and_then(|s| s.api_provider)
            .unwrap_or(self.default_provider)
    }

    /// Key and model for `provider`; an empty key is reported before any client exists
    fn resolve_credentials(
        &self,
        provider: ProviderId,
        settings: Option<&UserSettings>,
    ) -> Result<(String, Option<String>), AiError> {
        let credential = settings.map(|s| s.credential(provider));

        let user_key = credential
            .map(|c| c.api_key.trim().to_string())
            .filter(|key| !key.is_empty());

        let api_key = match user_key {
            Some(key) => key,
            None if provider == self.default_provider => match &self.fallback_api_key {
                Some(key) => key.clone(),
                None => return Err(AiError::MissingApiKey { provider }),
            },
            None => return Err(AiError::MissingApiKey { provider }),
        };

        let model = credential
            .map(|c| c.model.trim().to_string())
            .filter(|model| !model.is_empty());

        Ok((api_key, model))
    }

    /// Run one completion and return the raw text or a typed error
    pub async fn complete(
        &self,
        prompt: &str,
        settings: Option<&UserSettings>,
        options: &GenerationOptions,
    ) -> Result<String, AiError> {
        let provider = self.resolve_provider(settings);

        let (api_key, model) = match self.resolve_credentials(provider, settings) {
            Ok(credentials) => credentials,
            Err(e) => {
                log_ai_operation!(warn, "complete", e);
                return Err(e);
            }
        };

        let client = self.factory.create(provider, &api_key, model.as_deref());
        log_ai_operation!(start, "complete", provider = provider, model = client.model_name());

        let started = Instant::now();
        let result = if options.is_plain() {
            client.generate(prompt).await
        } else {
            client.generate_with(prompt, options).await
        };

        match result {
            Ok(text) => {
                log_ai_operation!(
                    success,
                    "complete",
                    provider = provider,
                    duration_ms = started.elapsed().as_millis() as u64,
                    response_length = text.len()
                );
                debug!(provider = %provider, response_content = %text, "Raw completion text");
                Ok(text)
            }
            Err(e) => {
                log_ai_operation!(error, "complete", provider = provider, error = e);
                Err(AiError::Transport(format!("{:#}", e)))
            }
        }
    }

    /// Never fails: any error is folded into `CompletionOutcome::error`
    pub async fn call_ai(
        &self,
        prompt: &str,
        settings: Option<&UserSettings>,
        options: &GenerationOptions,
    ) -> CompletionOutcome {
        match self.complete(prompt, settings, options).await {
            Ok(text) => CompletionOutcome { text, error: None },
            Err(e) => CompletionOutcome {
                text: String::new(),
                error: Some(e.to_string()),
            },
        }
    }
}
