pub mod ai_providers;
pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod extraction;
pub mod gateway;
pub mod interpreter;
pub mod logging;
pub mod models;
pub mod practice;
pub mod prompts;
pub mod vocab_store;

pub use ai_providers::{
    ClientFactory, CompletionClient, GenerationOptions, HttpClientFactory, ProviderId,
};
pub use config::Config;
pub use database::Database;
pub use errors::*;
pub use extraction::{ExtractionPolicy, ExtractionService};
pub use gateway::{CompletionGateway, CompletionOutcome};
pub use models::*;
pub use practice::PracticeService;
pub use vocab_store::VocabularyStore;
