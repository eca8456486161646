//! Shared types, error model, personas, and configuration for AnswerForge.
//!
//! This crate is the foundation depended on by all other AnswerForge crates.
//! It provides:
//! - [`AnswerForgeError`], the unified error type
//! - Domain types ([`QuestionRecord`], [`AnswerRecord`], [`SearchSnippet`], [`RunId`])
//! - The persona registry ([`PersonaRegistry`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod personas;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompletionConfig, DefaultsConfig, SearchConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, search_credentials, validate_api_key,
};
pub use error::{AnswerForgeError, Result};
pub use personas::{DEFAULT_PERSONA_KEY, PersonaDefinition, PersonaRegistry};
pub use types::{
    AnswerRecord, GOOGLE_CSE_ORIGIN, QuestionId, QuestionRecord, RunId, SearchSnippet,
};
