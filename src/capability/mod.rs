//! Contract with the external text-generation capability.
//!
//! Pipelines never run inference themselves. They consult the capability gate
//! ([`LanguageModel::is_available`]), open a session through [`SessionGuard`], send a single
//! prompt, and let the guard tear the session down on every exit path.

mod ollama;
pub mod schema;

use crate::config::{Config, GenerationProvider};
use async_trait::async_trait;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;

pub use ollama::OllamaLanguageModel;
pub use schema::{PropertySchema, ResponseSchema, SchemaViolation};

/// Instructional message reported whenever the capability gate is closed.
pub const UNAVAILABLE_MESSAGE: &str = "AI features not available. Configure a generation provider (GENERATION_PROVIDER=ollama) to enable them.";

/// Errors surfaced by the text-generation capability.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The capability gate reported that no provider is usable in this environment.
    #[error("{}", UNAVAILABLE_MESSAGE)]
    Unavailable,
    /// Provider could not be reached or rejected the endpoint.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// The session was already torn down.
    #[error("Session has already been destroyed")]
    SessionClosed,
}

/// Entry point to a text-generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Synchronous availability check. Must not perform I/O or mutate state.
    fn is_available(&self) -> bool;

    /// Open a new prompting session.
    async fn create_session(&self) -> Result<Box<dyn LanguageSession>, ModelError>;
}

/// A single prompting session. Callers must invoke [`LanguageSession::destroy`] after use;
/// [`SessionGuard`] does so automatically.
#[async_trait]
pub trait LanguageSession: Send + Sync {
    /// Send a prompt, optionally constraining the output to a JSON object schema.
    async fn prompt(
        &self,
        prompt: &str,
        constraint: Option<&ResponseSchema>,
    ) -> Result<String, ModelError>;

    /// Release the resources held by the session. Calling it twice is harmless.
    fn destroy(&mut self);
}

/// Scoped owner of a [`LanguageSession`]; destroys the session when dropped.
pub struct SessionGuard {
    session: Box<dyn LanguageSession>,
}

impl SessionGuard {
    /// Open a session on `model`, refusing when the capability gate is closed.
    pub async fn acquire(model: &dyn LanguageModel) -> Result<Self, ModelError> {
        ensure_available(model)?;
        let session = model.create_session().await?;
        tracing::trace!("Language model session opened");
        Ok(Self { session })
    }
}

impl Deref for SessionGuard {
    type Target = dyn LanguageSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.destroy();
        tracing::trace!("Language model session destroyed");
    }
}

/// Fail with [`ModelError::Unavailable`] when the gate is closed.
pub fn ensure_available(model: &dyn LanguageModel) -> Result<(), ModelError> {
    if model.is_available() {
        Ok(())
    } else {
        Err(ModelError::Unavailable)
    }
}

/// Model used when no provider is configured. The gate is always closed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledLanguageModel;

#[async_trait]
impl LanguageModel for DisabledLanguageModel {
    fn is_available(&self) -> bool {
        false
    }

    async fn create_session(&self) -> Result<Box<dyn LanguageSession>, ModelError> {
        Err(ModelError::Unavailable)
    }
}

/// Build the language model described by `config`.
pub fn get_language_model(config: &Config) -> Result<Arc<dyn LanguageModel>, ModelError> {
    match config.generation_provider {
        GenerationProvider::None => Ok(Arc::new(DisabledLanguageModel)),
        GenerationProvider::Ollama => Ok(Arc::new(OllamaLanguageModel::new(
            config.ollama_url.clone(),
            config.generation_model.clone(),
        )?)),
    }
}
