//! Ollama-backed implementation of the text-generation contract.
//!
//! Sessions are lightweight handles over a shared HTTP client; each prompt is a single
//! non-streaming `POST /api/generate`. Structured prompts forward the JSON schema through the
//! `format` field.

use super::{LanguageModel, LanguageSession, ModelError, ResponseSchema};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

/// Language model served by a local Ollama runtime.
pub struct OllamaLanguageModel {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaLanguageModel {
    /// Build a client for the runtime at `base_url` using `model` for every session.
    pub fn new(base_url: String, model: String) -> Result<Self, ModelError> {
        let http = Client::builder()
            .user_agent("promptdesk/generate")
            .build()
            .map_err(|error| {
                ModelError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
            })?;
        Ok(Self {
            http,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for OllamaLanguageModel {
    fn is_available(&self) -> bool {
        !self.base_url.trim().is_empty() && !self.model.trim().is_empty()
    }

    async fn create_session(&self) -> Result<Box<dyn LanguageSession>, ModelError> {
        Ok(Box::new(OllamaSession {
            http: self.http.clone(),
            endpoint: self.endpoint(),
            model: self.model.clone(),
            closed: false,
        }))
    }
}

struct OllamaSession {
    http: Client,
    endpoint: String,
    model: String,
    closed: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

impl OllamaSession {
    fn payload(&self, prompt: &str, constraint: Option<&ResponseSchema>) -> Value {
        let mut payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.2,
            }
        });
        if let Some(schema) = constraint {
            payload["format"] = schema.to_json();
            // Extraction should be as deterministic as the runtime allows.
            payload["options"]["temperature"] = json!(0.0);
        }
        payload
    }
}

#[async_trait]
impl LanguageSession for OllamaSession {
    async fn prompt(
        &self,
        prompt: &str,
        constraint: Option<&ResponseSchema>,
    ) -> Result<String, ModelError> {
        if self.closed {
            return Err(ModelError::SessionClosed);
        }

        let response = self
            .http
            .post(&self.endpoint)
            .json(&self.payload(prompt, constraint))
            .send()
            .await
            .map_err(|error| {
                ModelError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.endpoint
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ModelError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            ModelError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(ModelError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }

    fn destroy(&mut self) {
        self.closed = true;
    }
}
