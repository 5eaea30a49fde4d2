use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_GENERATION_MODEL: &str = "llama3.2";
const DEFAULT_THROTTLE_MS: u64 = 100;
const DEFAULT_NOTES_DIR: &str = "data";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration shared by the HTTP server and the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend used for text generation; `None` disables every pipeline that needs a model.
    pub generation_provider: GenerationProvider,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Model identifier passed to the provider.
    pub generation_model: String,
    /// Pause inserted after each successfully extracted record.
    pub extraction_throttle_ms: u64,
    /// Directory holding the file-backed key-value store.
    pub notes_dir: PathBuf,
    /// Optional command line that receives clipboard text on stdin.
    pub clipboard_command: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported text-generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// No provider configured; the capability gate reports unavailable.
    None,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            generation_provider: load_env_optional("GENERATION_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("GENERATION_PROVIDER".into()))
                })
                .transpose()?
                .unwrap_or(GenerationProvider::Ollama),
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            extraction_throttle_ms: load_env_optional("EXTRACTION_THROTTLE_MS")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("EXTRACTION_THROTTLE_MS".into()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_THROTTLE_MS),
            notes_dir: load_env_optional("NOTES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_NOTES_DIR)),
            clipboard_command: load_env_optional("CLIPBOARD_COMMAND"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation_provider: GenerationProvider::Ollama,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            extraction_throttle_ms: DEFAULT_THROTTLE_MS,
            notes_dir: PathBuf::from(DEFAULT_NOTES_DIR),
            clipboard_command: None,
            server_port: None,
        }
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl std::str::FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "disabled" => Ok(Self::None),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        provider = ?config.generation_provider,
        ollama_url = %config.ollama_url,
        model = %config.generation_model,
        notes_dir = %config.notes_dir.display(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parsing_accepts_known_values() {
        assert_eq!(
            "Ollama".parse::<GenerationProvider>(),
            Ok(GenerationProvider::Ollama)
        );
        assert_eq!(
            " none ".parse::<GenerationProvider>(),
            Ok(GenerationProvider::None)
        );
        assert!("openai".parse::<GenerationProvider>().is_err());
    }

    #[test]
    fn default_config_uses_documented_values() {
        let config = Config::default();
        assert_eq!(config.generation_provider, GenerationProvider::Ollama);
        assert_eq!(config.extraction_throttle_ms, 100);
        assert_eq!(config.notes_dir, PathBuf::from("data"));
        assert!(config.server_port.is_none());
    }
}
