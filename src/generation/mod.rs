//! Social post generation: one free-text request per topic, split into platform posts.

pub mod clipboard;
mod parser;

use crate::capability::{LanguageModel, ModelError, SessionGuard, ensure_available};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use clipboard::{Clipboard, ClipboardError, CommandClipboard, MemoryClipboard, copy_post};
pub use parser::parse_posts;

/// Errors surfaced by [`PostGenerator::generate`].
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Topic was empty or whitespace only; no request was issued.
    #[error("Please enter a topic for your post")]
    EmptyTopic,
    /// Gate closed or the request itself failed.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Target platform of a generated post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// LinkedIn
    LinkedIn,
    /// Twitter
    Twitter,
    /// Instagram
    Instagram,
}

impl Platform {
    /// All platforms in rendering order.
    pub const ALL: [Platform; 3] = [Platform::LinkedIn, Platform::Twitter, Platform::Instagram];

    /// Section label the model is asked to emit, colon included.
    pub const fn label(self) -> &'static str {
        match self {
            Platform::LinkedIn => "LINKEDIN:",
            Platform::Twitter => "TWITTER:",
            Platform::Instagram => "INSTAGRAM:",
        }
    }

    /// Display name.
    pub const fn name(self) -> &'static str {
        match self {
            Platform::LinkedIn => "LinkedIn",
            Platform::Twitter => "Twitter",
            Platform::Instagram => "Instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raised when a host names an unknown platform.
#[derive(Debug, Error)]
#[error("unknown platform '{0}' (expected linkedin, twitter or instagram)")]
pub struct UnknownPlatform(pub String);

impl std::str::FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linkedin" => Ok(Self::LinkedIn),
            "twitter" | "x" => Ok(Self::Twitter),
            "instagram" => Ok(Self::Instagram),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// Posts recovered from one generation. An empty field means "not generated".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPosts {
    /// LinkedIn post.
    pub linkedin: String,
    /// Twitter post.
    pub twitter: String,
    /// Instagram post.
    pub instagram: String,
}

impl SocialPosts {
    /// Post for `platform`, possibly empty.
    pub fn get(&self, platform: Platform) -> &str {
        match platform {
            Platform::LinkedIn => &self.linkedin,
            Platform::Twitter => &self.twitter,
            Platform::Instagram => &self.instagram,
        }
    }

    /// Replace the post for `platform`.
    pub fn set(&mut self, platform: Platform, text: String) {
        match platform {
            Platform::LinkedIn => self.linkedin = text,
            Platform::Twitter => self.twitter = text,
            Platform::Instagram => self.instagram = text,
        }
    }

    /// True when no platform produced a post.
    pub fn is_empty(&self) -> bool {
        Platform::ALL
            .into_iter()
            .all(|platform| self.get(platform).is_empty())
    }

    /// Non-empty posts in rendering order; hosts render only these.
    pub fn sections(&self) -> impl Iterator<Item = (Platform, &str)> + '_ {
        Platform::ALL
            .into_iter()
            .map(|platform| (platform, self.get(platform)))
            .filter(|(_, text)| !text.is_empty())
    }
}

/// Reject empty topics and trim the rest.
pub fn validate_topic(topic: &str) -> Result<&str, GenerationError> {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        Err(GenerationError::EmptyTopic)
    } else {
        Ok(trimmed)
    }
}

/// Prompt asking for three labeled posts about `topic`.
pub fn build_posts_prompt(topic: &str) -> String {
    format!(
        "Generate 3 social media posts about: \"{topic}\"\n\n\
         Format your response EXACTLY as follows (use these exact labels):\n\
         LINKEDIN:\n\
         [LinkedIn post content with relevant hashtags]\n\n\
         TWITTER:\n\
         [Twitter post content with relevant hashtags - keep it concise, under 280 characters]\n\n\
         INSTAGRAM:\n\
         [Instagram post content with relevant hashtags]\n\n\
         Make each post engaging, professional, and platform-appropriate. Include relevant hashtags for each platform."
    )
}

/// Single-shot generator: validates the topic, issues one request, splits the reply.
pub struct PostGenerator {
    model: Arc<dyn LanguageModel>,
}

impl PostGenerator {
    /// Build a generator over `model`.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Whether the underlying capability gate is open.
    pub fn is_available(&self) -> bool {
        self.model.is_available()
    }

    /// Generate posts for `topic`.
    ///
    /// Request failures propagate unchanged once the session has been released; there is no
    /// partial result.
    pub async fn generate(&self, topic: &str) -> Result<SocialPosts, GenerationError> {
        let topic = validate_topic(topic)?;
        ensure_available(self.model.as_ref())?;

        let raw = {
            let session = SessionGuard::acquire(self.model.as_ref()).await?;
            session.prompt(&build_posts_prompt(topic), None).await
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(error) => {
                tracing::error!(error = %error, "Post generation failed");
                return Err(error.into());
            }
        };

        let posts = parse_posts(&raw);
        let produced: Vec<&str> = posts.sections().map(|(p, _)| p.name()).collect();
        tracing::info!(platforms = ?produced, "Posts generated");
        if posts.is_empty() {
            tracing::warn!(chars = raw.len(), "Model reply contained no recognizable sections");
        }
        Ok(posts)
    }
}
