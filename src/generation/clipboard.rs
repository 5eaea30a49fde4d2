//! Clipboard contract used to copy a generated post.
//!
//! A failed copy is reported to the caller and never alters the posts held in memory.

use super::{Platform, SocialPosts};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors raised while writing to a clipboard.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// The selected platform has no post to copy.
    #[error("No {0} post to copy")]
    NothingToCopy(Platform),
    /// No clipboard command is configured.
    #[error("Clipboard is not configured (set CLIPBOARD_COMMAND)")]
    NotConfigured,
    /// The clipboard command could not be started or fed.
    #[error("Failed to copy to clipboard: {0}")]
    Io(#[from] std::io::Error),
    /// The clipboard command exited unsuccessfully.
    #[error("Failed to copy to clipboard: {0}")]
    CommandFailed(String),
    /// The clipboard refused the write.
    #[error("Failed to copy to clipboard: {0}")]
    Rejected(String),
}

/// Asynchronous clipboard write operation.
#[async_trait]
pub trait Clipboard: Send + Sync {
    /// Replace the clipboard contents with `text`.
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Copy the post for `platform` to `clipboard`.
pub async fn copy_post(
    clipboard: &dyn Clipboard,
    posts: &SocialPosts,
    platform: Platform,
) -> Result<(), ClipboardError> {
    let text = posts.get(platform);
    if text.is_empty() {
        return Err(ClipboardError::NothingToCopy(platform));
    }
    clipboard.write_text(text).await?;
    tracing::info!(platform = %platform, chars = text.len(), "Post copied to clipboard");
    Ok(())
}

/// Clipboard backed by an external command reading the text on stdin
/// (`wl-copy`, `xclip -selection clipboard`, `pbcopy`, ...).
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    /// Parse a whitespace-separated command line. Returns `None` for a blank line.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl Clipboard for CommandClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that exits early closes the pipe; its exit status reports the failure.
            let written = match stdin.write_all(text.as_bytes()).await {
                Ok(()) => stdin.shutdown().await,
                Err(error) => Err(error),
            };
            match written {
                Err(error) if error.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(error.into());
                }
                _ => {}
            }
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ClipboardError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )))
        }
    }
}

/// In-process clipboard for tests and headless hosts.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    reject: bool,
}

impl MemoryClipboard {
    /// Empty clipboard accepting every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clipboard that refuses every write.
    pub fn rejecting() -> Self {
        Self {
            contents: Mutex::new(None),
            reject: true,
        }
    }

    /// Last text written.
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.reject {
            return Err(ClipboardError::Rejected("clipboard permission denied".into()));
        }
        *self
            .contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(text.to_string());
        Ok(())
    }
}
