//! Local playback of synthesized speech
//!
//! The controller hands buffered audio to an [`AudioSink`]. The terminal
//! front-end uses [`FilePlayback`], which writes the audio to disk and, when a
//! player command is configured, runs it on the written file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::SpeechConfig;
use crate::error::{ChatdeskError, Result};
use crate::services::SpeechAudio;

/// Destination for synthesized audio
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play the audio, returning the file it was saved to, if any
    async fn play(&self, audio: &SpeechAudio) -> Result<Option<PathBuf>>;
}

/// Writes audio files and optionally runs an external player on them
#[derive(Debug, Clone)]
pub struct FilePlayback {
    output_dir: PathBuf,
    player: Option<String>,
}

impl FilePlayback {
    /// Create a sink writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>, player: Option<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            player,
        }
    }

    /// Create a sink from speech configuration
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.resolved_output_dir(), config.player.clone())
    }

    /// Directory audio files are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn next_path(&self, format: &str) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S%.3f");
        self.output_dir.join(format!("speech-{}.{}", stamp, format))
    }

    async fn run_player(&self, command: &str, path: &Path) -> Result<()> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ChatdeskError::Playback("player command is empty".to_string()))?;

        tracing::debug!(program, path = %path.display(), "Starting audio player");
        let status = Command::new(program)
            .args(parts)
            .arg(path)
            .status()
            .await
            .map_err(|e| ChatdeskError::Playback(format!("failed to start {}: {}", program, e)))?;

        if !status.success() {
            return Err(
                ChatdeskError::Playback(format!("{} exited with {}", program, status)).into(),
            );
        }
        Ok(())
    }
}

/// Write audio bytes to an explicit path, creating parent directories
///
/// # Errors
///
/// Returns error if the directory or file cannot be written
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use chatdesk::playback::save_audio;
/// use chatdesk::services::SpeechAudio;
///
/// # tokio_test::block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("reply.mp3");
/// let audio = SpeechAudio {
///     bytes: Bytes::from_static(b"ID3"),
///     format: "mp3".to_string(),
/// };
/// save_audio(&path, &audio).await.unwrap();
/// assert!(path.exists());
/// # });
/// ```
pub async fn save_audio(path: &Path, audio: &SpeechAudio) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ChatdeskError::from)?;
        }
    }
    tokio::fs::write(path, &audio.bytes)
        .await
        .map_err(ChatdeskError::from)?;
    tracing::info!("Wrote {} bytes of audio to {}", audio.bytes.len(), path.display());
    Ok(())
}

#[async_trait]
impl AudioSink for FilePlayback {
    async fn play(&self, audio: &SpeechAudio) -> Result<Option<PathBuf>> {
        let path = self.next_path(&audio.format);
        save_audio(&path, audio).await?;

        if let Some(command) = &self.player {
            self.run_player(command, &path).await?;
        }

        Ok(Some(path))
    }
}
