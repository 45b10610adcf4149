//! Configuration management for chatdesk
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ChatdeskError, Result};
use crate::topics::{default_topic_sets, TopicSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for chatdesk
///
/// Captures everything that differed between the forked chat front-ends:
/// service endpoints and timeouts, session behavior, generation parameters,
/// speech settings and the quick question sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote service settings
    #[serde(default)]
    pub service: ServiceConfig,
    /// Session behavior
    #[serde(default)]
    pub session: SessionConfig,
    /// Parameters sent with generation requests
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Text-to-speech settings and local playback
    #[serde(default)]
    pub speech: SpeechConfig,
    /// Quick question sets
    #[serde(default = "default_topic_sets")]
    pub topics: Vec<TopicSet>,
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL under which `conversations`, `asr` and `tts` live
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-endpoint-class request timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_api_base() -> String {
    "http://localhost:8000/ai".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl ServiceConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }

    /// Collection URL of the conversation service
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdesk::config::ServiceConfig;
    ///
    /// let service = ServiceConfig {
    ///     api_base: "http://api.local/ai/".to_string(),
    ///     ..Default::default()
    /// };
    /// assert_eq!(service.conversations_url(), "http://api.local/ai/conversations");
    /// ```
    pub fn conversations_url(&self) -> String {
        self.endpoint("conversations")
    }

    /// Speech-to-text endpoint
    pub fn asr_url(&self) -> String {
        self.endpoint("asr")
    }

    /// Text-to-speech endpoint
    pub fn tts_url(&self) -> String {
        self.endpoint("tts")
    }
}

/// Request timeouts in seconds, one per endpoint class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Audio upload for transcription
    #[serde(default = "default_transcription_timeout")]
    pub transcription_seconds: u64,

    /// List, detail, retitle and archive calls
    #[serde(default = "default_read_timeout")]
    pub read_seconds: u64,

    /// Start and continue calls that wait for a model reply
    #[serde(default = "default_generation_timeout")]
    pub generation_seconds: u64,

    /// Speech synthesis, including streaming the audio body
    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_seconds: u64,
}

fn default_transcription_timeout() -> u64 {
    20
}

fn default_read_timeout() -> u64 {
    10
}

fn default_generation_timeout() -> u64 {
    30
}

fn default_synthesis_timeout() -> u64 {
    60
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            transcription_seconds: default_transcription_timeout(),
            read_seconds: default_read_timeout(),
            generation_seconds: default_generation_timeout(),
            synthesis_seconds: default_synthesis_timeout(),
        }
    }
}

impl TimeoutConfig {
    /// Transcription timeout
    pub fn transcription(&self) -> Duration {
        Duration::from_secs(self.transcription_seconds)
    }

    /// Read/update timeout
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_seconds)
    }

    /// Generation timeout
    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_seconds)
    }

    /// Synthesis timeout
    pub fn synthesis(&self) -> Duration {
        Duration::from_secs(self.synthesis_seconds)
    }
}

/// Session behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Archive the active conversation when a new chat is started
    #[serde(default)]
    pub archive_on_new_chat: bool,

    /// Allow renaming conversations
    #[serde(default = "default_retitle_enabled")]
    pub retitle_enabled: bool,

    /// Conversations fetched per list page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Message sent silently to open a conversation in an empty session
    #[serde(default = "default_greeting")]
    pub greeting: Option<String>,
}

fn default_retitle_enabled() -> bool {
    true
}

fn default_page_size() -> u32 {
    20
}

fn default_greeting() -> Option<String> {
    Some("Hello".to_string())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            archive_on_new_chat: false,
            retitle_enabled: default_retitle_enabled(),
            page_size: default_page_size(),
            greeting: default_greeting(),
        }
    }
}

/// Generation parameters forwarded to the conversation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Context type used when starting a conversation
    #[serde(default = "default_context_type")]
    pub context_type: String,

    /// Model requested when continuing a conversation
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum reply tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_context_type() -> String {
    "contextual".to_string()
}

fn default_generation_model() -> String {
    "gpt-4-1106-preview".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            context_type: default_context_type(),
            model: default_generation_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Speech synthesis and playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// TTS model
    #[serde(default = "default_tts_model")]
    pub model: String,

    /// TTS voice
    #[serde(default = "default_tts_voice")]
    pub voice: String,

    /// Audio container format, also used as file extension
    #[serde(default = "default_tts_format")]
    pub format: String,

    /// Speaking rate
    #[serde(default = "default_tts_speed")]
    pub speed: f32,

    /// Directory synthesized audio is written to
    ///
    /// Defaults to the platform cache directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Command used to play audio files, e.g. `mpv --really-quiet`
    ///
    /// The file path is appended as the last argument. When unset, audio is
    /// only written to disk.
    #[serde(default)]
    pub player: Option<String>,
}

fn default_tts_model() -> String {
    "tts-1-hd".to_string()
}

fn default_tts_voice() -> String {
    "nova".to_string()
}

fn default_tts_format() -> String {
    "mp3".to_string()
}

fn default_tts_speed() -> f32 {
    1.0
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: default_tts_model(),
            voice: default_tts_voice(),
            format: default_tts_format(),
            speed: default_tts_speed(),
            output_dir: None,
            player: None,
        }
    }
}

impl SpeechConfig {
    /// Directory audio is written to
    pub fn resolved_output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("", "", "chatdesk")
            .map(|dirs| dirs.cache_dir().join("audio"))
            .unwrap_or_else(|| std::env::temp_dir().join("chatdesk-audio"))
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to YAML configuration file
    /// * `cli` - Parsed command line arguments
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            service: ServiceConfig::default(),
            session: SessionConfig::default(),
            generation: GenerationConfig::default(),
            speech: SpeechConfig::default(),
            topics: default_topic_sets(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatdeskError::Config(format!("Failed to read {}: {}", path, e)))?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ChatdeskError::from)?;
        tracing::debug!("Loaded configuration from {}", path);
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_base) = std::env::var("CHATDESK_API_BASE") {
            self.service.api_base = api_base;
        }

        if let Ok(value) = std::env::var("CHATDESK_ARCHIVE_ON_NEW_CHAT") {
            match parse_bool(&value) {
                Some(flag) => self.session.archive_on_new_chat = flag,
                None => tracing::warn!("Invalid CHATDESK_ARCHIVE_ON_NEW_CHAT: {}", value),
            }
        }

        if let Ok(value) = std::env::var("CHATDESK_RETITLE_ENABLED") {
            match parse_bool(&value) {
                Some(flag) => self.session.retitle_enabled = flag,
                None => tracing::warn!("Invalid CHATDESK_RETITLE_ENABLED: {}", value),
            }
        }

        if let Ok(page_size) = std::env::var("CHATDESK_PAGE_SIZE") {
            if let Ok(value) = page_size.parse() {
                self.session.page_size = value;
            } else {
                tracing::warn!("Invalid CHATDESK_PAGE_SIZE: {}", page_size);
            }
        }

        if let Ok(model) = std::env::var("CHATDESK_GENERATION_MODEL") {
            self.generation.model = model;
        }

        if let Ok(voice) = std::env::var("CHATDESK_TTS_VOICE") {
            self.speech.voice = voice;
        }

        if let Ok(dir) = std::env::var("CHATDESK_AUDIO_DIR") {
            self.speech.output_dir = Some(PathBuf::from(dir));
        }

        if let Ok(player) = std::env::var("CHATDESK_AUDIO_PLAYER") {
            self.speech.player = if player.trim().is_empty() {
                None
            } else {
                Some(player)
            };
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(api_base) = &cli.api_base {
            tracing::debug!(api_base = %api_base, "CLI override: --api-base");
            self.service.api_base = api_base.clone();
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.service.api_base).map_err(|e| {
            ChatdeskError::Config(format!(
                "service.api_base is not a valid URL ({}): {}",
                self.service.api_base, e
            ))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ChatdeskError::Config(format!(
                "service.api_base must use http or https, got {}",
                base.scheme()
            ))
            .into());
        }

        let timeouts = &self.service.timeouts;
        for (name, value) in [
            ("transcription_seconds", timeouts.transcription_seconds),
            ("read_seconds", timeouts.read_seconds),
            ("generation_seconds", timeouts.generation_seconds),
            ("synthesis_seconds", timeouts.synthesis_seconds),
        ] {
            if value == 0 {
                return Err(ChatdeskError::Config(format!(
                    "service.timeouts.{} must be greater than 0",
                    name
                ))
                .into());
            }
        }

        if self.session.page_size == 0 || self.session.page_size > 100 {
            return Err(ChatdeskError::Config(
                "session.page_size must be between 1 and 100".to_string(),
            )
            .into());
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ChatdeskError::Config(
                "generation.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.generation.max_tokens == 0 {
            return Err(ChatdeskError::Config(
                "generation.max_tokens must be greater than 0".to_string(),
            )
            .into());
        }

        if self.speech.speed <= 0.0 || self.speech.speed > 4.0 {
            return Err(ChatdeskError::Config(
                "speech.speed must be greater than 0.0 and at most 4.0".to_string(),
            )
            .into());
        }

        if self.speech.format.trim().is_empty() {
            return Err(
                ChatdeskError::Config("speech.format cannot be empty".to_string()).into(),
            );
        }

        if self.topics.iter().any(|set| set.name.trim().is_empty()) {
            return Err(ChatdeskError::Config("topic names cannot be empty".to_string()).into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.api_base, "http://localhost:8000/ai");
        assert!(!config.session.archive_on_new_chat);
        assert!(config.session.retitle_enabled);
        assert_eq!(config.session.page_size, 20);
        assert_eq!(config.session.greeting.as_deref(), Some("Hello"));
        assert_eq!(config.topics.len(), 1);
    }

    #[test]
    fn test_timeout_defaults_are_ordered_by_endpoint_class() {
        let t = TimeoutConfig::default();
        assert_eq!(t.transcription(), Duration::from_secs(20));
        assert_eq!(t.read(), Duration::from_secs(10));
        assert_eq!(t.generation(), Duration::from_secs(30));
        assert_eq!(t.synthesis(), Duration::from_secs(60));
    }

    #[test]
    fn test_generation_and_speech_defaults() {
        let g = GenerationConfig::default();
        assert_eq!(g.context_type, "contextual");
        assert_eq!(g.model, "gpt-4-1106-preview");
        assert_eq!(g.max_tokens, 2000);

        let s = SpeechConfig::default();
        assert_eq!(s.model, "tts-1-hd");
        assert_eq!(s.voice, "nova");
        assert_eq!(s.format, "mp3");
        assert!(s.player.is_none());
    }

    #[test]
    fn test_endpoint_urls_strip_trailing_slash() {
        let service = ServiceConfig {
            api_base: "https://api.example.com/ai/".to_string(),
            ..Default::default()
        };
        assert_eq!(service.asr_url(), "https://api.example.com/ai/asr");
        assert_eq!(service.tts_url(), "https://api.example.com/ai/tts");
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_api_base() {
        let mut config = Config::default();
        config.service.api_base = "not a url".to_string();
        assert!(config.validate().is_err());

        config.service.api_base = "ftp://example.com".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.service.timeouts.synthesis_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("synthesis_seconds"));
    }

    #[test]
    fn test_config_validation_page_size_bounds() {
        let mut config = Config::default();
        config.session.page_size = 0;
        assert!(config.validate().is_err());
        config.session.page_size = 101;
        assert!(config.validate().is_err());
        config.session.page_size = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_temperature_and_speed() {
        let mut config = Config::default();
        config.generation.temperature = 2.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.speech.speed = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_topic_name() {
        let mut config = Config::default();
        config.topics.push(TopicSet::new("  ", vec!["q"]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
service:
  api_base: "https://api.example.com/ai"
  timeouts:
    generation_seconds: 45
session:
  archive_on_new_chat: true
  retitle_enabled: false
  greeting: null
generation:
  model: "gpt-4o"
speech:
  voice: "alloy"
  player: "mpv --really-quiet"
topics:
  - name: sales
    questions:
      - "Show me my recent sales summary"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.service.api_base, "https://api.example.com/ai");
        assert_eq!(config.service.timeouts.generation_seconds, 45);
        assert_eq!(config.service.timeouts.read_seconds, 10);
        assert!(config.session.archive_on_new_chat);
        assert!(!config.session.retitle_enabled);
        assert!(config.session.greeting.is_none());
        assert_eq!(config.generation.model, "gpt-4o");
        assert_eq!(config.generation.max_tokens, 2000);
        assert_eq!(config.speech.voice, "alloy");
        assert_eq!(config.speech.player.as_deref(), Some("mpv --really-quiet"));
        assert_eq!(config.topics.len(), 1);
        assert_eq!(config.topics[0].name, "sales");
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.session.page_size, 20);
        assert_eq!(config.topics, default_topic_sets());
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        let cli = crate::cli::Cli::default();
        let config = Config::load("nonexistent.yaml", &cli).unwrap();
        assert_eq!(config.session.page_size, 20);
    }

    #[test]
    #[serial]
    fn test_load_file_and_cli_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "session:\n  page_size: 5\n").unwrap();

        let cli = crate::cli::Cli {
            api_base: Some("http://127.0.0.1:9999/ai".to_string()),
            ..Default::default()
        };
        let config = Config::load(path.to_str().unwrap(), &cli).unwrap();
        assert_eq!(config.session.page_size, 5);
        assert_eq!(config.service.api_base, "http://127.0.0.1:9999/ai");
    }

    #[test]
    fn test_load_invalid_yaml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "session: [unclosed").unwrap();

        let result = Config::load(path.to_str().unwrap(), &crate::cli::Cli::default());
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_overrides_fields() {
        std::env::set_var("CHATDESK_API_BASE", "http://env.local/ai");
        std::env::set_var("CHATDESK_ARCHIVE_ON_NEW_CHAT", "yes");
        std::env::set_var("CHATDESK_PAGE_SIZE", "not-a-number");
        std::env::set_var("CHATDESK_AUDIO_PLAYER", "afplay");

        let mut config = Config::default();
        config.apply_env_vars();

        assert_eq!(config.service.api_base, "http://env.local/ai");
        assert!(config.session.archive_on_new_chat);
        assert_eq!(config.session.page_size, 20);
        assert_eq!(config.speech.player.as_deref(), Some("afplay"));

        std::env::remove_var("CHATDESK_API_BASE");
        std::env::remove_var("CHATDESK_ARCHIVE_ON_NEW_CHAT");
        std::env::remove_var("CHATDESK_PAGE_SIZE");
        std::env::remove_var("CHATDESK_AUDIO_PLAYER");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_resolved_output_dir_prefers_config() {
        let speech = SpeechConfig {
            output_dir: Some(PathBuf::from("/tmp/voice")),
            ..Default::default()
        };
        assert_eq!(speech.resolved_output_dir(), PathBuf::from("/tmp/voice"));
    }
}
