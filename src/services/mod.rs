//! Remote service abstractions for chatdesk
//!
//! The conversation, speech-to-text and text-to-speech backends are opaque
//! HTTP services. Each one sits behind a trait so the session controller can
//! be driven by the reqwest implementations in production and by mocks in
//! tests.

pub mod conversation;
pub mod speech;

pub use conversation::HttpConversationService;
pub use speech::HttpSpeechService;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{ChatdeskError, Result};
use crate::session::{ConversationSummary, Message};

/// Service name used in conversation service errors
pub const CONVERSATION_SERVICE: &str = "conversation service";
/// Service name used in speech-to-text errors
pub const ASR_SERVICE: &str = "speech-to-text service";
/// Service name used in text-to-speech errors
pub const TTS_SERVICE: &str = "text-to-speech service";

/// Parameters of a conversation list request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Owner of the conversations
    pub user_id: String,
    /// 1-based page number
    pub page: u32,
    /// Entries per page
    pub page_size: u32,
}

/// One page of active conversations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationPage {
    /// Summaries in server order
    pub conversations: Vec<ConversationSummary>,
    /// Total number of conversations, when reported
    pub total: Option<u64>,
    /// Page number the server answered with
    pub page: u32,
}

/// Request to open a new conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartRequest {
    /// Owner of the new conversation
    pub user_id: String,
    /// First user message
    pub message: String,
    /// Context type forwarded to the service
    pub context_type: String,
    /// Client identifier
    pub client_id: String,
    /// Branch identifier
    pub branch_id: String,
}

/// Request to add a user message to an existing conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinueRequest {
    /// Conversation being continued
    pub conversation_id: String,
    /// User message
    pub message: String,
    /// Model the reply should be generated with
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum reply tokens
    pub max_tokens: u32,
}

/// Assistant reply to a start or continue request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Conversation the reply belongs to
    pub conversation_id: String,
    /// Assistant message text
    pub response: String,
}

/// Mutation requested through `PATCH /conversations/{id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationUpdate {
    /// Set a new title
    Title(String),
    /// Move the conversation to the archived status
    Archive,
}

impl ConversationUpdate {
    /// JSON body sent for this update
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdesk::services::ConversationUpdate;
    ///
    /// let body = ConversationUpdate::Archive.body();
    /// assert_eq!(body["status"], "archived");
    /// ```
    pub fn body(&self) -> serde_json::Value {
        match self {
            ConversationUpdate::Title(title) => serde_json::json!({ "title": title }),
            ConversationUpdate::Archive => serde_json::json!({ "status": "archived" }),
        }
    }
}

/// Audio file submitted for transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUpload {
    /// Raw file contents
    pub bytes: Vec<u8>,
    /// File name reported in the multipart part
    pub filename: String,
    /// MIME type of the audio
    pub mime_type: String,
}

impl AudioUpload {
    /// Create an upload
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Guess an audio MIME type from a file extension
///
/// # Examples
///
/// ```
/// use chatdesk::services::guess_audio_mime;
///
/// assert_eq!(guess_audio_mime("note.WAV"), "audio/wav");
/// assert_eq!(guess_audio_mime("unknown.bin"), "application/octet-stream");
/// ```
pub fn guess_audio_mime(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Request sent to the text-to-speech service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    /// Text to speak
    pub text: String,
    /// TTS model
    pub model: String,
    /// Voice name
    pub voice: String,
    /// Output format
    pub format: String,
    /// Speaking rate
    pub speed: f32,
}

/// Fully buffered synthesized audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    /// Audio bytes
    pub bytes: Bytes,
    /// Format the audio was requested in
    pub format: String,
}

/// Conversation service operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Fetch one page of the user's active conversations
    async fn list(&self, query: &ListQuery) -> Result<ConversationPage>;

    /// Fetch the full message list of a conversation
    async fn detail(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Open a new conversation with a first message
    async fn start(&self, request: &StartRequest) -> Result<Reply>;

    /// Add a message to an existing conversation
    async fn continue_conversation(&self, request: &ContinueRequest) -> Result<Reply>;

    /// Retitle or archive a conversation
    async fn update(&self, conversation_id: &str, update: &ConversationUpdate) -> Result<()>;
}

/// Speech-to-text operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe audio; `None` when nothing was recognized
    async fn transcribe(&self, upload: &AudioUpload) -> Result<Option<String>>;
}

/// Text-to-speech operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize the text and return the buffered audio
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio>;
}

/// Response envelope shared by all JSON endpoints: `{"data": ...}`
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    // A missing `data` key reads as `None` without a `T: Default` bound.
    pub(crate) data: Option<T>,
}

/// Build an HTTP client with the shared user agent
pub(crate) fn build_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("chatdesk/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ChatdeskError::Config(format!("Failed to create HTTP client: {}", e)))?;
    Ok(client)
}

/// Turn a send failure into a transport error
pub(crate) fn transport_error(service: &str, error: reqwest::Error) -> anyhow::Error {
    let message = if error.is_timeout() {
        format!("request timed out ({})", error)
    } else {
        error.to_string()
    };
    tracing::warn!("Failed to reach {}: {}", service, message);
    ChatdeskError::Transport {
        service: service.to_string(),
        message,
    }
    .into()
}

/// Reject non-success responses, keeping the body for the error message
pub(crate) async fn ensure_success(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!("{} returned error {}: {}", service, status, body);
    Err(ChatdeskError::ServiceStatus {
        service: service.to_string(),
        status: status.as_u16(),
        body,
    }
    .into())
}

/// Read a JSON envelope and return its `data` member
pub(crate) async fn read_envelope<T>(service: &str, response: reqwest::Response) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let body = response.text().await.map_err(|e| transport_error(service, e))?;
    let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
        tracing::error!("Failed to parse {} response: {}", service, e);
        ChatdeskError::Payload {
            service: service.to_string(),
            message: e.to_string(),
        }
    })?;

    let data = envelope.data.ok_or_else(|| ChatdeskError::Payload {
        service: service.to_string(),
        message: "response has no data".to_string(),
    })?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_bodies() {
        assert_eq!(
            ConversationUpdate::Title("Sales".to_string()).body(),
            serde_json::json!({ "title": "Sales" })
        );
        assert_eq!(
            ConversationUpdate::Archive.body(),
            serde_json::json!({ "status": "archived" })
        );
    }

    #[test]
    fn test_guess_audio_mime() {
        assert_eq!(guess_audio_mime("a.mp3"), "audio/mpeg");
        assert_eq!(guess_audio_mime("a.webm"), "audio/webm");
        assert_eq!(guess_audio_mime("noextension"), "application/octet-stream");
    }

    #[test]
    fn test_envelope_null_data() {
        let envelope: Envelope<serde_json::Value> = serde_json::from_str(r#"{"data":null}"#).unwrap();
        assert!(envelope.data.is_none());

        let envelope: Envelope<serde_json::Value> = serde_json::from_str("{}").unwrap();
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_continue_request_serializes_all_fields() {
        let request = ContinueRequest {
            conversation_id: "k1".to_string(),
            message: "more".to_string(),
            model: "gpt-4-1106-preview".to_string(),
            temperature: 0.5,
            max_tokens: 2000,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["conversation_id"], "k1");
        assert_eq!(value["max_tokens"], 2000);
        assert_eq!(value["temperature"], 0.5);
    }
}
