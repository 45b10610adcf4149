//! Per-user session state
//!
//! A [`Session`] holds everything the client knows about one user visit:
//! the tenant identifiers it was bootstrapped with, the active conversation,
//! the local message log, the cached conversation list and ephemeral UI
//! flags. The session is plain data; only the
//! [`SessionController`](crate::controller::SessionController) mutates it in
//! response to confirmed service results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{ChatdeskError, Result};

/// Maximum number of characters of a title shown in conversation lists
pub const TITLE_DISPLAY_CHARS: usize = 40;

/// Title shown for conversations the server has not named yet
pub const UNTITLED: &str = "Untitled conversation";

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person using the client
    User,
    /// The remote assistant
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single entry in the message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message
    pub role: Role,
    /// Message text
    pub content: String,
}

impl Message {
    /// Create a user message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdesk::session::{Message, Role};
    ///
    /// let msg = Message::user("Hello");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Summary row of the conversation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation id
    pub id: String,
    /// Title, if the server has one
    #[serde(default)]
    pub title: Option<String>,
    /// Number of messages stored server-side
    #[serde(default, deserialize_with = "null_as_zero")]
    pub message_count: u64,
}

fn null_as_zero<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

impl ConversationSummary {
    /// Title as shown in a list, truncated and marked when active
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdesk::session::ConversationSummary;
    ///
    /// let summary = ConversationSummary {
    ///     id: "k1".to_string(),
    ///     title: None,
    ///     message_count: 4,
    /// };
    /// assert_eq!(summary.display_title(false), "Untitled conversation");
    /// assert_eq!(summary.display_title(true), "* Untitled conversation");
    /// ```
    pub fn display_title(&self, is_active: bool) -> String {
        let title = match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => UNTITLED,
        };

        let mut shown: String = title.chars().take(TITLE_DISPLAY_CHARS).collect();
        if title.chars().count() > TITLE_DISPLAY_CHARS {
            shown.push_str("...");
        }

        if is_active {
            format!("* {}", shown)
        } else {
            shown
        }
    }

    /// Short caption with the message count
    pub fn caption(&self) -> String {
        format!("{} msgs", self.message_count)
    }
}

/// Cached conversation list
///
/// The cache is filled by a successful list fetch and goes stale whenever a
/// mutation succeeds. There is no time-based expiry.
#[derive(Debug, Clone)]
pub struct ConversationCache {
    entries: Vec<ConversationSummary>,
    total: Option<u64>,
    page: u32,
    stale: bool,
}

impl ConversationCache {
    /// Create an empty cache that still has to be loaded
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            total: None,
            page: 1,
            stale: true,
        }
    }

    /// Cached summaries, possibly stale
    pub fn entries(&self) -> &[ConversationSummary] {
        &self.entries
    }

    /// Total number of conversations reported by the server
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Page the cached entries belong to
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Whether the cache must be refetched before use
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Mark the cache as needing a refetch
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Replace the cached entries with a fresh server result
    pub fn replace(&mut self, entries: Vec<ConversationSummary>, total: Option<u64>, page: u32) {
        self.entries = entries;
        self.total = total;
        self.page = page;
        self.stale = false;
    }
}

impl Default for ConversationCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifiers a session is bootstrapped with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionParams {
    /// Client (tenant) identifier
    pub client_id: String,
    /// Branch identifier
    pub branch_id: String,
    /// Optional user identifier
    pub user_id: Option<String>,
}

impl SessionParams {
    /// Create parameters from explicit identifiers
    pub fn new(client_id: impl Into<String>, branch_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            branch_id: branch_id.into(),
            user_id: None,
        }
    }

    /// Set an explicit user identifier
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Read identifiers from a query string such as `client_id=a&branch_id=b`
    ///
    /// A leading `?` is accepted. Unknown keys are ignored. The result is not
    /// validated; call [`SessionParams::validate`] before use.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdesk::session::SessionParams;
    ///
    /// let params = SessionParams::from_query("?client_id=c1&branch_id=b1");
    /// assert_eq!(params.client_id, "c1");
    /// assert_eq!(params.effective_user_id(), "c1");
    /// ```
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "client_id" => params.client_id = value.into_owned(),
                "branch_id" => params.branch_id = value.into_owned(),
                "user_id" if !value.is_empty() => params.user_id = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Read identifiers from the query string of a full session link
    ///
    /// # Errors
    ///
    /// Returns error if `link` is not a valid URL
    pub fn from_url(link: &str) -> Result<Self> {
        let parsed = url::Url::parse(link).map_err(ChatdeskError::from)?;
        Ok(Self::from_query(parsed.query().unwrap_or_default()))
    }

    /// User id sent to the service; falls back to the client id
    pub fn effective_user_id(&self) -> &str {
        match self.user_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => &self.client_id,
        }
    }

    /// Check that the required identifiers are present
    ///
    /// # Errors
    ///
    /// Returns [`ChatdeskError::MissingParameters`] naming every missing
    /// identifier together with an example invocation.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.client_id.trim().is_empty() {
            missing.push("client_id");
        }
        if self.branch_id.trim().is_empty() {
            missing.push("branch_id");
        }

        if missing.is_empty() {
            return Ok(());
        }

        Err(ChatdeskError::MissingParameters {
            missing: missing.join(", "),
            remediation: "Please provide both client_id and branch_id, for example:\n  \
                chatdesk chat --client-id <CLIENT_ID> --branch-id <BRANCH_ID>\n  \
                chatdesk chat --link 'http://localhost:8501/?client_id=<CLIENT_ID>&branch_id=<BRANCH_ID>'\n\
                The CHATDESK_CLIENT_ID and CHATDESK_BRANCH_ID environment variables work too."
                .to_string(),
        }
        .into())
    }
}

/// Operation a notice refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Fetching the conversation list
    ListConversations,
    /// Loading one conversation
    LoadConversation,
    /// Starting or continuing a conversation
    SendMessage,
    /// Opening greeting
    Greeting,
    /// Archiving a conversation
    Archive,
    /// Renaming a conversation
    Retitle,
    /// Speech-to-text
    Transcribe,
    /// Text-to-speech
    Synthesize,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::ListConversations => "loading conversations",
            Operation::LoadConversation => "loading conversation",
            Operation::SendMessage => "sending message",
            Operation::Greeting => "loading greeting",
            Operation::Archive => "archiving conversation",
            Operation::Retitle => "renaming conversation",
            Operation::Transcribe => "transcription",
            Operation::Synthesize => "voice synthesis",
        };
        write!(f, "{}", label)
    }
}

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational, nothing failed
    Info,
    /// The operation failed and was aborted
    Error,
}

/// User-visible annotation produced by an operation
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Operation that produced the notice
    pub operation: Operation,
    /// Message for the user
    pub message: String,
    /// When the notice was raised
    pub at: DateTime<Utc>,
}

impl Notice {
    /// Create an error notice for a failed operation
    pub fn error(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            operation,
            message: message.into(),
            at: Utc::now(),
        }
    }

    /// Create an informational notice
    pub fn info(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            operation,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Error => write!(f, "Error {}: {}", self.operation, self.message),
            NoticeLevel::Info => write!(f, "{}", self.message),
        }
    }
}

/// Ephemeral presentation flags
#[derive(Debug, Clone, Default)]
pub struct UiFlags {
    /// Topic whose quick questions are shown, `None` for all
    pub topic_filter: Option<String>,
    /// Conversations currently in title edit mode
    pub editing: HashSet<String>,
    /// Synthesized audio is being played
    pub playing_audio: bool,
}

/// Client-local state for one user visit
#[derive(Debug, Clone)]
pub struct Session {
    params: SessionParams,
    pub(crate) active_conversation_id: Option<String>,
    pub(crate) messages: Vec<Message>,
    pub(crate) conversations: ConversationCache,
    pub(crate) flags: UiFlags,
    pub(crate) notices: Vec<Notice>,
}

impl Session {
    /// Create an empty session
    ///
    /// # Errors
    ///
    /// Returns error if the bootstrap parameters are incomplete
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdesk::session::{Session, SessionParams};
    ///
    /// let session = Session::new(SessionParams::new("c1", "b1")).unwrap();
    /// assert!(session.is_empty());
    /// assert!(Session::new(SessionParams::new("", "b1")).is_err());
    /// ```
    pub fn new(params: SessionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            active_conversation_id: None,
            messages: Vec::new(),
            conversations: ConversationCache::new(),
            flags: UiFlags::default(),
            notices: Vec::new(),
        })
    }

    /// Client identifier
    pub fn client_id(&self) -> &str {
        &self.params.client_id
    }

    /// Branch identifier
    pub fn branch_id(&self) -> &str {
        &self.params.branch_id
    }

    /// User identifier, defaulting to the client identifier
    pub fn user_id(&self) -> &str {
        self.params.effective_user_id()
    }

    /// Conversation the next message continues, if any
    pub fn active_conversation_id(&self) -> Option<&str> {
        self.active_conversation_id.as_deref()
    }

    /// Local message log
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Cached conversation list
    pub fn conversations(&self) -> &ConversationCache {
        &self.conversations
    }

    /// UI flags
    pub fn flags(&self) -> &UiFlags {
        &self.flags
    }

    /// Notices raised since they were last drained
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Remove and return all pending notices
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// No active conversation and no messages
    pub fn is_empty(&self) -> bool {
        self.active_conversation_id.is_none() && self.messages.is_empty()
    }

    pub(crate) fn reset(&mut self) {
        self.active_conversation_id = None;
        self.messages.clear();
        self.conversations.invalidate();
    }
}
