//! Conversation session controller
//!
//! [`SessionController`] owns one [`Session`] and is the only place that
//! mutates it. Every operation follows the same contract:
//!
//! 1. call the relevant remote service once;
//! 2. apply the result to the session only after the full response parsed;
//! 3. on failure, record a [`Notice`], leave confirmed state untouched and
//!    return the error;
//! 4. tell subscribed observers what changed.
//!
//! Operations take `&mut self`, so a session never has two calls in flight.
//!
//! # Example
//!
//! ```no_run
//! use chatdesk::config::Config;
//! use chatdesk::controller::{Collaborators, SessionController};
//! use chatdesk::session::{Session, SessionParams};
//!
//! # async fn example() -> chatdesk::error::Result<()> {
//! let config = Config::default();
//! let session = Session::new(SessionParams::new("c1", "b1"))?;
//! let mut controller =
//!     SessionController::new(session, Collaborators::http(&config)?, &config);
//!
//! controller.subscribe(|event| println!("{:?}", event));
//! controller.send_message("What is my most popular product?").await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, GenerationConfig, SessionConfig, SpeechConfig};
use crate::error::{ChatdeskError, Result};
use crate::playback::{AudioSink, FilePlayback};
use crate::services::{
    AudioUpload, ContinueRequest, ConversationService, ConversationUpdate,
    HttpConversationService, HttpSpeechService, ListQuery, SpeechRequest, SpeechToText,
    StartRequest, TextToSpeech,
};
use crate::session::{ConversationSummary, Message, Notice, Operation, Role, Session};
use crate::topics::{find_topic, visible_questions, TopicSet};

/// Change notification delivered to observers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A remote call started; the presentation should show it is busy
    Busy(Operation),
    /// The remote call finished, successfully or not
    Idle(Operation),
    /// The message log changed
    MessagesChanged,
    /// The active conversation changed
    ConversationChanged(Option<String>),
    /// The cached conversation list must be refetched
    ConversationListStale,
    /// The cached conversation list was refreshed
    ConversationListUpdated,
    /// A conversation entered or left title edit mode
    EditModeChanged {
        /// Conversation id
        conversation_id: String,
        /// Whether edit mode is now on
        editing: bool,
    },
    /// The quick question topic filter changed
    TopicFilterChanged(Option<String>),
    /// Audio playback started or stopped
    PlaybackChanged(bool),
    /// A notice was raised
    Notice(Notice),
}

type Observer = Box<dyn Fn(&SessionEvent) + Send + Sync>;

/// Remote collaborators the controller talks to
#[derive(Clone)]
pub struct Collaborators {
    /// Conversation service
    pub conversations: Arc<dyn ConversationService>,
    /// Speech-to-text service
    pub speech_to_text: Arc<dyn SpeechToText>,
    /// Text-to-speech service
    pub text_to_speech: Arc<dyn TextToSpeech>,
    /// Where synthesized audio goes
    pub audio: Arc<dyn AudioSink>,
}

impl Collaborators {
    /// HTTP collaborators and file playback built from configuration
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be created
    pub fn http(config: &Config) -> Result<Self> {
        let speech = Arc::new(HttpSpeechService::new(&config.service)?);
        Ok(Self {
            conversations: Arc::new(HttpConversationService::new(&config.service)?),
            speech_to_text: speech.clone(),
            text_to_speech: speech,
            audio: Arc::new(FilePlayback::from_config(&config.speech)),
        })
    }
}

/// Drives one session against the remote services
pub struct SessionController {
    session: Session,
    services: Collaborators,
    session_config: SessionConfig,
    generation: GenerationConfig,
    speech: SpeechConfig,
    topics: Vec<TopicSet>,
    observers: Vec<Observer>,
}

impl SessionController {
    /// Create a controller for a session
    pub fn new(session: Session, services: Collaborators, config: &Config) -> Self {
        tracing::info!(
            client_id = %session.client_id(),
            branch_id = %session.branch_id(),
            archive_on_new_chat = config.session.archive_on_new_chat,
            "Session controller ready"
        );

        Self {
            session,
            services,
            session_config: config.session.clone(),
            generation: config.generation.clone(),
            speech: config.speech.clone(),
            topics: config.topics.clone(),
            observers: Vec::new(),
        }
    }

    /// Current session state
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Remove and return pending notices
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.session.take_notices()
    }

    /// Register an observer for state changes
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    fn emit(&self, event: SessionEvent) {
        for observer in &self.observers {
            observer(&event);
        }
    }

    fn fail(&mut self, operation: Operation, error: anyhow::Error) -> anyhow::Error {
        tracing::warn!("{} failed: {:#}", operation, error);
        let notice = Notice::error(operation, error.to_string());
        self.session.notices.push(notice.clone());
        self.emit(SessionEvent::Notice(notice));
        error
    }

    fn inform(&mut self, operation: Operation, message: &str) {
        let notice = Notice::info(operation, message);
        self.session.notices.push(notice.clone());
        self.emit(SessionEvent::Notice(notice));
    }

    fn invalidate_conversations(&mut self) {
        self.session.conversations.invalidate();
        self.emit(SessionEvent::ConversationListStale);
    }

    fn set_active(&mut self, conversation_id: Option<String>) {
        if self.session.active_conversation_id != conversation_id {
            self.session.active_conversation_id = conversation_id.clone();
            self.emit(SessionEvent::ConversationChanged(conversation_id));
        }
    }

    fn start_request(&self, message: &str) -> StartRequest {
        StartRequest {
            user_id: self.session.user_id().to_string(),
            message: message.to_string(),
            context_type: self.generation.context_type.clone(),
            client_id: self.session.client_id().to_string(),
            branch_id: self.session.branch_id().to_string(),
        }
    }

    /// Send a user message, starting a conversation when none is active
    ///
    /// The user message is appended before the call. If starting a new
    /// conversation fails the message is removed again so the session stays
    /// empty; if continuing fails the message stays in the log. Blank input
    /// is ignored.
    ///
    /// # Errors
    ///
    /// Returns the service error after recording it as a notice
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring blank message");
            return Ok(());
        }

        self.session.messages.push(Message::user(text));
        self.emit(SessionEvent::MessagesChanged);
        self.emit(SessionEvent::Busy(Operation::SendMessage));

        let result = match self.session.active_conversation_id.clone() {
            None => {
                let request = self.start_request(text);
                self.services.conversations.start(&request).await
            }
            Some(conversation_id) => {
                let request = ContinueRequest {
                    conversation_id,
                    message: text.to_string(),
                    model: self.generation.model.clone(),
                    temperature: self.generation.temperature,
                    max_tokens: self.generation.max_tokens,
                };
                self.services
                    .conversations
                    .continue_conversation(&request)
                    .await
            }
        };
        self.emit(SessionEvent::Idle(Operation::SendMessage));

        match result {
            Ok(reply) => {
                if self.session.active_conversation_id.is_none() {
                    self.set_active(Some(reply.conversation_id));
                }
                self.session.messages.push(Message::assistant(reply.response));
                self.emit(SessionEvent::MessagesChanged);
                self.invalidate_conversations();
                Ok(())
            }
            Err(e) => {
                if self.session.active_conversation_id.is_none() {
                    self.session.messages.pop();
                    self.emit(SessionEvent::MessagesChanged);
                }
                Err(self.fail(Operation::SendMessage, e))
            }
        }
    }

    /// Open a conversation with the configured greeting
    ///
    /// Only runs on an empty session. The greeting itself is not shown; only
    /// the assistant reply is appended. Returns whether a greeting was sent.
    ///
    /// # Errors
    ///
    /// Returns the service error after recording it as a notice
    pub async fn greet(&mut self) -> Result<bool> {
        if !self.session.is_empty() {
            return Ok(false);
        }
        let Some(greeting) = self.session_config.greeting.clone() else {
            return Ok(false);
        };

        self.emit(SessionEvent::Busy(Operation::Greeting));
        let request = self.start_request(&greeting);
        let result = self.services.conversations.start(&request).await;
        self.emit(SessionEvent::Idle(Operation::Greeting));

        match result {
            Ok(reply) => {
                self.set_active(Some(reply.conversation_id));
                self.session.messages.push(Message::assistant(reply.response));
                self.emit(SessionEvent::MessagesChanged);
                self.invalidate_conversations();
                Ok(true)
            }
            Err(e) => Err(self.fail(Operation::Greeting, e)),
        }
    }

    /// Replace the message log with a conversation from the server
    ///
    /// # Errors
    ///
    /// Returns the service error after recording it as a notice; the current
    /// conversation and messages are kept in that case
    pub async fn load_conversation(&mut self, conversation_id: &str) -> Result<()> {
        self.emit(SessionEvent::Busy(Operation::LoadConversation));
        let result = self.services.conversations.detail(conversation_id).await;
        self.emit(SessionEvent::Idle(Operation::LoadConversation));

        match result {
            Ok(messages) => {
                tracing::info!(
                    conversation_id,
                    messages = messages.len(),
                    "Loaded conversation"
                );
                self.session.messages = messages;
                self.set_active(Some(conversation_id.to_string()));
                self.emit(SessionEvent::MessagesChanged);
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::LoadConversation, e)),
        }
    }

    /// Leave the current conversation and return to an empty session
    ///
    /// When `archive_on_new_chat` is enabled the active conversation is
    /// archived first. An archive failure is reported as a notice but the
    /// reset still happens.
    pub async fn start_new_chat(&mut self) {
        if self.session_config.archive_on_new_chat {
            if let Some(conversation_id) = self.session.active_conversation_id.clone() {
                self.emit(SessionEvent::Busy(Operation::Archive));
                let result = self
                    .services
                    .conversations
                    .update(&conversation_id, &ConversationUpdate::Archive)
                    .await;
                self.emit(SessionEvent::Idle(Operation::Archive));

                match result {
                    Ok(()) => tracing::info!(%conversation_id, "Archived conversation"),
                    Err(e) => {
                        self.fail(Operation::Archive, e);
                    }
                }
            }
        }

        let had_messages = !self.session.messages.is_empty();
        let previous = self.session.active_conversation_id.clone();
        self.session.reset();

        if previous.is_some() {
            self.emit(SessionEvent::ConversationChanged(None));
        }
        if had_messages {
            self.emit(SessionEvent::MessagesChanged);
        }
        self.emit(SessionEvent::ConversationListStale);
    }

    /// Rename a conversation
    ///
    /// The new title only shows up after the next list refresh.
    ///
    /// # Errors
    ///
    /// Returns error if retitling is disabled, the title is blank, or the
    /// service call fails
    pub async fn retitle(&mut self, conversation_id: &str, title: &str) -> Result<()> {
        if !self.session_config.retitle_enabled {
            let error = ChatdeskError::Unsupported("renaming conversations is disabled".into());
            return Err(self.fail(Operation::Retitle, error.into()));
        }

        let title = title.trim();
        if title.is_empty() {
            let error = ChatdeskError::Validation("title cannot be empty".into());
            return Err(self.fail(Operation::Retitle, error.into()));
        }

        self.emit(SessionEvent::Busy(Operation::Retitle));
        let result = self
            .services
            .conversations
            .update(conversation_id, &ConversationUpdate::Title(title.to_string()))
            .await;
        self.emit(SessionEvent::Idle(Operation::Retitle));

        match result {
            Ok(()) => {
                tracing::info!(conversation_id, title, "Renamed conversation");
                self.invalidate_conversations();
                if self.session.flags.editing.remove(conversation_id) {
                    self.emit(SessionEvent::EditModeChanged {
                        conversation_id: conversation_id.to_string(),
                        editing: false,
                    });
                }
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::Retitle, e)),
        }
    }

    /// Archive a conversation
    ///
    /// Archiving the active conversation also resets the session.
    ///
    /// # Errors
    ///
    /// Returns the service error after recording it as a notice
    pub async fn archive(&mut self, conversation_id: &str) -> Result<()> {
        self.emit(SessionEvent::Busy(Operation::Archive));
        let result = self
            .services
            .conversations
            .update(conversation_id, &ConversationUpdate::Archive)
            .await;
        self.emit(SessionEvent::Idle(Operation::Archive));

        match result {
            Ok(()) => {
                tracing::info!(conversation_id, "Archived conversation");
                self.session.flags.editing.remove(conversation_id);
                if self.session.active_conversation_id() == Some(conversation_id) {
                    self.session.reset();
                    self.emit(SessionEvent::ConversationChanged(None));
                    self.emit(SessionEvent::MessagesChanged);
                }
                self.invalidate_conversations();
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::Archive, e)),
        }
    }

    /// Fetch a page of active conversations into the cache
    ///
    /// # Errors
    ///
    /// Returns the service error after recording it as a notice; the cache
    /// keeps its previous entries and staleness
    pub async fn refresh_conversations(&mut self, page: u32) -> Result<&[ConversationSummary]> {
        let query = ListQuery {
            user_id: self.session.user_id().to_string(),
            page: page.max(1),
            page_size: self.session_config.page_size,
        };

        self.emit(SessionEvent::Busy(Operation::ListConversations));
        let result = self.services.conversations.list(&query).await;
        self.emit(SessionEvent::Idle(Operation::ListConversations));

        match result {
            Ok(fetched) => {
                self.session
                    .conversations
                    .replace(fetched.conversations, fetched.total, fetched.page);
                self.emit(SessionEvent::ConversationListUpdated);
                Ok(self.session.conversations.entries())
            }
            Err(e) => Err(self.fail(Operation::ListConversations, e)),
        }
    }

    /// Cached conversation list, refetched first if stale
    ///
    /// # Errors
    ///
    /// Returns the service error when a refetch was needed and failed
    pub async fn conversations(&mut self) -> Result<&[ConversationSummary]> {
        if self.session.conversations.is_stale() {
            let page = self.session.conversations.page();
            return self.refresh_conversations(page).await;
        }
        Ok(self.session.conversations.entries())
    }

    /// Transcribe audio and send the transcript as a user message
    ///
    /// Returns the transcript, or `None` when nothing was recognized; in that
    /// case no message is sent.
    ///
    /// # Errors
    ///
    /// Returns error if transcription or the follow-up send fails
    pub async fn transcribe_and_send(&mut self, upload: &AudioUpload) -> Result<Option<String>> {
        self.emit(SessionEvent::Busy(Operation::Transcribe));
        let result = self.services.speech_to_text.transcribe(upload).await;
        self.emit(SessionEvent::Idle(Operation::Transcribe));

        match result {
            Ok(Some(text)) if !text.trim().is_empty() => {
                self.send_message(&text).await?;
                Ok(Some(text))
            }
            Ok(_) => {
                self.inform(Operation::Transcribe, "No speech was recognized in the audio");
                Ok(None)
            }
            Err(e) => Err(self.fail(Operation::Transcribe, e)),
        }
    }

    /// Synthesize text and play it through the audio sink
    ///
    /// Never touches the message log or the active conversation.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    pub async fn synthesize(&mut self, text: &str) -> Result<Option<PathBuf>> {
        let request = SpeechRequest {
            text: text.to_string(),
            model: self.speech.model.clone(),
            voice: self.speech.voice.clone(),
            format: self.speech.format.clone(),
            speed: self.speech.speed,
        };

        self.session.flags.playing_audio = true;
        self.emit(SessionEvent::PlaybackChanged(true));
        self.emit(SessionEvent::Busy(Operation::Synthesize));

        let result = match self.services.text_to_speech.synthesize(&request).await {
            Ok(audio) => self.services.audio.play(&audio).await,
            Err(e) => Err(e),
        };

        self.emit(SessionEvent::Idle(Operation::Synthesize));
        self.session.flags.playing_audio = false;
        self.emit(SessionEvent::PlaybackChanged(false));

        result.map_err(|e| self.fail(Operation::Synthesize, e))
    }

    /// Synthesize the assistant message at `index` of the message log
    ///
    /// # Errors
    ///
    /// Returns error if there is no assistant message at `index` or if
    /// synthesis fails
    pub async fn speak_message(&mut self, index: usize) -> Result<Option<PathBuf>> {
        let content = match self.session.messages.get(index) {
            Some(message) if message.role == Role::Assistant => message.content.clone(),
            _ => {
                let error =
                    ChatdeskError::Validation(format!("no assistant message at position {}", index));
                return Err(self.fail(Operation::Synthesize, error.into()));
            }
        };
        self.synthesize(&content).await
    }

    /// Put a conversation into title edit mode
    ///
    /// # Errors
    ///
    /// Returns error if retitling is disabled
    pub fn begin_edit(&mut self, conversation_id: &str) -> Result<()> {
        if !self.session_config.retitle_enabled {
            let error = ChatdeskError::Unsupported("renaming conversations is disabled".into());
            return Err(self.fail(Operation::Retitle, error.into()));
        }
        if self.session.flags.editing.insert(conversation_id.to_string()) {
            self.emit(SessionEvent::EditModeChanged {
                conversation_id: conversation_id.to_string(),
                editing: true,
            });
        }
        Ok(())
    }

    /// Leave title edit mode without saving
    pub fn cancel_edit(&mut self, conversation_id: &str) {
        if self.session.flags.editing.remove(conversation_id) {
            self.emit(SessionEvent::EditModeChanged {
                conversation_id: conversation_id.to_string(),
                editing: false,
            });
        }
    }

    /// Whether a conversation is in title edit mode
    pub fn is_editing(&self, conversation_id: &str) -> bool {
        self.session.flags.editing.contains(conversation_id)
    }

    /// Restrict quick questions to one topic, or show all with `None`
    ///
    /// # Errors
    ///
    /// Returns error if the topic is not configured
    pub fn set_topic_filter(&mut self, topic: Option<&str>) -> Result<()> {
        let filter = match topic {
            Some(name) => {
                let set = find_topic(&self.topics, name).ok_or_else(|| {
                    ChatdeskError::Validation(format!("unknown topic: {}", name))
                })?;
                Some(set.name.clone())
            }
            None => None,
        };

        if self.session.flags.topic_filter != filter {
            self.session.flags.topic_filter = filter.clone();
            self.emit(SessionEvent::TopicFilterChanged(filter));
        }
        Ok(())
    }

    /// Configured topic sets
    pub fn topics(&self) -> &[TopicSet] {
        &self.topics
    }

    /// Quick questions visible under the current topic filter
    pub fn quick_questions(&self) -> Vec<&str> {
        visible_questions(&self.topics, self.session.flags.topic_filter.as_deref())
    }

    /// Send the quick question at `index` of [`Self::quick_questions`]
    ///
    /// # Errors
    ///
    /// Returns error if the index is out of range or sending fails
    pub async fn ask_quick_question(&mut self, index: usize) -> Result<()> {
        let question = self
            .quick_questions()
            .get(index)
            .map(|q| q.to_string())
            .ok_or_else(|| ChatdeskError::Validation(format!("no quick question {}", index + 1)))?;
        self.send_message(&question).await
    }
}
