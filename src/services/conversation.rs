//! HTTP client for the conversation service
//!
//! Implements [`ConversationService`] against the REST API rooted at
//! `{api_base}/conversations`. Read and update calls use the short read
//! timeout; start and continue wait for a model reply and use the longer
//! generation timeout.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::{ChatdeskError, Result};
use crate::services::{
    build_client, ensure_success, read_envelope, transport_error, ContinueRequest,
    ConversationPage, ConversationService, ConversationUpdate, ListQuery, Reply, StartRequest,
    CONVERSATION_SERVICE,
};
use crate::session::{ConversationSummary, Message};

/// `data` member of the list response
#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    conversations: Vec<ConversationSummary>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    page: Option<u32>,
}

/// `data` member of the detail response
#[derive(Debug, Deserialize)]
struct DetailData {
    #[serde(default)]
    messages: Vec<Message>,
}

/// `data` member of start and continue responses
#[derive(Debug, Deserialize)]
struct ReplyData {
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    response: Option<String>,
}

/// reqwest-backed conversation service client
///
/// # Examples
///
/// ```
/// use chatdesk::config::ServiceConfig;
/// use chatdesk::services::HttpConversationService;
///
/// let service = HttpConversationService::new(&ServiceConfig::default()).unwrap();
/// assert_eq!(service.base_url(), "http://localhost:8000/ai/conversations");
/// ```
pub struct HttpConversationService {
    client: Client,
    base_url: String,
    read_timeout: Duration,
    generation_timeout: Duration,
}

impl HttpConversationService {
    /// Create a client from service configuration
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = build_client()?;
        let base_url = config.conversations_url();

        tracing::info!("Initialized conversation service client: {}", base_url);

        Ok(Self {
            client,
            base_url,
            read_timeout: config.timeouts.read(),
            generation_timeout: config.timeouts.generation(),
        })
    }

    /// Collection URL requests are built from
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn conversation_url(&self, conversation_id: &str) -> String {
        format!("{}/{}", self.base_url, conversation_id)
    }

    fn into_reply(data: ReplyData, fallback_id: Option<&str>) -> Result<Reply> {
        let conversation_id = data
            .conversation_id
            .filter(|id| !id.is_empty())
            .or_else(|| fallback_id.map(str::to_string))
            .ok_or_else(|| ChatdeskError::Payload {
                service: CONVERSATION_SERVICE.to_string(),
                message: "reply is missing conversation_id".to_string(),
            })?;

        let response = data
            .response
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ChatdeskError::Payload {
                service: CONVERSATION_SERVICE.to_string(),
                message: "reply has no response text".to_string(),
            })?;

        Ok(Reply {
            conversation_id,
            response,
        })
    }
}

#[async_trait]
impl ConversationService for HttpConversationService {
    async fn list(&self, query: &ListQuery) -> Result<ConversationPage> {
        tracing::debug!(
            user_id = %query.user_id,
            page = query.page,
            page_size = query.page_size,
            "Fetching conversations"
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("user_id", query.user_id.as_str()),
                ("status", "active"),
                ("page", &query.page.to_string()),
                ("page_size", &query.page_size.to_string()),
            ])
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| transport_error(CONVERSATION_SERVICE, e))?;

        let response = ensure_success(CONVERSATION_SERVICE, response).await?;
        let data: ListData = read_envelope(CONVERSATION_SERVICE, response).await?;

        tracing::debug!("Fetched {} conversations", data.conversations.len());
        Ok(ConversationPage {
            conversations: data.conversations,
            total: data.total,
            page: data.page.unwrap_or(query.page),
        })
    }

    async fn detail(&self, conversation_id: &str) -> Result<Vec<Message>> {
        tracing::debug!(conversation_id, "Fetching conversation detail");

        let response = self
            .client
            .get(self.conversation_url(conversation_id))
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| transport_error(CONVERSATION_SERVICE, e))?;

        let response = ensure_success(CONVERSATION_SERVICE, response).await?;
        let data: DetailData = read_envelope(CONVERSATION_SERVICE, response).await?;
        Ok(data.messages)
    }

    async fn start(&self, request: &StartRequest) -> Result<Reply> {
        tracing::debug!(user_id = %request.user_id, "Starting conversation");

        // The start endpoint takes its arguments as query parameters.
        let response = self
            .client
            .post(format!("{}/start", self.base_url))
            .query(request)
            .timeout(self.generation_timeout)
            .send()
            .await
            .map_err(|e| transport_error(CONVERSATION_SERVICE, e))?;

        let response = ensure_success(CONVERSATION_SERVICE, response).await?;
        let data: ReplyData = read_envelope(CONVERSATION_SERVICE, response).await?;
        let reply = Self::into_reply(data, None)?;

        tracing::info!(conversation_id = %reply.conversation_id, "Conversation started");
        Ok(reply)
    }

    async fn continue_conversation(&self, request: &ContinueRequest) -> Result<Reply> {
        tracing::debug!(conversation_id = %request.conversation_id, "Continuing conversation");

        let response = self
            .client
            .post(format!(
                "{}/continue",
                self.conversation_url(&request.conversation_id)
            ))
            .json(request)
            .timeout(self.generation_timeout)
            .send()
            .await
            .map_err(|e| transport_error(CONVERSATION_SERVICE, e))?;

        let response = ensure_success(CONVERSATION_SERVICE, response).await?;
        let data: ReplyData = read_envelope(CONVERSATION_SERVICE, response).await?;
        Self::into_reply(data, Some(&request.conversation_id))
    }

    async fn update(&self, conversation_id: &str, update: &ConversationUpdate) -> Result<()> {
        tracing::debug!(conversation_id, ?update, "Updating conversation");

        let response = self
            .client
            .patch(self.conversation_url(conversation_id))
            .json(&update.body())
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| transport_error(CONVERSATION_SERVICE, e))?;

        ensure_success(CONVERSATION_SERVICE, response).await?;
        Ok(())
    }
}
