//! Command-line interface definition for chatdesk
//!
//! This module defines the CLI structure using clap's derive API,
//! providing an interactive chat command plus one-shot commands for
//! conversation management, transcription and speech synthesis.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::error::Result;
use crate::session::SessionParams;

/// chatdesk - terminal client for a remote conversation API
///
/// Chat with the conversation service, browse and manage past
/// conversations, and round-trip audio through the speech services.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatdesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override the API base URL from config
    #[arg(long)]
    pub api_base: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Session bootstrap arguments shared by session-scoped commands
///
/// Identifiers can be given individually or through a session link whose
/// query string carries `client_id`, `branch_id` and optionally `user_id`.
/// Individual flags win over values found in the link.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Client identifier
    #[arg(long, env = "CHATDESK_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Branch identifier
    #[arg(long, env = "CHATDESK_BRANCH_ID")]
    pub branch_id: Option<String>,

    /// User identifier (defaults to the client identifier)
    #[arg(long, env = "CHATDESK_USER_ID")]
    pub user_id: Option<String>,

    /// Session link, e.g. `https://host/?client_id=..&branch_id=..`
    #[arg(long)]
    pub link: Option<String>,
}

impl SessionArgs {
    /// Resolve the arguments into validated session parameters
    ///
    /// # Errors
    ///
    /// Returns error if the link cannot be parsed or if `client_id` or
    /// `branch_id` end up empty.
    pub fn to_params(&self) -> Result<SessionParams> {
        let mut params = match &self.link {
            Some(link) => SessionParams::from_url(link)?,
            None => SessionParams::default(),
        };

        if let Some(client_id) = &self.client_id {
            params.client_id = client_id.clone();
        }
        if let Some(branch_id) = &self.branch_id {
            params.branch_id = branch_id.clone();
        }
        if let Some(user_id) = &self.user_id {
            params.user_id = Some(user_id.clone());
        }

        params.validate()?;
        Ok(params)
    }
}

/// Available commands for chatdesk
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Session identifiers
        #[command(flatten)]
        session: SessionArgs,

        /// Skip the automatic greeting when the session starts empty
        #[arg(long)]
        no_greeting: bool,

        /// Resume an existing conversation by id
        #[arg(short, long)]
        resume: Option<String>,
    },

    /// Browse and manage conversations
    Conversations {
        /// Session identifiers
        #[command(flatten)]
        session: SessionArgs,

        /// Conversation subcommand
        #[command(subcommand)]
        command: ConversationCommand,
    },

    /// Transcribe an audio file through the speech-to-text service
    Transcribe {
        /// Audio file to upload
        file: PathBuf,

        /// MIME type of the file (guessed from the extension when omitted)
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Synthesize speech for a piece of text
    Speak {
        /// Text to synthesize
        text: String,

        /// Write the audio to this path instead of the configured output dir
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Conversation management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConversationCommand {
    /// List active conversations
    List {
        /// Page number (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the messages of a conversation
    Show {
        /// Conversation id
        id: String,
    },

    /// Change the title of a conversation
    Rename {
        /// Conversation id
        id: String,

        /// New title
        title: String,
    },

    /// Archive a conversation
    Archive {
        /// Conversation id
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            api_base: None,
            command: Commands::Chat {
                session: SessionArgs::default(),
                no_greeting: false,
                resume: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(cli.api_base.is_none());

        if let Commands::Chat {
            no_greeting,
            resume,
            ..
        } = cli.command
        {
            assert!(!no_greeting);
            assert!(resume.is_none());
        } else {
            panic!("Expected default command to be Chat");
        }
    }

    #[test]
    fn test_cli_parse_chat_with_ids() {
        let cli = Cli::try_parse_from([
            "chatdesk",
            "chat",
            "--client-id",
            "c1",
            "--branch-id",
            "b1",
        ])
        .unwrap();

        match cli.command {
            Commands::Chat { session, .. } => {
                assert_eq!(session.client_id.as_deref(), Some("c1"));
                assert_eq!(session.branch_id.as_deref(), Some("b1"));
            }
            _ => panic!("Expected Chat command"),
        }
    }

    #[test]
    fn test_cli_parse_conversations_rename() {
        let cli = Cli::try_parse_from([
            "chatdesk",
            "conversations",
            "--client-id",
            "c1",
            "--branch-id",
            "b1",
            "rename",
            "k1",
            "Quarterly sales",
        ])
        .unwrap();

        match cli.command {
            Commands::Conversations {
                command: ConversationCommand::Rename { id, title },
                ..
            } => {
                assert_eq!(id, "k1");
                assert_eq!(title, "Quarterly sales");
            }
            _ => panic!("Expected Conversations Rename command"),
        }
    }

    #[test]
    fn test_cli_parse_list_defaults_to_first_page() {
        let cli = Cli::try_parse_from([
            "chatdesk",
            "conversations",
            "--client-id",
            "c1",
            "--branch-id",
            "b1",
            "list",
        ])
        .unwrap();

        match cli.command {
            Commands::Conversations {
                command: ConversationCommand::List { page, json },
                ..
            } => {
                assert_eq!(page, 1);
                assert!(!json);
            }
            _ => panic!("Expected Conversations List command"),
        }
    }

    #[test]
    fn test_cli_parse_global_api_base() {
        let cli = Cli::try_parse_from([
            "chatdesk",
            "--api-base",
            "http://localhost:9000/ai",
            "speak",
            "hi",
        ])
        .unwrap();
        assert_eq!(cli.api_base.as_deref(), Some("http://localhost:9000/ai"));
    }

    #[test]
    fn test_session_args_link_and_flag_override() {
        let args = SessionArgs {
            client_id: None,
            branch_id: Some("b2".to_string()),
            user_id: None,
            link: Some("http://localhost:8501/?client_id=c1&branch_id=b1".to_string()),
        };
        let params = args.to_params().unwrap();
        assert_eq!(params.client_id, "c1");
        assert_eq!(params.branch_id, "b2");
        assert_eq!(params.effective_user_id(), "c1");
    }

    #[test]
    fn test_session_args_missing_ids_is_error() {
        let args = SessionArgs {
            client_id: Some("c1".to_string()),
            ..Default::default()
        };
        let err = args.to_params().unwrap_err();
        assert!(err.to_string().contains("branch_id"));
    }
}
