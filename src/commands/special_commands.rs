//! Special commands parser for interactive chat mode
//!
//! Lines starting with `/` manage the session instead of being sent to the
//! assistant: browsing, loading, renaming and archiving conversations, quick
//! questions, voice input and playback. Command names are case-insensitive;
//! arguments keep their case.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// A conversation named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationRef {
    /// 1-based position in the last printed list
    Position(usize),
    /// Conversation id
    Id(String),
}

impl ConversationRef {
    fn parse(arg: &str) -> Self {
        match arg.parse::<usize>() {
            Ok(n) if n > 0 => ConversationRef::Position(n),
            _ => ConversationRef::Id(arg.to_string()),
        }
    }
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Leave the current conversation and start fresh
    NewChat,

    /// Show a page of conversations (current page when `None`)
    ListConversations(Option<u32>),

    /// Load a conversation into the session
    Load(ConversationRef),

    /// Put a conversation into title edit mode
    Edit(ConversationRef),

    /// Leave title edit mode without saving
    CancelEdit(ConversationRef),

    /// Rename a conversation
    Rename {
        /// Conversation to rename
        target: ConversationRef,
        /// New title
        title: String,
    },

    /// Archive a conversation, the active one when `None`
    Archive(Option<ConversationRef>),

    /// List configured topics
    ShowTopics,

    /// Filter quick questions by topic; `None` shows every topic
    SetTopic(Option<String>),

    /// Show the visible quick questions
    ShowQuestions,

    /// Send quick question `n` (1-based)
    Ask(usize),

    /// Speak assistant message `n` (1-based), the latest when `None`
    Play(Option<usize>),

    /// Transcribe an audio file and send the transcript
    Transcribe(PathBuf),

    /// Display session status
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input is sent to the assistant.
    None,
}

fn missing(command: &str, usage: &str) -> CommandError {
    CommandError::MissingArgument {
        command: command.to_string(),
        usage: usage.to_string(),
    }
}

fn positive(command: &str, arg: &str) -> Result<usize, CommandError> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        }),
    }
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` if input starts with "/" but is not
/// a valid command, `CommandError::MissingArgument` when a required argument
/// is absent and `CommandError::UnsupportedArgument` for malformed numbers.
///
/// # Examples
///
/// ```
/// use chatdesk::commands::special_commands::{
///     parse_special_command, ConversationRef, SpecialCommand,
/// };
///
/// let cmd = parse_special_command("/load 2").unwrap();
/// assert_eq!(cmd, SpecialCommand::Load(ConversationRef::Position(2)));
///
/// let cmd = parse_special_command("/rename k1 Quarterly Sales").unwrap();
/// assert_eq!(
///     cmd,
///     SpecialCommand::Rename {
///         target: ConversationRef::Id("k1".to_string()),
///         title: "Quarterly Sales".to_string(),
///     }
/// );
///
/// let cmd = parse_special_command("how are sales?").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    // If input doesn't start with "/", it's not a command (except exit/quit)
    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match name.as_str() {
        "/new" | "/reset" => Ok(SpecialCommand::NewChat),

        "/list" | "/conversations" => {
            if rest.is_empty() {
                Ok(SpecialCommand::ListConversations(None))
            } else {
                let page = positive("/list", rest)?;
                let page = u32::try_from(page).map_err(|_| CommandError::UnsupportedArgument {
                    command: "/list".to_string(),
                    arg: rest.to_string(),
                })?;
                Ok(SpecialCommand::ListConversations(Some(page)))
            }
        }

        "/load" | "/open" => {
            if rest.is_empty() {
                return Err(missing("/load", "/load <number|conversation_id>"));
            }
            Ok(SpecialCommand::Load(ConversationRef::parse(rest)))
        }

        "/edit" => {
            if rest.is_empty() {
                return Err(missing("/edit", "/edit <number|conversation_id>"));
            }
            Ok(SpecialCommand::Edit(ConversationRef::parse(rest)))
        }

        "/cancel" => {
            if rest.is_empty() {
                return Err(missing("/cancel", "/cancel <number|conversation_id>"));
            }
            Ok(SpecialCommand::CancelEdit(ConversationRef::parse(rest)))
        }

        "/rename" => {
            let usage = "/rename <number|conversation_id> <title>";
            let (target, title) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| missing("/rename", usage))?;
            let title = title.trim();
            if title.is_empty() {
                return Err(missing("/rename", usage));
            }
            Ok(SpecialCommand::Rename {
                target: ConversationRef::parse(target),
                title: title.to_string(),
            })
        }

        "/archive" => {
            if rest.is_empty() {
                Ok(SpecialCommand::Archive(None))
            } else {
                Ok(SpecialCommand::Archive(Some(ConversationRef::parse(rest))))
            }
        }

        "/topics" => Ok(SpecialCommand::ShowTopics),
        "/topic" => match rest.to_lowercase().as_str() {
            "" => Err(missing("/topic", "/topic <name|all>")),
            "all" | "none" => Ok(SpecialCommand::SetTopic(None)),
            _ => Ok(SpecialCommand::SetTopic(Some(rest.to_string()))),
        },

        "/questions" | "/quick" => Ok(SpecialCommand::ShowQuestions),
        "/ask" => {
            if rest.is_empty() {
                return Err(missing("/ask", "/ask <number>"));
            }
            Ok(SpecialCommand::Ask(positive("/ask", rest)?))
        }

        "/play" | "/speak" => {
            if rest.is_empty() {
                Ok(SpecialCommand::Play(None))
            } else {
                Ok(SpecialCommand::Play(Some(positive("/play", rest)?)))
            }
        }

        "/audio" | "/voice" => {
            if rest.is_empty() {
                return Err(missing("/audio", "/audio <path/to/recording>"));
            }
            Ok(SpecialCommand::Transcribe(PathBuf::from(rest)))
        }

        "/status" => Ok(SpecialCommand::ShowStatus),
        "/help" | "/?" => Ok(SpecialCommand::Help),

        "exit" | "quit" | "/exit" | "/quit" => Ok(SpecialCommand::Exit),

        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

/// Display help text for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

CONVERSATIONS:
  /new                 - Start a new conversation
  /list [page]         - Show your active conversations
  /load <n|id>         - Load a conversation from the list
  /edit <n|id>         - Mark a conversation for renaming
  /cancel <n|id>       - Stop renaming a conversation
  /rename <n|id> <title> - Rename a conversation
  /archive [n|id]      - Archive a conversation (the current one by default)

QUICK QUESTIONS:
  /topics              - Show the available question topics
  /topic <name|all>    - Only show questions from one topic
  /questions           - Show the quick questions
  /ask <n>             - Send quick question n

VOICE:
  /audio <path>        - Transcribe a recording and send it
  /play [n]            - Read assistant reply n aloud (latest by default)

SESSION:
  /status              - Show the current session
  /help                - Show this help message
  exit                 - Exit interactive mode

NOTES:
  - Commands are case-insensitive
  - Regular text (not starting with /) is sent to the assistant
  - Numbers refer to the most recent /list, /questions or message log
"#
    );
}
