//! chatdesk - terminal client for a remote conversation API
//!
//! This library keeps the client-side state of one conversation session and
//! drives the remote conversation, speech-to-text and text-to-speech services.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: Session state, messages, conversation summaries and notices
//! - `controller`: The session controller that applies service results to state
//! - `services`: Service traits and their HTTP implementations
//! - `playback`: Where synthesized audio ends up
//! - `topics`: Quick question topic sets
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use chatdesk::config::Config;
//! use chatdesk::controller::{Collaborators, SessionController};
//! use chatdesk::session::{Session, SessionParams};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let session = Session::new(SessionParams::new("c1", "b1"))?;
//!     let mut controller =
//!         SessionController::new(session, Collaborators::http(&config)?, &config);
//!     controller.greet().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod playback;
pub mod services;
pub mod session;
pub mod topics;

// Re-export commonly used types
pub use config::Config;
pub use controller::{Collaborators, SessionController, SessionEvent};
pub use error::{ChatdeskError, Result};
pub use session::{ConversationSummary, Message, Notice, Role, Session, SessionParams};
