//! chatdesk - terminal client for a remote conversation API
//!
#![doc = "Main entry point for the chatdesk application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatdesk::cli::{Cli, Commands};
use chatdesk::commands;
use chatdesk::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat {
            session,
            no_greeting,
            resume,
        } => {
            let params = session.to_params()?;
            if let Some(r) = &resume {
                tracing::debug!("Resuming conversation: {}", r);
            }
            commands::chat::run_chat(config, params, !no_greeting, resume).await?;
            Ok(())
        }
        Commands::Conversations { session, command } => {
            tracing::info!("Starting conversation management command");
            let params = session.to_params()?;
            commands::conversations::handle_conversations(&config, params, command).await?;
            Ok(())
        }
        Commands::Transcribe { file, mime_type } => {
            tracing::info!("Transcribing {}", file.display());
            commands::speech::transcribe_file(&config, &file, mime_type).await?;
            Ok(())
        }
        Commands::Speak { text, output } => {
            commands::speech::speak(&config, &text, output).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins over `--verbose`. Logs go to stderr so they do not mix
/// with command output.
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "chatdesk=debug" } else { "chatdesk=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
