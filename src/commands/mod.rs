/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `chat`          - Interactive chat session
- `conversations` - One-shot conversation management (list, show, rename, archive)
- `speech`        - One-shot transcription and synthesis

All handlers go through the session controller or the service traits; none
of them talk HTTP directly.
*/

use crate::config::Config;
use crate::controller::{Collaborators, SessionController, SessionEvent};
use crate::error::{ChatdeskError, Result};
use crate::session::{ConversationSummary, Message, NoticeLevel, Role, Session, SessionParams};

// Special commands parser for interactive chat
pub mod special_commands;

fn print_message(message: &Message) {
    use colored::Colorize;

    match message.role {
        Role::User => println!("{} {}", "you:".bold().blue(), message.content),
        Role::Assistant => println!("{} {}", "assistant:".bold().green(), message.content),
    }
}

fn print_conversation_rows(session: &Session) {
    use colored::Colorize;

    let cache = session.conversations();
    if cache.entries().is_empty() {
        println!("{}", "No active conversations".dimmed());
        return;
    }

    for (i, summary) in cache.entries().iter().enumerate() {
        let active = session.active_conversation_id() == Some(summary.id.as_str());
        let title = summary.display_title(active);
        let title = if active {
            title.bold().to_string()
        } else {
            title
        };
        println!(
            "{:>3}. {}  {}  {}",
            i + 1,
            title,
            summary.caption().dimmed(),
            summary.id.dimmed()
        );
    }

    match cache.total() {
        Some(total) => println!(
            "{}",
            format!("Page {} ({} conversations in total)", cache.page(), total).dimmed()
        ),
        None => println!("{}", format!("Page {}", cache.page()).dimmed()),
    }
}

/// Create a controller wired to the HTTP services
fn build_controller(config: &Config, params: SessionParams) -> Result<SessionController> {
    let session = Session::new(params)?;
    let services = Collaborators::http(config)?;
    Ok(SessionController::new(session, services, config))
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Builds a session controller and runs a readline loop. Plain input is
    //! sent to the assistant; lines starting with `/` are special commands.
    //! Notices raised by the controller are printed through an observer.

    use super::*;
    use crate::commands::special_commands::{
        parse_special_command, print_help, ConversationRef, SpecialCommand,
    };
    use crate::services::{guess_audio_mime, AudioUpload};
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::path::Path;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration
    /// * `params` - Validated session identifiers
    /// * `greet` - Send the configured greeting when no conversation is resumed
    /// * `resume` - Conversation id to load before the first prompt
    ///
    /// # Errors
    ///
    /// Returns error if the services cannot be initialized or the terminal
    /// cannot be read
    pub async fn run_chat(
        config: Config,
        params: SessionParams,
        greet: bool,
        resume: Option<String>,
    ) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let mut controller = build_controller(&config, params)?;
        controller.subscribe(print_event);

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(controller.session());

        let mut printed = 0;
        match resume {
            Some(id) => {
                if controller.load_conversation(&id).await.is_ok() {
                    sync_transcript(&controller, &mut printed, true);
                }
            }
            None if greet => {
                if let Ok(true) = controller.greet().await {
                    sync_transcript(&controller, &mut printed, true);
                }
            }
            None => {}
        }
        controller.take_notices();

        loop {
            let prompt = format_prompt(controller.session());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(trimmed)?;

                    let command = match parse_special_command(trimmed) {
                        Ok(command) => command,
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    };

                    match command {
                        SpecialCommand::Exit => break,
                        SpecialCommand::None => {
                            if controller.send_message(trimmed).await.is_ok() {
                                sync_transcript(&controller, &mut printed, false);
                            } else {
                                clamp_printed(&controller, &mut printed);
                            }
                        }
                        other => {
                            handle_special_command(&mut controller, other, &mut printed).await;
                        }
                    }

                    // Notices were already printed by the observer.
                    controller.take_notices();
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_event(event: &SessionEvent) {
        match event {
            SessionEvent::Notice(notice) => match notice.level {
                NoticeLevel::Error => eprintln!("{}", notice.to_string().red()),
                NoticeLevel::Info => println!("{}", notice.to_string().yellow()),
            },
            SessionEvent::Busy(operation) => {
                println!("{}", format!("({}...)", operation).dimmed())
            }
            SessionEvent::EditModeChanged {
                conversation_id,
                editing: true,
            } => println!(
                "Editing title of {}. Use /rename {} <title> or /cancel {}",
                conversation_id, conversation_id, conversation_id
            ),
            other => tracing::trace!(?other, "Session event"),
        }
    }

    fn format_prompt(session: &Session) -> String {
        match session.active_conversation_id() {
            Some(id) => format!("[{}] >> ", id.cyan()),
            None => format!("[{}] >> ", "new".green()),
        }
    }

    /// Print messages appended since the last call
    fn sync_transcript(controller: &SessionController, printed: &mut usize, show_user: bool) {
        let messages = controller.session().messages();
        if *printed > messages.len() {
            *printed = 0;
        }
        for message in &messages[*printed..] {
            if show_user || message.role == Role::Assistant {
                print_message(message);
            }
        }
        *printed = messages.len();
    }

    fn clamp_printed(controller: &SessionController, printed: &mut usize) {
        *printed = (*printed).min(controller.session().messages().len());
    }

    fn resolve(controller: &SessionController, target: &ConversationRef) -> Option<String> {
        match target {
            ConversationRef::Id(id) => Some(id.clone()),
            ConversationRef::Position(n) => {
                let entries = controller.session().conversations().entries();
                match entries.get(n - 1) {
                    Some(summary) => Some(summary.id.clone()),
                    None => {
                        eprintln!(
                            "{}",
                            format!("No conversation {} in the last list; run /list first", n)
                                .red()
                        );
                        None
                    }
                }
            }
        }
    }

    fn assistant_position(messages: &[Message], n: Option<usize>) -> Option<usize> {
        let mut assistant = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::Assistant)
            .map(|(i, _)| i);
        match n {
            Some(n) => assistant.nth(n - 1),
            None => assistant.last(),
        }
    }

    async fn handle_special_command(
        controller: &mut SessionController,
        command: SpecialCommand,
        printed: &mut usize,
    ) {
        match command {
            SpecialCommand::NewChat => {
                controller.start_new_chat().await;
                *printed = 0;
                println!("Started a new conversation\n");
            }
            SpecialCommand::ListConversations(page) => {
                let result = match page {
                    Some(page) => controller.refresh_conversations(page).await.map(|_| ()),
                    None => controller.conversations().await.map(|_| ()),
                };
                if result.is_ok() {
                    print_conversation_rows(controller.session());
                }
            }
            SpecialCommand::Load(target) => {
                if let Some(id) = resolve(controller, &target) {
                    if controller.load_conversation(&id).await.is_ok() {
                        *printed = 0;
                        sync_transcript(controller, printed, true);
                    }
                }
            }
            SpecialCommand::Edit(target) => {
                if let Some(id) = resolve(controller, &target) {
                    let _ = controller.begin_edit(&id);
                }
            }
            SpecialCommand::CancelEdit(target) => {
                if let Some(id) = resolve(controller, &target) {
                    controller.cancel_edit(&id);
                }
            }
            SpecialCommand::Rename { target, title } => {
                if let Some(id) = resolve(controller, &target) {
                    if controller.retitle(&id, &title).await.is_ok() {
                        println!("Renamed {} to \"{}\"", id, title);
                    }
                }
            }
            SpecialCommand::Archive(target) => {
                let id = match target {
                    Some(target) => resolve(controller, &target),
                    None => controller
                        .session()
                        .active_conversation_id()
                        .map(str::to_string),
                };
                match id {
                    Some(id) => {
                        if controller.archive(&id).await.is_ok() {
                            clamp_printed(controller, printed);
                            println!("Archived {}", id);
                        }
                    }
                    None => eprintln!("{}", "No active conversation to archive".red()),
                }
            }
            SpecialCommand::ShowTopics => {
                let filter = controller.session().flags().topic_filter.clone();
                for topic in controller.topics() {
                    let marker = if filter.as_deref() == Some(topic.name.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {} ({} questions)",
                        marker,
                        topic.name,
                        topic.questions.len()
                    );
                }
            }
            SpecialCommand::SetTopic(topic) => match controller.set_topic_filter(topic.as_deref())
            {
                Ok(()) => print_quick_questions(controller),
                Err(e) => eprintln!("{}", e.to_string().red()),
            },
            SpecialCommand::ShowQuestions => print_quick_questions(controller),
            SpecialCommand::Ask(n) => match controller.ask_quick_question(n - 1).await {
                Ok(()) => sync_transcript(controller, printed, true),
                Err(e) => {
                    if matches!(
                        e.downcast_ref::<ChatdeskError>(),
                        Some(ChatdeskError::Validation(_))
                    ) {
                        eprintln!("{}", e.to_string().red());
                    }
                    clamp_printed(controller, printed);
                }
            },
            SpecialCommand::Play(n) => {
                match assistant_position(controller.session().messages(), n) {
                    Some(index) => {
                        if let Ok(Some(path)) = controller.speak_message(index).await {
                            println!("{}", format!("Audio saved to {}", path.display()).dimmed());
                        }
                    }
                    None => eprintln!("{}", "No assistant reply to play".red()),
                }
            }
            SpecialCommand::Transcribe(path) => match read_upload(&path).await {
                Ok(upload) => match controller.transcribe_and_send(&upload).await {
                    Ok(Some(_)) => sync_transcript(controller, printed, true),
                    Ok(None) => {}
                    Err(_) => clamp_printed(controller, printed),
                },
                Err(e) => eprintln!("{}", e.to_string().red()),
            },
            SpecialCommand::ShowStatus => print_status_display(controller),
            SpecialCommand::Help => print_help(),
            SpecialCommand::Exit | SpecialCommand::None => {}
        }
    }

    async fn read_upload(path: &Path) -> Result<AudioUpload> {
        let bytes = tokio::fs::read(path).await.map_err(ChatdeskError::from)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        let mime_type = guess_audio_mime(&filename);
        Ok(AudioUpload::new(bytes, filename, mime_type))
    }

    fn print_quick_questions(controller: &SessionController) {
        let questions = controller.quick_questions();
        if questions.is_empty() {
            println!("{}", "No quick questions configured".dimmed());
            return;
        }
        for (i, question) in questions.iter().enumerate() {
            println!("{:>3}. {}", i + 1, question);
        }
        println!("{}", "Use /ask <n> to send one".dimmed());
    }

    fn print_welcome_banner(session: &Session) {
        println!("{}", "chatdesk".bold());
        println!(
            "client {}  branch {}  user {}",
            session.client_id().cyan(),
            session.branch_id().cyan(),
            session.user_id().cyan()
        );
        println!("Type /help for commands, exit to quit\n");
    }

    fn print_status_display(controller: &SessionController) {
        let session = controller.session();
        println!("\n{}", "Session Status".bold());
        println!("  client:        {}", session.client_id());
        println!("  branch:        {}", session.branch_id());
        println!("  user:          {}", session.user_id());
        println!(
            "  conversation:  {}",
            session.active_conversation_id().unwrap_or("(new)")
        );
        println!("  messages:      {}", session.messages().len());
        println!(
            "  topic filter:  {}",
            session.flags().topic_filter.as_deref().unwrap_or("all")
        );
        println!(
            "  list cache:    {}\n",
            if session.conversations().is_stale() {
                "stale"
            } else {
                "fresh"
            }
        );
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_assistant_position() {
            let messages = vec![
                Message::assistant("Welcome"),
                Message::user("q"),
                Message::assistant("a"),
            ];
            assert_eq!(assistant_position(&messages, None), Some(2));
            assert_eq!(assistant_position(&messages, Some(1)), Some(0));
            assert_eq!(assistant_position(&messages, Some(2)), Some(2));
            assert_eq!(assistant_position(&messages, Some(3)), None);
            assert_eq!(assistant_position(&[], None), None);
        }

        #[tokio::test]
        async fn test_read_upload_guesses_mime() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("note.mp3");
            std::fs::write(&path, b"abc").unwrap();

            let upload = read_upload(&path).await.unwrap();
            assert_eq!(upload.filename, "note.mp3");
            assert_eq!(upload.mime_type, "audio/mpeg");
            assert_eq!(upload.bytes, b"abc");
        }

        #[tokio::test]
        async fn test_read_upload_missing_file() {
            assert!(read_upload(Path::new("/nonexistent/recording.wav"))
                .await
                .is_err());
        }
    }
}

// Conversation management handlers
pub mod conversations {
    //! One-shot conversation management commands.

    use super::*;
    use crate::cli::ConversationCommand;
    use serde::Serialize;

    #[derive(Serialize)]
    struct ListOutput<'a> {
        page: u32,
        total: Option<u64>,
        conversations: &'a [ConversationSummary],
    }

    /// Run a conversation subcommand
    ///
    /// # Errors
    ///
    /// Returns error if the service call fails
    pub async fn handle_conversations(
        config: &Config,
        params: SessionParams,
        command: ConversationCommand,
    ) -> Result<()> {
        let mut controller = build_controller(config, params)?;

        match command {
            ConversationCommand::List { page, json } => {
                controller.refresh_conversations(page).await?;
                let session = controller.session();
                if json {
                    let cache = session.conversations();
                    let output = ListOutput {
                        page: cache.page(),
                        total: cache.total(),
                        conversations: cache.entries(),
                    };
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&output).map_err(ChatdeskError::from)?
                    );
                } else {
                    print_conversation_rows(session);
                }
            }
            ConversationCommand::Show { id } => {
                controller.load_conversation(&id).await?;
                for message in controller.session().messages() {
                    print_message(message);
                }
            }
            ConversationCommand::Rename { id, title } => {
                controller.retitle(&id, &title).await?;
                println!("Renamed {} to \"{}\"", id, title.trim());
            }
            ConversationCommand::Archive { id } => {
                controller.archive(&id).await?;
                println!("Archived {}", id);
            }
        }
        Ok(())
    }
}

// Speech handlers
pub mod speech {
    //! One-shot transcription and synthesis commands.

    use super::*;
    use crate::playback::{save_audio, AudioSink, FilePlayback};
    use crate::services::{
        guess_audio_mime, AudioUpload, HttpSpeechService, SpeechRequest, SpeechToText,
        TextToSpeech,
    };
    use std::path::{Path, PathBuf};

    /// Transcribe an audio file and print the transcript
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or transcription fails
    pub async fn transcribe_file(
        config: &Config,
        file: &Path,
        mime_type: Option<String>,
    ) -> Result<()> {
        let bytes = tokio::fs::read(file).await.map_err(ChatdeskError::from)?;
        let filename = file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        let mime_type = mime_type.unwrap_or_else(|| guess_audio_mime(&filename).to_string());

        let service = HttpSpeechService::new(&config.service)?;
        match service
            .transcribe(&AudioUpload::new(bytes, filename, mime_type))
            .await?
        {
            Some(text) => println!("{}", text),
            None => eprintln!("No speech was recognized in the audio"),
        }
        Ok(())
    }

    /// Synthesize text and save or play the audio
    ///
    /// With `output` the audio is written to that path; otherwise it goes
    /// through the configured playback sink.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or writing the audio fails
    pub async fn speak(config: &Config, text: &str, output: Option<PathBuf>) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatdeskError::Validation("nothing to speak".to_string()).into());
        }

        let service = HttpSpeechService::new(&config.service)?;
        let audio = service
            .synthesize(&SpeechRequest {
                text: text.to_string(),
                model: config.speech.model.clone(),
                voice: config.speech.voice.clone(),
                format: config.speech.format.clone(),
                speed: config.speech.speed,
            })
            .await?;

        match output {
            Some(path) => {
                save_audio(&path, &audio).await?;
                println!("{}", path.display());
            }
            None => {
                if let Some(path) = FilePlayback::from_config(&config.speech).play(&audio).await? {
                    println!("{}", path.display());
                }
            }
        }
        Ok(())
    }
}
