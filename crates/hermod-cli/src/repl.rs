//! `hermod agent`: one-shot messages and the interactive REPL.

use std::sync::Arc;

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};

use hermod_core::bus::MessageBus;
use hermod_core::config::load_config;

use crate::helpers;

const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

pub async fn run(message: Option<String>, session: &str) -> Result<()> {
    let config = load_config(None);
    let bus = Arc::new(MessageBus::new());
    let agent = helpers::build_agent(&config, bus, None)?;
    let (channel, chat_id) = helpers::split_session(session);

    // One-shot mode.
    if let Some(text) = message {
        let response = agent.process_direct(&text, &channel, &chat_id).await?;
        println!("{response}");
        return Ok(());
    }

    // Interactive mode.
    helpers::print_banner();
    let mut editor = create_editor()?;

    loop {
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("input error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&trimmed.to_lowercase().as_str()) {
            println!("Goodbye!");
            break;
        }

        let _ = editor.add_history_entry(&input);
        match agent.process_direct(trimmed, &channel, &chat_id).await {
            Ok(response) => helpers::print_response(&response),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    save_history(&mut editor);
    Ok(())
}

fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;
    let path = history_path();
    if path.exists() {
        let _ = editor.load_history(&path);
    }
    Ok(editor)
}

fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = editor.save_history(&path);
}

fn history_path() -> std::path::PathBuf {
    hermod_core::utils::data_path()
        .join("history")
        .join("cli_history")
}
