use crate::cli::ux::{ChatMessageType, format_message_block, style_chat_text};
use crate::svc::chat::Chat;
use anyhow::Result;
use clap::{Parser, Subcommand};

// -------------
// REPL commands
// -------------
#[derive(Parser, Debug)]
#[command(multicall = true)]
pub struct CliCommand {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Hash, PartialEq, Eq)]
pub enum Command {
    /// Clear chat history
    Clear,
    /// Show detailed logs for the last turn
    Log,
    /// Show the folder of the last generated web app
    #[command(alias = "p")]
    Project,
    /// Exit the chat session
    #[command(alias = "q", alias = "quit")]
    Exit,
}

impl Command {
    /// Executes a REPL command.
    ///
    /// Returns `Ok(false)` if the REPL should exit.
    pub fn execute(self, chat: &mut Chat) -> Result<bool> {
        match self {
            Command::Clear => {
                chat.clear();
                println!("Chat history cleared");
            }
            Command::Log => {
                println!("{}", format_message_block(chat.messages()));
            }
            Command::Project => match chat.last_project_dir() {
                Some(dir) => println!("Last project: {}", dir.display()),
                None => println!(
                    "{}",
                    style_chat_text("No web app created yet.", ChatMessageType::Footer)
                ),
            },
            Command::Exit => return Ok(false),
        }
        Ok(true)
    }
}

/// Splits a `/command arg` line into multicall arguments, dropping the leading slash.
pub fn parse_command_line(line: &str) -> Vec<String> {
    let trimmed_line = line.trim().trim_start_matches('/');

    // Unbalanced quotes fall back to plain whitespace splitting
    shlex::split(trimmed_line).unwrap_or_else(|| {
        trimmed_line
            .split_whitespace()
            .map(str::to_string)
            .collect()
    })
}
