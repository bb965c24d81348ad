use super::commands::{CliCommand, parse_command_line};
use crate::cli::ux::{
    ChatMessageType, GenerationSpinner, format_footer_metrics, format_tool_call,
    format_tool_output, style_chat_text,
};
use crate::svc::chat::Chat;
use anyhow::Result;
use clap::{CommandFactory, Parser};
use rustyline::completion::{Candidate, Completer};
use rustyline::error::ReadlineError;
use rustyline::hint::Hinter;
use rustyline::{CompletionType, Editor, Helper, Highlighter, Validator};
use std::io::Write;
use tracing::{debug, error};
use webgen_core::completion::{CancellationToken, CompletionMetrics};
use webgen_core::session::SessionEvent;

/// Words that end the session when typed on their own.
const EXIT_WORDS: [&str; 2] = ["exit", "quit"];

// -------------
// REPL completion
// -------------
#[derive(Helper, Validator, Highlighter)]
struct Repl {
    command_names: Vec<String>,
}

#[derive(Debug)]
struct CompletionCandidate {
    text: String,
    display_string: String,
}

impl CompletionCandidate {
    fn new(text: &str) -> Self {
        let display_string = style_chat_text(text, ChatMessageType::Footer).to_string();
        Self {
            text: text.to_owned(),
            display_string,
        }
    }
}

impl Candidate for CompletionCandidate {
    fn display(&self) -> &str {
        &self.display_string
    }

    fn replacement(&self) -> &str {
        &self.text
    }
}

impl Completer for Repl {
    type Candidate = CompletionCandidate;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> Result<(usize, Vec<Self::Candidate>), ReadlineError> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, Vec::new()));
        }

        let candidates = self
            .command_names
            .iter()
            .filter(|name| name.starts_with(line))
            .map(|name| CompletionCandidate::new(name))
            .collect();

        Ok((0, candidates))
    }
}

impl Hinter for Repl {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if line.is_empty() || pos < line.len() || !line.starts_with('/') {
            return None;
        }
        self.command_names
            .iter()
            .find(|&cmd_name| cmd_name.starts_with(line))
            .map(|cmd_name| cmd_name[line.len()..].into())
    }
}

/// Prints streamed session events as they arrive.
struct TurnPrinter {
    spinner: Option<GenerationSpinner>,
    labelled: bool,
    mid_line: bool,
}

impl TurnPrinter {
    fn new() -> Self {
        Self {
            spinner: Some(GenerationSpinner::new("Generating...".to_string())),
            labelled: false,
            mid_line: false,
        }
    }

    fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Text(text) => {
                self.stop_spinner();
                if !self.labelled {
                    print!("{} ", style_chat_text("Agent:", ChatMessageType::Prompt));
                    self.labelled = true;
                }
                print!("{text}");
                let _ = std::io::stdout().flush();
                self.mid_line = !text.ends_with('\n');
            }
            SessionEvent::ToolCall(call) => {
                self.end_line();
                self.print_line(&format_tool_call(&call));
                self.show_status(format!("Running {}...", call.name));
            }
            SessionEvent::ToolOutput(result) => {
                self.print_line(&format_tool_output(&result));
                self.labelled = false;
                self.show_status("Generating...".to_string());
            }
            SessionEvent::Metrics(metrics) => {
                debug!(?metrics, "Round trip finished");
            }
        }
    }

    /// Prints a tool line without tearing the spinner.
    fn print_line(&self, line: &str) {
        let styled = style_chat_text(line, ChatMessageType::Tool);
        match &self.spinner {
            Some(spinner) => spinner.suspend(|| println!("{styled}")),
            None => println!("{styled}"),
        }
    }

    /// Updates the running spinner, or starts one if text stopped it.
    fn show_status(&mut self, msg: String) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(msg);
        } else {
            self.spinner = Some(GenerationSpinner::new(msg));
        }
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.clear();
        }
    }

    fn end_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }

    fn finish(&mut self) {
        self.stop_spinner();
        self.end_line();
    }
}

/// Runs the interactive REPL for the chat session.
pub async fn run(chat: &mut Chat) -> Result<()> {
    println!(
        "{}",
        style_chat_text("WebApp Builder", ChatMessageType::Prompt)
    );
    println!(
        "Describe the web app you want. Type '/help' for commands, 'exit' to quit. [agent: {} | model: {}]",
        chat.agent_name(),
        chat.model_name()
    );

    let config = rustyline::Config::builder()
        .history_ignore_dups(true)?
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();

    let command_names = CliCommand::command()
        .get_subcommands()
        .flat_map(|c| c.get_name_and_visible_aliases())
        .map(|s| format!("/{s}"))
        .collect::<Vec<_>>();

    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(Repl { command_names }));

    let prompt = format!("\n{}", style_chat_text("You: ", ChatMessageType::Prompt));
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(&line)?;

                match classify_input(&line) {
                    ReplInput::Empty => continue,
                    ReplInput::Exit => {
                        println!("Bye!");
                        return Ok(());
                    }
                    ReplInput::Command(command_line) => {
                        match CliCommand::try_parse_from(parse_command_line(command_line)) {
                            Ok(cli_command) => {
                                if !cli_command.command.execute(chat)? {
                                    println!("Bye!");
                                    return Ok(());
                                }
                            }
                            Err(e) => {
                                e.print()?;
                            }
                        }
                    }
                    ReplInput::Message(message) => process_message(chat, message).await,
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Type 'exit' or /quit to exit.");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nBye!");
                return Ok(());
            }
            Err(err) => {
                return Err(err.into());
            }
        }
    }
}

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq)]
enum ReplInput<'a> {
    Empty,
    Exit,
    Command(&'a str),
    /// Sent to the builder exactly as typed.
    Message(&'a str),
}

fn classify_input(line: &str) -> ReplInput<'_> {
    let trimmed_line = line.trim();
    if trimmed_line.is_empty() {
        ReplInput::Empty
    } else if is_exit_word(trimmed_line) {
        ReplInput::Exit
    } else if trimmed_line.starts_with('/') {
        ReplInput::Command(trimmed_line)
    } else {
        ReplInput::Message(line)
    }
}

fn is_exit_word(line: &str) -> bool {
    EXIT_WORDS.iter().any(|w| line.eq_ignore_ascii_case(w))
}

/// Sends one message to the builder, streaming its progress until it answers or the
/// user presses Ctrl-C. Failures are reported and leave the history untouched.
async fn process_message(chat: &mut Chat, input: &str) {
    let checkpoint = chat.history_len();
    let cancel_token = CancellationToken::new();
    let mut printer = TurnPrinter::new();

    let outcome = {
        let mut on_event = |event: SessionEvent| printer.on_event(event);
        let send = chat.send(input, cancel_token.clone(), &mut on_event);
        tokio::pin!(send);

        tokio::select! {
            result = &mut send => Some(result),
            _ = tokio::signal::ctrl_c() => {
                cancel_token.cancel();
                None
            }
        }
    };
    printer.finish();

    match outcome {
        Some(Ok(reply)) => {
            let footer =
                format_footer_metrics(&reply.metrics, reply.finish_reason.as_deref(), false);
            println!("{footer}");
        }
        Some(Err(e)) => {
            error!(error = %e, "Turn failed");
            let message = format!("Error: {e:#}");
            eprintln!("{}", style_chat_text(&message, ChatMessageType::Error));
        }
        None => {
            chat.rollback(checkpoint);
            let footer = format_footer_metrics(&CompletionMetrics::default(), None, true);
            println!("{}", style_chat_text(&footer, ChatMessageType::Footer));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyline::history::DefaultHistory;

    fn repl() -> Repl {
        Repl {
            command_names: vec!["/clear".to_string(), "/log".to_string(), "/exit".to_string()],
        }
    }

    #[test]
    fn test_repl_completer_for_commands() {
        let history = DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);

        let line = "/c";
        let (start, candidates) = repl().complete(line, line.len(), &ctx).unwrap();
        assert_eq!(start, 0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].replacement(), "/clear");

        let (_, candidates) = repl().complete("make a todo app", 4, &ctx).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_repl_hinter() {
        let history = DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);

        assert_eq!(repl().hint("/l", 2, &ctx).unwrap(), "og");
        // Not a command
        assert!(repl().hint("abc", 3, &ctx).is_none());
        // Cursor is not at the end
        assert!(repl().hint("/log", 2, &ctx).is_none());
        assert!(repl().hint("", 0, &ctx).is_none());
    }

    #[test]
    fn test_is_exit_word() {
        assert!(is_exit_word("exit"));
        assert!(is_exit_word("QUIT"));
        assert!(!is_exit_word("exit now"));
        assert!(!is_exit_word("/exit"));
    }

    #[test]
    fn test_classify_input_forwards_messages_unchanged() {
        assert_eq!(classify_input("   "), ReplInput::Empty);
        assert_eq!(classify_input(" Exit "), ReplInput::Exit);
        assert_eq!(classify_input(" /clear "), ReplInput::Command("/clear"));
        assert_eq!(
            classify_input("  a todo app\twith tags "),
            ReplInput::Message("  a todo app\twith tags ")
        );
    }

    #[test]
    fn test_turn_printer_tracks_line_state() {
        let mut printer = TurnPrinter::new();
        printer.on_event(SessionEvent::Text("Hello".to_string()));
        assert!(printer.spinner.is_none());
        assert!(printer.labelled);
        assert!(printer.mid_line);

        printer.on_event(SessionEvent::Text(" world\n".to_string()));
        assert!(!printer.mid_line);

        printer.finish();
        assert!(printer.spinner.is_none());
    }

    #[test]
    fn test_turn_printer_restarts_spinner_for_tools() {
        let call = webgen_core::tools::ToolCall {
            id: "call_0".to_string(),
            name: "run_webapp".to_string(),
            arguments: r#"{"project_name":"todo"}"#.to_string(),
        };
        let mut printer = TurnPrinter::new();
        printer.on_event(SessionEvent::Text("Starting it.".to_string()));
        assert!(printer.spinner.is_none());

        printer.on_event(SessionEvent::ToolCall(call.clone()));
        assert!(printer.spinner.is_some());
        assert!(!printer.mid_line);

        printer.on_event(SessionEvent::ToolOutput(webgen_core::tools::ToolResult {
            call,
            output: serde_json::json!("Web app is running at http://localhost:8000"),
        }));
        assert!(printer.spinner.is_some());
        assert!(!printer.labelled);

        printer.finish();
        assert!(printer.spinner.is_none());
    }

    #[tokio::test]
    async fn test_process_message_keeps_completed_turn() {
        let config = webgen_core::config::parse_config(
            "agents:\n  solo: {}\nbuilder:\n  model:\n    type: test\n  agent: solo\n",
        )
        .unwrap();
        let tools = crate::ext::get_tools(&config).unwrap();
        let mut chat = Chat::new(&config, &tools).unwrap();
        let before = chat.history_len();

        process_message(&mut chat, "hello").await;

        assert_eq!(chat.history_len(), before + 2);
    }
}
