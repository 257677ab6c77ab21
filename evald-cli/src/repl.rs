//! REPL (Read-Eval-Print Loop) over evald sessions

use anyhow::Result;
use colored::*;
use evald_config::EvaldConfig;
use evald_session::{Session, SessionManager, Task};
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::{CmdKind, Highlighter, MatchingBracketHighlighter};
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::validate::{MatchingBracketValidator, Validator};
use rustyline::{Context, Editor, Helper};

use crate::formatter::OutputFormatter;

/// Console commands, all starting with a dot so they never collide with code
const DOT_COMMANDS: &[&str] = &[
    ".help", ".exit", ".quit", ".props", ".session", ".sessions", ".close", ".history", ".clear",
];

/// Helper wiring completion, hints, validation and highlighting together
struct EvaldHelper {
    hinter: HistoryHinter,
    validator: MatchingBracketValidator,
    highlighter: MatchingBracketHighlighter,
}

impl Helper for EvaldHelper {}

impl Completer for EvaldHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(complete_dot_command(&line[..pos]))
    }
}

impl Hinter for EvaldHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Validator for EvaldHelper {
    fn validate(
        &self,
        ctx: &mut rustyline::validate::ValidationContext,
    ) -> rustyline::Result<rustyline::validate::ValidationResult> {
        self.validator.validate(ctx)
    }
}

impl Highlighter for EvaldHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, default: bool) -> std::borrow::Cow<'b, str> {
        self.highlighter.highlight_prompt(prompt, default)
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> std::borrow::Cow<'h, str> {
        std::borrow::Cow::Owned(hint.dimmed().to_string())
    }

    fn highlight<'l>(&self, line: &'l str, pos: usize) -> std::borrow::Cow<'l, str> {
        self.highlighter.highlight(line, pos)
    }

    fn highlight_char(&self, line: &str, pos: usize, kind: CmdKind) -> bool {
        self.highlighter.highlight_char(line, pos, kind)
    }
}

impl Default for EvaldHelper {
    fn default() -> Self {
        Self {
            hinter: HistoryHinter {},
            validator: MatchingBracketValidator::new(),
            highlighter: MatchingBracketHighlighter::new(),
        }
    }
}

/// Complete the first word when it is a dot command
fn complete_dot_command(line_to_cursor: &str) -> (usize, Vec<Pair>) {
    if !line_to_cursor.starts_with('.') || line_to_cursor.contains(char::is_whitespace) {
        return (0, Vec::new());
    }

    let candidates = DOT_COMMANDS
        .iter()
        .filter(|command| command.starts_with(line_to_cursor))
        .map(|command| Pair {
            display: command.to_string(),
            replacement: command.to_string(),
        })
        .collect();
    (0, candidates)
}

/// What the console should do with one line of input
#[derive(Debug, PartialEq, Eq)]
enum ConsoleInput<'a> {
    Empty,
    Code(&'a str),
    Props(&'a str),
    Switch(Option<&'a str>),
    ListSessions,
    Close,
    History,
    Clear,
    Help,
    Exit,
    Unknown(&'a str),
}

fn parse_input(input: &str) -> ConsoleInput<'_> {
    let input = input.trim();
    if input.is_empty() {
        return ConsoleInput::Empty;
    }
    let (command, rest) = match input.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (input, ""),
    };
    // `.5 + 1` is code, not a command
    if !DOT_COMMANDS.contains(&command) {
        return ConsoleInput::Code(input);
    }

    match command {
        ".exit" | ".quit" => ConsoleInput::Exit,
        ".help" => ConsoleInput::Help,
        ".props" if !rest.is_empty() => ConsoleInput::Props(rest),
        ".session" => ConsoleInput::Switch(Some(rest).filter(|id| !id.is_empty())),
        ".sessions" => ConsoleInput::ListSessions,
        ".close" => ConsoleInput::Close,
        ".history" => ConsoleInput::History,
        ".clear" => ConsoleInput::Clear,
        _ => ConsoleInput::Unknown(command),
    }
}

/// Interactive console bound to one session at a time
pub struct EvaldConsole {
    manager: SessionManager,
    session_id: String,
    editor: Editor<EvaldHelper, rustyline::history::FileHistory>,
    formatter: OutputFormatter,
    running: bool,
}

impl EvaldConsole {
    /// Create a new console instance
    pub fn new(config: &EvaldConfig, session_id: impl Into<String>) -> Result<Self> {
        let mut editor = Editor::new()?;
        editor.set_helper(Some(EvaldHelper::default()));

        Ok(Self {
            manager: SessionManager::from_config(config),
            session_id: session_id.into(),
            editor,
            formatter: OutputFormatter::new(),
            running: false,
        })
    }

    /// Start the REPL loop
    pub async fn run(&mut self) -> Result<()> {
        self.show_banner();
        self.running = true;

        while self.running {
            let prompt = self.prompt();
            match self.editor.readline(&prompt) {
                Ok(input) => {
                    if let Err(e) = self.process_input(&input).await {
                        self.formatter.print_error(&format!("Error: {}", e));
                    }
                }
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    println!("Use '.exit' or Ctrl+D to quit");
                    continue;
                }
                Err(rustyline::error::ReadlineError::Eof) => {
                    break;
                }
                Err(e) => {
                    self.formatter.print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        self.manager.shutdown().await;
        self.formatter.print_info("Goodbye!");
        Ok(())
    }

    fn show_banner(&self) {
        println!(
            "{}",
            format!("evald console v{}", env!("CARGO_PKG_VERSION"))
                .bright_cyan()
                .bold()
        );
        println!(
            "Type '{}' for available commands, '{}' to quit",
            ".help".bright_yellow(),
            ".exit".bright_yellow()
        );
        println!();
    }

    /// `session [n]> `, where n numbers the next successful run
    fn prompt(&self) -> String {
        let count = self
            .manager
            .get(&self.session_id)
            .map(|session| session.execution_count())
            .unwrap_or(0);
        format!("{} [{}]> ", self.session_id, count + 1)
            .bright_green()
            .to_string()
    }

    async fn process_input(&mut self, input: &str) -> Result<()> {
        let parsed = parse_input(input);
        if parsed != ConsoleInput::Empty {
            self.editor.add_history_entry(input.trim())?;
        }

        match parsed {
            ConsoleInput::Empty => {}
            ConsoleInput::Code(code) => self.evaluate(Task::run(code)).await?,
            ConsoleInput::Props(code) => self.evaluate(Task::property_names(code)).await?,
            ConsoleInput::Switch(Some(id)) => {
                self.session_id = id.to_string();
                self.formatter
                    .print_info(&format!("Switched to session '{}'", id));
            }
            ConsoleInput::Switch(None) => {
                self.formatter
                    .print_info(&format!("Current session: '{}'", self.session_id));
            }
            ConsoleInput::ListSessions => self.list_sessions(),
            ConsoleInput::Close => {
                if self.manager.close(&self.session_id).await {
                    self.formatter
                        .print_success(&format!("Closed session '{}'", self.session_id));
                } else {
                    self.formatter
                        .print_warning(&format!("Session '{}' is not running", self.session_id));
                }
            }
            ConsoleInput::History => {
                for (i, entry) in self.editor.history().iter().enumerate() {
                    println!("{:3}: {}", i + 1, entry);
                }
            }
            ConsoleInput::Clear => print!("\x1B[2J\x1B[1;1H"),
            ConsoleInput::Help => self.show_help(),
            ConsoleInput::Exit => self.running = false,
            ConsoleInput::Unknown(command) => {
                self.formatter.print_error(&format!(
                    "Invalid use of '{}'. Type .help for available commands",
                    command
                ));
            }
        }

        Ok(())
    }

    async fn evaluate(&mut self, task: Task) -> Result<()> {
        let task = task.on_success(|session: &Session| {
            session.increment_execution_count();
        });
        let outcome = match self.manager.run(&self.session_id, task) {
            Ok(handle) => handle.wait().await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                self.formatter.display_result(&result);
                Ok(())
            }
            Err(e) => {
                if self.manager.discard_after(&self.session_id, &e).await {
                    self.formatter.print_warning(&format!(
                        "Session '{}' was reset; the next input starts a fresh worker",
                        self.session_id
                    ));
                }
                Err(e.into())
            }
        }
    }

    fn list_sessions(&self) {
        let ids = self.manager.session_ids();
        if ids.is_empty() {
            self.formatter.print_info("No sessions running");
            return;
        }

        for id in ids {
            let Some(session) = self.manager.get(&id) else {
                continue;
            };
            let marker = if id == self.session_id { "*" } else { " " };
            println!(
                "{} {}  {}  pid {}  runs {}",
                marker,
                id.bright_yellow(),
                session.state(),
                session
                    .worker_pid()
                    .map(|pid| pid.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                session.execution_count()
            );
        }
    }

    fn show_help(&self) {
        println!("{}", "Console Commands:".bright_cyan().bold());
        println!("  {}            - Show this help", ".help".bright_yellow());
        println!("  {}     - Exit the console", ".exit, .quit".bright_yellow());
        println!("  {}     - List property names of a value", ".props <expr>".bright_yellow());
        println!("  {}   - Show or switch the current session", ".session [id]".bright_yellow());
        println!("  {}        - List running sessions", ".sessions".bright_yellow());
        println!("  {}           - Close the current session", ".close".bright_yellow());
        println!("  {}         - Show input history", ".history".bright_yellow());
        println!("  {}           - Clear the screen", ".clear".bright_yellow());
        println!();
        println!(
            "{}",
            "Anything else is evaluated as JavaScript in the current session".bright_green()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_and_commands() {
        assert_eq!(parse_input("   "), ConsoleInput::Empty);
        assert_eq!(parse_input("let x = 41;"), ConsoleInput::Code("let x = 41;"));
        assert_eq!(parse_input(".props  Math "), ConsoleInput::Props("Math"));
        assert_eq!(parse_input(".props"), ConsoleInput::Unknown(".props"));
        assert_eq!(parse_input(".session s2"), ConsoleInput::Switch(Some("s2")));
        assert_eq!(parse_input(".session"), ConsoleInput::Switch(None));
        assert_eq!(parse_input(".sessions"), ConsoleInput::ListSessions);
        assert_eq!(parse_input(".quit"), ConsoleInput::Exit);
        assert_eq!(parse_input(".bogus arg"), ConsoleInput::Code(".bogus arg"));
    }

    #[test]
    fn test_leading_dot_code_is_evaluated() {
        assert_eq!(parse_input(".5 + 1"), ConsoleInput::Code(".5 + 1"));
        assert_eq!(parse_input(" .25*4 "), ConsoleInput::Code(".25*4"));
        assert_eq!(parse_input(".help"), ConsoleInput::Help);
    }

    #[test]
    fn test_complete_dot_commands() {
        let (start, candidates) = complete_dot_command(".se");
        assert_eq!(start, 0);
        let names: Vec<_> = candidates.iter().map(|c| c.replacement.as_str()).collect();
        assert_eq!(names, vec![".session", ".sessions"]);

        assert!(complete_dot_command("x.se").1.is_empty());
        assert!(complete_dot_command(".props Ma").1.is_empty());
    }
}
