//! Output formatting for console results

use colored::*;
use evald_session::{ExecutionResult, Outcome};

/// Output formatter for evaluation results
#[derive(Default)]
pub struct OutputFormatter {}

impl OutputFormatter {
    pub fn new() -> Self {
        Self {}
    }

    /// Display a result: captured output first, then the value or error
    pub fn display_result(&self, result: &ExecutionResult) {
        if let Some(stdout) = &result.stdout {
            print!("{}", stdout);
        }
        if let Some(stderr) = &result.stderr {
            eprint!("{}", stderr.yellow());
        }

        match &result.outcome {
            Outcome::Mime(_) => {
                if let Some(text) = result.text_plain() {
                    println!("{}", text);
                }
            }
            Outcome::Error(failure) => {
                eprintln!(
                    "{} {}",
                    format!("{}:", failure.ename).bright_red().bold(),
                    failure.evalue.bright_red()
                );
                for line in traceback_details(&failure.traceback, &failure.ename, &failure.evalue) {
                    eprintln!("    {}", line.dimmed());
                }
            }
            Outcome::Names(names) => {
                println!("{}", format_names(names));
            }
        }
    }

    /// Print the success message
    pub fn print_success(&self, message: &str) {
        println!("{} {}", "✓".bright_green().bold(), message);
    }

    /// Print an error message
    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", "✗".bright_red().bold(), message.bright_red());
    }

    /// Print a warning message
    pub fn print_warning(&self, message: &str) {
        println!("{} {}", "⚠".bright_yellow().bold(), message.bright_yellow());
    }

    /// Print an info message
    pub fn print_info(&self, message: &str) {
        println!("{} {}", "ℹ".bright_blue().bold(), message);
    }
}

/// Traceback lines beyond the `ename: evalue` header
fn traceback_details<'a>(traceback: &'a [String], ename: &str, evalue: &str) -> Vec<&'a str> {
    let header = format!("{}: {}", ename, evalue);
    traceback
        .iter()
        .map(String::as_str)
        .filter(|line| *line != header)
        .collect()
}

/// Lay out property names in rows of a readable width
fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        return "(no properties)".to_string();
    }

    let mut lines = Vec::new();
    let mut line = String::new();
    for name in names {
        if !line.is_empty() && line.len() + name.len() + 2 > 80 {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push_str("  ");
        }
        line.push_str(name);
    }
    lines.push(line);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traceback_details_drop_header() {
        let traceback = vec![
            "ReferenceError: y is not defined".to_string(),
            "at <eval>:1:1".to_string(),
        ];
        assert_eq!(
            traceback_details(&traceback, "ReferenceError", "y is not defined"),
            vec!["at <eval>:1:1"]
        );
    }

    #[test]
    fn test_format_names_wraps() {
        assert_eq!(format_names(&[]), "(no properties)");

        let names: Vec<String> = (0..30).map(|i| format!("property{}", i)).collect();
        let formatted = format_names(&names);
        assert!(formatted.lines().count() > 1);
        assert!(formatted.lines().all(|line| line.len() <= 80));
        assert!(formatted.contains("property29"));
    }
}
