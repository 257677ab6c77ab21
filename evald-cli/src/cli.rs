//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Run as worker process (internal use)
    #[arg(long, hide = true)]
    pub worker: bool,

    /// Worker ID, also the name of the socket to connect to (used with --worker)
    #[arg(long, value_name = "ID", hide = true)]
    pub worker_id: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run snippets in order on one session and print each result
    Exec {
        /// Session identifier
        #[arg(long, value_name = "ID", default_value = "main")]
        session: String,

        /// List property names of each snippet's value instead of rendering it
        #[arg(long)]
        props: bool,

        /// Print each result as JSON
        #[arg(long)]
        json: bool,

        /// Code snippets, evaluated in order
        #[arg(value_name = "CODE", required = true)]
        code: Vec<String>,
    },

    /// Start an interactive console
    Repl {
        /// Session to start in
        #[arg(long, value_name = "ID", default_value = "main")]
        session: String,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration in effect
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_exec() {
        let cli = Cli::parse_from(["evald", "exec", "--session", "s1", "let x = 41;", "x + 1;"]);
        match cli.command {
            Some(Commands::Exec {
                session,
                code,
                props,
                json,
            }) => {
                assert_eq!(session, "s1");
                assert_eq!(code, vec!["let x = 41;", "x + 1;"]);
                assert!(!props);
                assert!(!json);
            }
            _ => panic!("expected exec"),
        }
    }

    #[test]
    fn test_parse_worker_mode() {
        let cli = Cli::parse_from(["evald", "--worker", "--worker-id", "evald-abc"]);
        assert!(cli.worker);
        assert_eq!(cli.worker_id.as_deref(), Some("evald-abc"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["evald", "repl", "--log-level", "debug"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Some(Commands::Repl { ref session }) if session == "main"));
    }
}
