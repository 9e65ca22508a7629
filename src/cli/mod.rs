//! Command-line interface

pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsString;

/// Conversational pipeline engine driven by JSON step programs
#[derive(Debug, Parser, Clone)]
#[command(name = "convoflow")]
#[command(version = "0.1.0")]
#[command(about = "A conversational pipeline engine driven by JSON step programs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory containing program documents
    #[arg(short, long, global = true, default_value = "programs")]
    pub programs: String,

    /// When the program cache is refreshed from disk
    #[arg(long, global = true, default_value = "on-cache-miss")]
    pub reload: ReloadPolicyArg,

    /// Path to the LLM CLI executable
    #[arg(long, global = true)]
    pub model_cmd: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run an interactive chat session against a program
    Chat(ChatCommand),

    /// List available programs
    List(ListCommand),

    /// Validate a program document
    Validate(ValidateCommand),
}

#[derive(Debug, Parser, Clone)]
pub struct ChatCommand {
    /// Program to run (defaults to "default")
    #[arg(short = 'P', long)]
    pub program: Option<String>,

    /// Resume an existing session id (a new one is generated otherwise)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Do not persist session state
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct ListCommand {
    /// Emit the listing as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct ValidateCommand {
    /// Path to the program document
    pub file: String,

    /// Echo the parsed document as JSON
    #[arg(long)]
    pub json: bool,
}

/// CLI flavor of [`crate::store::ReloadPolicy`]
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReloadPolicyArg {
    Always,
    OnCacheMiss,
    Never,
}

impl From<ReloadPolicyArg> for crate::store::ReloadPolicy {
    fn from(arg: ReloadPolicyArg) -> Self {
        match arg {
            ReloadPolicyArg::Always => crate::store::ReloadPolicy::Always,
            ReloadPolicyArg::OnCacheMiss => crate::store::ReloadPolicy::OnCacheMiss,
            ReloadPolicyArg::Never => crate::store::ReloadPolicy::Never,
        }
    }
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_command() {
        let cli = Cli::try_parse_from([
            "convoflow",
            "--programs",
            "/tmp/programs",
            "chat",
            "--program",
            "anxiety",
            "--session",
            "abc",
        ])
        .unwrap();

        assert_eq!(cli.programs, "/tmp/programs");
        match cli.command {
            Command::Chat(cmd) => {
                assert_eq!(cmd.program.as_deref(), Some("anxiety"));
                assert_eq!(cmd.session.as_deref(), Some("abc"));
            }
            other => panic!("Expected chat command, got {:?}", other),
        }
    }

    #[test]
    fn test_reload_policy_default() {
        let cli = Cli::try_parse_from(["convoflow", "list"]).unwrap();
        assert!(matches!(cli.reload, ReloadPolicyArg::OnCacheMiss));
    }
}
