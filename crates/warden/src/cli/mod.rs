//! Admin console for the moderation log and appeals.

pub mod commands;
pub mod format;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use warden_config::DEFAULT_CONFIG_PATH;
use warden_moderation::ReversalAction;

#[derive(Debug, Parser)]
#[command(author, version, about = "Moderation log and appeal console", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List moderation log entries, newest first
    Logs {
        /// Only entries whose user id contains this text
        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List pending appeals
    Appeals {
        #[arg(long)]
        json: bool,
    },

    /// Submit an appeal against a log entry
    Submit {
        #[arg(long)]
        log_id: String,

        #[arg(long)]
        text: String,
    },

    /// Dismiss an appeal without changing anything on the platform
    Dismiss {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        log_id: String,
    },

    /// Accept an appeal and reverse the original action
    Accept {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        log_id: String,

        #[arg(long, value_parser = parse_reversal)]
        action: ReversalAction,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Ban a user from the main community
    Ban {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Kick a user from the main community
    Kick {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Open a private case thread for an appeal
    OpenCase {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        log_id: String,
    },
}

impl Command {
    /// Whether the command can talk to the chat platform.
    pub fn uses_platform(&self) -> bool {
        match self {
            Command::Logs { .. } | Command::Ban { .. } | Command::Kick { .. } => true,
            Command::OpenCase { .. } => true,
            Command::Accept { action, .. } => !action.is_record_only(),
            Command::Appeals { .. } | Command::Submit { .. } | Command::Dismiss { .. } => false,
        }
    }
}

fn parse_reversal(value: &str) -> Result<ReversalAction, String> {
    value.parse().map_err(|_| {
        format!(
            "expected one of: {}",
            ReversalAction::ALL.map(|a| a.label().to_lowercase()).join(", ")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accept() {
        let cli = Cli::try_parse_from([
            "warden", "accept", "--user-id", "1001", "--log-id", "4", "--action", "UNBAN",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert_eq!(
            cli.command,
            Command::Accept {
                user_id: "1001".to_string(),
                log_id: "4".to_string(),
                action: ReversalAction::Unban,
                reason: None,
            }
        );
        assert!(cli.command.uses_platform());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = Cli::try_parse_from([
            "warden", "accept", "--user-id", "1", "--log-id", "4", "--action", "timeout",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["warden", "logs", "--search", "10", "--config", "x.yaml"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("x.yaml"));
        assert!(matches!(cli.command, Command::Logs { search: Some(ref s), json: false } if s == "10"));
    }

    #[test]
    fn test_unkick_stays_offline() {
        let cli = Cli::try_parse_from([
            "warden", "accept", "--user-id", "1", "--log-id", "4", "--action", "unkick",
        ])
        .unwrap();
        assert!(!cli.command.uses_platform());
    }
}
