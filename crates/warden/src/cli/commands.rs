use warden_moderation::{LogFilter, ModerationError, ModerationSystem};

use crate::cli::{Command, format as fmt};

/// Runs one console command and renders its output.
pub async fn execute(command: &Command, system: &ModerationSystem) -> Result<String, ModerationError> {
    match command {
        Command::Logs { search, json } => {
            let filter = match search {
                Some(search) => LogFilter::new().with_user_id_contains(search.as_str()),
                None => LogFilter::new(),
            };
            let views = system.list_logs_resolved(&filter).await?;
            if *json {
                return to_json(&views);
            }
            if views.is_empty() {
                return Ok(fmt::warning("No log entries found."));
            }

            let mut result = fmt::header(&format!("Moderation log ({} entries)", views.len()));
            for view in &views {
                result.push('\n');
                result.push_str(&fmt::log_line(view));
            }
            Ok(result)
        }

        Command::Appeals { json } => {
            let appeals = system.list_appeals().await?;
            if *json {
                return to_json(&appeals);
            }
            if appeals.is_empty() {
                return Ok(fmt::warning("No pending appeals."));
            }

            let mut result = fmt::header(&format!("Pending appeals ({})", appeals.len()));
            for appeal in &appeals {
                result.push('\n');
                result.push_str(&fmt::appeal_block(appeal));
            }
            Ok(result)
        }

        Command::Submit { log_id, text } => {
            let appeal = system.submit_appeal(log_id, text).await?;
            Ok(format!(
                "{} {} {}",
                fmt::success("Appeal submitted for"),
                fmt::entity(&appeal.user_id),
                fmt::id(&format!("(log #{})", appeal.log_id))
            ))
        }

        Command::Dismiss { user_id, log_id } => {
            system.dismiss_appeal(user_id, log_id).await?;
            Ok(format!(
                "{} {} {}",
                fmt::success("Appeal dismissed for"),
                fmt::entity(user_id),
                fmt::id(&format!("(log #{})", log_id))
            ))
        }

        Command::Accept {
            user_id,
            log_id,
            action,
            reason,
        } => {
            let outcome = system
                .accept_appeal(user_id, log_id, *action, reason.as_deref())
                .await?;
            let mut result = format!(
                "{}\n  {} {}",
                fmt::success(&outcome.message),
                fmt::label("Logged as:"),
                fmt::id(&format!("#{}", outcome.entry.id))
            );
            if !outcome.appeal_removed {
                result.push('\n');
                result.push_str(&fmt::warning("The appeal had already been removed."));
            }
            Ok(result)
        }

        Command::Ban { user_id, reason } => {
            let entry = system.ban(user_id, reason.as_deref()).await?;
            Ok(action_result("Banned", &entry.user_id, &entry.id, &entry.reason))
        }

        Command::Kick { user_id, reason } => {
            let entry = system.kick(user_id, reason.as_deref()).await?;
            Ok(action_result("Kicked", &entry.user_id, &entry.id, &entry.reason))
        }

        Command::OpenCase { user_id, log_id } => {
            let status = system.open_case(user_id, log_id).await?;
            Ok(fmt::success(&status))
        }
    }
}

fn action_result(verb: &str, user_id: &str, log_id: &str, reason: &str) -> String {
    format!(
        "{} {} {}\n  {} {}",
        fmt::success(verb),
        fmt::entity(user_id),
        fmt::id(&format!("(log #{})", log_id)),
        fmt::label("Reason:"),
        reason
    )
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, ModerationError> {
    serde_json::to_string_pretty(value).map_err(|e| ModerationError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden_moderation::{
        ErrorKind, MockExecutor, ModerationConfig, ModerationStorage, ReversalAction,
    };

    use super::*;

    fn system() -> (ModerationSystem, MockExecutor) {
        let mock = MockExecutor::new().with_username("1001", "troublemaker");
        let config = ModerationConfig {
            main_community_id: "main".to_string(),
            ..ModerationConfig::default()
        };
        let system = ModerationSystem::new(ModerationStorage::memory(), Arc::new(mock.clone()), config);
        (system, mock)
    }

    #[tokio::test]
    async fn test_ban_then_list_logs() {
        let (system, _mock) = system();
        let output = execute(
            &Command::Ban {
                user_id: "1001".to_string(),
                reason: None,
            },
            &system,
        )
        .await
        .unwrap();
        assert!(output.contains("No reason given"));

        let output = execute(
            &Command::Logs {
                search: Some("100".to_string()),
                json: false,
            },
            &system,
        )
        .await
        .unwrap();
        assert!(output.contains("Moderation log (1 entries)"));
        assert!(output.contains("troublemaker"));
    }

    #[tokio::test]
    async fn test_appeals_json_output() {
        let (system, _mock) = system();
        let entry = system.kick("1001", Some("spam")).await.unwrap();
        execute(
            &Command::Submit {
                log_id: entry.id.clone(),
                text: "I am sorry".to_string(),
            },
            &system,
        )
        .await
        .unwrap();

        let output = execute(&Command::Appeals { json: true }, &system)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["user_id"], "1001");
        assert_eq!(parsed[0]["log_id"], entry.id);
    }

    #[tokio::test]
    async fn test_accept_unkick_output() {
        let (system, _mock) = system();
        let entry = system.kick("1001", None).await.unwrap();
        system.submit_appeal(&entry.id, "sorry").await.unwrap();

        let output = execute(
            &Command::Accept {
                user_id: "1001".to_string(),
                log_id: entry.id.clone(),
                action: ReversalAction::Unkick,
                reason: None,
            },
            &system,
        )
        .await
        .unwrap();
        assert!(output.contains("Kick overturned for <@1001>"));
    }

    #[tokio::test]
    async fn test_dismiss_missing_reports_not_found() {
        let (system, _mock) = system();
        let err = execute(
            &Command::Dismiss {
                user_id: "1".to_string(),
                log_id: "2".to_string(),
            },
            &system,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("appeal by 1 for log 2"));
    }

    #[tokio::test]
    async fn test_empty_log() {
        let (system, _mock) = system();
        let output = execute(
            &Command::Logs {
                search: None,
                json: false,
            },
            &system,
        )
        .await
        .unwrap();
        assert!(output.contains("No log entries found."));
    }
}
