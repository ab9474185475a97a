//! Moderation actions and the appeal lifecycle.
//!
//! An appeal is `Submitted` until it is either dismissed or accepted; both
//! end by deleting it from the appeal store. There is no transaction across
//! the two stores: an accepted appeal whose removal fails after the reversal
//! was journaled stays visible and can be handled again.
//!
//! A platform action and its log entry run as one task. The caller waits for
//! that task for at most `action_timeout`; after that the task is left to
//! finish on its own and may still journal the action. Such tasks are kept
//! until [`ModerationSystem::settle`] awaits them.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    ActionType, Appeal, DEFAULT_ACTION_REASON, DEFAULT_APPEAL_REASON, LogEntry, LogFilter,
    ModerationError, NewLogEntry, ReversalAction,
    executor::{ActionExecutor, CaseRequest},
    storage::ModerationStorage,
};

#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// Community every platform action runs against.
    pub main_community_id: String,
    pub appeal_channel_id: Option<String>,
    pub appeal_invite_link: Option<String>,
    /// How long a caller waits for a platform action and its log entry.
    pub action_timeout: Duration,
    /// Upper bound for each username lookup while listing logs.
    pub resolve_timeout: Duration,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            main_community_id: String::new(),
            appeal_channel_id: None,
            appeal_invite_link: None,
            action_timeout: Duration::from_secs(10),
            resolve_timeout: Duration::from_secs(1),
        }
    }
}

/// A log entry decorated for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogView {
    #[serde(flatten)]
    pub entry: LogEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub entry: LogEntry,
    pub message: String,
    /// False when the appeal vanished between the reversal and its removal.
    pub appeal_removed: bool,
}

type ActionTask = JoinHandle<Result<LogEntry, ModerationError>>;

#[derive(Debug)]
pub struct ModerationSystem {
    storage: ModerationStorage,
    executor: Arc<dyn ActionExecutor>,
    config: ModerationConfig,
    /// Journaled actions whose caller stopped waiting.
    in_flight: Mutex<Vec<ActionTask>>,
}

impl ModerationSystem {
    pub fn new(
        storage: ModerationStorage,
        executor: Arc<dyn ActionExecutor>,
        config: ModerationConfig,
    ) -> Self {
        Self {
            storage,
            executor,
            config,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    pub fn storage(&self) -> &ModerationStorage {
        &self.storage
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    pub async fn ban(
        &self,
        user_id: &str,
        reason: Option<&str>,
    ) -> Result<LogEntry, ModerationError> {
        self.apply_action(ActionType::Ban, user_id, reason).await
    }

    pub async fn kick(
        &self,
        user_id: &str,
        reason: Option<&str>,
    ) -> Result<LogEntry, ModerationError> {
        self.apply_action(ActionType::Kick, user_id, reason).await
    }

    async fn apply_action(
        &self,
        action: ActionType,
        user_id: &str,
        reason: Option<&str>,
    ) -> Result<LogEntry, ModerationError> {
        let user_id = require("user_id", user_id)?;
        let reason = reason_or(reason, DEFAULT_ACTION_REASON);

        let entry = self.journaled(action, user_id, reason).await?;
        info!(
            log_type = "moderation",
            "{} {} (log {}): {}", action, user_id, entry.id, entry.reason
        );
        Ok(entry)
    }

    /// Runs `action` on the platform and journals it once the platform call
    /// succeeded. Nothing is journaled when the platform call fails.
    async fn journaled(
        &self,
        action: ActionType,
        user_id: &str,
        reason: String,
    ) -> Result<LogEntry, ModerationError> {
        let community_id = if action == ActionType::Unkick {
            self.config.main_community_id.clone()
        } else {
            self.main_community()?.to_string()
        };
        let executor = Arc::clone(&self.executor);
        let logs = Arc::clone(self.storage.logs());
        let user = user_id.to_string();

        let mut task: ActionTask = tokio::spawn(async move {
            executor
                .apply(&community_id, &user, action, &reason)
                .await?;
            let entry = logs.append(NewLogEntry::new(action, user, reason)).await?;
            Ok::<LogEntry, ModerationError>(entry)
        });

        match tokio::time::timeout(self.config.action_timeout, &mut task).await {
            Ok(Ok(Ok(entry))) => Ok(entry),
            Ok(Ok(Err(e))) => {
                warn!(
                    log_type = "moderation",
                    "{} for {} failed: {}", action, user_id, e
                );
                Err(e)
            }
            Ok(Err(e)) => Err(ModerationError::Executor(format!(
                "{} task for {} aborted: {}",
                action, user_id, e
            ))),
            Err(_) => {
                warn!(
                    log_type = "moderation",
                    "{} for {} did not finish within {:?}; it may still complete",
                    action,
                    user_id,
                    self.config.action_timeout
                );
                self.in_flight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(task);
                Err(ModerationError::Timeout(self.config.action_timeout))
            }
        }
    }

    /// Waits up to `bound` for journaled actions whose callers timed out.
    /// Returns how many were still running when the bound expired.
    pub async fn settle(&self, bound: Duration) -> usize {
        let pending = std::mem::take(
            &mut *self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if pending.is_empty() {
            return 0;
        }

        debug!(
            log_type = "moderation",
            "Waiting for {} unfinished action(s)",
            pending.len()
        );
        let deadline = tokio::time::Instant::now() + bound;
        let mut unfinished = 0;
        for task in pending {
            match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(Ok(entry))) => info!(
                    log_type = "moderation",
                    "Late {} of {} journaled as log {}", entry.action, entry.user_id, entry.id
                ),
                Ok(Ok(Err(e))) => warn!(log_type = "moderation", "Late action failed: {}", e),
                Ok(Err(e)) => warn!(log_type = "moderation", "Late action aborted: {}", e),
                Err(_) => unfinished += 1,
            }
        }

        if unfinished > 0 {
            warn!(
                log_type = "moderation",
                "{} action(s) still running after {:?}; their outcome is unknown",
                unfinished,
                bound
            );
        }
        unfinished
    }

    pub async fn list_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, ModerationError> {
        self.storage.logs().list(filter).await
    }

    /// Lists logs with usernames looked up on the platform. Lookups that fail
    /// or exceed `resolve_timeout` leave the username empty.
    pub async fn list_logs_resolved(
        &self,
        filter: &LogFilter,
    ) -> Result<Vec<LogView>, ModerationError> {
        let entries = self.list_logs(filter).await?;
        let mut views = Vec::with_capacity(entries.len());

        for entry in entries {
            let username = match tokio::time::timeout(
                self.config.resolve_timeout,
                self.executor.resolve_username(&entry.user_id),
            )
            .await
            {
                Ok(Ok(username)) => username,
                Ok(Err(e)) => {
                    debug!(
                        log_type = "moderation",
                        "Could not resolve user {}: {}", entry.user_id, e
                    );
                    None
                }
                Err(_) => {
                    debug!(
                        log_type = "moderation",
                        "Resolving user {} timed out", entry.user_id
                    );
                    None
                }
            };
            views.push(LogView { entry, username });
        }

        Ok(views)
    }

    /// Files an appeal against an existing log entry. The user id is copied
    /// from the entry. Submitting twice creates two appeals.
    pub async fn submit_appeal(&self, log_id: &str, text: &str) -> Result<Appeal, ModerationError> {
        let log_id = require("log_id", log_id)?;
        if text.trim().is_empty() {
            return Err(ModerationError::validation("Missing field: text"));
        }

        let entry = self
            .storage
            .logs()
            .get(log_id)
            .await?
            .ok_or_else(|| ModerationError::InvalidReference(log_id.to_string()))?;

        let appeal = Appeal::new(&entry, text);
        self.storage.appeals().append(appeal.clone()).await?;

        info!(
            log_type = "moderation",
            "Appeal submitted by {} for log {}", appeal.user_id, appeal.log_id
        );
        Ok(appeal)
    }

    pub async fn list_appeals(&self) -> Result<Vec<Appeal>, ModerationError> {
        self.storage.appeals().list().await
    }

    pub async fn dismiss_appeal(&self, user_id: &str, log_id: &str) -> Result<(), ModerationError> {
        let user_id = require("user_id", user_id)?;
        let log_id = require("log_id", log_id)?;

        if !self.storage.appeals().remove(user_id, log_id).await? {
            return Err(appeal_not_found(user_id, log_id));
        }

        info!(
            log_type = "moderation",
            "Appeal by {} for log {} dismissed", user_id, log_id
        );
        Ok(())
    }

    /// Accepts an appeal by reversing the original action on the main
    /// community, journaling the reversal and removing the appeal.
    ///
    /// If the platform call fails nothing is journaled and the appeal stays
    /// pending. A [`ModerationError::Timeout`] means the outcome is unknown:
    /// the reversal keeps running and may still be applied and journaled
    /// while the appeal stays pending. Accepting again without checking the
    /// log can apply the reversal twice.
    pub async fn accept_appeal(
        &self,
        user_id: &str,
        log_id: &str,
        action: ReversalAction,
        reason: Option<&str>,
    ) -> Result<AcceptOutcome, ModerationError> {
        let user_id = require("user_id", user_id)?;
        let log_id = require("log_id", log_id)?;

        if !self.storage.appeals().contains(user_id, log_id).await? {
            return Err(appeal_not_found(user_id, log_id));
        }

        let reason = reason_or(reason, DEFAULT_APPEAL_REASON);
        let entry = match self.journaled(action.action_type(), user_id, reason).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    log_type = "moderation",
                    "Appeal by {} for log {} stays pending", user_id, log_id
                );
                return Err(e);
            }
        };

        let appeal_removed = self.storage.appeals().remove(user_id, log_id).await?;
        if !appeal_removed {
            warn!(
                log_type = "moderation",
                "Appeal by {} for log {} was already gone after {}", user_id, log_id, action
            );
        }

        info!(
            log_type = "moderation",
            "Appeal by {} for log {} accepted: {} (log {})", user_id, log_id, action, entry.id
        );

        Ok(AcceptOutcome {
            message: acceptance_message(action, user_id),
            entry,
            appeal_removed,
        })
    }

    /// Opens a private case thread for a pending appeal and tells the user
    /// where to go. The notification is best effort and never fails the call.
    pub async fn open_case(&self, user_id: &str, log_id: &str) -> Result<String, ModerationError> {
        let user_id = require("user_id", user_id)?;
        let log_id = require("log_id", log_id)?;
        let channel_id = self
            .config
            .appeal_channel_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ModerationError::validation("Appeal channel is not configured"))?;

        if !self.storage.appeals().contains(user_id, log_id).await? {
            return Err(appeal_not_found(user_id, log_id));
        }

        let case = CaseRequest {
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            log_id: log_id.to_string(),
        };
        let mut status = self.executor.open_case(&case).await?;

        let notice = appeal_notice(self.config.appeal_invite_link.as_deref());
        match self.executor.notify_user(user_id, &notice).await {
            Ok(()) => status.push_str(" User notified via DM."),
            Err(e) => warn!(
                log_type = "moderation",
                "Failed to notify {} about their appeal case: {}", user_id, e
            ),
        }

        info!(
            log_type = "moderation",
            "Case opened for {} (log {}): {}", user_id, log_id, status
        );
        Ok(status)
    }

    fn main_community(&self) -> Result<&str, ModerationError> {
        let id = self.config.main_community_id.as_str();
        if id.is_empty() {
            return Err(ModerationError::validation(
                "Main community is not configured",
            ));
        }
        Ok(id)
    }
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, ModerationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ModerationError::validation(format!(
            "Missing field: {}",
            field
        )));
    }
    Ok(value)
}

fn reason_or(reason: Option<&str>, default: &str) -> String {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn appeal_not_found(user_id: &str, log_id: &str) -> ModerationError {
    ModerationError::not_found(format!("appeal by {} for log {}", user_id, log_id))
}

fn acceptance_message(action: ReversalAction, user_id: &str) -> String {
    let mention = format!("<@{}>", user_id);
    match action {
        ReversalAction::Unban => format!("Appeal Accepted. Unbanned {}.", mention),
        ReversalAction::Untimeout => {
            format!("Appeal Accepted. Removed timeout from {}.", mention)
        }
        ReversalAction::Unkick => format!(
            "Appeal Accepted. Kick overturned for {}. User may need to rejoin via invite.",
            mention
        ),
    }
}

fn appeal_notice(invite_link: Option<&str>) -> String {
    let mut notice = String::from("Your appeal case has been opened.");
    if let Some(link) = invite_link.filter(|link| !link.is_empty()) {
        notice.push_str(&format!(
            " Join the appeal server to continue: {}\n\nOnce you join you will be added to your private appeal thread.",
            link
        ));
    }
    notice.push_str(" A moderator will contact you there.");
    notice
}
