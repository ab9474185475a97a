//! Moderation action log and appeal lifecycle.
//!
//! Moderation actions (ban, kick and their reversals) are journaled to an
//! append-only log. Users appeal a log entry; moderators dismiss or accept the
//! appeal, and acceptance reverses the original action through an
//! [`ActionExecutor`].

use std::{fmt, str::FromStr, time::Duration};

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub mod executor;
pub mod file;
pub mod memory;
pub mod storage;
pub mod system;

pub use executor::{
    ActionExecutor, CaseRequest, ExecutorError, bridge::ExecutorBridge, mock::MockExecutor,
};
pub use storage::{
    AppealStorageBackend, CorruptionPolicy, LogStorageBackend, ModerationStorage, StorageConfig,
    StorageType,
};
pub use system::{AcceptOutcome, LogView, ModerationConfig, ModerationSystem};

/// Wall-clock format used for every persisted timestamp (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEFAULT_ACTION_REASON: &str = "No reason given";
pub const DEFAULT_APPEAL_REASON: &str = "Appeal accepted";

pub fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid log ID: {0}")]
    InvalidReference(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("No answer from the chat platform within {0:?}, the action outcome is unknown")]
    Timeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of [`ModerationError`] for boundary layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InvalidReference,
    NotFound,
    PermissionDenied,
    Executor,
    Timeout,
    Storage,
}

impl ModerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidReference(_) => ErrorKind::InvalidReference,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Executor(_) => ErrorKind::Executor,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Storage(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::Storage,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Kind of a journaled moderation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Ban,
    Kick,
    Unban,
    Untimeout,
    Unkick,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Ban => "ban",
            ActionType::Kick => "kick",
            ActionType::Unban => "unban",
            ActionType::Untimeout => "untimeout",
            ActionType::Unkick => "unkick",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action a moderator picks when accepting an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReversalAction {
    Unban,
    Untimeout,
    Unkick,
}

impl ReversalAction {
    pub const ALL: [ReversalAction; 3] = [
        ReversalAction::Unban,
        ReversalAction::Untimeout,
        ReversalAction::Unkick,
    ];

    pub fn action_type(self) -> ActionType {
        match self {
            ReversalAction::Unban => ActionType::Unban,
            ReversalAction::Untimeout => ActionType::Untimeout,
            ReversalAction::Unkick => ActionType::Unkick,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReversalAction::Unban => "Unban",
            ReversalAction::Untimeout => "Untimeout",
            ReversalAction::Unkick => "Unkick",
        }
    }

    /// Unkick cannot be applied on the platform; it is only journaled.
    pub fn is_record_only(self) -> bool {
        matches!(self, ReversalAction::Unkick)
    }
}

impl fmt::Display for ReversalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReversalAction {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReversalAction::ALL
            .into_iter()
            .find(|action| action.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModerationError::Validation(format!("Unknown action: {}", s)))
    }
}

/// A journaled moderation action.
///
/// `id` is a decimal string assigned by the log store. Entries written by
/// older tooling may lack an id or store it as a number; they load with an
/// empty id or its decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(rename = "type")]
    pub action: ActionType,
    #[serde(alias = "userId", deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reason: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
}

impl LogEntry {
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.trim().parse().ok()
    }
}

/// A log entry before the store has assigned its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub action: ActionType,
    pub user_id: String,
    pub reason: String,
    pub timestamp: String,
}

impl NewLogEntry {
    pub fn new(action: ActionType, user_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action,
            user_id: user_id.into(),
            reason: reason.into(),
            timestamp: now_timestamp(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn into_entry(self, id: String) -> LogEntry {
        LogEntry {
            id,
            action: self.action,
            user_id: self.user_id,
            reason: self.reason,
            timestamp: self.timestamp,
        }
    }
}

/// A pending appeal against a log entry, identified by `(user_id, log_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    #[serde(alias = "logId", deserialize_with = "lenient_string")]
    pub log_id: String,
    #[serde(alias = "userId", deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
}

impl Appeal {
    pub fn new(log_entry: &LogEntry, text: impl Into<String>) -> Self {
        Self {
            log_id: log_entry.id.clone(),
            user_id: log_entry.user_id.clone(),
            text: text.into(),
            timestamp: now_timestamp(),
        }
    }

    pub fn matches(&self, user_id: &str, log_id: &str) -> bool {
        self.user_id == user_id && self.log_id == log_id
    }
}

/// Reads a text field that older files may hold as a number or `null`.
/// Numbers keep their decimal text, `null` becomes empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub user_id_contains: Option<String>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id_contains(mut self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        let needle = needle.trim();
        self.user_id_contains = (!needle.is_empty()).then(|| needle.to_lowercase());
        self
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        match &self.user_id_contains {
            Some(needle) => entry.user_id.to_lowercase().contains(needle),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, user_id: &str) -> LogEntry {
        NewLogEntry::new(ActionType::Ban, user_id, "spam").into_entry(id.to_string())
    }

    #[test]
    fn test_action_type_serializes_lowercase() {
        let json = serde_json::to_string(&ActionType::Untimeout).unwrap();
        assert_eq!(json, "\"untimeout\"");
        assert_eq!(ReversalAction::Unkick.action_type().as_str(), "unkick");
    }

    #[test]
    fn test_reversal_action_parse_case_insensitive() {
        assert_eq!(
            "unban".parse::<ReversalAction>().unwrap(),
            ReversalAction::Unban
        );
        assert_eq!(
            " UNTIMEOUT ".parse::<ReversalAction>().unwrap(),
            ReversalAction::Untimeout
        );
        let err = "timeout".parse::<ReversalAction>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_log_entry_without_id_loads() {
        let json = r#"{"type": "kick", "user_id": "42", "reason": "x", "timestamp": "2024-01-01 00:00:00"}"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "");
        assert_eq!(entry.numeric_id(), None);
        assert_eq!(entry.action, ActionType::Kick);
    }

    #[test]
    fn test_numeric_and_null_fields_load_as_text() {
        let json = r#"{"id": 8, "type": "ban", "user_id": 42, "reason": null, "timestamp": null}"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "8");
        assert_eq!(entry.numeric_id(), Some(8));
        assert_eq!(entry.user_id, "42");
        assert_eq!(entry.reason, "");

        let appeal: Appeal =
            serde_json::from_str(r#"{"log_id": 8, "user_id": "42", "text": "sorry"}"#).unwrap();
        assert!(appeal.matches("42", "8"));
    }

    #[test]
    fn test_camel_case_aliases_accepted() {
        let json = r#"{"logId": "3", "userId": "42", "text": "please"}"#;
        let appeal: Appeal = serde_json::from_str(json).unwrap();
        assert!(appeal.matches("42", "3"));
        assert_eq!(appeal.timestamp, "");
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let filter = LogFilter::new().with_user_id_contains("AB");
        assert!(filter.matches(&entry("1", "xxabyy")));
        assert!(!filter.matches(&entry("2", "1234")));

        let blank = LogFilter::new().with_user_id_contains("   ");
        assert!(blank.matches(&entry("3", "1234")));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = now_timestamp();
        assert_eq!(ts.len(), 19);
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ModerationError::Timeout(Duration::from_secs(10)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            ModerationError::Serialization("bad".into()).kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            ModerationError::InvalidReference("9".into()).to_string(),
            "Invalid log ID: 9"
        );
    }
}
