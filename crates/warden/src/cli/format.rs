//! Colored console output

use warden_moderation::{ActionType, Appeal, LogView};

pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1B[0m";
    pub const BOLD: &'static str = "\x1B[1m";

    pub const RED: &'static str = "\x1B[31m";
    pub const GREEN: &'static str = "\x1B[32m";
    pub const YELLOW: &'static str = "\x1B[33m";
    pub const CYAN: &'static str = "\x1B[36m";
    pub const GRAY: &'static str = "\x1B[90m";

    pub const BOLD_RED: &'static str = "\x1B[1;31m";
    pub const BOLD_GREEN: &'static str = "\x1B[1;32m";
}

pub fn colorize(text: &str, color: &str) -> String {
    format!("{}{}{}", color, text, Colors::RESET)
}

pub fn header(text: &str) -> String {
    colorize(&format!("=== {} ===", text), Colors::BOLD_GREEN)
}

/// User ids and other platform references
pub fn entity(text: &str) -> String {
    colorize(text, Colors::CYAN)
}

pub fn warning(text: &str) -> String {
    colorize(text, Colors::YELLOW)
}

pub fn error(text: &str) -> String {
    colorize(text, Colors::RED)
}

pub fn secondary(text: &str) -> String {
    colorize(text, Colors::GRAY)
}

pub fn success(text: &str) -> String {
    colorize(text, Colors::GREEN)
}

pub fn label(text: &str) -> String {
    colorize(text, Colors::BOLD)
}

pub fn id(text: &str) -> String {
    colorize(text, Colors::GRAY)
}

/// Punitive actions in red, reversals in green.
pub fn action(action: ActionType) -> String {
    let color = match action {
        ActionType::Ban | ActionType::Kick => Colors::BOLD_RED,
        ActionType::Unban | ActionType::Untimeout | ActionType::Unkick => Colors::BOLD_GREEN,
    };
    colorize(&format!("{:<9}", action.as_str()), color)
}

pub fn log_line(view: &LogView) -> String {
    let entry = &view.entry;
    let user = match &view.username {
        Some(name) => format!("{} ({})", entity(&entry.user_id), name),
        None => entity(&entry.user_id),
    };
    let timestamp = if entry.timestamp.is_empty() {
        "-".to_string()
    } else {
        entry.timestamp.clone()
    };
    format!(
        "  {} {} {} {} {}",
        id(&format!("#{:<5}", entry.id)),
        secondary(&timestamp),
        action(entry.action),
        user,
        entry.reason
    )
}

pub fn appeal_block(appeal: &Appeal) -> String {
    format!(
        "  {} {}  {} {}  {}\n    {}",
        label("User:"),
        entity(&appeal.user_id),
        label("Log:"),
        id(&format!("#{}", appeal.log_id)),
        secondary(&appeal.timestamp),
        appeal.text
    )
}

#[cfg(test)]
mod tests {
    use warden_moderation::NewLogEntry;

    use super::*;

    #[test]
    fn test_log_line_shows_username_when_resolved() {
        let entry = NewLogEntry::new(ActionType::Ban, "1001", "raiding")
            .with_timestamp("2024-05-01 12:00:00")
            .into_entry("4".to_string());
        let view = LogView {
            entry,
            username: Some("troublemaker".to_string()),
        };

        let line = log_line(&view);
        assert!(line.contains("1001"));
        assert!(line.contains("(troublemaker)"));
        assert!(line.contains("raiding"));
        assert!(line.contains(Colors::BOLD_RED));
    }

    #[test]
    fn test_missing_timestamp_rendered_as_dash() {
        let entry = NewLogEntry::new(ActionType::Unkick, "1001", "")
            .with_timestamp("")
            .into_entry("9".to_string());
        let line = log_line(&LogView {
            entry,
            username: None,
        });
        assert!(line.contains(&secondary("-")));
        assert!(line.contains(Colors::BOLD_GREEN));
    }
}
