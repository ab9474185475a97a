use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
};

use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::layer::{Context, Layer};
use warden_config::LoggingConfig;

/// Filters events by their `log_type` field.
///
/// Events with a configured type use that type's level; everything else uses
/// the minimum level. Excluded types are dropped entirely.
#[derive(Debug, Clone)]
pub struct LogTypeFilter {
    type_levels: HashMap<String, Level>,
    excluded_types: HashSet<String>,
    min_level: Level,
}

impl LogTypeFilter {
    pub fn from_config(config: &LoggingConfig) -> Self {
        let type_levels = config
            .log_types
            .iter()
            .filter_map(|(log_type, level)| {
                Level::from_str(level.trim())
                    .ok()
                    .map(|level| (log_type.clone(), level))
            })
            .collect();

        let min_level = config
            .min_level
            .as_deref()
            .and_then(|level| Level::from_str(level.trim()).ok())
            .unwrap_or(if config.debug { Level::DEBUG } else { Level::INFO });

        Self {
            type_levels,
            excluded_types: config.exclude_types.iter().cloned().collect(),
            min_level,
        }
    }

    pub fn allows(&self, log_type: Option<&str>, level: &Level) -> bool {
        let Some(log_type) = log_type else {
            return level <= &self.min_level;
        };
        if self.excluded_types.contains(log_type) {
            return false;
        }
        let required = self
            .type_levels
            .get(log_type)
            .copied()
            .unwrap_or(self.min_level);
        level <= &required
    }
}

impl<S: Subscriber> Layer<S> for LogTypeFilter {
    fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
        let mut visitor = LogTypeVisitor::default();
        event.record(&mut visitor);
        self.allows(visitor.log_type.as_deref(), event.metadata().level())
    }
}

#[derive(Default)]
struct LogTypeVisitor {
    log_type: Option<String>,
}

impl Visit for LogTypeVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "log_type" {
            self.log_type = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "log_type" {
            self.log_type = Some(format!("{:?}", value).trim_matches('"').to_string());
        }
    }
}
