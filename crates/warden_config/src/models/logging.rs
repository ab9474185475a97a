use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub debug: bool,

    pub use_color: bool,

    pub show_timestamp: bool,

    pub show_target: bool,

    /// Level applied to everything not covered by `log_types`.
    pub min_level: Option<String>,

    /// Per `log_type` levels, e.g. `storage: debug`.
    pub log_types: HashMap<String, String>,

    pub exclude_types: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            debug: false,
            use_color: true,
            show_timestamp: true,
            show_target: false,
            min_level: None,
            log_types: HashMap::new(),
            exclude_types: Vec::new(),
        }
    }
}
