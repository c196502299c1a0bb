//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Environment variable toggling cancellation support.
pub const ENV_CANCELLATION: &str = "PROMISEFLOW_CANCELLATION";
/// Environment variable toggling warnings.
pub const ENV_WARNINGS: &str = "PROMISEFLOW_WARNINGS";
/// Environment variable toggling trace capture.
pub const ENV_LONG_STACK_TRACES: &str = "PROMISEFLOW_LONG_STACK_TRACES";

/// Feature flags for a [`Runtime`](super::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Whether `cancel` does anything. When off, `cancel` only warns.
    #[serde(default = "default_true")]
    pub cancellation: bool,
    /// Whether warnings and deprecation notices are emitted.
    #[serde(default = "default_true")]
    pub warnings: bool,
    /// Whether futures record trace frames at creation points.
    #[serde(default)]
    pub long_stack_traces: bool,
    /// Maximum number of frames kept per future.
    #[serde(default = "default_max_trace_frames")]
    pub max_trace_frames: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_trace_frames() -> usize {
    16
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cancellation: default_true(),
            warnings: default_true(),
            long_stack_traces: false,
            max_trace_frames: default_max_trace_frames(),
        }
    }
}

impl RuntimeConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from defaults overridden by environment variables.
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_CANCELLATION).as_deref().and_then(parse_flag) {
            config.cancellation = v;
        }
        if let Some(v) = lookup(ENV_WARNINGS).as_deref().and_then(parse_flag) {
            config.warnings = v;
        }
        if let Some(v) = lookup(ENV_LONG_STACK_TRACES).as_deref().and_then(parse_flag) {
            config.long_stack_traces = v;
        }
        config
    }

    /// Enables or disables cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, enabled: bool) -> Self {
        self.cancellation = enabled;
        self
    }

    /// Enables or disables warnings.
    #[must_use]
    pub fn with_warnings(mut self, enabled: bool) -> Self {
        self.warnings = enabled;
        self
    }

    /// Enables or disables trace capture.
    #[must_use]
    pub fn with_long_stack_traces(mut self, enabled: bool) -> Self {
        self.long_stack_traces = enabled;
        self
    }

    /// Sets the per-future trace frame limit.
    #[must_use]
    pub fn with_max_trace_frames(mut self, frames: usize) -> Self {
        self.max_trace_frames = frames;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::new();
        assert!(config.cancellation);
        assert!(config.warnings);
        assert!(!config.long_stack_traces);
        assert_eq!(config.max_trace_frames, 16);
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .with_cancellation(false)
            .with_long_stack_traces(true)
            .with_max_trace_frames(4);
        assert!(!config.cancellation);
        assert!(config.long_stack_traces);
        assert_eq!(config.max_trace_frames, 4);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"cancellation": false}"#).unwrap();
        assert!(!config.cancellation);
        assert!(config.warnings);
        assert_eq!(config.max_trace_frames, 16);
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = [
            (ENV_CANCELLATION, "off"),
            (ENV_LONG_STACK_TRACES, "1"),
            (ENV_WARNINGS, "maybe"),
        ]
        .into_iter()
        .collect();
        let config = RuntimeConfig::from_lookup(|k| env.get(k).map(|v| (*v).to_string()));
        assert!(!config.cancellation);
        assert!(config.long_stack_traces);
        assert!(config.warnings);
    }
}
