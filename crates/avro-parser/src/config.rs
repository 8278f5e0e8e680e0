//! Parse limits and mode selection.

use std::str::FromStr;

use avro_scanner::{Mode, MAX_DEPTH_CEILING};
use avro_syntax::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;
pub const DEFAULT_MAX_INPUT_BYTES: usize = 16 * 1024 * 1024;

/// Limits and options for one parse.
///
/// Read from a JSON document (`{"max_nesting_depth": 32}`), then overridden
/// by `AVRO_MAX_DEPTH`, `AVRO_MAX_INPUT_BYTES` and `AVRO_MODE` when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseConfig {
    /// Deepest nesting of brackets and types before the parse fails.
    pub max_nesting_depth: usize,

    /// Largest input accepted, in bytes.
    pub max_input_bytes: usize,

    /// Forces JSON or IDL; inferred from the first token when absent.
    pub mode: Option<Mode>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            mode: None,
        }
    }
}

impl ParseConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: ParseConfig =
            serde_json::from_str(text).map_err(|e| Error::new(format!("invalid parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// The defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Applies `AVRO_MAX_DEPTH`, `AVRO_MAX_INPUT_BYTES` and `AVRO_MODE`.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = var("AVRO_MAX_DEPTH") {
            self.max_nesting_depth = parse_number("AVRO_MAX_DEPTH", &v)?;
        }
        if let Some(v) = var("AVRO_MAX_INPUT_BYTES") {
            self.max_input_bytes = parse_number("AVRO_MAX_INPUT_BYTES", &v)?;
        }
        if let Some(v) = var("AVRO_MODE") {
            let mode = Mode::from_str(&v).map_err(|e| Error::new(format!("AVRO_MODE: {e}")))?;
            self.mode = (mode != Mode::Unknown).then_some(mode);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 || self.max_nesting_depth > MAX_DEPTH_CEILING {
            return Err(Error::new(format!(
                "max_nesting_depth must be between 1 and {MAX_DEPTH_CEILING}, got {}",
                self.max_nesting_depth
            )));
        }
        if self.max_input_bytes == 0 {
            return Err(Error::new("max_input_bytes must be positive"));
        }
        Ok(())
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::new(format!("{name}: expected a number, got `{value}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_config_fills_in_defaults() {
        let config = ParseConfig::from_json_str(r#"{"max_nesting_depth": 8, "mode": "idl"}"#).unwrap();
        assert_eq!(config.max_nesting_depth, 8);
        assert_eq!(config.max_input_bytes, DEFAULT_MAX_INPUT_BYTES);
        assert_eq!(config.mode, Some(Mode::Idl));
    }

    #[test]
    fn json_config_rejects_unknown_fields_and_bad_limits() {
        assert!(ParseConfig::from_json_str(r#"{"depth": 8}"#).is_err());
        assert!(ParseConfig::from_json_str(r#"{"max_nesting_depth": 0}"#).is_err());
        assert!(ParseConfig::from_json_str(r#"{"max_nesting_depth": 1000}"#).is_err());
    }

    #[test]
    fn environment_overrides() {
        let vars = |name: &str| match name {
            "AVRO_MAX_DEPTH" => Some("12".to_string()),
            "AVRO_MODE" => Some("json".to_string()),
            _ => None,
        };
        let config = ParseConfig::default().with_vars(vars).unwrap();
        assert_eq!(config.max_nesting_depth, 12);
        assert_eq!(config.mode, Some(Mode::Json));

        let auto = ParseConfig::default()
            .with_vars(|n| (n == "AVRO_MODE").then(|| "auto".to_string()))
            .unwrap();
        assert_eq!(auto.mode, None);

        let bad = ParseConfig::default().with_vars(|n| (n == "AVRO_MAX_INPUT_BYTES").then(|| "lots".to_string()));
        assert!(bad.unwrap_err().msg.contains("AVRO_MAX_INPUT_BYTES"));
    }
}
