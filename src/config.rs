//! Runtime configuration read from the environment.
use elfload::log::Severity;
use std::io::IsTerminal;
use thiserror::Error;

/// Minimum severity of log messages, one of `debug`, `info`, `warn`, `error`.
pub const LOG_VAR: &str = "RUNELF_LOG";
/// Disables colored log output when set to a non-empty value.
pub const NO_COLOR_VAR: &str = "NO_COLOR";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid RUNELF_LOG value `{0}` (expected debug, info, warn or error)")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub min_severity: Severity,
    pub color: bool,
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unrecognized value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), std::io::stderr().is_terminal())
    }

    /// Build the configuration from `lookup`, which returns the value of a variable.
    ///
    /// Colors default to whether the log output is a terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unrecognized value.
    pub fn from_lookup<F>(lookup: F, terminal: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let min_severity = match lookup(LOG_VAR) {
            Some(value) => parse_severity(&value)?,
            None => Severity::Warn,
        };
        let color = terminal && lookup(NO_COLOR_VAR).is_none_or(|v| v.is_empty());

        Ok(Self {
            min_severity,
            color,
        })
    }

    /// Install the configuration into the logger.
    pub fn apply(&self) {
        elfload::log::set_min_severity(self.min_severity);
        elfload::log::set_color(self.color);
    }
}

fn parse_severity(value: &str) -> Result<Severity, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "debug" => Ok(Severity::Debug),
        "info" => Ok(Severity::Info),
        "warn" | "warning" => Ok(Severity::Warn),
        "error" => Ok(Severity::Error),
        _ => Err(ConfigError::InvalidLogLevel(value.to_string())),
    }
}
