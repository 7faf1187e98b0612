use std::env;
use std::str::FromStr;

use crate::options::{DEFAULT_ITERATIONS, ExpansionOptions, Vars};

/// How user assertion failures are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssertionMode {
    /// Failures reject the expansion so template authors see them.
    #[default]
    Development,
    /// Failures are logged and the offending value degrades to empty.
    Production,
}

impl FromStr for AssertionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(AssertionMode::Development),
            "production" | "prod" => Ok(AssertionMode::Production),
            _ => Err(format!("Unknown assertion mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub iterations: i32,
    pub mode: AssertionMode,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            mode: AssertionMode::Development,
            log_level: "amp_vars=info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(iterations) = lookup("AMP_VARS_ITERATIONS") {
            if let Ok(n) = iterations.parse::<i32>() {
                config.iterations = n;
            } else {
                eprintln!(
                    "Warning: Invalid AMP_VARS_ITERATIONS value '{}', using default {}",
                    iterations, config.iterations
                );
            }
        }

        if let Some(mode) = lookup("AMP_VARS_MODE") {
            match mode.parse::<AssertionMode>() {
                Ok(mode) => config.mode = mode,
                Err(_) => eprintln!(
                    "Warning: Invalid AMP_VARS_MODE value '{}', using default development",
                    mode
                ),
            }
        }

        if let Some(log_level) = lookup("RUST_LOG") {
            config.log_level = log_level;
        } else if let Some(log_level) = lookup("AMP_VARS_LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Some(log_format) = lookup("AMP_VARS_LOG_FORMAT") {
            config.log_format = match log_format.to_lowercase().as_str() {
                "text" | "plain" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    eprintln!(
                        "Warning: Invalid AMP_VARS_LOG_FORMAT value '{}', using default text",
                        log_format
                    );
                    LogFormat::Text
                }
            };
        }

        config
    }

    /// Top-level options carrying the configured iteration budget.
    pub fn expansion_options(&self, vars: Vars) -> ExpansionOptions {
        ExpansionOptions::new(vars, self.iterations, false)
    }
}
