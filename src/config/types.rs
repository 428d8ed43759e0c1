use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::notch::{DeviceProfile, Timings, TimingsError};

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub notch: NotchConfig,
    #[serde(default)]
    pub timings: TimingsConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// Overlay selection and first-run state
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct NotchConfig {
    /// Device profile id ("macbook-14", "macbook-16", "no-notch")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Set once the user has explicitly picked a profile
    #[serde(default)]
    pub onboarding_complete: bool,
}

/// Hover and animation timing, in milliseconds
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TimingsConfig {
    #[serde(default = "default_expand_ms")]
    pub expand_ms: f64,
    #[serde(default = "default_collapse_ms")]
    pub collapse_ms: f64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: f64,
    #[serde(default = "default_grace_ms")]
    pub grace_ms: f64,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            expand_ms: default_expand_ms(),
            collapse_ms: default_collapse_ms(),
            debounce_ms: default_debounce_ms(),
            grace_ms: default_grace_ms(),
        }
    }
}

fn default_expand_ms() -> f64 {
    250.0
}

fn default_collapse_ms() -> f64 {
    200.0
}

fn default_debounce_ms() -> f64 {
    300.0
}

fn default_grace_ms() -> f64 {
    150.0
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MediaConfig {
    /// Poll external players for now-playing info
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Local language-model server used by the chat panel
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AssistantConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout for generation, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// A problem found while validating the config.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub is_error: bool,
    pub message: String,
}

impl ConfigIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            is_error: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.is_error { "error" } else { "warning" };
        write!(f, "{}: {}", level, self.message)
    }
}

impl Config {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if let Some(id) = self.notch.profile.as_deref() {
            if DeviceProfile::lookup(id).is_none() {
                issues.push(ConfigIssue::warning(format!(
                    "notch.profile '{}' is unknown, the default profile will be used",
                    id
                )));
            }
        }

        let t = &self.timings;
        for (name, value) in [
            ("expand_ms", t.expand_ms),
            ("collapse_ms", t.collapse_ms),
            ("debounce_ms", t.debounce_ms),
            ("grace_ms", t.grace_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                issues.push(ConfigIssue::error(format!(
                    "timings.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if t.debounce_ms == 0.0 {
            issues.push(ConfigIssue::error("timings.debounce_ms must be greater than 0"));
        }
        if t.grace_ms > t.debounce_ms {
            issues.push(ConfigIssue::warning(
                "timings.grace_ms exceeds debounce_ms, hover collapse will never fire",
            ));
        }

        if self.media.poll_interval_ms == 0 {
            issues.push(ConfigIssue::error("media.poll_interval_ms must be greater than 0"));
        }

        if let Err(e) = reqwest::Url::parse(&self.assistant.base_url) {
            issues.push(ConfigIssue::error(format!(
                "assistant.base_url '{}' is not a valid URL: {}",
                self.assistant.base_url, e
            )));
        }
        if self.assistant.model.trim().is_empty() {
            issues.push(ConfigIssue::error("assistant.model must not be empty"));
        }

        issues
    }

    /// The configured profile, or the default when missing or unknown.
    pub fn profile(&self) -> DeviceProfile {
        DeviceProfile::resolve(self.notch.profile.as_deref())
    }
}

impl TimingsConfig {
    pub fn to_timings(&self) -> Result<Timings, TimingsError> {
        Timings::new(
            millis(self.expand_ms),
            millis(self.collapse_ms),
            millis(self.debounce_ms),
            millis(self.grace_ms),
        )
    }
}

fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_micros((ms * 1000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}
