//! Runtime configuration for the content script
//!
//! Every field has a default so an empty JSON object (or no configuration at
//! all) yields the stock behavior: poll every 500ms and mark overlays with
//! the `ss-overlay` class.

use crate::error::{GuardError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default polling period in milliseconds
pub const DEFAULT_SCAN_INTERVAL_MS: u32 = 500;

/// Default marker class identifying overlay nodes
pub const DEFAULT_MARKER_CLASS: &str = "ss-overlay";

/// Default overlay background
pub const DEFAULT_OVERLAY_BACKGROUND: &str = "rgba(255,0,0,0.5)";

/// How the service discovers new candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
    /// Re-scan the whole document on a fixed interval
    #[default]
    Poll,
    /// React to document mutation records
    Observe,
}

/// Content script configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Polling period in milliseconds (poll strategy only)
    pub scan_interval_ms: u32,
    /// Class name placed on every overlay node
    pub marker_class: String,
    /// CSS background of the overlay
    pub overlay_background: String,
    /// Label rendered by the indicator badge inside the overlay
    pub indicator_text: String,
    /// Tooltip shown when hovering the indicator badge
    pub indicator_tooltip: String,
    /// Candidate discovery strategy
    pub strategy: ScanStrategy,
    /// Maximum tracing level ("error", "warn", "info", "debug", "trace")
    pub log_level: String,
    /// Remove overlays whose target element has left the document
    pub prune_detached: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            marker_class: DEFAULT_MARKER_CLASS.to_string(),
            overlay_background: DEFAULT_OVERLAY_BACKGROUND.to_string(),
            indicator_text: "Blocked".to_string(),
            indicator_tooltip: "This purchase button has been disabled".to_string(),
            strategy: ScanStrategy::default(),
            log_level: "info".to_string(),
            prune_detached: true,
        }
    }
}

impl GuardConfig {
    /// Parse and validate configuration from a JSON string
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or a field fails validation
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values that serde cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_ms == 0 {
            return Err(GuardError::InvalidConfig(
                "scan_interval_ms must be greater than zero".to_string(),
            ));
        }
        if i32::try_from(self.scan_interval_ms).is_err() {
            return Err(GuardError::InvalidConfig(format!(
                "scan_interval_ms {} exceeds the host timer range",
                self.scan_interval_ms
            )));
        }
        if self.marker_class.trim().is_empty() || self.marker_class.contains(char::is_whitespace)
        {
            return Err(GuardError::InvalidConfig(format!(
                "marker_class must be a single non-empty class name, got {:?}",
                self.marker_class
            )));
        }
        self.tracing_level()?;
        Ok(())
    }

    /// Scan period as a `Duration`
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.scan_interval_ms))
    }

    /// Parsed tracing level
    pub fn tracing_level(&self) -> Result<tracing::Level> {
        self.log_level.parse::<tracing::Level>().map_err(|_| {
            GuardError::InvalidConfig(format!("unknown log level: {}", self.log_level))
        })
    }
}
