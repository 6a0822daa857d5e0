//! Recalculation job configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Scheduled recalculation settings
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Run the scheduled recalculation at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between runs
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Run once immediately on startup
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,

    /// Log batch progress every N entities
    #[serde(default = "default_progress_log_every")]
    pub progress_log_every: usize,
}

impl JobConfig {
    /// Get interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate job configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidJobInterval);
        }
        if self.progress_log_every == 0 {
            return Err(ValidationError::MustBePositive("job.progress_log_every"));
        }
        Ok(())
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            run_on_start: default_run_on_start(),
            progress_log_every: default_progress_log_every(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    86_400
}

fn default_run_on_start() -> bool {
    true
}

fn default_progress_log_every() -> usize {
    25
}
