//! ghostscale.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostscaleConfig {
    pub sorter: SorterSection,
    pub retry: RetrySection,
    pub requeue: RequeueSection,
    pub watch: WatchSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterSection {
    /// Pending requests the queue holds before producers block.
    pub queue_capacity: usize,
}

impl Default for SorterSection {
    fn default() -> Self {
        Self { queue_capacity: 1000 }
    }
}

/// Local, bounded retry of each expander call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub attempts: u32,
    /// Per-call latency bound, e.g. "30s". "0s" disables it.
    pub call_timeout: String,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            attempts: 3,
            call_timeout: "30s".to_string(),
        }
    }
}

/// Global requeue of failed admissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequeueSection {
    /// Requeues allowed before a request is dead-lettered.
    pub max_attempts: u32,
    pub base_backoff: String,
    pub max_backoff: String,
}

impl Default for RequeueSection {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_backoff: "500ms".to_string(),
            max_backoff: "60s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Annotation whose value `"true"` marks a placeholder workload.
    pub placeholder_annotation: String,
    /// Annotation carrying the group identifier.
    pub group_annotation: String,
    pub skip_daemon_owned: bool,
    pub skip_cron_owned: bool,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            placeholder_annotation: "ghostscale.io/placeholder".to_string(),
            group_annotation: "ghostscale.io/group".to_string(),
            skip_daemon_owned: true,
            skip_cron_owned: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,ghostscale=debug".to_string(),
            json: false,
        }
    }
}

impl GhostscaleConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GhostscaleConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Err(e) = config.validate() {
            warn!(error = %e, "rejecting config");
            return Err(e);
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sorter.queue_capacity == 0 {
            return Err(ConfigError::Invalid("sorter.queue_capacity must be positive".into()));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid("retry.attempts must be positive".into()));
        }
        self.call_timeout()?;
        let base = parse_duration(&self.requeue.base_backoff)?;
        let max = parse_duration(&self.requeue.max_backoff)?;
        if base > max {
            return Err(ConfigError::Invalid(
                "requeue.base_backoff exceeds requeue.max_backoff".into(),
            ));
        }
        Ok(())
    }

    /// The expander call timeout, `None` when disabled.
    pub fn call_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        let timeout = parse_duration(&self.retry.call_timeout)?;
        Ok((!timeout.is_zero()).then_some(timeout))
    }
}

/// Parse a duration string like "250ms", "30s", "5m", or bare seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().map(Duration::from_millis).map_err(|_| invalid())
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().map(Duration::from_secs).map_err(|_| invalid())
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .map(|m| Duration::from_secs(m * 60))
            .map_err(|_| invalid())
    } else {
        s.parse::<u64>().map(Duration::from_secs).map_err(|_| invalid())
    }
}
