use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use rdt_transport::config::ProtocolConfigInput;
use rdt_transport::ProtocolConfig;

use crate::impairment::{ImpairmentConfig, ImpairmentConfigInput};

pub const DEFAULT_SEED: u64 = 1;
pub const DEFAULT_MESSAGES: usize = 1_000;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 200;
pub const DEFAULT_MESSAGE_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_TIME: Duration = Duration::from_secs(3_600);

/// Everything one simulation run needs.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub seed: u64,
    /// Messages the source submits.
    pub messages: usize,
    /// Message sizes are drawn from `1..=max_message_size`.
    pub max_message_size: usize,
    /// Mean gap between submissions.
    pub message_interval: Duration,
    /// Virtual-time bound; a run still busy at this point has failed.
    pub max_time: Duration,
    pub protocol: ProtocolConfig,
    /// Applied independently to both directions.
    pub impairment: ImpairmentConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            messages: DEFAULT_MESSAGES,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            message_interval: DEFAULT_MESSAGE_INTERVAL,
            max_time: DEFAULT_MAX_TIME,
            protocol: ProtocolConfig::default(),
            impairment: ImpairmentConfig::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(ScenarioConfig::default());
        }
        let parsed: ScenarioConfigInput =
            toml::from_str(input).context("invalid scenario TOML")?;
        parsed.resolve()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("loading scenario {}", path.display()))
    }
}

/// Scenario file contents. Missing fields fall back to the defaults.
///
/// ```toml
/// seed = 7
/// messages = 500
///
/// [protocol]
/// window_size = 10
///
/// [impairment]
/// loss_rate = 0.15
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScenarioConfigInput {
    pub seed: Option<u64>,
    pub messages: Option<usize>,
    pub max_message_size: Option<usize>,
    pub message_interval_ms: Option<u64>,
    pub max_time_secs: Option<u64>,
    pub protocol: ProtocolConfigInput,
    pub impairment: ImpairmentConfigInput,
}

impl ScenarioConfigInput {
    pub fn resolve(self) -> Result<ScenarioConfig> {
        let protocol = self
            .protocol
            .resolve()
            .context("invalid [protocol] section")?;
        let impairment = self
            .impairment
            .resolve()
            .context("invalid [impairment] section")?;

        let max_message_size = self.max_message_size.unwrap_or(DEFAULT_MAX_MESSAGE_SIZE);
        ensure!(max_message_size > 0, "max_message_size must be at least 1");

        let max_time = self
            .max_time_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_MAX_TIME);
        ensure!(!max_time.is_zero(), "max_time_secs must be non-zero");

        Ok(ScenarioConfig {
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            messages: self.messages.unwrap_or(DEFAULT_MESSAGES),
            max_message_size,
            message_interval: self
                .message_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_MESSAGE_INTERVAL),
            max_time,
            protocol,
            impairment,
        })
    }
}
