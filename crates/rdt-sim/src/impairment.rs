use std::time::Duration;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Per-direction link impairment parameters.
///
/// Rates are probabilities in `[0, 1]` applied independently to every
/// packet. Delay is drawn uniformly from `mean_delay ± jitter`, clamped at
/// zero. A reordered packet is held back a further `2 * jitter` plus up to
/// `mean_delay`, so it is never earlier than an unimpaired packet sent at the
/// same instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpairmentConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub reorder_rate: f64,
    pub mean_delay: Duration,
    pub jitter: Duration,
}

impl Default for ImpairmentConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            reorder_rate: 0.0,
            mean_delay: Duration::from_millis(50),
            jitter: Duration::from_millis(10),
        }
    }
}

impl ImpairmentConfig {
    /// A link that never misbehaves.
    pub fn clean() -> Self {
        Self::default()
    }

    /// Equal loss, corruption and reordering.
    pub fn uniform(rate: f64) -> Self {
        Self {
            loss_rate: rate,
            corrupt_rate: rate,
            reorder_rate: rate,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, rate) in [
            ("loss_rate", self.loss_rate),
            ("corrupt_rate", self.corrupt_rate),
            ("reorder_rate", self.reorder_rate),
        ] {
            ensure!(
                (0.0..=1.0).contains(&rate),
                "{name} must be within [0, 1], got {rate}"
            );
        }
        // A link that loses everything can never complete a transfer.
        ensure!(self.loss_rate < 1.0, "loss_rate of 1.0 blocks all traffic");
        ensure!(
            self.corrupt_rate < 1.0,
            "corrupt_rate of 1.0 blocks all traffic"
        );
        Ok(())
    }

    /// Longest time one packet can spend on the link.
    pub fn max_delay(&self) -> Duration {
        let normal = self.mean_delay + self.jitter;
        if self.reorder_rate > 0.0 {
            normal + self.jitter * 2 + self.mean_delay
        } else {
            normal
        }
    }
}

/// Impairment section of a scenario file. Missing fields keep defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ImpairmentConfigInput {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub reorder_rate: Option<f64>,
    pub mean_delay_ms: Option<u64>,
    pub jitter_ms: Option<u64>,
}

impl ImpairmentConfigInput {
    pub fn resolve(self) -> Result<ImpairmentConfig> {
        let defaults = ImpairmentConfig::default();
        let config = ImpairmentConfig {
            loss_rate: self.loss_rate.unwrap_or(defaults.loss_rate),
            corrupt_rate: self.corrupt_rate.unwrap_or(defaults.corrupt_rate),
            reorder_rate: self.reorder_rate.unwrap_or(defaults.reorder_rate),
            mean_delay: self
                .mean_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.mean_delay),
            jitter: self
                .jitter_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.jitter),
        };
        config.validate()?;
        Ok(config)
    }
}
