//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;

use crate::error::{self, ConfigError};
use crate::intake::IntakeScript;

/// Uniform delay range applied before every outbound send.
///
/// A delay is `base + U(0, jitter)`, approximating human typing cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterRange {
    pub base: Duration,
    pub jitter: Duration,
}

impl JitterRange {
    pub const fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// No delay at all. Useful for tests and local adapters.
    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Upper bound of any sampled delay.
    pub fn max(&self) -> Duration {
        self.base + self.jitter
    }

    /// Draw a delay from the range.
    pub fn sample(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.base + Duration::from_millis(extra)
    }
}

impl Default for JitterRange {
    fn default() -> Self {
        Self::new(Duration::from_millis(1200), Duration::from_millis(1000))
    }
}

/// Intake desk configuration.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Inactivity window after which a sender's ticket is replaced.
    pub ticket_ttl: Duration,
    /// Window during which the unsolicited greeting banner is not resent.
    pub flood_ttl: Duration,
    /// Cadence of the background eviction sweep. `None` disables it.
    pub sweep_interval: Option<Duration>,
    /// Pacing applied before every outbound message.
    pub send_delay: JitterRange,
    /// Optional JSON file overriding the built-in intake script.
    pub script_path: Option<PathBuf>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            ticket_ttl: Duration::from_secs(2 * 60 * 60), // 2 hours
            flood_ttl: Duration::from_secs(30 * 60),      // 30 minutes
            sweep_interval: Some(Duration::from_secs(600)), // 10 minutes
            send_delay: JitterRange::default(),
            script_path: None,
        }
    }
}

impl IntakeConfig {
    /// Build config from `INTAKE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let ticket_ttl = parse_u64(&lookup, "INTAKE_TICKET_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.ticket_ttl);

        let flood_ttl = parse_u64(&lookup, "INTAKE_FLOOD_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.flood_ttl);

        let sweep_interval = match parse_u64(&lookup, "INTAKE_SWEEP_INTERVAL_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.sweep_interval,
        };

        let base = parse_u64(&lookup, "INTAKE_SEND_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.send_delay.base);
        let jitter = parse_u64(&lookup, "INTAKE_SEND_JITTER_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.send_delay.jitter);

        let script_path = lookup("INTAKE_SCRIPT_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let config = Self {
            ticket_ttl,
            flood_ttl,
            sweep_interval,
            send_delay: JitterRange::new(base, jitter),
            script_path,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticket_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "INTAKE_TICKET_TTL_SECS".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.flood_ttl > self.ticket_ttl {
            return Err(ConfigError::InvalidValue {
                key: "INTAKE_FLOOD_TTL_SECS".into(),
                message: format!(
                    "flood window ({}s) must not exceed ticket TTL ({}s)",
                    self.flood_ttl.as_secs(),
                    self.ticket_ttl.as_secs()
                ),
            });
        }
        Ok(())
    }
}

/// Load configuration and the intake script from the process environment.
pub fn load() -> error::Result<(IntakeConfig, IntakeScript)> {
    load_with(|key| std::env::var(key).ok())
}

/// Load configuration from `lookup`, then the script file it points at
/// (or the built-in script when none is set).
pub fn load_with<F>(lookup: F) -> error::Result<(IntakeConfig, IntakeScript)>
where
    F: Fn(&str) -> Option<String>,
{
    let config = IntakeConfig::from_lookup(lookup)?;
    let script = match &config.script_path {
        Some(path) => IntakeScript::load(path)?,
        None => IntakeScript::default(),
    };
    Ok((config, script))
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?} is not a non-negative integer ({e})"),
        })
}
