use std::{path::PathBuf, time::Duration};

use anyhow::{Context, bail};

pub const EVENT_QUEUE_CAPACITY_ENV: &str = "KEEL_EVENT_QUEUE_CAPACITY";
pub const STEP_DELAY_MS_ENV: &str = "KEEL_STEP_DELAY_MS";
pub const DISABLE_METRICS_ENV: &str = "KEEL_DISABLE_METRICS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// JSON file holding the desired-state message to start from.
    pub payload_path: PathBuf,
    /// Capacity of the outbound state change queue.
    pub event_queue_capacity: usize,
    /// Pause between engine passes; also the simulated duration of one runtime action.
    pub step_delay: Duration,
    pub disable_metrics: bool,
}

impl AgentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    fn from_lookup(
        mut args: impl Iterator<Item = String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let Some(payload_path) = args.next() else {
            bail!("usage: keel-agentd <payload.json>");
        };

        let event_queue_capacity = match lookup(EVENT_QUEUE_CAPACITY_ENV) {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("{EVENT_QUEUE_CAPACITY_ENV}={v}"))?,
            None => 256,
        };
        if event_queue_capacity == 0 {
            bail!("{EVENT_QUEUE_CAPACITY_ENV} must be positive");
        }

        let step_delay_ms = match lookup(STEP_DELAY_MS_ENV) {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{STEP_DELAY_MS_ENV}={v}"))?,
            None => 100,
        };

        let disable_metrics = match lookup(DISABLE_METRICS_ENV) {
            Some(v) => parse_bool(&v).with_context(|| format!("{DISABLE_METRICS_ENV}={v}"))?,
            None => false,
        };

        Ok(Self {
            payload_path: PathBuf::from(payload_path),
            event_queue_capacity,
            step_delay: Duration::from_millis(step_delay_ms),
            disable_metrics,
        })
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("not a boolean: {other}"),
    }
}
