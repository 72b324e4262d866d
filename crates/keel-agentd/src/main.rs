mod agent;
mod config;
mod runtime;

use std::path::Path;

use anyhow::{Context, bail};
use keel_core::ChannelSink;
use keel_model::{BackendMessage, PayloadMessage};
use keel_observe::{log_state_change, logger_init_from_env};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{agent::Agent, config::AgentConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    let log_cfg = logger_init_from_env()?;
    debug!(format = ?log_cfg.format, level = %log_cfg.level, "logger initialized");

    // 2) Config + desired state
    let cfg = AgentConfig::from_env()?;
    let message = load_payload(&cfg.payload_path).await?;
    info!(
        path = %cfg.payload_path.display(),
        message_id = %message.message_id,
        tasks = message.tasks.len(),
        "desired state loaded"
    );

    // 3) Outbound state changes are only logged here
    let (sink, mut reports) = ChannelSink::channel(cfg.event_queue_capacity);
    let (attachment_tx, mut attachments) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(async move {
        let mut delivered = 0usize;
        loop {
            let event = tokio::select! {
                Some(event) = reports.recv() => event,
                Some(event) = attachments.recv() => event,
                else => break,
            };
            log_state_change(&event);
            delivered += 1;
        }
        delivered
    });

    // 4) Agent
    let agent = Agent::new(cfg, sink, attachment_tx);
    let outcome = agent.apply(&message);
    info!(
        added = outcome.added.len(),
        rejected = outcome.rejected.len(),
        "tasks accepted"
    );

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal_token.cancel();
        }
    });

    info!("agent is running, press Ctrl+C to stop");
    agent.run(token).await;
    drop(agent);

    let delivered = reporter.await?;
    info!(delivered, "shutting down");
    Ok(())
}

async fn load_payload(path: &Path) -> anyhow::Result<PayloadMessage> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_payload(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Accepts either a full backend message or a bare payload.
fn parse_payload(raw: &str) -> anyhow::Result<PayloadMessage> {
    match serde_json::from_str::<BackendMessage>(raw) {
        Ok(BackendMessage::PayloadMessage(message)) => Ok(message),
        Ok(other) => bail!("expected a PayloadMessage, got {}", other.type_name()),
        Err(_) => Ok(serde_json::from_str::<PayloadMessage>(raw)?),
    }
}
