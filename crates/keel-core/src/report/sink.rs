use async_trait::async_trait;
use keel_model::StateChangeEvent;
use tokio::sync::mpsc;

use crate::error::CoreError;

/// Destination for state changes reported upstream.
///
/// Implementations own the transport; the report filter only needs to know whether a
/// submission was accepted.
#[async_trait]
pub trait StateChangeSink: Send + Sync {
    /// Deliver one state change. An error leaves the change eligible for retry.
    async fn submit(&self, event: StateChangeEvent) -> Result<(), CoreError>;
}

/// Sink that forwards state changes into a bounded channel.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<StateChangeEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<StateChangeEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StateChangeEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl StateChangeSink for ChannelSink {
    async fn submit(&self, event: StateChangeEvent) -> Result<(), CoreError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CoreError::Delivery("state change channel closed".into()))
    }
}
