//! Tracks network interfaces appearing on the host and matches them to task attachments.
mod cache;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use keel_model::{
    AttachmentStateChange, AttachmentStatus, ContainerStatus, EniAttachment, StateChangeEvent,
    Task,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{TaskEngineState, error::CoreError};
use cache::TtlSet;

/// Limits for remembering devices that belong to no task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EniStateManagerConfig {
    pub max_unmanaged_devices: usize,
    pub unmanaged_ttl: Duration,
}

impl Default for EniStateManagerConfig {
    fn default() -> Self {
        Self {
            max_unmanaged_devices: 10,
            unmanaged_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// Reports attachments once their device shows up on the host.
pub struct EniStateManager {
    state: TaskEngineState,
    events: mpsc::UnboundedSender<StateChangeEvent>,
    unmanaged: Mutex<TtlSet<String>>,
}

impl EniStateManager {
    pub fn new(
        state: TaskEngineState,
        events: mpsc::UnboundedSender<StateChangeEvent>,
        config: EniStateManagerConfig,
    ) -> Self {
        Self {
            state,
            events,
            unmanaged: Mutex::new(TtlSet::new(
                config.max_unmanaged_devices,
                config.unmanaged_ttl,
            )),
        }
    }

    /// Process the devices present at startup. `devices` maps MAC address to device name.
    pub fn init(&self, devices: &HashMap<String, String>) -> usize {
        info!(devices = devices.len(), "initializing network attachment state");
        self.reconcile(devices)
    }

    /// Process the current set of devices, reporting any attachment not reported yet.
    ///
    /// Returns the number of attachment changes emitted.
    pub fn reconcile(&self, devices: &HashMap<String, String>) -> usize {
        let mut sent = 0;
        for (mac, device) in devices {
            match self.handle_eni_event(mac) {
                Ok(true) => {
                    debug!(%mac, %device, "attachment reported");
                    sent += 1;
                }
                Ok(false) => {}
                Err(err) => warn!(%mac, %device, error = %err, "failed to report attachment"),
            }
        }
        sent
    }

    /// Attachment to report for this MAC, if it belongs to a task and was not reported yet.
    pub fn should_be_sent(&self, mac: &str) -> Option<Arc<EniAttachment>> {
        let Some(eni) = self.state.eni_by_mac(mac) else {
            let mut unmanaged = self.unmanaged.lock().unwrap_or_else(PoisonError::into_inner);
            if unmanaged.insert(mac.to_ascii_lowercase()) {
                info!(%mac, "device is not managed by any task");
            }
            return None;
        };
        if eni.is_sent() {
            debug!(%mac, attachment = %eni.attachment_arn, "attachment already reported");
            return None;
        }
        Some(eni)
    }

    /// A device with this MAC appeared. Marks the matching attachment attached and emits
    /// it once. Returns `true` if an event was emitted.
    pub fn handle_eni_event(&self, mac: &str) -> Result<bool, CoreError> {
        let Some(eni) = self.should_be_sent(mac) else {
            return Ok(false);
        };
        if !eni.claim_send() {
            return Ok(false);
        }

        eni.set_status(AttachmentStatus::Attached);
        let event = StateChangeEvent::Attachment(AttachmentStateChange {
            task_arn: eni.task_arn.clone(),
            attachment_arn: eni.attachment_arn.clone(),
            mac_address: eni.mac_address.clone(),
            status: AttachmentStatus::Attached,
        });
        if self.events.send(event).is_err() {
            eni.set_sent(false);
            return Err(CoreError::Delivery("attachment event channel closed".into()));
        }
        Ok(true)
    }
}

/// Advance containers waiting on task resources once the attachment is in place.
///
/// Every container whose steady state is `ResourcesProvisioned` and that is known `Running`
/// moves to `ResourcesProvisioned`. Tasks without an attachment have nothing to wait for.
/// Returns the names of containers that moved.
pub fn mark_resources_provisioned(task: &Task) -> Vec<String> {
    if task.eni.as_ref().is_some_and(|eni| !eni.is_attached()) {
        return Vec::new();
    }

    let mut provisioned = Vec::new();
    for container in &task.containers {
        if container.steady_state_status() == ContainerStatus::ResourcesProvisioned
            && container.known_status() == ContainerStatus::Running
            && container.advance_known_status(ContainerStatus::ResourcesProvisioned)
        {
            provisioned.push(container.name().to_string());
        }
    }
    provisioned
}

#[cfg(test)]
mod tests {
    use keel_model::{Container, ContainerSpec};

    use super::*;

    const MAC: &str = "0a:58:a9:fe:ac:02";

    fn state_with_attachment() -> (TaskEngineState, Arc<Task>) {
        let mut task = Task::new(
            "arn:task/1",
            "web",
            "1",
            vec![
                Container::new(ContainerSpec::new("pause", "pause"))
                    .unwrap()
                    .with_steady_state(ContainerStatus::ResourcesProvisioned),
                Container::new(ContainerSpec::new("app", "nginx")).unwrap(),
            ],
        )
        .unwrap();
        task.eni = Some(Arc::new(EniAttachment::new(
            "arn:task/1",
            "arn:attachment/1",
            MAC,
        )));
        let state = TaskEngineState::new();
        let task = state.add_task(task);
        (state, task)
    }

    #[tokio::test]
    async fn managed_device_is_reported_once() {
        let (state, task) = state_with_attachment();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = EniStateManager::new(state, tx, EniStateManagerConfig::default());

        assert!(manager.handle_eni_event(&MAC.to_uppercase()).unwrap());
        assert!(!manager.handle_eni_event(MAC).unwrap());

        match rx.recv().await {
            Some(StateChangeEvent::Attachment(change)) => {
                assert_eq!(change.attachment_arn, "arn:attachment/1");
                assert_eq!(change.status, AttachmentStatus::Attached);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
        assert!(task.eni.as_ref().unwrap().is_attached());
    }

    #[tokio::test]
    async fn unmanaged_devices_are_ignored() {
        let (state, _task) = state_with_attachment();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = EniStateManager::new(state, tx, EniStateManagerConfig::default());

        let devices = HashMap::from([
            ("02:00:00:00:00:99".to_string(), "eth1".to_string()),
            (MAC.to_string(), "eth2".to_string()),
        ]);
        assert_eq!(manager.init(&devices), 1);
        assert_eq!(manager.reconcile(&devices), 0);
        assert!(manager.should_be_sent("02:00:00:00:00:99").is_none());

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_channel_keeps_attachment_retryable() {
        let (state, task) = state_with_attachment();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let manager = EniStateManager::new(state, tx, EniStateManagerConfig::default());

        let err = manager.handle_eni_event(MAC).unwrap_err();
        assert!(matches!(err, CoreError::Delivery(_)));
        assert!(!task.eni.as_ref().unwrap().is_sent());
        assert!(manager.should_be_sent(MAC).is_some());
    }

    #[test]
    fn provisioning_waits_for_attachment() {
        let (_state, task) = state_with_attachment();
        for c in &task.containers {
            c.set_known_status(ContainerStatus::Running);
        }
        assert!(mark_resources_provisioned(&task).is_empty());

        task.eni.as_ref().unwrap().set_status(AttachmentStatus::Attached);
        assert_eq!(mark_resources_provisioned(&task), vec!["pause".to_string()]);
        assert_eq!(
            task.container("app").unwrap().known_status(),
            ContainerStatus::Running
        );
        assert!(mark_resources_provisioned(&task).is_empty());
    }
}
