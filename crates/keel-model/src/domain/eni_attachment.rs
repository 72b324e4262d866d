use serde::{Deserialize, Serialize};

use crate::Guarded;

/// Attachment state of a network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentStatus {
    #[default]
    None,
    Attached,
    Detached,
}

/// Network interface the backend attached for a task.
///
/// The device is matched by MAC address once it shows up on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EniAttachment {
    pub task_arn: String,
    pub attachment_arn: String,
    pub mac_address: String,
    #[serde(default)]
    status: Guarded<AttachmentStatus>,
    /// Set once the attachment has been reported to the backend.
    #[serde(default)]
    sent: Guarded<bool>,
}

impl EniAttachment {
    pub fn new(
        task_arn: impl Into<String>,
        attachment_arn: impl Into<String>,
        mac_address: impl Into<String>,
    ) -> Self {
        Self {
            task_arn: task_arn.into(),
            attachment_arn: attachment_arn.into(),
            mac_address: mac_address.into(),
            status: Guarded::default(),
            sent: Guarded::default(),
        }
    }

    pub fn status(&self) -> AttachmentStatus {
        self.status.get()
    }

    pub fn set_status(&self, status: AttachmentStatus) {
        self.status.set(status);
    }

    pub fn is_attached(&self) -> bool {
        self.status() == AttachmentStatus::Attached
    }

    pub fn is_sent(&self) -> bool {
        self.sent.get()
    }

    pub fn set_sent(&self, sent: bool) {
        self.sent.set(sent);
    }

    /// Mark the attachment as reported, returning `false` if it already was.
    pub fn claim_send(&self) -> bool {
        self.sent.set_if(true, |sent, _| !*sent)
    }
}
