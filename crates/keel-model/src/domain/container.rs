use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    ContainerSpec, ContainerStatus, Guarded, ModelError, PortBinding, next_known_state_progression,
};

/// Error recorded while trying to move a container toward its desired status.
///
/// Reported to the backend as the `reason` of the next state change, in the form
/// `"<name>: <message>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyingError {
    pub name: String,
    pub message: String,
}

impl ApplyingError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ApplyingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for ApplyingError {}

/// Consistent view of the four status fields of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub desired: ContainerStatus,
    pub known: ContainerStatus,
    pub applied: ContainerStatus,
    pub sent: ContainerStatus,
}

/// Concurrency-safe record of one container of a task.
///
/// Each mutable field sits behind its own lock, so a reader of the known status is never
/// blocked by a writer of the desired status. Accessors never hold more than one lock;
/// callers that need a joint view of the status fields use [`Container::snapshot`].
///
/// Writers by path:
/// - the runtime observer writes the known status, exit code, port bindings and image id;
/// - the backend message path writes the desired status;
/// - the engine loop writes the applied status and the applying error;
/// - the reporting path writes the sent status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(flatten)]
    pub spec: ContainerSpec,
    /// Set for containers injected by the agent rather than declared in the task definition.
    #[serde(default)]
    pub is_internal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    steady_state: Option<ContainerStatus>,
    #[serde(default)]
    image_id: Guarded<String>,
    #[serde(default)]
    desired_status: Guarded<ContainerStatus>,
    #[serde(default)]
    known_status: Guarded<ContainerStatus>,
    #[serde(default)]
    applied_status: Guarded<ContainerStatus>,
    #[serde(default)]
    sent_status: Guarded<ContainerStatus>,
    #[serde(default)]
    known_exit_code: Guarded<Option<i32>>,
    #[serde(default)]
    known_port_bindings: Guarded<Vec<PortBinding>>,
    #[serde(default)]
    applying_error: Guarded<Option<ApplyingError>>,
}

impl Container {
    /// Build a record from a validated spec.
    pub fn new(spec: ContainerSpec) -> Result<Self, ModelError> {
        spec.validate()?;
        Ok(Self {
            spec,
            is_internal: false,
            steady_state: None,
            image_id: Guarded::default(),
            desired_status: Guarded::default(),
            known_status: Guarded::default(),
            applied_status: Guarded::default(),
            sent_status: Guarded::default(),
            known_exit_code: Guarded::default(),
            known_port_bindings: Guarded::default(),
            applying_error: Guarded::default(),
        })
    }

    /// Build a record for a container injected by the agent.
    pub fn internal(spec: ContainerSpec, steady_state: ContainerStatus) -> Result<Self, ModelError> {
        let mut container = Self::new(spec)?.with_steady_state(steady_state);
        container.is_internal = true;
        Ok(container)
    }

    /// Declare a non-default steady state.
    pub fn with_steady_state(mut self, steady_state: ContainerStatus) -> Self {
        debug_assert!(steady_state.is_running(), "invalid steady state {steady_state}");
        self.steady_state = Some(steady_state);
        self
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn image(&self) -> &str {
        &self.spec.image
    }

    pub fn is_essential(&self) -> bool {
        self.spec.essential
    }

    /// Status the container is considered ready at; `Running` unless overridden.
    pub fn steady_state_status(&self) -> ContainerStatus {
        self.steady_state.unwrap_or(ContainerStatus::Running)
    }

    pub fn desired_status(&self) -> ContainerStatus {
        self.desired_status.get()
    }

    pub fn set_desired_status(&self, status: ContainerStatus) {
        self.desired_status.set(status);
    }

    /// Raise the desired status, ignoring values that are not ahead of the current one.
    pub fn advance_desired_status(&self, status: ContainerStatus) -> bool {
        self.desired_status.set_if(status, |cur, next| next > cur)
    }

    pub fn known_status(&self) -> ContainerStatus {
        self.known_status.get()
    }

    pub fn set_known_status(&self, status: ContainerStatus) {
        self.known_status.set(status);
    }

    /// Raise the known status, returning `false` for observations that are not ahead of it.
    pub fn advance_known_status(&self, status: ContainerStatus) -> bool {
        self.known_status.set_if(status, |cur, next| next > cur)
    }

    pub fn applied_status(&self) -> ContainerStatus {
        self.applied_status.get()
    }

    pub fn set_applied_status(&self, status: ContainerStatus) {
        self.applied_status.set(status);
    }

    pub fn sent_status(&self) -> ContainerStatus {
        self.sent_status.get()
    }

    pub fn set_sent_status(&self, status: ContainerStatus) {
        self.sent_status.set(status);
    }

    /// Raise the sent status, ignoring values that are not ahead of the current one.
    pub fn advance_sent_status(&self, status: ContainerStatus) -> bool {
        self.sent_status.set_if(status, |cur, next| next > cur)
    }

    pub fn image_id(&self) -> String {
        self.image_id.get()
    }

    pub fn set_image_id(&self, image_id: impl Into<String>) {
        self.image_id.set(image_id.into());
    }

    pub fn known_exit_code(&self) -> Option<i32> {
        self.known_exit_code.get()
    }

    pub fn set_known_exit_code(&self, code: Option<i32>) {
        self.known_exit_code.set(code);
    }

    pub fn known_port_bindings(&self) -> Vec<PortBinding> {
        self.known_port_bindings.get()
    }

    pub fn set_known_port_bindings(&self, bindings: Vec<PortBinding>) {
        self.known_port_bindings.set(bindings);
    }

    pub fn applying_error(&self) -> Option<ApplyingError> {
        self.applying_error.get()
    }

    pub fn set_applying_error(&self, error: Option<ApplyingError>) {
        self.applying_error.set(error);
    }

    /// Returns `true` if the container is known to have stopped.
    pub fn known_terminal(&self) -> bool {
        self.known_status().is_terminal()
    }

    /// Returns `true` if the container is supposed to stop.
    pub fn desired_terminal(&self) -> bool {
        self.desired_status().is_terminal()
    }

    /// Returns `true` if the known status equals the steady state.
    pub fn is_known_steady_state(&self) -> bool {
        self.known_status() == self.steady_state_status()
    }

    /// Next known status to aim for, given the current known status.
    pub fn next_known_state_progression(&self) -> ContainerStatus {
        next_known_state_progression(self.known_status(), self.steady_state_status())
    }

    /// Copy of the four status fields taken under one combined critical section.
    ///
    /// Locks are taken in a fixed order (desired, known, applied, sent). Setters only ever
    /// hold a single lock, so the combined section cannot deadlock with them.
    pub fn snapshot(&self) -> StatusSnapshot {
        let desired = self.desired_status.read();
        let known = self.known_status.read();
        let applied = self.applied_status.read();
        let sent = self.sent_status.read();
        StatusSnapshot {
            desired: *desired,
            known: *known,
            applied: *applied,
            sent: *sent,
        }
    }

    /// Copy of the container with declared overrides applied to the run spec.
    ///
    /// The record itself is never modified.
    pub fn overridden(&self) -> Container {
        let mut result = self.clone();
        if let Some(command) = &self.spec.overrides.command {
            result.spec.command = command.clone();
        }
        result
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) ({}->{})",
            self.name(),
            self.image(),
            self.known_status(),
            self.desired_status()
        )?;
        if let Some(code) = self.known_exit_code() {
            write!(f, " - Exit: {code}")?;
        }
        Ok(())
    }
}
