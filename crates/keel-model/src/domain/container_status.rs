use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser};

use crate::{ModelError, TaskStatus};

/// Lifecycle status of a single container.
///
/// Variants are declared in lifecycle order; comparisons such as "is at least as far
/// along as" rely on that ordering.
///
/// ```text
/// Container: None -> Pulled -> Created -> Running -> ResourcesProvisioned -> Stopped
/// Task     : None ->     Created        ->          Running               -> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(i32)]
pub enum ContainerStatus {
    /// Zero state; the image has not been pulled yet.
    #[default]
    None = 0,
    /// The image has been pulled.
    Pulled = 1,
    /// The container has been created by the runtime.
    Created = 2,
    /// The container has started.
    Running = 3,
    /// Post-start setup (for example a network attachment) has completed.
    ///
    /// Task-definition containers never wait here. Containers injected by the agent may
    /// need extra work before they count as ready, and declare this as their steady state.
    ResourcesProvisioned = 4,
    /// The container has stopped.
    Stopped = 5,
    /// Upper bound used in comparisons. Never assigned to a container.
    Zombie = 6,
}

impl ContainerStatus {
    /// Every assignable status, in lifecycle order.
    pub const ALL: [ContainerStatus; 6] = [
        ContainerStatus::None,
        ContainerStatus::Pulled,
        ContainerStatus::Created,
        ContainerStatus::Running,
        ContainerStatus::ResourcesProvisioned,
        ContainerStatus::Stopped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::None => "NONE",
            ContainerStatus::Pulled => "PULLED",
            ContainerStatus::Created => "CREATED",
            ContainerStatus::Running => "RUNNING",
            ContainerStatus::ResourcesProvisioned => "RESOURCES_PROVISIONED",
            ContainerStatus::Stopped => "STOPPED",
            ContainerStatus::Zombie => "ZOMBIE",
        }
    }

    /// Legacy integer encoding used by older checkpoints.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as i64 == code)
    }

    /// Maps this container status to the task status it implies.
    ///
    /// A container that runs but still waits for its `ResourcesProvisioned` steady state
    /// keeps the task at `Created`.
    pub fn task_status(&self, steady_state: ContainerStatus) -> TaskStatus {
        match *self {
            ContainerStatus::None => TaskStatus::None,
            s if s == steady_state => TaskStatus::Running,
            ContainerStatus::Created => TaskStatus::Created,
            ContainerStatus::Stopped => TaskStatus::Stopped,
            ContainerStatus::Running if steady_state == ContainerStatus::ResourcesProvisioned => {
                TaskStatus::Created
            }
            _ => TaskStatus::None,
        }
    }

    /// Returns `true` if the backend recognizes this status for a container with the given
    /// steady state. Pull and create steps are never reported individually.
    pub fn should_report_to_backend(&self, steady_state: ContainerStatus) -> bool {
        *self == steady_state || *self == ContainerStatus::Stopped
    }

    /// Collapses the internal status to the value reported to the backend:
    /// `Running`, `Stopped` or `None`.
    pub fn backend_status(&self, steady_state: ContainerStatus) -> ContainerStatus {
        if *self == steady_state {
            return ContainerStatus::Running;
        }
        if *self == ContainerStatus::Stopped {
            return ContainerStatus::Stopped;
        }
        ContainerStatus::None
    }

    /// Returns `true` if the container has stopped.
    pub fn is_terminal(&self) -> bool {
        *self == ContainerStatus::Stopped
    }

    /// Returns `true` for `Running` and `ResourcesProvisioned`.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ContainerStatus::Running | ContainerStatus::ResourcesProvisioned
        )
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == norm)
            .ok_or_else(|| ModelError::InvalidStatus(s.to_string()))
    }
}

impl Serialize for ContainerStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if *self == ContainerStatus::Zombie {
            return Err(ser::Error::custom("the zombie status is never persisted"));
        }
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ContainerStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Code(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Name(name) => name.parse().map_err(de::Error::custom),
            Repr::Code(code) => Self::from_code(code)
                .ok_or_else(|| de::Error::custom(format!("unknown container status code {code}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEADY_STATES: [ContainerStatus; 2] = [
        ContainerStatus::Running,
        ContainerStatus::ResourcesProvisioned,
    ];

    #[test]
    fn ordering_follows_lifecycle() {
        assert!(ContainerStatus::None < ContainerStatus::Pulled);
        assert!(ContainerStatus::Pulled < ContainerStatus::Created);
        assert!(ContainerStatus::Created < ContainerStatus::Running);
        assert!(ContainerStatus::Running < ContainerStatus::ResourcesProvisioned);
        assert!(ContainerStatus::ResourcesProvisioned < ContainerStatus::Stopped);
        assert!(ContainerStatus::Stopped < ContainerStatus::Zombie);
    }

    #[test]
    fn task_status_with_default_steady_state() {
        let steady = ContainerStatus::Running;
        assert_eq!(ContainerStatus::None.task_status(steady), TaskStatus::None);
        assert_eq!(ContainerStatus::Pulled.task_status(steady), TaskStatus::None);
        assert_eq!(ContainerStatus::Created.task_status(steady), TaskStatus::Created);
        assert_eq!(ContainerStatus::Running.task_status(steady), TaskStatus::Running);
        assert_eq!(
            ContainerStatus::ResourcesProvisioned.task_status(steady),
            TaskStatus::None
        );
        assert_eq!(ContainerStatus::Stopped.task_status(steady), TaskStatus::Stopped);
        assert_eq!(ContainerStatus::Zombie.task_status(steady), TaskStatus::None);
    }

    #[test]
    fn running_but_unprovisioned_keeps_task_created() {
        let steady = ContainerStatus::ResourcesProvisioned;
        assert_eq!(ContainerStatus::Running.task_status(steady), TaskStatus::Created);
        assert_eq!(
            ContainerStatus::ResourcesProvisioned.task_status(steady),
            TaskStatus::Running
        );
    }

    #[test]
    fn report_only_steady_and_stopped() {
        for steady in STEADY_STATES {
            for status in ContainerStatus::ALL {
                let expected = status == steady || status == ContainerStatus::Stopped;
                assert_eq!(
                    status.should_report_to_backend(steady),
                    expected,
                    "{status} with steady state {steady}"
                );
            }
        }
    }

    #[test]
    fn backend_status_collapses_granularity() {
        for steady in STEADY_STATES {
            for status in ContainerStatus::ALL {
                let backend = status.backend_status(steady);
                assert!(matches!(
                    backend,
                    ContainerStatus::None | ContainerStatus::Running | ContainerStatus::Stopped
                ));
            }
            assert_eq!(steady.backend_status(steady), ContainerStatus::Running);
        }
        assert_eq!(
            ContainerStatus::Running.backend_status(ContainerStatus::ResourcesProvisioned),
            ContainerStatus::None
        );
        assert_eq!(
            ContainerStatus::Zombie.backend_status(ContainerStatus::Running),
            ContainerStatus::None
        );
    }

    #[test]
    fn terminal_and_running_predicates() {
        assert!(ContainerStatus::Stopped.is_terminal());
        assert!(!ContainerStatus::Running.is_terminal());

        assert!(ContainerStatus::Running.is_running());
        assert!(ContainerStatus::ResourcesProvisioned.is_running());
        assert!(!ContainerStatus::Created.is_running());
        assert!(!ContainerStatus::Stopped.is_running());
    }

    #[test]
    fn parse_names() {
        assert_eq!(
            "resources_provisioned".parse::<ContainerStatus>().unwrap(),
            ContainerStatus::ResourcesProvisioned
        );
        assert!("ZOMBIE".parse::<ContainerStatus>().is_err());
        assert!("bogus".parse::<ContainerStatus>().is_err());
    }

    #[test]
    fn serde_accepts_names_and_legacy_codes() {
        let json = serde_json::to_string(&ContainerStatus::Running).unwrap();
        assert_eq!(json, r#""RUNNING""#);

        let from_code: ContainerStatus = serde_json::from_str("4").unwrap();
        assert_eq!(from_code, ContainerStatus::ResourcesProvisioned);
        assert!(serde_json::from_str::<ContainerStatus>("6").is_err());

        assert!(serde_json::to_string(&ContainerStatus::Zombie).is_err());
    }
}
