mod guarded;
pub use guarded::Guarded;

mod container_status;
pub use container_status::ContainerStatus;

mod task_status;
pub use task_status::TaskStatus;

mod progression;
pub use progression::next_known_state_progression;

mod container_spec;
pub use container_spec::{
    ContainerOverrides, ContainerSpec, DockerConfig, MountPoint, PortBinding, TransportProtocol,
    VolumeFrom, MINIMUM_MEMORY_BYTES,
};

mod container;
pub use container::{ApplyingError, Container, StatusSnapshot};

mod docker_container;
pub use docker_container::DockerContainer;

mod eni_attachment;
pub use eni_attachment::{AttachmentStatus, EniAttachment};

mod task;
pub use task::Task;

/// Amazon-style resource name of a task, used as its identity across the agent.
pub type TaskArn = String;
