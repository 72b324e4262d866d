use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("container name is empty")]
    EmptyName,
    #[error("container {container}: image is empty")]
    EmptyImage { container: String },
    #[error("container {container}: memory {memory_mib}MiB is below the {minimum_mib}MiB minimum")]
    MemoryBelowMinimum {
        container: String,
        memory_mib: u32,
        minimum_mib: u32,
    },
    #[error("task {task}: duplicate container {container}")]
    DuplicateContainer { task: String, container: String },
    #[error("container {container}: depends on unknown container {dependency}")]
    UnknownDependency {
        container: String,
        dependency: String,
    },
    #[error("invalid status: {0}")]
    InvalidStatus(String),
}
