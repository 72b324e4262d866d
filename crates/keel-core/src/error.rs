use keel_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown task: {0}")]
    UnknownTask(String),
    #[error("task {task}: unknown container {container}")]
    UnknownContainer { task: String, container: String },
    #[error("invalid spec: {0}")]
    InvalidSpec(#[from] ModelError),
    #[error("delivery failed: {0}")]
    Delivery(String),
}
