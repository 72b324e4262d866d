use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::Container;

/// Cross-reference between a runtime container and the record it implements.
///
/// The runtime assigns the id and generated name; the record is shared with the owning task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerContainer {
    pub docker_id: String,
    /// Generated runtime name, needed for linking.
    pub docker_name: String,
    pub container: Arc<Container>,
}

impl DockerContainer {
    pub fn new(
        docker_id: impl Into<String>,
        docker_name: impl Into<String>,
        container: Arc<Container>,
    ) -> Self {
        Self {
            docker_id: docker_id.into(),
            docker_name: docker_name.into(),
            container,
        }
    }
}

impl fmt::Display for DockerContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id: {}, Name: {}, Container: {}",
            self.docker_id, self.docker_name, self.container
        )
    }
}
