use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Minimum amount of memory a container may be given.
pub const MINIMUM_MEMORY_BYTES: u64 = 4 * 1024 * 1024;

const MIB: u64 = 1024 * 1024;

/// Transport protocol of a port binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    #[default]
    Tcp,
    Udp,
}

/// Mapping between a container port and a host port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    pub container_port: u16,
    pub host_port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bind_ip: String,
    #[serde(default)]
    pub protocol: TransportProtocol,
}

/// Volume mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPoint {
    pub source_volume: String,
    pub container_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Volumes inherited from another container of the same task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeFrom {
    pub source_container: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Run-time overrides delivered alongside the task.
///
/// Only the command may be overridden.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// Raw runtime configuration passed through to the runtime driver untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Run specification of a container as declared in the task definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<Vec<String>>,
    /// CPU shares.
    #[serde(default)]
    pub cpu: u32,
    /// Memory limit in MiB. `0` means no limit was declared.
    #[serde(default)]
    pub memory: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes_from: Vec<VolumeFrom>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mount_points: Vec<MountPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<PortBinding>,
    #[serde(default)]
    pub essential: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub overrides: ContainerOverrides,
    #[serde(default)]
    pub docker_config: DockerConfig,
    /// Names of containers that must be running before this one starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_dependencies: Vec<String>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_memory(mut self, memory_mib: u32) -> Self {
        self.memory = memory_mib;
        self
    }

    pub fn essential(mut self, essential: bool) -> Self {
        self.essential = essential;
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.run_dependencies.push(name.into());
        self
    }

    pub fn with_overrides(mut self, overrides: ContainerOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Memory limit in bytes, if one was declared.
    pub fn memory_bytes(&self) -> Option<u64> {
        (self.memory != 0).then(|| u64::from(self.memory) * MIB)
    }

    /// Checks the spec before a record is built from it.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName);
        }
        if self.image.trim().is_empty() {
            return Err(ModelError::EmptyImage {
                container: self.name.clone(),
            });
        }
        if let Some(bytes) = self.memory_bytes()
            && bytes < MINIMUM_MEMORY_BYTES
        {
            return Err(ModelError::MemoryBelowMinimum {
                container: self.name.clone(),
                memory_mib: self.memory,
                minimum_mib: (MINIMUM_MEMORY_BYTES / MIB) as u32,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_floor_is_enforced() {
        let spec = ContainerSpec::new("web", "nginx").with_memory(3);
        assert_eq!(
            spec.validate(),
            Err(ModelError::MemoryBelowMinimum {
                container: "web".into(),
                memory_mib: 3,
                minimum_mib: 4,
            })
        );

        assert!(ContainerSpec::new("web", "nginx").with_memory(4).validate().is_ok());
    }

    #[test]
    fn undeclared_memory_is_accepted() {
        let spec = ContainerSpec::new("web", "nginx");
        assert_eq!(spec.memory_bytes(), None);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn empty_name_and_image_are_rejected() {
        assert_eq!(
            ContainerSpec::new(" ", "nginx").validate(),
            Err(ModelError::EmptyName)
        );
        assert!(matches!(
            ContainerSpec::new("web", "").validate(),
            Err(ModelError::EmptyImage { .. })
        ));
    }

    #[test]
    fn optional_fields_default_on_decode() {
        let spec: ContainerSpec =
            serde_json::from_str(r#"{"name":"web","image":"nginx:latest"}"#).unwrap();
        assert!(spec.command.is_empty());
        assert!(!spec.essential);
        assert_eq!(spec.overrides, ContainerOverrides::default());
    }
}
