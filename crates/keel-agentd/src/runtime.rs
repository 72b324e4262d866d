use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use keel_core::ContainerObservation;
use keel_model::{ApplyingError, Container, ContainerStatus, DockerContainer, Task};
use tracing::debug;

/// Image prefix the simulated runtime refuses to pull.
pub const UNPULLABLE_PREFIX: &str = "invalid/";

const FIRST_EPHEMERAL_PORT: u64 = 32768;

/// Result of one runtime action.
#[derive(Debug)]
pub struct Applied {
    pub observation: ContainerObservation,
    /// Set when the action created a runtime container.
    pub docker: Option<DockerContainer>,
}

/// In-process stand-in for the container runtime driver.
///
/// Every action takes `delay` and succeeds, except pulls of images under
/// [`UNPULLABLE_PREFIX`].
pub struct SimulatedRuntime {
    delay: Duration,
    sequence: AtomicU64,
}

impl SimulatedRuntime {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            sequence: AtomicU64::new(1),
        }
    }

    pub async fn apply(
        &self,
        task: &Task,
        container: &Arc<Container>,
        target: ContainerStatus,
    ) -> Result<Applied, ApplyingError> {
        tokio::time::sleep(self.delay).await;

        let observation = match target {
            ContainerStatus::Pulled => {
                if container.image().starts_with(UNPULLABLE_PREFIX) {
                    return Err(ApplyingError::new(
                        "CannotPullContainerError",
                        format!("{}: repository does not exist", container.image()),
                    ));
                }
                container.set_image_id(format!("sha256:{:064x}", self.next()));
                ContainerObservation::new(ContainerStatus::Pulled)
            }
            ContainerStatus::Created => {
                let docker = DockerContainer::new(
                    format!("{:012x}", self.next()),
                    format!("ecs-{}-{}-{}", task.family, task.version, container.name()),
                    Arc::clone(container),
                );
                debug!(container = %docker, "runtime container created");
                return Ok(Applied {
                    observation: ContainerObservation::new(ContainerStatus::Created),
                    docker: Some(docker),
                });
            }
            ContainerStatus::Running => {
                let effective = container.overridden();
                debug!(
                    container = %container.name(),
                    command = ?effective.spec.command,
                    "starting container"
                );
                let bindings = effective
                    .spec
                    .port_mappings
                    .into_iter()
                    .map(|mut binding| {
                        if binding.host_port == 0 {
                            binding.host_port = (FIRST_EPHEMERAL_PORT + self.next() % 28000) as u16;
                        }
                        if binding.bind_ip.is_empty() {
                            binding.bind_ip = "0.0.0.0".to_string();
                        }
                        binding
                    })
                    .collect();
                ContainerObservation::new(ContainerStatus::Running).with_port_bindings(bindings)
            }
            ContainerStatus::Stopped => {
                let observation = ContainerObservation::new(ContainerStatus::Stopped);
                if container.known_status().is_running() {
                    observation.with_exit_code(0)
                } else {
                    observation
                }
            }
            other => {
                return Err(ApplyingError::new(
                    "UnsupportedTransition",
                    format!("runtime cannot move a container to {other}"),
                ));
            }
        };

        Ok(Applied {
            observation,
            docker: None,
        })
    }

    fn next(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use keel_model::{ContainerSpec, PortBinding, TransportProtocol};

    use super::*;

    fn task_with(spec: ContainerSpec) -> Task {
        Task::new("arn:task/1", "web", "2", vec![Container::new(spec).unwrap()]).unwrap()
    }

    #[tokio::test]
    async fn unpullable_image_fails() {
        let runtime = SimulatedRuntime::new(Duration::ZERO);
        let task = task_with(ContainerSpec::new("app", "invalid/nginx"));
        let err = runtime
            .apply(&task, &task.containers[0], ContainerStatus::Pulled)
            .await
            .unwrap_err();
        assert_eq!(err.name, "CannotPullContainerError");
    }

    #[tokio::test]
    async fn create_names_runtime_container() {
        let runtime = SimulatedRuntime::new(Duration::ZERO);
        let task = task_with(ContainerSpec::new("app", "nginx"));
        let applied = runtime
            .apply(&task, &task.containers[0], ContainerStatus::Created)
            .await
            .unwrap();
        let docker = applied.docker.unwrap();
        assert_eq!(docker.docker_name, "ecs-web-2-app");
        assert_eq!(applied.observation.status, ContainerStatus::Created);
    }

    #[tokio::test]
    async fn start_assigns_host_ports() {
        let runtime = SimulatedRuntime::new(Duration::ZERO);
        let mut spec = ContainerSpec::new("app", "nginx");
        spec.port_mappings.push(PortBinding {
            container_port: 80,
            host_port: 0,
            bind_ip: String::new(),
            protocol: TransportProtocol::Tcp,
        });
        let task = task_with(spec);
        let applied = runtime
            .apply(&task, &task.containers[0], ContainerStatus::Running)
            .await
            .unwrap();
        let binding = &applied.observation.port_bindings[0];
        assert_eq!(binding.container_port, 80);
        assert!(binding.host_port >= 32768);
        assert_eq!(binding.bind_ip, "0.0.0.0");
    }

    #[tokio::test]
    async fn stop_reports_exit_code_only_after_start() {
        let runtime = SimulatedRuntime::new(Duration::ZERO);
        let task = task_with(ContainerSpec::new("app", "nginx"));
        let app = &task.containers[0];

        let applied = runtime.apply(&task, app, ContainerStatus::Stopped).await.unwrap();
        assert_eq!(applied.observation.exit_code, None);

        app.set_known_status(ContainerStatus::Running);
        let applied = runtime.apply(&task, app, ContainerStatus::Stopped).await.unwrap();
        assert_eq!(applied.observation.exit_code, Some(0));
    }
}
