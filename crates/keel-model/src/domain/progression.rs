use crate::ContainerStatus;

/// Returns the single next known status on the way to `steady_state`.
///
/// Walks `None -> Pulled -> Created -> Running [-> ResourcesProvisioned] -> Stopped`
/// one step at a time. Once the steady state (or `Stopped`) has been reached the only
/// remaining step is `Stopped`.
pub fn next_known_state_progression(
    current: ContainerStatus,
    steady_state: ContainerStatus,
) -> ContainerStatus {
    debug_assert!(
        current != ContainerStatus::Zombie,
        "zombie is a comparison bound, not a container status"
    );
    debug_assert!(
        steady_state.is_running(),
        "steady state must be RUNNING or RESOURCES_PROVISIONED, got {steady_state}"
    );

    if current >= steady_state {
        return ContainerStatus::Stopped;
    }
    match current {
        ContainerStatus::None => ContainerStatus::Pulled,
        ContainerStatus::Pulled => ContainerStatus::Created,
        ContainerStatus::Created => ContainerStatus::Running,
        ContainerStatus::Running => ContainerStatus::ResourcesProvisioned,
        ContainerStatus::ResourcesProvisioned
        | ContainerStatus::Stopped
        | ContainerStatus::Zombie => ContainerStatus::Stopped,
    }
}
