use keel_model::{ContainerStatus, StateChangeEvent, TaskStatus};
use tracing::{Level, debug, info, warn};

#[inline]
pub fn message_for(event: &StateChangeEvent) -> &'static str {
    match event {
        StateChangeEvent::Container(c) => match c.status {
            ContainerStatus::Running => "container reached its steady state",
            ContainerStatus::Stopped if c.reason.is_some() => "container stopped after an error",
            ContainerStatus::Stopped => "container stopped",
            _ => "container status changed",
        },
        StateChangeEvent::Task(t) => match t.status {
            TaskStatus::Running => "task running",
            TaskStatus::Stopped => "task stopped",
            _ => "task status changed",
        },
        StateChangeEvent::Attachment(_) => "network attachment attached",
    }
}

/// Level a state change is logged at.
#[inline]
pub fn level_for(event: &StateChangeEvent) -> Level {
    match event {
        StateChangeEvent::Container(c) => match c.status {
            ContainerStatus::Stopped if c.reason.is_some() => Level::WARN,
            ContainerStatus::Running | ContainerStatus::Stopped => Level::INFO,
            _ => Level::DEBUG,
        },
        StateChangeEvent::Task(t) if t.status.should_report_to_backend() => Level::INFO,
        StateChangeEvent::Task(_) => Level::DEBUG,
        StateChangeEvent::Attachment(_) => Level::DEBUG,
    }
}

/// Log an outbound state change with its structured fields.
pub fn log_state_change(event: &StateChangeEvent) {
    let msg = message_for(event);
    let level = level_for(event);

    match event {
        StateChangeEvent::Container(c) => {
            let exit_code = c.exit_code.unwrap_or_default();
            if level == Level::WARN {
                warn!(
                    task = %c.task_arn,
                    container = %c.container_name,
                    status = %c.status,
                    exit_code,
                    reason = c.reason.as_deref().unwrap_or_default(),
                    "{msg}"
                );
            } else if level == Level::INFO {
                info!(
                    task = %c.task_arn,
                    container = %c.container_name,
                    status = %c.status,
                    exit_code,
                    "{msg}"
                );
            } else {
                debug!(
                    task = %c.task_arn,
                    container = %c.container_name,
                    status = %c.status,
                    "{msg}"
                );
            }
        }
        StateChangeEvent::Task(t) if level == Level::INFO => {
            info!(task = %t.task_arn, status = %t.status, "{msg}")
        }
        StateChangeEvent::Task(t) => debug!(task = %t.task_arn, status = %t.status, "{msg}"),
        StateChangeEvent::Attachment(a) => debug!(
            task = %a.task_arn,
            attachment = %a.attachment_arn,
            mac = %a.mac_address,
            "{msg}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use keel_model::{
        AttachmentStateChange, AttachmentStatus, ContainerStateChange, TaskStateChange,
    };

    use super::*;

    fn container(status: ContainerStatus, reason: Option<&str>) -> StateChangeEvent {
        StateChangeEvent::Container(ContainerStateChange {
            task_arn: "arn:task/1".into(),
            container_name: "app".into(),
            status,
            known_status: status,
            exit_code: None,
            reason: reason.map(str::to_string),
            port_bindings: vec![],
        })
    }

    #[test]
    fn stop_with_reason_is_a_warning() {
        let event = container(ContainerStatus::Stopped, Some("CannotPullContainerError: denied"));
        assert_eq!(level_for(&event), Level::WARN);
        assert_eq!(message_for(&event), "container stopped after an error");
        log_state_change(&event);
    }

    #[test]
    fn steady_and_clean_stop_are_info() {
        assert_eq!(level_for(&container(ContainerStatus::Running, None)), Level::INFO);
        assert_eq!(level_for(&container(ContainerStatus::Stopped, None)), Level::INFO);
        assert_eq!(level_for(&container(ContainerStatus::None, None)), Level::DEBUG);
    }

    #[test]
    fn task_and_attachment_levels() {
        let task = |status| {
            StateChangeEvent::Task(TaskStateChange {
                task_arn: "arn:task/1".into(),
                status,
                reason: None,
            })
        };
        assert_eq!(level_for(&task(TaskStatus::Running)), Level::INFO);
        assert_eq!(level_for(&task(TaskStatus::Created)), Level::DEBUG);

        let attachment = StateChangeEvent::Attachment(AttachmentStateChange {
            task_arn: "arn:task/1".into(),
            attachment_arn: "arn:attachment/1".into(),
            mac_address: "0a:00:00:00:00:01".into(),
            status: AttachmentStatus::Attached,
        });
        assert_eq!(level_for(&attachment), Level::DEBUG);
        log_state_change(&attachment);
    }
}
