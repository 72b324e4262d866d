pub mod error;
pub use error::CoreError;

mod state;
pub use state::TaskEngineState;

pub mod aggregate;
pub use aggregate::{Aggregation, ContainerObservation, TaskAggregator};

pub mod report;
pub use report::{
    BackendReportFilter, ChannelSink, ReportTicket, StateChangeSink, is_stop_reported,
};

pub mod engine;
pub use engine::{plan_next_action, plan_task_actions, record_applied, record_transition};

mod payload;
pub use payload::{
    PAUSE_CONTAINER_IMAGE, PAUSE_CONTAINER_NAME, PayloadOutcome, apply_payload, register_task,
    set_desired_status,
};

pub mod eni;
pub use eni::{EniStateManager, EniStateManagerConfig, mark_resources_provisioned};
