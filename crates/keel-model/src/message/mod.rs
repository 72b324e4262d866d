mod backend;
pub use backend::{
    AckRequest, BackendMessage, ContainerPayload, EniPayload, ErrorMessage, HeartbeatMessage,
    PayloadMessage, TaskPayload,
};

mod state_change;
pub use state_change::{
    AttachmentStateChange, ContainerStateChange, StateChangeEvent, TaskStateChange,
};
