pub mod branch;
pub mod orchestrator;
pub mod pull_request;
pub mod types;

pub use orchestrator::WorkflowOrchestrator;
pub use types::{WorkflowRequest, WorkflowResult};
