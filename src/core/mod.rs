pub mod credentials;
pub mod decision;
pub mod gateway;
pub mod task_locks;
pub mod task_state;

pub use decision::{DecisionAction, DecodedDecision};
pub use gateway::{AnalysisGateway, AnalysisStats, GatewayError, SubmitRequest, TaskRecord};
pub use task_state::TaskStatus;
