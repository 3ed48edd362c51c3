//! Workflows: gateway calls combined with store updates and user-facing
//! outcomes.

pub mod auth;
mod outcome;
pub mod tasks;

pub use auth::{AuthSignal, AuthState, AuthWorkflow, PROFILE_STALE_AFTER};
pub use outcome::{Failure, Notice, Outcome, Route, WorkflowResult};
pub use tasks::TaskWorkflow;
