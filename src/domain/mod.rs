//! Domain models

pub mod workflow;

pub use workflow::{LogLine, RunStatus, Stage, StageStatus, WorkflowKind, WorkflowRun};
