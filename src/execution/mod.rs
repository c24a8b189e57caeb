//! Flow Execution Module
//!
//! Runs jobs: walks flow graphs, threads the run context through every
//! node, and reports finished runs.
//!
//! # Architecture
//!
//! - [`action`]: Step, decider and listener contracts
//! - [`context`]: Run-scoped state
//! - [`engine`]: Flow walker and failure propagation
//! - [`launcher`]: Job lookup, parameter checks and run results
//! - [`history`]: Execution history sinks

pub mod action;
pub mod context;
pub mod engine;
pub mod history;
pub mod launcher;

pub use action::{Action, Decide, StepListener};
pub use context::{ExecutionContext, NodeVisit};
pub use engine::{Engine, FlowResult};
pub use history::{HistorySink, InMemoryHistory, JsonFileHistory, RunRecord};
pub use launcher::{JobLauncher, JobRunResult};
