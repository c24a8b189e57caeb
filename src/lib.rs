//! FlowBatch - Batch Flow Execution Engine
//!
//! Runs batch jobs described as flow graphs of steps, deciders, nested
//! flows and nested jobs. Every node produces an outcome label, and the
//! next node is chosen by matching that label against the transitions
//! of the node, so failures can be handled as ordinary branches.
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`workflow`]: Flow graph model, builders, validation and definition files
//! - [`execution`]: Flow walker, job launcher and execution history
//! - [`monitoring`]: Node timings of a run
//! - [`jobs`]: Sample delivery, billing and flower jobs
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use flowbatch::jobs::{self, FixedClock, JobsConfig};
//! use flowbatch::JobLauncher;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JobsConfig::default().with_clock(FixedClock(9));
//!     let launcher = JobLauncher::new(jobs::registry(&config)?);
//!
//!     let mut parameters = HashMap::new();
//!     parameters.insert("item".to_string(), "shoes".to_string());
//!     parameters.insert("run.date".to_string(), "2024-05-01".to_string());
//!
//!     let run = launcher.launch("deliverPackageJob", parameters)?;
//!     assert!(run.is_success());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod jobs;
pub mod monitoring;
pub mod workflow;

// Re-export commonly used types
pub use error::{ErrorDetail, ErrorKind, FlowDefinitionError, LaunchError, StepExecutionError};
pub use execution::engine::Engine;
pub use execution::launcher::{JobLauncher, JobRunResult};
pub use workflow::model::{Flow, Job, Outcome, Step, TerminalStatus};
pub use workflow::parser::load_definitions;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "FlowBatch";
