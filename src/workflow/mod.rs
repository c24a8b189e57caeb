//! Flow Definition Module
//!
//! Provides data structures and utilities for defining, validating and
//! loading flow graphs and jobs.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Outcome, Node, Flow, Job)
//! - [`builder`]: Fluent construction of flows and jobs
//! - [`validator`]: Definition-time graph checks
//! - [`pattern`]: Outcome label pattern matching
//! - [`parameters`]: Launch parameter contracts
//! - [`registry`]: Named actions and launchable jobs
//! - [`parser`]: YAML definition files

pub mod builder;
pub mod model;
pub mod parameters;
pub mod parser;
pub mod pattern;
pub mod registry;
pub mod validator;

pub use builder::{FlowBuilder, JobBuilder, TransitionBuilder};
pub use model::{
    Decider, Flow, Job, JobStep, Node, NodeKind, Outcome, Step, Target, TerminalStatus, Transition,
};
pub use parameters::{ParameterSpec, ParameterType};
pub use parser::{load_definitions, parse_definitions};
pub use registry::{ActionRegistry, JobRegistry};
