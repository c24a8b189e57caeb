//! Error Types
//!
//! The error taxonomy of the engine. Definition errors abort job
//! registration, parameter errors abort a launch, and everything that
//! happens inside a run is reported through [`ErrorDetail`] on the run
//! result instead of the error channel.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure raised by an action body.
#[derive(Debug, Error)]
#[error("Step '{step}' failed: {message}")]
pub struct StepExecutionError {
    /// Name of the step (filled in by the engine when left empty)
    pub step: String,
    /// Human-readable cause
    pub message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl StepExecutionError {
    /// Creates an error with a plain message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            step: String::new(),
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying error as the cause.
    pub fn from_error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            step: String::new(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Attaches the failing step's name.
    pub fn in_step(mut self, step: impl Into<String>) -> Self {
        self.step = step.into();
        self
    }
}

impl From<std::io::Error> for StepExecutionError {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(err)
    }
}

/// Problems detected while building or loading a flow graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowDefinitionError {
    #[error("Flow has an empty name")]
    EmptyName,

    #[error("Flow '{0}' has no start node")]
    MissingStart(String),

    #[error("Flow '{flow}': start node '{node}' is not part of the flow")]
    UnknownStart { flow: String, node: String },

    #[error("Flow '{flow}': duplicate node name '{node}'")]
    DuplicateNode { flow: String, node: String },

    #[error("Flow '{flow}': node with empty name")]
    EmptyNodeName { flow: String },

    #[error("Flow '{flow}': transition from unknown node '{node}'")]
    UnknownSource { flow: String, node: String },

    #[error("Flow '{flow}': transition from '{from}' targets unknown node '{target}'")]
    UnknownTarget {
        flow: String,
        from: String,
        target: String,
    },

    #[error("Flow '{flow}': node '{from}' has more than one transition for pattern '{pattern}'")]
    DuplicateTransition {
        flow: String,
        from: String,
        pattern: String,
    },

    #[error("Flow '{flow}': transition from '{from}' has an empty pattern")]
    EmptyPattern { flow: String, from: String },

    #[error("Flow '{flow}': node '{node}' is unreachable from the start node")]
    UnreachableNode { flow: String, node: String },

    #[error("Job name is empty")]
    EmptyJobName,

    #[error("Job '{0}' has no root flow")]
    MissingFlow(String),

    #[error("Duplicate job name '{0}'")]
    DuplicateJob(String),

    #[error("Unknown {kind} '{name}'")]
    UnknownAction { kind: &'static str, name: String },

    #[error("Duplicate flow name '{0}'")]
    DuplicateFlow(String),

    #[error("Unknown flow '{0}'")]
    UnknownFlow(String),

    #[error("Unknown job '{0}'")]
    UnknownJob(String),

    #[error("'{0}' refers to itself through nested flows or jobs")]
    RecursiveDefinition(String),

    #[error("Transition from '{from}' on '{pattern}': {reason}")]
    InvalidTarget {
        from: String,
        pattern: String,
        reason: String,
    },

    #[error("Failed to parse definitions: {0}")]
    Parse(String),

    #[error("{}", join_errors(.0))]
    Multiple(Vec<FlowDefinitionError>),
}

fn join_errors(errors: &[FlowDefinitionError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A single violation of a job's parameter contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterProblem {
    Missing(String),
    Mistyped {
        name: String,
        expected: String,
        value: String,
    },
}

impl fmt::Display for ParameterProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "missing required parameter '{}'", name),
            Self::Mistyped {
                name,
                expected,
                value,
            } => write!(f, "parameter '{}' = '{}' is not a valid {}", name, value, expected),
        }
    }
}

fn join_problems(problems: &[ParameterProblem]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Launch-time violation of a job's parameter contract.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid parameters for job '{job}': {}", join_problems(.problems))]
pub struct InvalidParametersError {
    pub job: String,
    pub problems: Vec<ParameterProblem>,
}

/// A label reached a node that has no transition for it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Node '{node}' produced outcome '{label}' with no matching transition")]
pub struct UnhandledOutcomeError {
    pub node: String,
    pub label: String,
}

/// Errors returned by `JobLauncher::launch` before any node runs.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("No job registered under '{0}'")]
    UnknownJob(String),

    #[error(transparent)]
    InvalidParameters(#[from] InvalidParametersError),
}

/// Failures of an execution history sink.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Job name '{0}' cannot be used as a history directory")]
    InvalidJobName(String),
}

/// Category of a failure surfaced on a run result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    StepExecution,
    StepFailed,
    ListenerFailed,
    UnhandledOutcome,
    InvalidParameters,
    VisitLimitExceeded,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::StepExecution => "StepExecution",
            ErrorKind::StepFailed => "StepFailed",
            ErrorKind::ListenerFailed => "ListenerFailed",
            ErrorKind::UnhandledOutcome => "UnhandledOutcome",
            ErrorKind::InvalidParameters => "InvalidParameters",
            ErrorKind::VisitLimitExceeded => "VisitLimitExceeded",
        };
        write!(f, "{}", name)
    }
}

/// Serializable summary of why a run ended abnormally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub node: Option<String>,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, node: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            node,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{} at '{}': {}", self.kind, node, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl From<&StepExecutionError> for ErrorDetail {
    fn from(err: &StepExecutionError) -> Self {
        ErrorDetail::new(
            ErrorKind::StepExecution,
            Some(err.step.clone()),
            err.message.clone(),
        )
    }
}

impl From<&UnhandledOutcomeError> for ErrorDetail {
    fn from(err: &UnhandledOutcomeError) -> Self {
        ErrorDetail::new(
            ErrorKind::UnhandledOutcome,
            Some(err.node.clone()),
            err.to_string(),
        )
    }
}
