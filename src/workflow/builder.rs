//! Flow and Job Builders
//!
//! Explicit construction of immutable flow graphs. Nodes and transitions
//! are collected first and checked as a whole by [`FlowBuilder::build`],
//! so an invalid graph never becomes a [`Flow`].
//!
//! # Example
//!
//! ```
//! use flowbatch::execution::action::{action_fn, decider_fn};
//! use flowbatch::workflow::{Decider, FlowBuilder, Outcome, Step};
//!
//! let flow = FlowBuilder::new("deliveryFlow")
//!     .start(Step::new("drive", action_fn(|_ctx| Ok(Outcome::Completed))))
//!     .add_node(Decider::new("decider", decider_fn(|_ctx| Outcome::custom("PRESENT"))))
//!     .add_node(Step::new("give", action_fn(|_ctx| Ok(Outcome::Completed))))
//!     .on("drive", "FAILED").fail()
//!     .on("drive", "*").to("decider")
//!     .on("decider", "PRESENT").to("give")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(flow.start(), "drive");
//! ```

use std::sync::Arc;

use log::debug;

use crate::error::FlowDefinitionError;

use super::model::{Flow, Job, Node, Target, TerminalStatus, Transition, COMPLETED};
use super::parameters::ParameterSpec;
use super::validator::validate_flow;

/// Collects nodes and transitions for a flow.
#[derive(Debug, Clone)]
pub struct FlowBuilder {
    name: String,
    start: Option<String>,
    nodes: Vec<Node>,
    transitions: Vec<Transition>,
}

impl FlowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            start: None,
            nodes: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Adds `node` and makes it the start node.
    pub fn start(mut self, node: impl Into<Node>) -> Self {
        let node = node.into();
        self.start = Some(node.name().to_string());
        self.nodes.push(node);
        self
    }

    /// Marks an already added node as the start node.
    pub fn start_at(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into().trim().to_string());
        self
    }

    pub fn add_node(mut self, node: impl Into<Node>) -> Self {
        self.nodes.push(node.into());
        self
    }

    pub fn add_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Begins a transition from `from` taken when its outcome matches `pattern`.
    pub fn on(self, from: impl Into<String>, pattern: impl Into<String>) -> TransitionBuilder {
        TransitionBuilder {
            builder: self,
            from: from.into(),
            pattern: pattern.into(),
        }
    }

    /// Continues with `to` when `from` completes.
    ///
    /// Any other outcome of `from` stays unmatched and ends the flow.
    pub fn next(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.on(from, COMPLETED).to(to)
    }

    /// Validates the graph and freezes it into a [`Flow`].
    pub fn build(self) -> Result<Flow, FlowDefinitionError> {
        validate_flow(&self.name, self.start.as_deref(), &self.nodes, &self.transitions)?;

        // validate_flow rejects a missing start
        let start = self.start.unwrap_or_default();

        debug!(
            "Built flow '{}': {} nodes, {} transitions, start '{}'",
            self.name,
            self.nodes.len(),
            self.transitions.len(),
            start
        );

        Ok(Flow::from_parts(self.name, start, self.nodes, self.transitions))
    }
}

/// Second half of [`FlowBuilder::on`]: chooses the target.
#[derive(Debug, Clone)]
pub struct TransitionBuilder {
    builder: FlowBuilder,
    from: String,
    pattern: String,
}

impl TransitionBuilder {
    /// Continue with the named node.
    pub fn to(self, node: impl Into<String>) -> FlowBuilder {
        self.target(Target::Node(node.into()))
    }

    /// End the flow with `COMPLETED`.
    pub fn end(self) -> FlowBuilder {
        self.target(Target::Terminal(TerminalStatus::Completed))
    }

    /// End the flow with `FAILED`.
    pub fn fail(self) -> FlowBuilder {
        self.target(Target::Terminal(TerminalStatus::Failed))
    }

    /// End the flow with `STOPPED`.
    pub fn stop(self) -> FlowBuilder {
        self.target(Target::Terminal(TerminalStatus::Stopped))
    }

    /// End the flow with an arbitrary status label.
    pub fn end_with(self, label: impl AsRef<str>) -> FlowBuilder {
        self.target(Target::Terminal(TerminalStatus::from_label(label.as_ref())))
    }

    pub fn target(self, target: Target) -> FlowBuilder {
        let transition = Transition::new(self.from, self.pattern, target);
        self.builder.add_transition(transition)
    }
}

/// Builds a [`Job`] around a root flow.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    name: String,
    flow: Option<Arc<Flow>>,
    parameters: Vec<ParameterSpec>,
}

impl JobBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            flow: None,
            parameters: Vec::new(),
        }
    }

    pub fn flow(mut self, flow: impl Into<Arc<Flow>>) -> Self {
        self.flow = Some(flow.into());
        self
    }

    pub fn parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn build(self) -> Result<Job, FlowDefinitionError> {
        if self.name.is_empty() {
            return Err(FlowDefinitionError::EmptyJobName);
        }
        let flow = self
            .flow
            .ok_or_else(|| FlowDefinitionError::MissingFlow(self.name.clone()))?;

        Ok(Job::from_parts(self.name, flow, self.parameters))
    }
}
