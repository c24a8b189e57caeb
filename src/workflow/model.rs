//! Flow Data Model
//!
//! Core data structures of a flow graph: outcomes, terminal statuses,
//! transitions, the four node kinds, and the immutable [`Flow`] and
//! [`Job`] definitions built from them.
//!
//! Definitions are constructed once (see [`crate::workflow::builder`])
//! and shared read-only between runs; nothing here carries run state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::execution::action::{Action, Decide, StepListener};
use crate::workflow::parameters::ParameterSpec;
use crate::workflow::pattern;

/// Label of the built-in successful outcome.
pub const COMPLETED: &str = "COMPLETED";

/// Label of the built-in failed outcome.
pub const FAILED: &str = "FAILED";

/// Label of the stopped terminal status.
pub const STOPPED: &str = "STOPPED";

/// Symbolic result of executing a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    Completed,
    Failed,
    /// Application-defined label such as `PRESENT` or `TRIM_REQUIRED`
    Custom(String),
}

impl Outcome {
    /// Creates a custom outcome.
    ///
    /// The reserved labels `COMPLETED` and `FAILED` map back to the
    /// built-in variants so that labels compare consistently.
    pub fn custom(label: impl Into<String>) -> Self {
        Self::from_label(&label.into())
    }

    /// Parses a label into an outcome.
    pub fn from_label(label: &str) -> Self {
        match label {
            COMPLETED => Outcome::Completed,
            FAILED => Outcome::Failed,
            other => Outcome::Custom(other.to_string()),
        }
    }

    /// The label transitions are matched against.
    pub fn label(&self) -> &str {
        match self {
            Outcome::Completed => COMPLETED,
            Outcome::Failed => FAILED,
            Outcome::Custom(label) => label,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<String> for Outcome {
    fn from(label: String) -> Self {
        Outcome::from_label(&label)
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.label().to_string()
    }
}

/// Final status of a flow or job run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TerminalStatus {
    Completed,
    Failed,
    Stopped,
    Custom(String),
}

impl TerminalStatus {
    pub fn from_label(label: &str) -> Self {
        match label {
            COMPLETED => TerminalStatus::Completed,
            FAILED => TerminalStatus::Failed,
            STOPPED => TerminalStatus::Stopped,
            other => TerminalStatus::Custom(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TerminalStatus::Completed => COMPLETED,
            TerminalStatus::Failed => FAILED,
            TerminalStatus::Stopped => STOPPED,
            TerminalStatus::Custom(label) => label,
        }
    }

    /// The outcome a nested flow or job reports to its enclosing flow.
    pub fn to_outcome(&self) -> Outcome {
        Outcome::from_label(self.label())
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TerminalStatus::Completed)
    }
}

impl From<&Outcome> for TerminalStatus {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Completed => TerminalStatus::Completed,
            Outcome::Failed => TerminalStatus::Failed,
            Outcome::Custom(label) => TerminalStatus::Custom(label.clone()),
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<String> for TerminalStatus {
    fn from(label: String) -> Self {
        TerminalStatus::from_label(&label)
    }
}

impl From<TerminalStatus> for String {
    fn from(status: TerminalStatus) -> Self {
        status.label().to_string()
    }
}

/// Where a transition leads.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Continue with the named node of the same flow
    Node(String),
    /// End the flow with this status
    Terminal(TerminalStatus),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Node(name) => write!(f, "{}", name),
            Target::Terminal(status) => write!(f, "<{}>", status),
        }
    }
}

/// A rule mapping `(from, pattern)` to a target.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: String,
    pub pattern: String,
    pub target: Target,
}

impl Transition {
    pub fn new(from: impl Into<String>, pattern: impl Into<String>, target: Target) -> Self {
        Self {
            from: from.into(),
            pattern: pattern.into(),
            target,
        }
    }
}

/// Kind of a node, recorded alongside each visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Step,
    Decider,
    Flow,
    Job,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Step => "step",
            NodeKind::Decider => "decider",
            NodeKind::Flow => "flow",
            NodeKind::Job => "job",
        };
        write!(f, "{}", name)
    }
}

/// A named unit of work.
#[derive(Clone)]
pub struct Step {
    name: String,
    action: Arc<dyn Action>,
    listener: Option<Arc<dyn StepListener>>,
}

impl Step {
    /// Creates a step running `action`.
    ///
    /// # Example
    ///
    /// ```
    /// use flowbatch::execution::action::action_fn;
    /// use flowbatch::workflow::{Outcome, Step};
    ///
    /// let step = Step::new("packageItemStep", action_fn(|_ctx| Ok(Outcome::Completed)));
    /// assert_eq!(step.name(), "packageItemStep");
    /// ```
    pub fn new(name: impl Into<String>, action: impl Action + 'static) -> Self {
        Self::from_arc(name, Arc::new(action))
    }

    /// Creates a step around an already shared action.
    pub fn from_arc(name: impl Into<String>, action: Arc<dyn Action>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            action,
            listener: None,
        }
    }

    /// Attaches a listener.
    pub fn with_listener(mut self, listener: impl StepListener + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn with_listener_arc(mut self, listener: Arc<dyn StepListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &dyn Action {
        self.action.as_ref()
    }

    pub fn listener(&self) -> Option<&dyn StepListener> {
        self.listener.as_deref()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// A branching pseudo-step deriving an outcome from the context.
#[derive(Clone)]
pub struct Decider {
    name: String,
    decider: Arc<dyn Decide>,
}

impl Decider {
    pub fn new(name: impl Into<String>, decider: impl Decide + 'static) -> Self {
        Self::from_arc(name, Arc::new(decider))
    }

    pub fn from_arc(name: impl Into<String>, decider: Arc<dyn Decide>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            decider,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decider(&self) -> &dyn Decide {
        self.decider.as_ref()
    }
}

impl fmt::Debug for Decider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decider").field("name", &self.name).finish()
    }
}

/// A whole job embedded as a node of another flow.
#[derive(Debug, Clone)]
pub struct JobStep {
    name: String,
    job: Arc<Job>,
}

impl JobStep {
    pub fn new(name: impl Into<String>, job: Arc<Job>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            job,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job(&self) -> &Job {
        &self.job
    }
}

/// Any executable element of a flow graph.
#[derive(Debug, Clone)]
pub enum Node {
    Step(Step),
    Decider(Decider),
    /// Nested flow, addressed by the flow's own name
    Flow(Arc<Flow>),
    Job(JobStep),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Step(step) => step.name(),
            Node::Decider(decider) => decider.name(),
            Node::Flow(flow) => flow.name(),
            Node::Job(job_step) => job_step.name(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Step(_) => NodeKind::Step,
            Node::Decider(_) => NodeKind::Decider,
            Node::Flow(_) => NodeKind::Flow,
            Node::Job(_) => NodeKind::Job,
        }
    }
}

impl From<Step> for Node {
    fn from(step: Step) -> Self {
        Node::Step(step)
    }
}

impl From<Decider> for Node {
    fn from(decider: Decider) -> Self {
        Node::Decider(decider)
    }
}

impl From<Arc<Flow>> for Node {
    fn from(flow: Arc<Flow>) -> Self {
        Node::Flow(flow)
    }
}

impl From<JobStep> for Node {
    fn from(job_step: JobStep) -> Self {
        Node::Job(job_step)
    }
}

/// A validated, immutable flow graph.
///
/// Only [`crate::workflow::builder::FlowBuilder::build`] creates flows,
/// so every instance satisfies the definition-time invariants.
#[derive(Debug, Clone)]
pub struct Flow {
    name: String,
    start: String,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    transitions: Vec<Transition>,
}

impl Flow {
    pub(crate) fn from_parts(
        name: String,
        start: String,
        nodes: Vec<Node>,
        transitions: Vec<Transition>,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name().to_string(), i))
            .collect();

        Self {
            name,
            start,
            nodes,
            index,
            transitions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the node every walk begins with.
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All transitions in registration order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Transitions leaving `node`, in registration order.
    pub fn transitions_from<'a, 'b>(
        &'a self,
        node: &'b str,
    ) -> impl Iterator<Item = &'a Transition> + 'b
    where
        'a: 'b,
    {
        self.transitions.iter().filter(move |t| t.from == node)
    }

    /// Selects the transition for `label` produced by `node`.
    ///
    /// Exact labels win over wildcard patterns; among wildcard patterns
    /// the most specific one wins, so `"*"` is always the last resort.
    /// Returns `None` when nothing matches.
    pub fn resolve(&self, node: &str, label: &str) -> Option<&Transition> {
        pattern::select(self.transitions_from(node), label)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A named, launchable root flow plus its parameter contract.
#[derive(Debug, Clone)]
pub struct Job {
    name: String,
    flow: Arc<Flow>,
    parameters: Vec<ParameterSpec>,
}

impl Job {
    pub(crate) fn from_parts(name: String, flow: Arc<Flow>, parameters: Vec<ParameterSpec>) -> Self {
        Self {
            name,
            flow,
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::action::{action_fn, decider_fn};
    use crate::workflow::builder::FlowBuilder;

    fn noop(name: &str) -> Step {
        Step::new(name, action_fn(|_ctx| Ok(Outcome::Completed)))
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Completed.label(), "COMPLETED");
        assert_eq!(Outcome::Failed.label(), "FAILED");
        assert_eq!(Outcome::custom("PRESENT").label(), "PRESENT");
    }

    #[test]
    fn test_custom_reserved_labels_map_to_builtins() {
        assert_eq!(Outcome::custom("COMPLETED"), Outcome::Completed);
        assert_eq!(Outcome::custom("FAILED"), Outcome::Failed);
        assert!(Outcome::custom("FAILED").is_failed());
    }

    #[test]
    fn test_outcome_serializes_as_label() {
        let json = serde_json::to_string(&Outcome::custom("TRIM_REQUIRED")).unwrap();
        assert_eq!(json, "\"TRIM_REQUIRED\"");

        let back: Outcome = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(back, Outcome::Completed);
    }

    #[test]
    fn test_terminal_status_from_outcome() {
        assert_eq!(TerminalStatus::from(&Outcome::Completed), TerminalStatus::Completed);
        assert_eq!(TerminalStatus::from(&Outcome::Failed), TerminalStatus::Failed);
        assert_eq!(
            TerminalStatus::from(&Outcome::custom("MAYBE")),
            TerminalStatus::Custom("MAYBE".to_string())
        );
    }

    #[test]
    fn test_terminal_status_to_outcome() {
        assert_eq!(TerminalStatus::Completed.to_outcome(), Outcome::Completed);
        assert_eq!(TerminalStatus::Failed.to_outcome(), Outcome::Failed);
        assert_eq!(TerminalStatus::Stopped.to_outcome(), Outcome::custom("STOPPED"));
        assert_eq!(TerminalStatus::from_label("STOPPED"), TerminalStatus::Stopped);
    }

    #[test]
    fn test_node_names_and_kinds() {
        let step: Node = noop(" drive ").into();
        assert_eq!(step.name(), "drive");
        assert_eq!(step.kind(), NodeKind::Step);

        let decider: Node = Decider::new("decider", decider_fn(|_ctx| Outcome::custom("PRESENT"))).into();
        assert_eq!(decider.kind(), NodeKind::Decider);

        let flow = Arc::new(FlowBuilder::new("inner").start(noop("a")).build().unwrap());
        let nested: Node = flow.into();
        assert_eq!(nested.name(), "inner");
        assert_eq!(nested.kind(), NodeKind::Flow);
    }

    #[test]
    fn test_flow_lookup() {
        let flow = FlowBuilder::new("flow")
            .start(noop("a"))
            .add_node(noop("b"))
            .next("a", "b")
            .build()
            .unwrap();

        assert_eq!(flow.start(), "a");
        assert_eq!(flow.len(), 2);
        assert!(flow.node("b").is_some());
        assert!(flow.node("c").is_none());
        assert_eq!(flow.transitions_from("a").count(), 1);
        assert_eq!(flow.transitions_from("b").count(), 0);
    }

    #[test]
    fn test_flow_resolve_prefers_exact_over_wildcard() {
        let flow = FlowBuilder::new("flow")
            .start(noop("a"))
            .add_node(noop("b"))
            .add_node(noop("c"))
            .on("a", "*")
            .to("b")
            .on("a", "COMPLETED")
            .to("c")
            .build()
            .unwrap();

        let chosen = flow.resolve("a", "COMPLETED").unwrap();
        assert_eq!(chosen.target, Target::Node("c".to_string()));

        let fallback = flow.resolve("a", "ANYTHING").unwrap();
        assert_eq!(fallback.target, Target::Node("b".to_string()));
    }

    #[test]
    fn test_flow_resolve_outlives_node_name() {
        let flow = FlowBuilder::new("flow")
            .start(noop("a"))
            .on("a", "*")
            .end()
            .build()
            .unwrap();

        let chosen = {
            let node = String::from("a");
            flow.resolve(&node, "DONE")
        };
        assert_eq!(chosen.map(|t| t.pattern.as_str()), Some("*"));
    }

    #[test]
    fn test_flow_resolve_no_match() {
        let flow = FlowBuilder::new("flow")
            .start(noop("a"))
            .on("a", "FAILED")
            .fail()
            .build()
            .unwrap();

        assert!(flow.resolve("a", "COMPLETED").is_none());
    }

    #[test]
    fn test_step_debug_hides_action() {
        let step = noop("debuggable");
        let text = format!("{:?}", step);
        assert!(text.contains("debuggable"));
    }
}
