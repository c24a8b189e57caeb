//! Flow Execution Engine
//!
//! Walks a flow graph from its start node:
//! - executes the current node (step, decider, nested flow or nested job)
//! - records the outcome in the context
//! - resolves the next transition from the outcome label
//! - stops at a terminal target or at an unmatched outcome
//!
//! Failures are converted into `FAILED` outcomes and become ordinary
//! branches whenever the flow has a transition for them. Only a failure
//! nothing consumes ends the run abnormally.
//!
//! The engine keeps no state between calls; one instance can drive any
//! number of concurrent runs, each with its own [`ExecutionContext`].

use log::{debug, error, info, warn};

use crate::error::{ErrorDetail, ErrorKind, StepExecutionError, UnhandledOutcomeError};
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::workflow::model::{Flow, Job, Node, Outcome, Step, Target, TerminalStatus};
use crate::workflow::parameters::validate_parameters;

use super::context::ExecutionContext;

/// Default cap on node executions per run.
pub const DEFAULT_MAX_NODE_VISITS: usize = 1000;

/// Terminal result of walking one flow.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowResult {
    pub status: TerminalStatus,
    pub error: Option<ErrorDetail>,
}

impl FlowResult {
    fn new(status: TerminalStatus, error: Option<ErrorDetail>) -> Self {
        Self { status, error }
    }
}

/// Outcome of one node plus the failure behind it, if any.
struct NodeExecution {
    outcome: Outcome,
    failure: Option<ErrorDetail>,
    stopped: bool,
    /// The visit cap tripped somewhere below this node
    limit_exceeded: bool,
}

impl NodeExecution {
    fn outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            failure: None,
            stopped: false,
            limit_exceeded: false,
        }
    }

    fn failed(failure: ErrorDetail) -> Self {
        Self {
            outcome: Outcome::Failed,
            failure: Some(failure),
            stopped: false,
            limit_exceeded: false,
        }
    }

    fn nested(result: FlowResult) -> Self {
        Self {
            outcome: result.status.to_outcome(),
            stopped: result.status == TerminalStatus::Stopped,
            limit_exceeded: result
                .error
                .as_ref()
                .is_some_and(|e| e.kind == ErrorKind::VisitLimitExceeded),
            failure: result.error,
        }
    }
}

/// Per-run bookkeeping that is not part of the user-visible context.
struct RunState<'a> {
    visits: usize,
    timeline: &'a mut ExecutionTimeline,
}

/// Flow execution engine.
///
/// # Example
///
/// ```
/// use flowbatch::execution::action::action_fn;
/// use flowbatch::execution::{Engine, ExecutionContext};
/// use flowbatch::monitoring::ExecutionTimeline;
/// use flowbatch::workflow::{FlowBuilder, Outcome, Step, TerminalStatus};
///
/// let flow = FlowBuilder::new("flow")
///     .start(Step::new("only", action_fn(|_ctx| Ok(Outcome::Completed))))
///     .build()
///     .unwrap();
///
/// let engine = Engine::new();
/// let mut ctx = ExecutionContext::default();
/// let mut timeline = ExecutionTimeline::new();
/// let result = engine.execute_flow(&flow, &mut ctx, &mut timeline);
///
/// assert_eq!(result.status, TerminalStatus::Completed);
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    max_node_visits: Option<usize>,
}

impl Engine {
    /// Creates an engine with the default visit cap.
    pub fn new() -> Self {
        Self {
            max_node_visits: Some(DEFAULT_MAX_NODE_VISITS),
        }
    }

    /// Sets the maximum number of node executions per run.
    ///
    /// `None` removes the cap; cyclic flows then run until they leave
    /// the cycle on their own.
    pub fn set_max_node_visits(&mut self, max: Option<usize>) {
        self.max_node_visits = max;
    }

    pub fn max_node_visits(&self) -> Option<usize> {
        self.max_node_visits
    }

    /// Runs a job's root flow.
    ///
    /// Parameter validation is the launcher's job; this only walks.
    pub fn execute_job(
        &self,
        job: &Job,
        ctx: &mut ExecutionContext,
        timeline: &mut ExecutionTimeline,
    ) -> FlowResult {
        self.execute_flow(job.flow(), ctx, timeline)
    }

    /// Walks `flow` to a terminal status.
    pub fn execute_flow(
        &self,
        flow: &Flow,
        ctx: &mut ExecutionContext,
        timeline: &mut ExecutionTimeline,
    ) -> FlowResult {
        let mut run = RunState {
            visits: 0,
            timeline,
        };
        self.walk(flow, ctx, &mut run)
    }

    fn walk(&self, flow: &Flow, ctx: &mut ExecutionContext, run: &mut RunState<'_>) -> FlowResult {
        debug!("Entering flow '{}' at '{}'", flow.name(), flow.start());

        let mut current = flow.start().to_string();

        loop {
            let Some(node) = flow.node(&current) else {
                // Builders reject unknown targets, so this only guards hand-made graphs
                error!("Flow '{}' has no node '{}'", flow.name(), current);
                return FlowResult::new(
                    TerminalStatus::Failed,
                    Some(ErrorDetail::new(
                        ErrorKind::StepFailed,
                        Some(current),
                        format!("unknown node in flow '{}'", flow.name()),
                    )),
                );
            };

            run.visits += 1;
            if let Some(limit) = self.max_node_visits {
                if run.visits > limit {
                    warn!(
                        "Node visit limit of {} reached at '{}' in flow '{}'",
                        limit,
                        node.name(),
                        flow.name()
                    );
                    return FlowResult::new(
                        TerminalStatus::Failed,
                        Some(ErrorDetail::new(
                            ErrorKind::VisitLimitExceeded,
                            Some(node.name().to_string()),
                            format!("more than {} node executions in one run", limit),
                        )),
                    );
                }
            }

            run.timeline.add_event(node.name(), EventType::Started);
            let execution = self.execute_node(node, ctx, run);
            run.timeline
                .add_event(node.name(), EventType::Finished(execution.outcome.clone()));

            ctx.record(node.name(), node.kind(), &execution.outcome);

            if execution.stopped {
                info!(
                    "'{}' stopped; stopping flow '{}'",
                    node.name(),
                    flow.name()
                );
                return FlowResult::new(TerminalStatus::Stopped, None);
            }

            // Enclosing transitions must not absorb the cap
            if execution.limit_exceeded {
                return FlowResult::new(TerminalStatus::Failed, execution.failure);
            }

            let label = execution.outcome.label();
            let Some(transition) = flow.resolve(node.name(), label) else {
                return self.terminate_unmatched(flow, node, execution);
            };

            match &transition.target {
                Target::Node(next) => {
                    debug!("'{}' --{}--> '{}'", node.name(), label, next);
                    current = next.clone();
                }
                Target::Terminal(status) => {
                    info!(
                        "Flow '{}' ends with {} after '{}' ({})",
                        flow.name(),
                        status,
                        node.name(),
                        label
                    );
                    let error = match status {
                        TerminalStatus::Failed => Some(execution.failure.unwrap_or_else(|| {
                            ErrorDetail::new(
                                ErrorKind::StepFailed,
                                Some(node.name().to_string()),
                                format!(
                                    "flow '{}' failed on outcome '{}'",
                                    flow.name(),
                                    label
                                ),
                            )
                        })),
                        _ => None,
                    };
                    return FlowResult::new(status.clone(), error);
                }
            }
        }
    }

    /// Ends a flow whose current outcome has no transition.
    ///
    /// `COMPLETED` ends normally, `FAILED` ends as a failure, and any
    /// other label ends with that label as an unhandled outcome.
    fn terminate_unmatched(&self, flow: &Flow, node: &Node, execution: NodeExecution) -> FlowResult {
        let status = TerminalStatus::from(&execution.outcome);

        match &execution.outcome {
            Outcome::Completed => {
                info!("Flow '{}' completed after '{}'", flow.name(), node.name());
                FlowResult::new(status, None)
            }
            Outcome::Failed => {
                warn!(
                    "Flow '{}' failed: '{}' returned FAILED with no transition for it",
                    flow.name(),
                    node.name()
                );
                let error = execution.failure.unwrap_or_else(|| {
                    ErrorDetail::new(
                        ErrorKind::StepFailed,
                        Some(node.name().to_string()),
                        format!("'{}' returned FAILED", node.name()),
                    )
                });
                FlowResult::new(status, Some(error))
            }
            Outcome::Custom(label) => {
                let unhandled = UnhandledOutcomeError {
                    node: node.name().to_string(),
                    label: label.clone(),
                };
                warn!("Flow '{}': {}", flow.name(), unhandled);
                let error = execution
                    .failure
                    .unwrap_or_else(|| ErrorDetail::from(&unhandled));
                FlowResult::new(status, Some(error))
            }
        }
    }

    fn execute_node(
        &self,
        node: &Node,
        ctx: &mut ExecutionContext,
        run: &mut RunState<'_>,
    ) -> NodeExecution {
        match node {
            Node::Step(step) => self.execute_step(step, ctx),
            Node::Decider(decider) => {
                let outcome = decider.decider().decide(ctx);
                info!("Decider '{}' decided {}", decider.name(), outcome);
                NodeExecution::outcome(outcome)
            }
            Node::Flow(flow) => {
                info!("Entering nested flow '{}'", flow.name());
                let result = self.walk(flow, ctx, run);
                NodeExecution::nested(result)
            }
            Node::Job(job_step) => {
                let job = job_step.job();
                info!("Running nested job '{}' as '{}'", job.name(), job_step.name());

                if let Err(err) = validate_parameters(job.name(), job.parameters(), &ctx.job_parameters) {
                    error!("Nested job '{}' rejected: {}", job.name(), err);
                    return NodeExecution::failed(ErrorDetail::new(
                        ErrorKind::InvalidParameters,
                        Some(job_step.name().to_string()),
                        err.to_string(),
                    ));
                }

                let result = self.walk(job.flow(), ctx, run);
                NodeExecution::nested(result)
            }
        }
    }

    /// Runs listener hooks and the action of one step.
    fn execute_step(&self, step: &Step, ctx: &mut ExecutionContext) -> NodeExecution {
        info!("Executing step '{}'", step.name());

        let mut failure = None;

        let before = match step.listener() {
            Some(listener) => listener.before_step(ctx),
            None => Ok(()),
        };

        let raw = match before {
            Err(err) => {
                let err = name_error(err, step.name());
                error!("Listener before '{}' failed: {}", step.name(), err);
                failure = Some(ErrorDetail::new(
                    ErrorKind::ListenerFailed,
                    Some(step.name().to_string()),
                    err.message,
                ));
                Outcome::Failed
            }
            Ok(()) => match step.action().execute(ctx) {
                Ok(outcome) => outcome,
                Err(err) => {
                    let err = name_error(err, step.name());
                    error!("{}", err);
                    failure = Some(ErrorDetail::from(&err));
                    Outcome::Failed
                }
            },
        };

        let outcome = match step.listener() {
            None => raw,
            Some(listener) => match listener.after_step(ctx, raw.clone()) {
                Ok(outcome) => {
                    if outcome != raw {
                        info!(
                            "Listener on '{}' changed outcome {} -> {}",
                            step.name(),
                            raw,
                            outcome
                        );
                    }
                    outcome
                }
                Err(err) => {
                    let err = name_error(err, step.name());
                    error!("Listener after '{}' failed: {}", step.name(), err);
                    failure = Some(ErrorDetail::new(
                        ErrorKind::ListenerFailed,
                        Some(step.name().to_string()),
                        err.message,
                    ));
                    Outcome::Failed
                }
            },
        };

        // A listener that turns a failure into success clears it
        if !outcome.is_failed() {
            failure = None;
        }

        NodeExecution {
            outcome,
            failure,
            stopped: false,
            limit_exceeded: false,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn name_error(err: StepExecutionError, step: &str) -> StepExecutionError {
    if err.step.is_empty() {
        err.in_step(step)
    } else {
        err
    }
}
