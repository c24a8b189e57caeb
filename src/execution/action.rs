//! Node Capabilities
//!
//! The three contracts a flow is assembled from:
//! - [`Action`]: the body of a step, may fail
//! - [`Decide`]: a total, read-only decision over the context
//! - [`StepListener`]: hooks around a step that may override its outcome
//!
//! Implementations are shared between runs and must not keep per-run
//! state; anything a run produces belongs in the [`ExecutionContext`].

use crate::error::StepExecutionError;
use crate::workflow::model::Outcome;

use super::context::ExecutionContext;

/// Body of a step.
pub trait Action: Send + Sync {
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<Outcome, StepExecutionError>;
}

impl<F> Action for F
where
    F: Fn(&mut ExecutionContext) -> Result<Outcome, StepExecutionError> + Send + Sync,
{
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<Outcome, StepExecutionError> {
        self(ctx)
    }
}

/// Branching logic of a decider.
///
/// Must always produce an outcome; an undecidable case is reported as a
/// custom label describing it.
pub trait Decide: Send + Sync {
    fn decide(&self, ctx: &ExecutionContext) -> Outcome;
}

impl<F> Decide for F
where
    F: Fn(&ExecutionContext) -> Outcome + Send + Sync,
{
    fn decide(&self, ctx: &ExecutionContext) -> Outcome {
        self(ctx)
    }
}

/// Observer around a step.
pub trait StepListener: Send + Sync {
    /// Runs before the action; an error skips the action and counts as
    /// a step failure.
    fn before_step(&self, _ctx: &mut ExecutionContext) -> Result<(), StepExecutionError> {
        Ok(())
    }

    /// Receives the raw outcome (`FAILED` if the action errored) and
    /// returns the one transitions are matched against.
    fn after_step(
        &self,
        _ctx: &mut ExecutionContext,
        outcome: Outcome,
    ) -> Result<Outcome, StepExecutionError> {
        Ok(outcome)
    }
}

/// Pins a closure to the [`Action`] signature so argument types are inferred.
pub fn action_fn<F>(f: F) -> F
where
    F: Fn(&mut ExecutionContext) -> Result<Outcome, StepExecutionError> + Send + Sync,
{
    f
}

/// Pins a closure to the [`Decide`] signature.
pub fn decider_fn<F>(f: F) -> F
where
    F: Fn(&ExecutionContext) -> Outcome + Send + Sync,
{
    f
}
