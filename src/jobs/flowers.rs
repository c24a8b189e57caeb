//! Flower preparation job.

use std::sync::Arc;

use log::info;

use crate::error::{FlowDefinitionError, StepExecutionError};
use crate::execution::action::StepListener;
use crate::execution::ExecutionContext;
use crate::workflow::builder::{FlowBuilder, JobBuilder};
use crate::workflow::model::{Flow, Job, Outcome, Step};
use crate::workflow::parameters::{ParameterSpec, ParameterType};
use crate::workflow::registry::ActionRegistry;

use super::delivery::say;

/// Routes an order through thorn removal when it contains roses.
///
/// Reads the `type` job parameter after the selection step and replaces
/// its outcome with `TRIM_REQUIRED` or `NO_TRIM_REQUIRED`. A failed
/// selection stays failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowerSelectionListener;

impl StepListener for FlowerSelectionListener {
    fn before_step(&self, _ctx: &mut ExecutionContext) -> Result<(), StepExecutionError> {
        info!("Starting flower selection");
        Ok(())
    }

    fn after_step(
        &self,
        ctx: &mut ExecutionContext,
        outcome: Outcome,
    ) -> Result<Outcome, StepExecutionError> {
        if outcome.is_failed() {
            return Ok(outcome);
        }

        let flower_type = ctx.parameter("type").unwrap_or_default();
        let label = if flower_type.eq_ignore_ascii_case("roses") {
            "TRIM_REQUIRED"
        } else {
            "NO_TRIM_REQUIRED"
        };
        Ok(Outcome::custom(label))
    }
}

/// Select, trim roses, arrange, then deliver.
pub fn prepare_flowers_job(delivery: Arc<Flow>) -> Result<Job, FlowDefinitionError> {
    let flow = FlowBuilder::new("prepareFlowersFlow")
        .start(
            Step::new("selectFlowerStep", say("Gathering flowers for order."))
                .with_listener(FlowerSelectionListener),
        )
        .add_node(Step::new("removeThornsStep", say("Remove thorns from roses.")))
        .add_node(Step::new("arrangeFlowerStep", say("Arranging flowers for order")))
        .add_node(delivery)
        .on("selectFlowerStep", "TRIM_REQUIRED")
        .to("removeThornsStep")
        .next("removeThornsStep", "arrangeFlowerStep")
        .on("selectFlowerStep", "NO_TRIM_REQUIRED")
        .to("arrangeFlowerStep")
        .on("arrangeFlowerStep", "*")
        .to("deliveryFlow")
        .build()?;

    JobBuilder::new("prepareFlowersJob")
        .flow(flow)
        .parameter(ParameterSpec::required("type", ParameterType::String))
        .build()
}

pub(super) fn register(actions: &mut ActionRegistry) {
    actions.register_action("selectFlower", say("Gathering flowers for order."));
    actions.register_action("removeThorns", say("Remove thorns from roses."));
    actions.register_action("arrangeFlower", say("Arranging flowers for order"));
    actions.register_listener("flowerSelection", FlowerSelectionListener);
}
