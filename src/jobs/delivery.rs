//! Delivery and billing jobs.

use std::sync::Arc;

use log::info;

use crate::error::{FlowDefinitionError, StepExecutionError};
use crate::execution::action::{action_fn, Action, Decide};
use crate::execution::ExecutionContext;
use crate::workflow::builder::{FlowBuilder, JobBuilder};
use crate::workflow::model::{Decider, Flow, Job, JobStep, Outcome, Step};
use crate::workflow::parameters::{ParameterSpec, ParameterType};
use crate::workflow::registry::ActionRegistry;

use super::{Clock, JobsConfig};

/// Deliveries before this hour find the customer at home.
pub const DELIVERY_CUTOFF_HOUR: u32 = 12;

/// Shared-data key overriding the delivery hour.
pub const DELIVERY_HOUR_KEY: &str = "delivery.hour";

/// Shared-data key holding the receipt check.
pub const RECEIPT_CORRECT_KEY: &str = "receipt.correct";

/// Action that only logs a message.
pub(crate) fn say(message: &'static str) -> impl Action {
    action_fn(move |_ctx| {
        info!("{}", message);
        Ok(Outcome::Completed)
    })
}

fn package_item() -> impl Action {
    action_fn(|ctx| {
        let item = ctx
            .parameter("item")
            .ok_or_else(|| StepExecutionError::new("missing job parameter 'item'"))?;
        let date = ctx
            .parameter("run.date")
            .ok_or_else(|| StepExecutionError::new("missing job parameter 'run.date'"))?;

        info!("The {} has been packaged on {}.", item, date);
        Ok(Outcome::Completed)
    })
}

fn give_package_to_customer() -> impl Action {
    action_fn(|ctx| {
        let correct = !matches!(ctx.parameter("receipt"), Some(r) if r.eq_ignore_ascii_case("incorrect"));
        ctx.put(RECEIPT_CORRECT_KEY, correct);

        info!("Given the package to the customer.");
        Ok(Outcome::Completed)
    })
}

/// Drives to the customer's address.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriveToAddress {
    pub got_lost: bool,
}

impl Action for DriveToAddress {
    fn execute(&self, _ctx: &mut ExecutionContext) -> Result<Outcome, StepExecutionError> {
        if self.got_lost {
            return Err(StepExecutionError::new("Got lost driving to the address"));
        }
        info!("Successfully arrived at the address.");
        Ok(Outcome::Completed)
    }
}

/// Decides whether the customer is home: `PRESENT` before the cutoff
/// hour, `NOT_PRESENT` from then on.
pub struct DeliveryDecider {
    cutoff_hour: u32,
    clock: Arc<dyn Clock>,
}

impl DeliveryDecider {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            cutoff_hour: DELIVERY_CUTOFF_HOUR,
            clock,
        }
    }
}

impl Decide for DeliveryDecider {
    fn decide(&self, ctx: &ExecutionContext) -> Outcome {
        let hour = ctx
            .get_u64(DELIVERY_HOUR_KEY)
            .map(|h| h.min(u64::from(u32::MAX)) as u32)
            .unwrap_or_else(|| self.clock.hour());

        let label = if hour < self.cutoff_hour {
            "PRESENT"
        } else {
            "NOT_PRESENT"
        };
        info!("Decider result is {} (hour {})", label, hour);
        Outcome::custom(label)
    }
}

/// Checks the receipt handed over with the package.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiptDecider;

impl Decide for ReceiptDecider {
    fn decide(&self, ctx: &ExecutionContext) -> Outcome {
        let label = match ctx.get_bool(RECEIPT_CORRECT_KEY) {
            Some(true) => "CORRECT",
            Some(false) => "INCORRECT",
            None => "UNVERIFIED",
        };
        info!("Receipt decider result is {}", label);
        Outcome::custom(label)
    }
}

fn delivery_builder(config: &JobsConfig) -> FlowBuilder {
    FlowBuilder::new("deliveryFlow")
        .start(Step::new(
            "driveToAddressStep",
            DriveToAddress {
                got_lost: config.got_lost,
            },
        ))
        .add_node(Decider::new("decider", DeliveryDecider::new(Arc::clone(&config.clock))))
        .add_node(Step::new("givePackageToCustomer", give_package_to_customer()))
        .add_node(Decider::new("receiptDecider", ReceiptDecider))
        .add_node(Step::new("thankCustomerStep", say("Thanking the customer.")))
        .add_node(Step::new("refundStep", say("Refunding customer money.")))
        .add_node(Step::new("leaveAtDoorStep", say("Leaving package at the door.")))
        .on("driveToAddressStep", "*")
        .to("decider")
        .on("decider", "PRESENT")
        .to("givePackageToCustomer")
        .next("givePackageToCustomer", "receiptDecider")
        .on("receiptDecider", "CORRECT")
        .to("thankCustomerStep")
        .on("receiptDecider", "INCORRECT")
        .to("refundStep")
        .on("decider", "NOT_PRESENT")
        .to("leaveAtDoorStep")
}

/// Drive, decide, hand over or leave at the door, check the receipt.
///
/// Getting lost fails the flow.
pub fn delivery_flow(config: &JobsConfig) -> Result<Flow, FlowDefinitionError> {
    delivery_builder(config)
        .on("driveToAddressStep", "FAILED")
        .fail()
        .build()
}

/// Delivery flow that stores the package when the driver gets lost.
pub fn delivery_flow_with_storage(config: &JobsConfig) -> Result<Flow, FlowDefinitionError> {
    delivery_builder(config)
        .add_node(Step::new(
            "storePackageStep",
            say("Storing the package while the customer address is located."),
        ))
        .on("driveToAddressStep", "FAILED")
        .to("storePackageStep")
        .build()
}

pub fn billing_job() -> Result<Job, FlowDefinitionError> {
    let flow = FlowBuilder::new("billingFlow")
        .start(Step::new("invoiceStep", say("Invoice is sent to the customer")))
        .build()?;

    JobBuilder::new("billingJob").flow(flow).build()
}

/// Package, deliver, then bill.
pub fn deliver_package_job(
    delivery: Arc<Flow>,
    billing: Arc<Job>,
) -> Result<Job, FlowDefinitionError> {
    let flow = FlowBuilder::new("deliverPackageFlow")
        .start(Step::new("packageItemStep", package_item()))
        .add_node(delivery)
        .add_node(JobStep::new("nestedBillingJobStep", billing))
        .on("packageItemStep", "*")
        .to("deliveryFlow")
        .next("deliveryFlow", "nestedBillingJobStep")
        .build()?;

    JobBuilder::new("deliverPackageJob")
        .flow(flow)
        .parameter(ParameterSpec::required("item", ParameterType::String))
        .parameter(ParameterSpec::required("run.date", ParameterType::Date))
        .parameter(ParameterSpec::optional("receipt", ParameterType::String))
        .build()
}

pub(super) fn register(actions: &mut ActionRegistry, config: &JobsConfig) {
    actions.register_action("packageItem", package_item());
    actions.register_action(
        "driveToAddress",
        DriveToAddress {
            got_lost: config.got_lost,
        },
    );
    actions.register_action("givePackageToCustomer", give_package_to_customer());
    actions.register_action("thankCustomer", say("Thanking the customer."));
    actions.register_action("refund", say("Refunding customer money."));
    actions.register_action("leaveAtDoor", say("Leaving package at the door."));
    actions.register_action(
        "storePackage",
        say("Storing the package while the customer address is located."),
    );
    actions.register_action("invoice", say("Invoice is sent to the customer"));

    actions.register_decider("delivery", DeliveryDecider::new(Arc::clone(&config.clock)));
    actions.register_decider("receipt", ReceiptDecider);
}
