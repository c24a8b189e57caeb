//! Sample Jobs
//!
//! A small package-delivery application built on the engine:
//!
//! - `billingJob`: sends the invoice
//! - `deliverPackageJob`: packages an item, runs the delivery flow, then
//!   bills the customer through the nested billing job
//! - `prepareFlowersJob`: prepares a flower order and delivers it
//!
//! [`register_actions`] exposes the same behaviour by name for
//! definition files.

pub mod delivery;
pub mod flowers;

use std::fmt;
use std::sync::Arc;

use chrono::{Local, Timelike};

use crate::error::FlowDefinitionError;
use crate::workflow::registry::{ActionRegistry, JobRegistry};

pub use delivery::{
    billing_job, deliver_package_job, delivery_flow, delivery_flow_with_storage, DeliveryDecider,
    DriveToAddress, ReceiptDecider, DELIVERY_CUTOFF_HOUR,
};
pub use flowers::{prepare_flowers_job, FlowerSelectionListener};

/// Source of the current hour of day.
pub trait Clock: Send + Sync {
    fn hour(&self) -> u32;
}

/// Local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn hour(&self) -> u32 {
        Local::now().hour()
    }
}

/// Clock stuck at one hour, for tests and demos.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u32);

impl Clock for FixedClock {
    fn hour(&self) -> u32 {
        self.0
    }
}

/// Settings fixed when the sample jobs are built.
#[derive(Clone)]
pub struct JobsConfig {
    /// Makes the driver get lost on the way to every address
    pub got_lost: bool,
    pub clock: Arc<dyn Clock>,
}

impl JobsConfig {
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn lost(mut self) -> Self {
        self.got_lost = true;
        self
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            got_lost: false,
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for JobsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobsConfig")
            .field("got_lost", &self.got_lost)
            .field("hour", &self.clock.hour())
            .finish()
    }
}

/// Registers every sample action, decider and listener by name.
pub fn register_actions(actions: &mut ActionRegistry, config: &JobsConfig) {
    delivery::register(actions, config);
    flowers::register(actions);
}

/// Builds the three sample jobs.
pub fn registry(config: &JobsConfig) -> Result<JobRegistry, FlowDefinitionError> {
    let delivery = Arc::new(delivery_flow(config)?);
    let billing = Arc::new(billing_job()?);

    let mut jobs = JobRegistry::new();
    jobs.register(Arc::clone(&billing))?;
    jobs.register(deliver_package_job(Arc::clone(&delivery), billing)?)?;
    jobs.register(prepare_flowers_job(delivery)?)?;
    Ok(jobs)
}
