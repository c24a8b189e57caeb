//! Registries
//!
//! - [`ActionRegistry`]: actions, deciders and listeners by name, used
//!   to resolve definition files
//! - [`JobRegistry`]: launchable jobs by name

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::FlowDefinitionError;
use crate::execution::action::{Action, Decide, StepListener};
use crate::workflow::model::Job;

/// Named behaviour that definition files refer to.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
    deciders: HashMap<String, Arc<dyn Decide>>,
    listeners: HashMap<String, Arc<dyn StepListener>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action; a later registration replaces an earlier one.
    pub fn register_action(&mut self, name: impl Into<String>, action: impl Action + 'static) {
        self.actions.insert(name.into(), Arc::new(action));
    }

    pub fn register_decider(&mut self, name: impl Into<String>, decider: impl Decide + 'static) {
        self.deciders.insert(name.into(), Arc::new(decider));
    }

    pub fn register_listener(
        &mut self,
        name: impl Into<String>,
        listener: impl StepListener + 'static,
    ) {
        self.listeners.insert(name.into(), Arc::new(listener));
    }

    pub fn action(&self, name: &str) -> Result<Arc<dyn Action>, FlowDefinitionError> {
        self.actions
            .get(name)
            .cloned()
            .ok_or_else(|| FlowDefinitionError::UnknownAction {
                kind: "action",
                name: name.to_string(),
            })
    }

    pub fn decider(&self, name: &str) -> Result<Arc<dyn Decide>, FlowDefinitionError> {
        self.deciders
            .get(name)
            .cloned()
            .ok_or_else(|| FlowDefinitionError::UnknownAction {
                kind: "decider",
                name: name.to_string(),
            })
    }

    pub fn listener(&self, name: &str) -> Result<Arc<dyn StepListener>, FlowDefinitionError> {
        self.listeners
            .get(name)
            .cloned()
            .ok_or_else(|| FlowDefinitionError::UnknownAction {
                kind: "listener",
                name: name.to_string(),
            })
    }

    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Jobs available for launch, ordered by name.
#[derive(Debug, Default, Clone)]
pub struct JobRegistry {
    jobs: BTreeMap<String, Arc<Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job. Names must be unique.
    pub fn register(&mut self, job: impl Into<Arc<Job>>) -> Result<(), FlowDefinitionError> {
        let job = job.into();
        if self.jobs.contains_key(job.name()) {
            return Err(FlowDefinitionError::DuplicateJob(job.name().to_string()));
        }
        self.jobs.insert(job.name().to_string(), job);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Job>> {
        self.jobs.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.jobs.keys().map(String::as_str).collect()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Arc<Job>> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::action::{action_fn, decider_fn};
    use crate::workflow::builder::{FlowBuilder, JobBuilder};
    use crate::workflow::model::{Outcome, Step};

    fn job(name: &str) -> Job {
        JobBuilder::new(name)
            .flow(
                FlowBuilder::new(format!("{}Flow", name))
                    .start(Step::new("only", action_fn(|_ctx| Ok(Outcome::Completed))))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    struct Quiet;

    impl StepListener for Quiet {}

    #[test]
    fn test_action_registry_lookup() {
        let mut actions = ActionRegistry::new();
        actions.register_action("invoice", action_fn(|_ctx| Ok(Outcome::Completed)));
        actions.register_decider("always", decider_fn(|_ctx| Outcome::custom("YES")));
        actions.register_listener("quiet", Quiet);

        assert!(actions.action("invoice").is_ok());
        assert!(actions.decider("always").is_ok());
        assert!(actions.listener("quiet").is_ok());
        assert_eq!(actions.action_names(), vec!["invoice"]);
    }

    #[test]
    fn test_action_registry_unknown_names() {
        let actions = ActionRegistry::new();
        match actions.decider("missing") {
            Err(FlowDefinitionError::UnknownAction { kind, name }) => {
                assert_eq!(kind, "decider");
                assert_eq!(name, "missing");
            }
            _ => panic!("expected an unknown decider error"),
        }
    }

    #[test]
    fn test_job_registry_rejects_duplicates() {
        let mut jobs = JobRegistry::new();
        jobs.register(job("billingJob")).unwrap();

        let err = jobs.register(job("billingJob")).unwrap_err();
        assert_eq!(err, FlowDefinitionError::DuplicateJob("billingJob".to_string()));
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn test_job_registry_names_sorted() {
        let mut jobs = JobRegistry::new();
        jobs.register(job("prepareFlowersJob")).unwrap();
        jobs.register(job("billingJob")).unwrap();

        assert_eq!(jobs.names(), vec!["billingJob", "prepareFlowersJob"]);
        assert!(jobs.get("billingJob").is_some());
        assert!(jobs.get("unknown").is_none());
    }
}
