//! Execution Context
//!
//! Run-scoped state threaded by reference through every node of one run,
//! including nodes of nested flows and jobs. Created at launch and
//! returned with the run result.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::model::{NodeKind, Outcome};
use crate::workflow::parameters::DATE_FORMAT;

/// One executed node, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeVisit {
    pub name: String,
    pub kind: NodeKind,
    pub outcome: Outcome,
}

/// Mutable state of a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Launch parameters, as given
    pub job_parameters: HashMap<String, String>,

    /// Latest outcome of every executed node, keyed by node name
    pub step_results: HashMap<String, Outcome>,

    /// Free-form data steps pass to later nodes
    pub shared_data: HashMap<String, Value>,

    visits: Vec<NodeVisit>,
}

impl ExecutionContext {
    pub fn new(job_parameters: HashMap<String, String>) -> Self {
        Self {
            job_parameters,
            ..Self::default()
        }
    }

    /// Adds a shared value before the run starts.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(key, value);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.job_parameters.get(name).map(String::as_str)
    }

    /// Reads a `YYYY-MM-DD` parameter.
    pub fn date_parameter(&self, name: &str) -> Option<NaiveDate> {
        self.parameter(name)
            .and_then(|value| NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok())
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.shared_data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.shared_data.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Outcome recorded for a node earlier in this run.
    pub fn result(&self, node: &str) -> Option<&Outcome> {
        self.step_results.get(node)
    }

    /// Every executed node, in order.
    pub fn visits(&self) -> &[NodeVisit] {
        &self.visits
    }

    pub(crate) fn record(&mut self, name: &str, kind: NodeKind, outcome: &Outcome) {
        self.step_results.insert(name.to_string(), outcome.clone());
        self.visits.push(NodeVisit {
            name: name.to_string(),
            kind,
            outcome: outcome.clone(),
        });
    }
}
