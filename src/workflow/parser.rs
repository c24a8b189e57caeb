//! Definition File Parser
//!
//! Loads flows and jobs from YAML. Steps, deciders and listeners are
//! referred to by name and resolved through an [`ActionRegistry`].
//!
//! ```yaml
//! flows:
//!   - name: billingFlow
//!     start: invoiceStep
//!     nodes:
//!       - { kind: step, name: invoiceStep, action: invoice }
//! jobs:
//!   - name: billingJob
//!     flow: billingFlow
//! ```
//!
//! Flows and jobs may refer to each other in any order. Every flow is
//! built through [`FlowBuilder`], so loaded graphs pass the same checks
//! as hand-built ones.

use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::sync::Arc;

use log::{debug, info};
use serde::Deserialize;

use crate::error::FlowDefinitionError;

use super::builder::{FlowBuilder, JobBuilder};
use super::model::{Decider, Flow, Job, JobStep, Node, Step, Target, TerminalStatus, Transition};
use super::parameters::ParameterSpec;
use super::registry::{ActionRegistry, JobRegistry};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionsFile {
    #[serde(default)]
    flows: Vec<FlowDef>,
    #[serde(default)]
    jobs: Vec<JobDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlowDef {
    name: String,
    start: Option<String>,
    #[serde(default)]
    nodes: Vec<NodeDef>,
    #[serde(default)]
    transitions: Vec<TransitionDef>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum NodeDef {
    Step {
        name: String,
        action: String,
        #[serde(default)]
        listener: Option<String>,
    },
    Decider {
        name: String,
        decider: String,
    },
    /// Nested flow; the node takes the flow's name
    Flow { flow: String },
    /// Nested job; the node name defaults to the job name
    Job {
        #[serde(default)]
        name: Option<String>,
        job: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransitionDef {
    from: String,
    on: String,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobDef {
    name: String,
    flow: String,
    #[serde(default)]
    parameters: Vec<ParameterSpec>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum DefKey {
    Flow(String),
    Job(String),
}

impl DefKey {
    fn name(&self) -> &str {
        match self {
            DefKey::Flow(name) | DefKey::Job(name) => name,
        }
    }
}

/// Builds definitions on demand, memoizing each flow and job once.
struct Resolver<'a> {
    actions: &'a ActionRegistry,
    flow_defs: HashMap<&'a str, &'a FlowDef>,
    job_defs: HashMap<&'a str, &'a JobDef>,
    flows: HashMap<String, Arc<Flow>>,
    jobs: HashMap<String, Arc<Job>>,
    resolving: Vec<DefKey>,
}

impl<'a> Resolver<'a> {
    fn new(file: &'a DefinitionsFile, actions: &'a ActionRegistry) -> Result<Self, FlowDefinitionError> {
        let mut flow_defs = HashMap::new();
        for def in &file.flows {
            if flow_defs.insert(def.name.as_str(), def).is_some() {
                return Err(FlowDefinitionError::DuplicateFlow(def.name.clone()));
            }
        }

        let mut job_defs = HashMap::new();
        for def in &file.jobs {
            if job_defs.insert(def.name.as_str(), def).is_some() {
                return Err(FlowDefinitionError::DuplicateJob(def.name.clone()));
            }
        }

        Ok(Self {
            actions,
            flow_defs,
            job_defs,
            flows: HashMap::new(),
            jobs: HashMap::new(),
            resolving: Vec::new(),
        })
    }

    fn enter(&mut self, key: DefKey) -> Result<(), FlowDefinitionError> {
        if self.resolving.contains(&key) {
            return Err(FlowDefinitionError::RecursiveDefinition(key.name().to_string()));
        }
        self.resolving.push(key);
        Ok(())
    }

    fn leave(&mut self) {
        self.resolving.pop();
    }

    fn flow(&mut self, name: &str) -> Result<Arc<Flow>, FlowDefinitionError> {
        if let Some(flow) = self.flows.get(name) {
            return Ok(Arc::clone(flow));
        }

        let def = *self
            .flow_defs
            .get(name)
            .ok_or_else(|| FlowDefinitionError::UnknownFlow(name.to_string()))?;

        self.enter(DefKey::Flow(name.to_string()))?;
        let built = self.build_flow(def);
        self.leave();

        let flow = Arc::new(built?);
        debug!("Resolved flow '{}' ({} nodes)", flow.name(), flow.len());
        self.flows.insert(name.to_string(), Arc::clone(&flow));
        Ok(flow)
    }

    fn job(&mut self, name: &str) -> Result<Arc<Job>, FlowDefinitionError> {
        if let Some(job) = self.jobs.get(name) {
            return Ok(Arc::clone(job));
        }

        let def = *self
            .job_defs
            .get(name)
            .ok_or_else(|| FlowDefinitionError::UnknownJob(name.to_string()))?;

        self.enter(DefKey::Job(name.to_string()))?;
        let built = self.build_job(def);
        self.leave();

        let job = Arc::new(built?);
        self.jobs.insert(name.to_string(), Arc::clone(&job));
        Ok(job)
    }

    fn build_flow(&mut self, def: &FlowDef) -> Result<Flow, FlowDefinitionError> {
        let mut builder = FlowBuilder::new(def.name.as_str());

        for node in &def.nodes {
            let node = self.build_node(node)?;
            builder = builder.add_node(node);
        }

        if let Some(start) = &def.start {
            builder = builder.start_at(start.as_str());
        }

        for transition in &def.transitions {
            let target = match (&transition.to, &transition.end) {
                (Some(to), None) => Target::Node(to.clone()),
                (None, Some(end)) => Target::Terminal(TerminalStatus::from_label(end.trim())),
                (to, _) => {
                    let reason = if to.is_some() {
                        "'to' and 'end' are mutually exclusive"
                    } else {
                        "one of 'to' or 'end' is required"
                    };
                    return Err(FlowDefinitionError::InvalidTarget {
                        from: transition.from.clone(),
                        pattern: transition.on.clone(),
                        reason: reason.to_string(),
                    });
                }
            };
            builder = builder.add_transition(Transition::new(
                transition.from.as_str(),
                transition.on.as_str(),
                target,
            ));
        }

        builder.build()
    }

    fn build_node(&mut self, def: &NodeDef) -> Result<Node, FlowDefinitionError> {
        let node = match def {
            NodeDef::Step {
                name,
                action,
                listener,
            } => {
                let mut step = Step::from_arc(name.as_str(), self.actions.action(action)?);
                if let Some(listener) = listener {
                    step = step.with_listener_arc(self.actions.listener(listener)?);
                }
                Node::Step(step)
            }
            NodeDef::Decider { name, decider } => {
                Node::Decider(Decider::from_arc(name.as_str(), self.actions.decider(decider)?))
            }
            NodeDef::Flow { flow } => Node::Flow(self.flow(flow)?),
            NodeDef::Job { name, job } => {
                let resolved = self.job(job)?;
                let name = name.as_deref().unwrap_or(job.as_str());
                Node::Job(JobStep::new(name, resolved))
            }
        };
        Ok(node)
    }

    fn build_job(&mut self, def: &JobDef) -> Result<Job, FlowDefinitionError> {
        let flow = self.flow(&def.flow)?;
        def.parameters
            .iter()
            .cloned()
            .fold(JobBuilder::new(def.name.as_str()).flow(flow), JobBuilder::parameter)
            .build()
    }
}

/// Parses YAML definitions into a job registry.
///
/// Every declared flow is built and validated, including flows no job
/// uses.
pub fn parse_definitions(
    yaml: &str,
    actions: &ActionRegistry,
) -> Result<JobRegistry, FlowDefinitionError> {
    let file: DefinitionsFile =
        serde_yaml::from_str(yaml).map_err(|e| FlowDefinitionError::Parse(e.to_string()))?;

    let mut resolver = Resolver::new(&file, actions)?;

    for def in &file.flows {
        resolver.flow(&def.name)?;
    }

    let mut registry = JobRegistry::new();
    for def in &file.jobs {
        let job = resolver.job(&def.name)?;
        registry.register(job)?;
    }

    Ok(registry)
}

/// Loads job definitions from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use flowbatch::jobs::{register_actions, JobsConfig};
/// use flowbatch::workflow::{load_definitions, ActionRegistry};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut actions = ActionRegistry::new();
///     register_actions(&mut actions, &JobsConfig::default());
///
///     let jobs = load_definitions("definitions/delivery.yaml", &actions)?;
///     println!("Loaded {} jobs", jobs.len());
///     Ok(())
/// }
/// ```
pub fn load_definitions(path: &str, actions: &ActionRegistry) -> Result<JobRegistry, Box<dyn Error>> {
    info!("Loading definitions from: {}", path);

    let yaml_content = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read definitions file '{}': {}. Check that the file exists and is readable.",
            path, e
        )
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    let registry = parse_definitions(&yaml_content, actions)?;

    info!("Loaded {} job(s): {}", registry.len(), registry.names().join(", "));
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::action::{action_fn, decider_fn, StepListener};
    use crate::execution::{Engine, ExecutionContext};
    use crate::monitoring::ExecutionTimeline;
    use crate::workflow::model::{NodeKind, Outcome};
    use crate::workflow::parameters::ParameterType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct Trim;

    impl StepListener for Trim {
        fn after_step(
            &self,
            _ctx: &mut ExecutionContext,
            _outcome: Outcome,
        ) -> Result<Outcome, crate::error::StepExecutionError> {
            Ok(Outcome::custom("TRIM_REQUIRED"))
        }
    }

    fn actions() -> ActionRegistry {
        let mut actions = ActionRegistry::new();
        actions.register_action("ok", action_fn(|_ctx| Ok(Outcome::Completed)));
        actions.register_decider("present", decider_fn(|_ctx| Outcome::custom("PRESENT")));
        actions.register_listener("trim", Trim);
        actions
    }

    const DEFINITIONS: &str = r#"
jobs:
  - name: deliverJob
    flow: mainFlow
    parameters:
      - { name: item }
      - { name: run.date, type: date }
  - name: billingJob
    flow: billingFlow

flows:
  - name: mainFlow
    start: pack
    nodes:
      - { kind: step, name: pack, action: ok }
      - { kind: flow, flow: deliveryFlow }
      - { kind: job, name: billing, job: billingJob }
    transitions:
      - { from: pack, on: "*", to: deliveryFlow }
      - { from: deliveryFlow, on: COMPLETED, to: billing }

  - name: deliveryFlow
    start: decider
    nodes:
      - { kind: decider, name: decider, decider: present }
      - { kind: step, name: give, action: ok, listener: trim }
      - { kind: step, name: door, action: ok }
    transitions:
      - { from: decider, on: PRESENT, to: give }
      - { from: decider, on: NOT_PRESENT, to: door }
      - { from: give, on: TRIM_REQUIRED, end: COMPLETED }

  - name: billingFlow
    start: invoice
    nodes:
      - { kind: step, name: invoice, action: ok }
"#;

    #[test]
    fn test_parse_definitions() {
        let jobs = parse_definitions(DEFINITIONS, &actions()).unwrap();
        assert_eq!(jobs.names(), vec!["billingJob", "deliverJob"]);

        let job = jobs.get("deliverJob").unwrap();
        assert_eq!(job.flow().start(), "pack");
        assert_eq!(job.parameters().len(), 2);
        assert_eq!(job.parameters()[1].kind, ParameterType::Date);
        assert_eq!(job.flow().node("billing").unwrap().kind(), NodeKind::Job);
        assert_eq!(job.flow().node("deliveryFlow").unwrap().kind(), NodeKind::Flow);
    }

    #[test]
    fn test_parsed_job_runs() {
        let jobs = parse_definitions(DEFINITIONS, &actions()).unwrap();
        let job = jobs.get("deliverJob").unwrap();

        let mut ctx = ExecutionContext::default();
        let mut timeline = ExecutionTimeline::new();
        let result = Engine::new().execute_job(&job, &mut ctx, &mut timeline);

        assert!(result.status.is_completed());
        let names: Vec<_> = ctx.visits().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["pack", "decider", "give", "deliveryFlow", "invoice", "billing"]
        );
        assert_eq!(ctx.result("give"), Some(&Outcome::custom("TRIM_REQUIRED")));
    }

    #[test]
    fn test_shared_definitions_are_built_once() {
        let yaml = r#"
flows:
  - name: shared
    start: a
    nodes: [{ kind: step, name: a, action: ok }]
jobs:
  - { name: one, flow: shared }
  - { name: two, flow: shared }
"#;
        let jobs = parse_definitions(yaml, &actions()).unwrap();
        let one = jobs.get("one").unwrap();
        let two = jobs.get("two").unwrap();
        assert!(std::ptr::eq(one.flow(), two.flow()));
    }

    #[test]
    fn test_unknown_action() {
        let yaml = r#"
flows:
  - name: f
    start: a
    nodes: [{ kind: step, name: a, action: missing }]
"#;
        let err = parse_definitions(yaml, &actions()).unwrap_err();
        assert_eq!(
            err,
            FlowDefinitionError::UnknownAction {
                kind: "action",
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_flow_reference() {
        let yaml = r#"
jobs:
  - { name: j, flow: nowhere }
"#;
        let err = parse_definitions(yaml, &actions()).unwrap_err();
        assert_eq!(err, FlowDefinitionError::UnknownFlow("nowhere".to_string()));
    }

    #[test]
    fn test_recursive_flows_rejected() {
        let yaml = r#"
flows:
  - name: a
    start: b
    nodes: [{ kind: flow, flow: b }]
  - name: b
    start: a
    nodes: [{ kind: flow, flow: a }]
"#;
        let err = parse_definitions(yaml, &actions()).unwrap_err();
        assert_eq!(err, FlowDefinitionError::RecursiveDefinition("a".to_string()));
    }

    #[test]
    fn test_job_nesting_itself_rejected() {
        let yaml = r#"
flows:
  - name: loopFlow
    start: self
    nodes: [{ kind: job, name: self, job: loopJob }]
jobs:
  - { name: loopJob, flow: loopFlow }
"#;
        let err = parse_definitions(yaml, &actions()).unwrap_err();
        assert!(matches!(err, FlowDefinitionError::RecursiveDefinition(_)));
    }

    #[test]
    fn test_transition_needs_one_target() {
        let yaml = r#"
flows:
  - name: f
    start: a
    nodes: [{ kind: step, name: a, action: ok }]
    transitions:
      - { from: a, on: "*", to: a, end: FAILED }
"#;
        let err = parse_definitions(yaml, &actions()).unwrap_err();
        assert!(matches!(err, FlowDefinitionError::InvalidTarget { .. }));

        let yaml = yaml.replace("to: a, end: FAILED", "on_hold: true");
        assert!(parse_definitions(&yaml, &actions()).is_err());
    }

    #[test]
    fn test_graph_errors_surface() {
        let yaml = r#"
flows:
  - name: f
    start: a
    nodes:
      - { kind: step, name: a, action: ok }
      - { kind: step, name: orphan, action: ok }
"#;
        let err = parse_definitions(yaml, &actions()).unwrap_err();
        assert_eq!(
            err,
            FlowDefinitionError::UnreachableNode {
                flow: "f".to_string(),
                node: "orphan".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_flow_names() {
        let yaml = r#"
flows:
  - { name: f, start: a, nodes: [{ kind: step, name: a, action: ok }] }
  - { name: f, start: a, nodes: [{ kind: step, name: a, action: ok }] }
"#;
        let err = parse_definitions(yaml, &actions()).unwrap_err();
        assert_eq!(err, FlowDefinitionError::DuplicateFlow("f".to_string()));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse_definitions("flows: [ {", &actions()).unwrap_err();
        assert!(matches!(err, FlowDefinitionError::Parse(_)));
    }

    #[test]
    fn test_load_definitions_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(DEFINITIONS.as_bytes()).unwrap();

        let path = file.path().to_str().unwrap();
        let jobs = load_definitions(path, &actions()).unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn test_load_definitions_missing_file() {
        let err = load_definitions("/nonexistent/definitions.yaml", &actions()).unwrap_err();
        assert!(err.to_string().contains("Failed to read definitions file"));
    }
}
