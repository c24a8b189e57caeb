//! Flow Validation
//!
//! Definition-time checks run by [`FlowBuilder::build`]:
//! - Flow name and start node
//! - Node name uniqueness
//! - Transition reference integrity
//! - At most one transition per `(node, pattern)` pair
//! - Reachability of every node from the start node
//!
//! All problems found are reported together.
//!
//! [`FlowBuilder::build`]: super::builder::FlowBuilder::build

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info};

use crate::error::FlowDefinitionError;

use super::model::{Node, Target, Transition};

/// Validates the parts of a flow before it is frozen.
pub fn validate_flow(
    name: &str,
    start: Option<&str>,
    nodes: &[Node],
    transitions: &[Transition],
) -> Result<(), FlowDefinitionError> {
    debug!(
        "Validating flow '{}' with {} nodes and {} transitions",
        name,
        nodes.len(),
        transitions.len()
    );

    if name.trim().is_empty() {
        return Err(FlowDefinitionError::EmptyName);
    }

    let mut errors = Vec::new();

    // Node names
    let mut names: HashSet<&str> = HashSet::new();
    for node in nodes {
        if node.name().is_empty() {
            errors.push(FlowDefinitionError::EmptyNodeName {
                flow: name.to_string(),
            });
            continue;
        }
        if !names.insert(node.name()) {
            errors.push(FlowDefinitionError::DuplicateNode {
                flow: name.to_string(),
                node: node.name().to_string(),
            });
        }
    }

    // Start node
    match start {
        None => errors.push(FlowDefinitionError::MissingStart(name.to_string())),
        Some(start) if !names.contains(start) => {
            errors.push(FlowDefinitionError::UnknownStart {
                flow: name.to_string(),
                node: start.to_string(),
            })
        }
        Some(_) => {}
    }

    errors.extend(check_transitions(name, &names, transitions));

    if errors.is_empty() {
        if let Some(start) = start {
            errors.extend(check_reachability(name, start, nodes, transitions));
        }
    }

    match errors.len() {
        0 => {
            info!("Flow '{}' validated: {} nodes", name, nodes.len());
            Ok(())
        }
        1 => Err(errors.remove(0)),
        _ => Err(FlowDefinitionError::Multiple(errors)),
    }
}

/// Checks references, empty patterns, and duplicate `(from, pattern)` pairs.
fn check_transitions(
    flow: &str,
    names: &HashSet<&str>,
    transitions: &[Transition],
) -> Vec<FlowDefinitionError> {
    let mut errors = Vec::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for transition in transitions {
        if !names.contains(transition.from.as_str()) {
            errors.push(FlowDefinitionError::UnknownSource {
                flow: flow.to_string(),
                node: transition.from.clone(),
            });
        }

        if transition.pattern.is_empty() {
            errors.push(FlowDefinitionError::EmptyPattern {
                flow: flow.to_string(),
                from: transition.from.clone(),
            });
        }

        if let Target::Node(target) = &transition.target {
            if !names.contains(target.as_str()) {
                errors.push(FlowDefinitionError::UnknownTarget {
                    flow: flow.to_string(),
                    from: transition.from.clone(),
                    target: target.clone(),
                });
            }
        }

        if !seen.insert((transition.from.as_str(), transition.pattern.as_str())) {
            errors.push(FlowDefinitionError::DuplicateTransition {
                flow: flow.to_string(),
                from: transition.from.clone(),
                pattern: transition.pattern.clone(),
            });
        }
    }

    errors
}

/// Breadth-first walk from the start node; every node must be visited.
fn check_reachability(
    flow: &str,
    start: &str,
    nodes: &[Node],
    transitions: &[Transition],
) -> Vec<FlowDefinitionError> {
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for transition in transitions {
        if let Target::Node(target) = &transition.target {
            successors
                .entry(transition.from.as_str())
                .or_default()
                .push(target.as_str());
        }
    }

    let mut reached: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    reached.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        for &next in successors.get(current).into_iter().flatten() {
            if reached.insert(next) {
                queue.push_back(next);
            }
        }
    }

    for node in nodes {
        if !successors.contains_key(node.name()) {
            debug!(
                "Node '{}' in flow '{}' has no node transitions (ends the flow)",
                node.name(),
                flow
            );
        }
    }

    nodes
        .iter()
        .filter(|node| !reached.contains(node.name()))
        .map(|node| FlowDefinitionError::UnreachableNode {
            flow: flow.to_string(),
            node: node.name().to_string(),
        })
        .collect()
}
