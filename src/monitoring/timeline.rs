//! Execution Timeline
//!
//! Tracks node start/finish times of one run for the execution history
//! and for the ASCII chart printed by the CLI.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::model::Outcome;

/// Type of timeline event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    /// Node started executing
    Started,
    /// Node finished with this outcome
    Finished(Outcome),
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Name of the node
    pub node: String,
    /// Type of event
    pub event_type: EventType,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
}

/// Start and end of one node execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTiming {
    pub node: String,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Records when each node of a run starts and finishes.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: DateTime<Utc>,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Utc::now(),
        }
    }

    /// Records an event for a node.
    pub fn add_event(&mut self, node: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            node: node.into(),
            event_type,
            timestamp: Utc::now(),
        });
    }

    /// Returns all recorded events.
    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Pairs every start with its finish, in finishing order.
    ///
    /// Nested flows and cycles are handled by matching each finish
    /// with the latest unmatched start of the same node.
    pub fn timings(&self) -> Vec<NodeTiming> {
        let mut open: HashMap<&str, Vec<DateTime<Utc>>> = HashMap::new();
        let mut timings = Vec::new();

        for event in &self.events {
            match &event.event_type {
                EventType::Started => {
                    open.entry(event.node.as_str())
                        .or_default()
                        .push(event.timestamp);
                }
                EventType::Finished(outcome) => {
                    let started = open
                        .get_mut(event.node.as_str())
                        .and_then(|starts| starts.pop());
                    if let Some(started_at) = started {
                        timings.push(NodeTiming {
                            node: event.node.clone(),
                            outcome: outcome.clone(),
                            started_at,
                            finished_at: event.timestamp,
                            duration_ms: (event.timestamp - started_at).num_milliseconds(),
                        });
                    }
                }
            }
        }

        timings
    }

    /// Generates an ASCII chart of node executions.
    pub fn gantt_chart(&self) -> String {
        render_gantt(&self.timings(), self.start_time, Utc::now())
    }
}

/// Renders node timings of a run as an ASCII chart.
pub fn render_gantt(
    timings: &[NodeTiming],
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> String {
    let mut output = String::from("\nExecution Timeline:\n\n");

    let total_time = (finished_at - started_at).num_milliseconds().max(1);

    // Scale to 50 characters width
    let scale = 50.0 / total_time as f64;

    let mut timings = timings.to_vec();
    timings.sort_by_key(|t| t.started_at);

    for timing in timings {
        let start = (timing.started_at - started_at).num_milliseconds().max(0);
        let start_pos = (start as f64 * scale) as usize;
        let width = (timing.duration_ms as f64 * scale).max(1.0) as usize;

        let mut bar = " ".repeat(start_pos);
        bar.push_str(&"#".repeat(width));

        output.push_str(&format!(
            "{:20} |{:52}| {:>6} ms  {}\n",
            truncate(&timing.node, 20),
            bar,
            timing.duration_ms,
            timing.outcome
        ));
    }

    output.push_str(&format!("\nTotal: {} ms\n", total_time));
    output
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncates a string to a maximum length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_timeline_creation() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.events.is_empty());
        assert!(timeline.timings().is_empty());
    }

    #[test]
    fn test_timings_pair_start_and_finish() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("step1", EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event("step1", EventType::Finished(Outcome::Completed));

        let timings = timeline.timings();
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].node, "step1");
        assert_eq!(timings[0].outcome, Outcome::Completed);
        assert!(timings[0].duration_ms >= 20);
    }

    #[test]
    fn test_timings_nested_nodes() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("flow", EventType::Started);
        timeline.add_event("inner", EventType::Started);
        timeline.add_event("inner", EventType::Finished(Outcome::Completed));
        timeline.add_event("flow", EventType::Finished(Outcome::custom("DONE")));

        let timings = timeline.timings();
        let names: Vec<_> = timings.iter().map(|t| t.node.as_str()).collect();
        assert_eq!(names, vec!["inner", "flow"]);
        assert_eq!(timings[1].outcome, Outcome::custom("DONE"));
    }

    #[test]
    fn test_timings_repeated_node() {
        let mut timeline = ExecutionTimeline::new();
        for _ in 0..3 {
            timeline.add_event("retry", EventType::Started);
            timeline.add_event("retry", EventType::Finished(Outcome::Failed));
        }
        assert_eq!(timeline.timings().len(), 3);
    }

    #[test]
    fn test_unfinished_start_is_ignored() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("step1", EventType::Started);
        assert!(timeline.timings().is_empty());
        assert_eq!(timeline.get_events().len(), 1);
    }

    #[test]
    fn test_gantt_chart_generation() {
        let mut timeline = ExecutionTimeline::new();

        timeline.add_event("step1", EventType::Started);
        thread::sleep(Duration::from_millis(10));
        timeline.add_event("step1", EventType::Finished(Outcome::Completed));

        timeline.add_event("step2", EventType::Started);
        thread::sleep(Duration::from_millis(10));
        timeline.add_event("step2", EventType::Finished(Outcome::Failed));

        let chart = timeline.gantt_chart();
        assert!(chart.contains("step1"));
        assert!(chart.contains("step2"));
        assert!(chart.contains("FAILED"));
        assert!(chart.contains("Total:"));
    }

    #[test]
    fn test_gantt_chart_empty() {
        let timeline = ExecutionTimeline::default();
        let chart = timeline.gantt_chart();
        assert!(chart.contains("Timeline"));
    }

    #[test]
    fn test_render_gantt_from_timings() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("invoiceStep", EventType::Started);
        timeline.add_event("invoiceStep", EventType::Finished(Outcome::Completed));

        let chart = render_gantt(&timeline.timings(), timeline.start_time(), Utc::now());
        assert!(chart.contains("invoiceStep"));
        assert!(chart.contains("COMPLETED"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("givePackageToCustomerStep", 10), "givePac...");
    }
}
