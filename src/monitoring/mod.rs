//! Run Monitoring Module
//!
//! Tracks node timings during a run.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Node start/finish times and Gantt charts

pub mod timeline;

pub use timeline::{render_gantt, EventType, ExecutionTimeline, NodeTiming, TimelineEvent};
