//! Advisor Orchestration
//!
//! Wires the governance components (plan analysis, index gate, response
//! validation, cache) around a model call.

pub mod pipeline;

pub use pipeline::AdvisorPipeline;
