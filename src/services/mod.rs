//! Services
//!
//! Business logic services for the advisor. The pipeline orchestrates
//! one analysis run; the model client trait is the seam callers plug
//! their provider into.

pub mod advisor;
pub mod llm;

pub use advisor::AdvisorPipeline;
pub use llm::{ChunkHandler, GenerateOptions, ModelClient, ModelError, ModelResult};
