//! Integration Tests Module
//!
//! End-to-end tests for the Plansage advisor pipeline and its parts:
//! showplan analysis, the index evidence gate, response validation,
//! the two-tier analysis cache, and the assembled pipeline.


// Index recommendation gate tests
mod index_gate_test;

// Response validation and sanitization tests
mod response_guard_test;

// Two-tier analysis cache tests
mod cache_test;

// Full pipeline orchestration tests
mod pipeline_test;
