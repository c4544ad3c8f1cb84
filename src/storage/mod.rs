//! Storage Layer
//!
//! JSON config persistence under the user's home directory.

pub mod config;

pub use config::*;
