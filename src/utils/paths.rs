//! Cross-Platform Path Utilities
//!
//! Functions for resolving the per-install directories: ~/.plansage/
//! for configuration and ~/.plansage/cache/ for the analysis cache.

use std::path::PathBuf;

use crate::utils::error::{AdvisorError, AdvisorResult};

/// Get the user's home directory
pub fn home_dir() -> AdvisorResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AdvisorError::config("Could not determine home directory"))
}

/// Get the Plansage directory (~/.plansage/)
pub fn plansage_dir() -> AdvisorResult<PathBuf> {
    Ok(home_dir()?.join(".plansage"))
}

/// Get the config file path (~/.plansage/config.json)
pub fn config_path() -> AdvisorResult<PathBuf> {
    Ok(plansage_dir()?.join("config.json"))
}

/// Get the analysis cache directory (~/.plansage/cache/)
pub fn cache_dir() -> AdvisorResult<PathBuf> {
    Ok(plansage_dir()?.join("cache"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &PathBuf) -> AdvisorResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the Plansage directory, creating if it doesn't exist
pub fn ensure_plansage_dir() -> AdvisorResult<PathBuf> {
    let path = plansage_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}

/// Get the cache directory, creating if it doesn't exist
pub fn ensure_cache_dir() -> AdvisorResult<PathBuf> {
    let path = cache_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
