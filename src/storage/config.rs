//! JSON Configuration Management
//!
//! Handles reading and writing the advisor configuration file.

use std::fs;
use std::path::PathBuf;

use crate::models::settings::{AdvisorConfig, SettingsUpdate};
use crate::utils::error::{AdvisorError, AdvisorResult};
use crate::utils::paths::{config_path, ensure_plansage_dir};

/// Configuration service for managing advisor settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: AdvisorConfig,
}

impl ConfigService {
    /// Create a new config service, loading existing config or creating defaults
    pub fn new() -> AdvisorResult<Self> {
        ensure_plansage_dir()?;

        let config_path = config_path()?;
        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AdvisorConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &PathBuf) -> AdvisorResult<AdvisorConfig> {
        let content = fs::read_to_string(path)?;
        let config: AdvisorConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AdvisorError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &PathBuf, config: &AdvisorConfig) -> AdvisorResult<()> {
        config.validate().map_err(AdvisorError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Get a clone of the current configuration
    pub fn get_config_clone(&self) -> AdvisorConfig {
        self.config.clone()
    }

    /// Update the configuration with a partial update
    pub fn update_config(&mut self, update: SettingsUpdate) -> AdvisorResult<AdvisorConfig> {
        self.config.apply_update(update);
        self.save()?;
        Ok(self.config.clone())
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> AdvisorResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AdvisorResult<()> {
        self.config = Self::load_from_file(&self.config_path)?;
        Ok(())
    }

    /// Reset configuration to defaults
    pub fn reset(&mut self) -> AdvisorResult<()> {
        self.config = AdvisorConfig::default();
        self.save()?;
        Ok(())
    }

    /// Check if the config service is healthy
    pub fn is_healthy(&self) -> bool {
        self.config_path.exists() && self.config.validate().is_ok()
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            config: AdvisorConfig::default(),
        }
    }
}
