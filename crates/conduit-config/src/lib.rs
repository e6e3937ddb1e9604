// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Conduit access-control engine.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`CONDUIT_*`)
//! - Tracing subscriber setup from the logging section
//!
//! # Usage
//!
//! ```ignore
//! use conduit_config::{init_tracing, load_config};
//!
//! let config = load_config()?;
//! init_tracing(&config.logging)?;
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;
pub mod telemetry;

pub use error::ConfigError;
pub use layer::ConduitConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};
pub use telemetry::init_tracing;

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct ConduitConfig {
	pub database: DatabaseConfig,
	pub flow: FlowConfig,
	pub control: ControlConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`CONDUIT_*`)
/// 2. Config file (`/etc/conduit/acl.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ConduitConfig, ConfigError> {
	load_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ConduitConfig, ConfigError> {
	load_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<ConduitConfig, ConfigError> {
	let mut merged = ConduitConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Merge `sources` in precedence order and finalize.
pub fn load_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ConduitConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ConduitConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ConduitConfigLayer) -> Result<ConduitConfig, ConfigError> {
	let config = ConduitConfig {
		database: layer.database.unwrap_or_default().finalize(),
		flow: layer.flow.unwrap_or_default().finalize(),
		control: layer.control.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		database = %config.database.url,
		max_depth = config.flow.max_depth,
		quick_listing = config.flow.quick_listing,
		queue_capacity = config.control.queue_capacity,
		overflow_policy = ?config.control.overflow_policy,
		"Conduit configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &ConduitConfig) -> Result<(), ConfigError> {
	if config.flow.max_depth == 0 {
		return Err(ConfigError::Validation(
			"flow.max_depth must be greater than zero".to_string(),
		));
	}
	if config.control.queue_capacity == 0 {
		return Err(ConfigError::Validation(
			"control.queue_capacity must be greater than zero".to_string(),
		));
	}
	Ok(())
}
