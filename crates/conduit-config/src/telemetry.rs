// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Global tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ConfigError;
use crate::sections::{LogFormat, LoggingConfig};

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
	if let Ok(filter) = EnvFilter::try_from_default_env() {
		return Ok(filter);
	}
	EnvFilter::try_new(&config.level).map_err(|e| ConfigError::InvalidValue {
		key: "logging.level".to_string(),
		message: e.to_string(),
	})
}

/// Installs the global subscriber.
///
/// # Errors
/// Returns `ConfigError::Logging` if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
	let registry = tracing_subscriber::registry().with(env_filter(config)?);
	let result = match config.format {
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json())
			.try_init(),
	};
	result.map_err(|e| ConfigError::Logging(e.to_string()))
}
