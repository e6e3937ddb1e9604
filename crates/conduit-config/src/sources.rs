// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ConduitConfigLayer;
use crate::sections::{
	ControlConfigLayer, DatabaseConfigLayer, FlowConfigLayer, LogFormat, LoggingConfigLayer,
	QueueOverflowPolicy,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ConduitConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConduitConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ConduitConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/conduit/acl.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ConduitConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ConduitConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ConduitConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CONDUIT_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConduitConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_from(&|name| std::env::var(name).ok())
	}
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn load_from(lookup: Lookup<'_>) -> Result<ConduitConfigLayer, ConfigError> {
	let env = Env(lookup);
	Ok(ConduitConfigLayer {
		database: Some(DatabaseConfigLayer {
			url: env.var("CONDUIT_DATABASE_URL"),
		}),
		flow: Some(FlowConfigLayer {
			max_depth: env.parsed("CONDUIT_FLOW_MAX_DEPTH")?,
			quick_listing: env.bool("CONDUIT_FLOW_QUICK_LISTING"),
		}),
		control: Some(ControlConfigLayer {
			queue_capacity: env.parsed("CONDUIT_CONTROL_QUEUE_CAPACITY")?,
			overflow_policy: env.overflow_policy("CONDUIT_CONTROL_OVERFLOW_POLICY")?,
			tracing_sink: env.bool("CONDUIT_CONTROL_TRACING_SINK"),
			sqlite_sink: env.bool("CONDUIT_CONTROL_SQLITE_SINK"),
		}),
		logging: Some(LoggingConfigLayer {
			level: env.var("CONDUIT_LOG_LEVEL"),
			format: env.log_format("CONDUIT_LOG_FORMAT")?,
		}),
	})
}

struct Env<'a>(Lookup<'a>);

impl Env<'_> {
	fn var(&self, name: &str) -> Option<String> {
		(self.0)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid numeric value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn overflow_policy(&self, name: &str) -> Result<Option<QueueOverflowPolicy>, ConfigError> {
		self
			.var(name)
			.map(|v| match v.to_lowercase().as_str() {
				"block" => Ok(QueueOverflowPolicy::Block),
				"drop_newest" => Ok(QueueOverflowPolicy::DropNewest),
				_ => Err(ConfigError::InvalidValue {
					key: name.to_string(),
					message: format!("expected 'block' or 'drop_newest', got '{v}'"),
				}),
			})
			.transpose()
	}

	fn log_format(&self, name: &str) -> Result<Option<LogFormat>, ConfigError> {
		self
			.var(name)
			.map(|v| match v.to_lowercase().as_str() {
				"pretty" => Ok(LogFormat::Pretty),
				"json" => Ok(LogFormat::Json),
				_ => Err(ConfigError::InvalidValue {
					key: name.to_string(),
					message: format!("expected 'pretty' or 'json', got '{v}'"),
				}),
			})
			.transpose()
	}
}
