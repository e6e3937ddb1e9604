// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{ControlConfigLayer, DatabaseConfigLayer, FlowConfigLayer, LoggingConfigLayer};

/// Conduit configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConduitConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub flow: Option<FlowConfigLayer>,
	#[serde(default)]
	pub control: Option<ControlConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ConduitConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ConduitConfigLayer) {
		merge_option(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_option(&mut self.flow, other.flow, FlowConfigLayer::merge);
		merge_option(&mut self.control, other.control, ControlConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_empty_layers() {
		let mut base = ConduitConfigLayer::default();
		base.merge(ConduitConfigLayer::default());
		assert!(base.flow.is_none());
	}

	#[test]
	fn test_merge_other_overwrites() {
		let mut base = ConduitConfigLayer {
			flow: Some(FlowConfigLayer {
				max_depth: Some(16),
				quick_listing: Some(false),
			}),
			..Default::default()
		};
		let other = ConduitConfigLayer {
			flow: Some(FlowConfigLayer {
				max_depth: Some(128),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(other);
		let flow = base.flow.unwrap();
		assert_eq!(flow.max_depth, Some(128));
		assert_eq!(flow.quick_listing, Some(false));
	}

	#[test]
	fn test_merge_adds_missing_sections() {
		let mut base = ConduitConfigLayer {
			flow: Some(FlowConfigLayer {
				max_depth: Some(16),
				..Default::default()
			}),
			..Default::default()
		};
		let other = ConduitConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite::memory:".to_string()),
			}),
			..Default::default()
		};
		base.merge(other);
		assert_eq!(base.flow.unwrap().max_depth, Some(16));
		assert_eq!(base.database.unwrap().url, Some("sqlite::memory:".to_string()));
	}

	#[test]
	fn test_parse_full_file() {
		let layer: ConduitConfigLayer = toml::from_str(
			r#"
[database]
url = "sqlite:/var/lib/conduit/acl.db"

[flow]
max_depth = 32

[control]
queue_capacity = 64
overflow_policy = "block"

[logging]
format = "json"
"#,
		)
		.unwrap();
		assert_eq!(layer.flow.unwrap().max_depth, Some(32));
		assert_eq!(layer.control.unwrap().queue_capacity, Some(64));
		assert!(layer.logging.unwrap().level.is_none());
	}
}
