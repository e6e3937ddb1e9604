// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flow traversal configuration section.

use serde::{Deserialize, Serialize};

/// Default bound on derivation chain length during traversal.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowConfigLayer {
	pub max_depth: Option<usize>,
	pub quick_listing: Option<bool>,
}

impl FlowConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.max_depth.is_some() {
			self.max_depth = other.max_depth;
		}
		if other.quick_listing.is_some() {
			self.quick_listing = other.quick_listing;
		}
	}

	pub fn finalize(self) -> FlowConfig {
		FlowConfig {
			max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
			quick_listing: self.quick_listing.unwrap_or(true),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowConfig {
	pub max_depth: usize,
	/// List visible flows with the owner-grouped traversal.
	pub quick_listing: bool,
}

impl Default for FlowConfig {
	fn default() -> Self {
		FlowConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = FlowConfig::default();
		assert_eq!(config.max_depth, 64);
		assert!(config.quick_listing);
	}

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut base = FlowConfigLayer {
			max_depth: Some(16),
			quick_listing: Some(false),
		};
		base.merge(FlowConfigLayer {
			max_depth: Some(32),
			quick_listing: None,
		});
		assert_eq!(base.max_depth, Some(32));
		assert_eq!(base.quick_listing, Some(false));
	}

	#[test]
	fn test_deserialize_partial() {
		let layer: FlowConfigLayer = toml::from_str("max_depth = 8").unwrap();
		assert_eq!(layer.max_depth, Some(8));
		assert!(layer.quick_listing.is_none());
	}
}
