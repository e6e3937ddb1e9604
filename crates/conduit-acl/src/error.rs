// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::types::{ResourceRef, SetId};

pub type Result<T> = std::result::Result<T, AclError>;

#[derive(Debug, Error)]
pub enum AclError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("invalid resource graph: {0}")]
	InvalidGraph(#[from] GraphError),

	#[error("invalid grant: {0}")]
	InvalidGrant(String),

	#[error("store error: {0}")]
	Store(#[from] StoreError),

	#[error("control event publish failed: {0}")]
	Publish(#[from] PublishError),
}

impl AclError {
	pub fn resource_not_found(resource: ResourceRef) -> Self {
		AclError::NotFound(format!("resource {resource}"))
	}
}

/// Structural problems in the set-derivation graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
	#[error("derivation cycle through data set {set_id}")]
	Cycle { set_id: SetId },

	#[error("traversal exceeded maximum depth of {limit}")]
	DepthExceeded { limit: usize },
}

/// Errors returned by storage collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("storage backend error: {0}")]
	Backend(String),

	#[error("corrupt record: {0}")]
	Corrupt(String),
}

/// Errors returned by a control event emitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
	#[error("control event queue is at capacity")]
	QueueFull,

	#[error("control plane is shutting down")]
	Shutdown,

	#[error("control plane rejected event: {0}")]
	Rejected(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn graph_errors_are_distinct_from_not_found() {
		let err = AclError::from(GraphError::Cycle {
			set_id: SetId::generate(),
		});
		assert!(matches!(err, AclError::InvalidGraph(GraphError::Cycle { .. })));
		assert!(err.to_string().contains("derivation cycle"));
	}

	#[test]
	fn resource_not_found_names_resource() {
		let set = SetId::generate();
		let err = AclError::resource_not_found(ResourceRef::Set(set));
		assert_eq!(err.to_string(), format!("not found: resource set:{set}"));
	}
}
