// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use conduit_acl::PublishError;
use thiserror::Error;

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Error, Debug)]
pub enum ControlError {
	#[error("control event queue is at capacity")]
	QueueFull,

	#[error("sink '{sink}' error: {source}")]
	SinkError {
		sink: String,
		#[source]
		source: ControlSinkError,
	},

	#[error("control plane is shutting down")]
	Shutdown,
}

#[derive(Error, Debug)]
pub enum ControlSinkError {
	#[error("transient error: {0}")]
	Transient(String),

	#[error("permanent error: {0}")]
	Permanent(String),
}

impl From<ControlError> for PublishError {
	fn from(err: ControlError) -> Self {
		match err {
			ControlError::QueueFull => PublishError::QueueFull,
			ControlError::Shutdown => PublishError::Shutdown,
			other => PublishError::Rejected(other.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn queue_full_maps_to_publish_queue_full() {
		assert!(matches!(PublishError::from(ControlError::QueueFull), PublishError::QueueFull));
		assert!(matches!(PublishError::from(ControlError::Shutdown), PublishError::Shutdown));
	}

	#[test]
	fn sink_errors_are_rejections() {
		let err = ControlError::SinkError {
			sink: "sqlite".to_string(),
			source: ControlSinkError::Permanent("table missing".to_string()),
		};
		assert!(matches!(PublishError::from(err), PublishError::Rejected(msg) if msg.contains("sqlite")));
	}
}
