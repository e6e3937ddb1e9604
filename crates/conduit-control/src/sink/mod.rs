// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use conduit_acl::ControlEvent;

pub use crate::error::ControlSinkError;

#[async_trait]
pub trait ControlSink: Send + Sync {
	/// Unique name for this sink (used in logs).
	fn name(&self) -> &str;

	/// Deliver an event to the sink.
	async fn publish(&self, event: Arc<ControlEvent>) -> Result<(), ControlSinkError>;

	/// Health check (optional, default: Ok).
	async fn health_check(&self) -> Result<(), ControlSinkError> {
		Ok(())
	}
}

pub mod sqlite;
pub mod tracing;
