// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use conduit_acl::{ControlEvent, ControlEventKind};

use super::{ControlSink, ControlSinkError};

/// Writes each control event as a structured log line under `conduit_control`.
#[derive(Debug, Default)]
pub struct TracingControlSink;

impl TracingControlSink {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl ControlSink for TracingControlSink {
	fn name(&self) -> &str {
		"tracing"
	}

	async fn publish(&self, event: Arc<ControlEvent>) -> Result<(), ControlSinkError> {
		let id = event.id.to_string();
		let resource = event.resource.to_string();
		let grant_id = event.grant_id.to_string();
		let created_at = event.created_at.to_rfc3339();

		match event.kind {
			ControlEventKind::Activate => tracing::info!(
				target: "conduit_control",
				id,
				resource,
				grant_id,
				created_at,
				kind = "activate",
				"control event"
			),
			ControlEventKind::Pause => tracing::warn!(
				target: "conduit_control",
				id,
				resource,
				grant_id,
				created_at,
				kind = "pause",
				"control event"
			),
		}
		Ok(())
	}
}
