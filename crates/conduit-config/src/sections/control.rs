// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Control-plane publishing configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// What the publisher does when the event queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueOverflowPolicy {
	#[default]
	DropNewest,
	Block,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ControlConfigLayer {
	pub queue_capacity: Option<usize>,
	pub overflow_policy: Option<QueueOverflowPolicy>,
	pub tracing_sink: Option<bool>,
	pub sqlite_sink: Option<bool>,
}

impl ControlConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.queue_capacity.is_some() {
			self.queue_capacity = other.queue_capacity;
		}
		if other.overflow_policy.is_some() {
			self.overflow_policy = other.overflow_policy;
		}
		if other.tracing_sink.is_some() {
			self.tracing_sink = other.tracing_sink;
		}
		if other.sqlite_sink.is_some() {
			self.sqlite_sink = other.sqlite_sink;
		}
	}

	pub fn finalize(self) -> ControlConfig {
		ControlConfig {
			queue_capacity: self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
			overflow_policy: self.overflow_policy.unwrap_or_default(),
			tracing_sink: self.tracing_sink.unwrap_or(true),
			sqlite_sink: self.sqlite_sink.unwrap_or(false),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlConfig {
	pub queue_capacity: usize,
	pub overflow_policy: QueueOverflowPolicy,
	pub tracing_sink: bool,
	pub sqlite_sink: bool,
}

impl Default for ControlConfig {
	fn default() -> Self {
		ControlConfigLayer::default().finalize()
	}
}
