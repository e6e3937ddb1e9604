// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of activate/pause control events to the pipeline runtime.
//!
//! [`ControlPlaneService`] is the [`conduit_acl::ControlEventEmitter`] used in
//! production: events go through a bounded queue to a background task that
//! hands them to each configured [`ControlSink`].

pub mod error;
pub mod pipeline;
pub mod sink;

pub use error::{ControlError, ControlResult, ControlSinkError};
pub use pipeline::ControlPlaneService;
pub use sink::sqlite::SqliteControlSink;
pub use sink::tracing::TracingControlSink;
pub use sink::ControlSink;

pub use conduit_config::{ControlConfig, QueueOverflowPolicy};
