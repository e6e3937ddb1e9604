// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

pub mod control;
pub mod database;
pub mod flow;
pub mod logging;

pub use control::{ControlConfig, ControlConfigLayer, QueueOverflowPolicy};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use flow::{FlowConfig, FlowConfigLayer, DEFAULT_MAX_DEPTH};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
