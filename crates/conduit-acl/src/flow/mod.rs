// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flow graphs: the sources, sets and sinks connected through set
//! derivation and flow links, as seen from one viewpoint.

pub mod builder;
pub mod cache;
pub mod graph;
pub mod listing;
pub mod quick;

pub use builder::{FlowBuilder, FlowOptions, DEFAULT_MAX_DEPTH};
pub use cache::{CacheStats, FlowCache, FlowCacheKey};
pub use graph::{merge_flows, EdgeKind, Flow, FlowEdge};
pub use listing::{FlowService, ListFlowsOptions};
pub use quick::{OwnerGroups, OwnerKey};
