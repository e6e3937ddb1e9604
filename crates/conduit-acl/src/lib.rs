// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access-control resolution and flow propagation for Conduit.
//!
//! - [`role`]: ordered roles and their capability sets
//! - [`accessor`]: accessors, accessor tuples and their resolution
//! - [`acl`]: grant lookup and effective-role evaluation
//! - [`flow`]: flow graph traversal, merging and the request-scoped cache
//! - [`propagate`]: activate/pause events on grant lifecycle changes
//! - [`service`]: grant mutations wired to propagation
//!
//! Storage and event delivery are injected through the traits in [`store`]
//! and [`propagate::ControlEventEmitter`].

pub mod accessor;
pub mod acl;
pub mod error;
pub mod flow;
pub mod grant;
pub mod membership;
pub mod memory;
pub mod propagate;
pub mod resource;
pub mod role;
pub mod service;
pub mod store;
pub mod types;
pub mod viewpoint;

pub use accessor::{
	any_tuple_matches, resolve_accessor_tuples, Accessor, AccessorKind, AccessorTuple, Principal,
};
pub use acl::AccessControl;
pub use error::{AclError, GraphError, PublishError, Result, StoreError};
pub use flow::{
	merge_flows, EdgeKind, Flow, FlowBuilder, FlowCache, FlowCacheKey, FlowEdge, FlowOptions,
	FlowService, ListFlowsOptions, OwnerGroups, OwnerKey,
};
pub use grant::{Grant, GrantRecord};
pub use membership::{OrgMembership, Team, TeamMembership};
pub use propagate::{
	AclPropagator, ControlEvent, ControlEventEmitter, ControlEventKind, PropagationReport,
};
pub use resource::{DataSet, DataSink, DataSource, FlowLink, ResourceNode};
pub use role::{enables_role, Capabilities, Role};
pub use service::{GrantChange, GrantService};
pub use store::{GrantStore, MembershipStore, ResourceStore};
pub use types::{
	FlowLinkId, GrantId, OrgId, OrgRole, ResourceKind, ResourceRef, ResourceStatus, SetId, SinkId,
	SourceId, TeamId, TeamRole, UserId,
};
pub use viewpoint::Viewpoint;
