// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence seams consumed by the engine.
//!
//! The engine never owns storage. Callers inject implementations of these
//! traits (the SQLite repositories in `conduit-db`, or
//! [`InMemoryStore`](crate::memory::InMemoryStore) in tests). Lookups of
//! missing records return `Ok(None)` / empty collections; `Err` is reserved
//! for backend failures.

use async_trait::async_trait;

use crate::accessor::AccessorTuple;
use crate::error::StoreError;
use crate::grant::Grant;
use crate::membership::Team;
use crate::resource::{DataSet, DataSink, DataSource, FlowLink, ResourceNode};
use crate::role::Role;
use crate::types::{GrantId, OrgId, OrgRole, ResourceRef, SetId, SinkId, SourceId, TeamId, UserId};

#[async_trait]
pub trait GrantStore: Send + Sync {
	async fn create_grant(&self, grant: &Grant) -> Result<(), StoreError>;
	async fn get_grant(&self, id: GrantId) -> Result<Option<Grant>, StoreError>;
	/// Sets the role of a grant and returns the updated row.
	async fn update_grant_role(&self, id: GrantId, role: Role) -> Result<Option<Grant>, StoreError>;
	/// Deletes a grant and returns the deleted row.
	async fn delete_grant(&self, id: GrantId) -> Result<Option<Grant>, StoreError>;
	/// Deletes every grant on a resource and returns the deleted rows.
	async fn delete_grants_for_resource(
		&self,
		resource: ResourceRef,
	) -> Result<Vec<Grant>, StoreError>;
	/// Returns grants matching any of the tuples, honoring each tuple's org constraint.
	async fn grants_for_tuples(&self, tuples: &[AccessorTuple]) -> Result<Vec<Grant>, StoreError>;
	async fn grants_for_resource(&self, resource: ResourceRef) -> Result<Vec<Grant>, StoreError>;
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
	async fn get_node(&self, resource: ResourceRef) -> Result<Option<ResourceNode>, StoreError>;
	async fn get_data_set(&self, id: SetId) -> Result<Option<DataSet>, StoreError>;
	/// Sets whose `parent_set_id` is `parent`.
	async fn child_sets(&self, parent: SetId) -> Result<Vec<DataSet>, StoreError>;
	/// Root sets (no parent) reading `source`.
	async fn sets_for_source(&self, source: SourceId) -> Result<Vec<DataSet>, StoreError>;
	async fn sinks_for_set(&self, set: SetId) -> Result<Vec<DataSink>, StoreError>;
	async fn flow_links_from_sink(&self, sink: SinkId) -> Result<Vec<FlowLink>, StoreError>;
	async fn flow_links_to_source(&self, source: SourceId) -> Result<Vec<FlowLink>, StoreError>;
	async fn sources_owned_by(
		&self,
		owner: UserId,
		org: Option<OrgId>,
	) -> Result<Vec<DataSource>, StoreError>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
	async fn get_team(&self, id: TeamId) -> Result<Option<Team>, StoreError>;
	async fn teams_for_user(&self, user: UserId) -> Result<Vec<Team>, StoreError>;
	async fn is_team_member(&self, team: TeamId, user: UserId) -> Result<bool, StoreError>;
	async fn org_exists(&self, org: OrgId) -> Result<bool, StoreError>;
	async fn org_role(&self, org: OrgId, user: UserId) -> Result<Option<OrgRole>, StoreError>;
}
