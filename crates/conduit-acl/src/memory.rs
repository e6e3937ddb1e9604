// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory implementations of the store and emitter seams.
//!
//! Used by tests and by embedders that keep the resource graph in memory.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::accessor::{any_tuple_matches, AccessorTuple};
use crate::error::{PublishError, StoreError};
use crate::grant::Grant;
use crate::membership::{OrgMembership, Team, TeamMembership};
use crate::propagate::{ControlEvent, ControlEventEmitter};
use crate::resource::{DataSet, DataSink, DataSource, FlowLink, ResourceNode};
use crate::role::Role;
use crate::store::{GrantStore, MembershipStore, ResourceStore};
use crate::types::{
	GrantId, OrgId, OrgRole, ResourceRef, ResourceStatus, SetId, SinkId, SourceId, TeamId,
	TeamRole, UserId,
};

#[derive(Default)]
struct State {
	grants: Vec<Grant>,
	sources: HashMap<SourceId, DataSource>,
	sets: HashMap<SetId, DataSet>,
	sinks: HashMap<SinkId, DataSink>,
	flow_links: Vec<FlowLink>,
	teams: HashMap<TeamId, Team>,
	team_memberships: Vec<TeamMembership>,
	orgs: Vec<OrgId>,
	org_memberships: Vec<OrgMembership>,
}

/// Grants, resources and memberships held in process memory.
#[derive(Default)]
pub struct InMemoryStore {
	state: RwLock<State>,
}

impl InMemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_source(&self, source: DataSource) {
		self.state.write().sources.insert(source.id, source);
	}

	pub fn add_set(&self, set: DataSet) {
		self.state.write().sets.insert(set.id, set);
	}

	pub fn add_sink(&self, sink: DataSink) {
		self.state.write().sinks.insert(sink.id, sink);
	}

	pub fn add_flow_link(&self, link: FlowLink) {
		self.state.write().flow_links.push(link);
	}

	pub fn add_grant(&self, grant: Grant) {
		self.state.write().grants.push(grant);
	}

	pub fn add_org(&self, org: OrgId) {
		let mut state = self.state.write();
		if !state.orgs.contains(&org) {
			state.orgs.push(org);
		}
	}

	/// Adds a member, or changes the role of an existing one.
	pub fn add_org_member(&self, org: OrgId, user: UserId, role: OrgRole) {
		self.add_org(org);
		let mut state = self.state.write();
		let existing = state
			.org_memberships
			.iter()
			.position(|m| m.org_id == org && m.user_id == user);
		match existing {
			Some(i) => state.org_memberships[i].role = role,
			None => state.org_memberships.push(OrgMembership::new(org, user, role)),
		}
	}

	pub fn add_team(&self, team: Team) {
		self.add_org(team.org_id);
		self.state.write().teams.insert(team.id, team);
	}

	/// Adds a member, or changes the role of an existing one.
	pub fn add_team_member(&self, team: TeamId, user: UserId, role: TeamRole) {
		let mut state = self.state.write();
		let existing = state
			.team_memberships
			.iter()
			.position(|m| m.team_id == team && m.user_id == user);
		match existing {
			Some(i) => state.team_memberships[i].role = role,
			None => state.team_memberships.push(TeamMembership::new(team, user, role)),
		}
	}

	/// Sets the status of any resource; unknown resources are ignored.
	pub fn set_status(&self, resource: ResourceRef, status: ResourceStatus) {
		let mut state = self.state.write();
		match resource {
			ResourceRef::Source(id) => {
				if let Some(s) = state.sources.get_mut(&id) {
					s.status = status;
				}
			}
			ResourceRef::Set(id) => {
				if let Some(s) = state.sets.get_mut(&id) {
					s.status = status;
				}
			}
			ResourceRef::Sink(id) => {
				if let Some(s) = state.sinks.get_mut(&id) {
					s.status = status;
				}
			}
		}
	}

	pub fn grants(&self) -> Vec<Grant> {
		self.state.read().grants.clone()
	}
}

#[async_trait]
impl GrantStore for InMemoryStore {
	async fn create_grant(&self, grant: &Grant) -> Result<(), StoreError> {
		let mut state = self.state.write();
		if state.grants.iter().any(|g| g.id == grant.id) {
			return Err(StoreError::Backend(format!("grant {} already exists", grant.id)));
		}
		state.grants.push(grant.clone());
		Ok(())
	}

	async fn get_grant(&self, id: GrantId) -> Result<Option<Grant>, StoreError> {
		Ok(self.state.read().grants.iter().find(|g| g.id == id).cloned())
	}

	async fn update_grant_role(&self, id: GrantId, role: Role) -> Result<Option<Grant>, StoreError> {
		let mut state = self.state.write();
		Ok(state.grants.iter_mut().find(|g| g.id == id).map(|g| {
			*g = g.with_role(role);
			g.clone()
		}))
	}

	async fn delete_grant(&self, id: GrantId) -> Result<Option<Grant>, StoreError> {
		let mut state = self.state.write();
		let position = state.grants.iter().position(|g| g.id == id);
		Ok(position.map(|i| state.grants.remove(i)))
	}

	async fn delete_grants_for_resource(
		&self,
		resource: ResourceRef,
	) -> Result<Vec<Grant>, StoreError> {
		let mut state = self.state.write();
		let (removed, kept): (Vec<_>, Vec<_>) = state
			.grants
			.drain(..)
			.partition(|g| g.resource == resource);
		state.grants = kept;
		Ok(removed)
	}

	async fn grants_for_tuples(&self, tuples: &[AccessorTuple]) -> Result<Vec<Grant>, StoreError> {
		Ok(self
			.state
			.read()
			.grants
			.iter()
			.filter(|g| any_tuple_matches(tuples, g))
			.cloned()
			.collect())
	}

	async fn grants_for_resource(&self, resource: ResourceRef) -> Result<Vec<Grant>, StoreError> {
		Ok(self
			.state
			.read()
			.grants
			.iter()
			.filter(|g| g.resource == resource)
			.cloned()
			.collect())
	}
}

#[async_trait]
impl ResourceStore for InMemoryStore {
	async fn get_node(&self, resource: ResourceRef) -> Result<Option<ResourceNode>, StoreError> {
		let state = self.state.read();
		Ok(match resource {
			ResourceRef::Source(id) => state.sources.get(&id).cloned().map(ResourceNode::Source),
			ResourceRef::Set(id) => state.sets.get(&id).cloned().map(ResourceNode::Set),
			ResourceRef::Sink(id) => state.sinks.get(&id).cloned().map(ResourceNode::Sink),
		})
	}

	async fn get_data_set(&self, id: SetId) -> Result<Option<DataSet>, StoreError> {
		Ok(self.state.read().sets.get(&id).cloned())
	}

	async fn child_sets(&self, parent: SetId) -> Result<Vec<DataSet>, StoreError> {
		let mut sets: Vec<_> = self
			.state
			.read()
			.sets
			.values()
			.filter(|s| s.parent_set_id == Some(parent))
			.cloned()
			.collect();
		sets.sort_by_key(|s| s.id);
		Ok(sets)
	}

	async fn sets_for_source(&self, source: SourceId) -> Result<Vec<DataSet>, StoreError> {
		let mut sets: Vec<_> = self
			.state
			.read()
			.sets
			.values()
			.filter(|s| s.parent_set_id.is_none() && s.data_source_id == Some(source))
			.cloned()
			.collect();
		sets.sort_by_key(|s| s.id);
		Ok(sets)
	}

	async fn sinks_for_set(&self, set: SetId) -> Result<Vec<DataSink>, StoreError> {
		let mut sinks: Vec<_> = self
			.state
			.read()
			.sinks
			.values()
			.filter(|s| s.data_set_id == Some(set))
			.cloned()
			.collect();
		sinks.sort_by_key(|s| s.id);
		Ok(sinks)
	}

	async fn flow_links_from_sink(&self, sink: SinkId) -> Result<Vec<FlowLink>, StoreError> {
		Ok(self
			.state
			.read()
			.flow_links
			.iter()
			.filter(|l| l.sink_id == sink)
			.cloned()
			.collect())
	}

	async fn flow_links_to_source(&self, source: SourceId) -> Result<Vec<FlowLink>, StoreError> {
		Ok(self
			.state
			.read()
			.flow_links
			.iter()
			.filter(|l| l.source_id == source)
			.cloned()
			.collect())
	}

	async fn sources_owned_by(
		&self,
		owner: UserId,
		org: Option<OrgId>,
	) -> Result<Vec<DataSource>, StoreError> {
		let mut sources: Vec<_> = self
			.state
			.read()
			.sources
			.values()
			.filter(|s| s.owner_id == owner && s.org_id == org)
			.cloned()
			.collect();
		sources.sort_by_key(|s| s.id);
		Ok(sources)
	}
}

#[async_trait]
impl MembershipStore for InMemoryStore {
	async fn get_team(&self, id: TeamId) -> Result<Option<Team>, StoreError> {
		Ok(self.state.read().teams.get(&id).cloned())
	}

	async fn teams_for_user(&self, user: UserId) -> Result<Vec<Team>, StoreError> {
		let state = self.state.read();
		Ok(state
			.team_memberships
			.iter()
			.filter(|m| m.user_id == user)
			.filter_map(|m| state.teams.get(&m.team_id).cloned())
			.collect())
	}

	async fn is_team_member(&self, team: TeamId, user: UserId) -> Result<bool, StoreError> {
		Ok(self
			.state
			.read()
			.team_memberships
			.iter()
			.any(|m| m.team_id == team && m.user_id == user))
	}

	async fn org_exists(&self, org: OrgId) -> Result<bool, StoreError> {
		Ok(self.state.read().orgs.contains(&org))
	}

	async fn org_role(&self, org: OrgId, user: UserId) -> Result<Option<OrgRole>, StoreError> {
		Ok(self
			.state
			.read()
			.org_memberships
			.iter()
			.find(|m| m.org_id == org && m.user_id == user)
			.map(|m| m.role))
	}
}

/// An emitter that records every published event.
#[derive(Default)]
pub struct RecordingEmitter {
	events: RwLock<Vec<ControlEvent>>,
	fail_with: RwLock<Option<PublishError>>,
}

impl RecordingEmitter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every subsequent publish fail with `error`.
	pub fn fail_with(&self, error: PublishError) {
		*self.fail_with.write() = Some(error);
	}

	pub fn events(&self) -> Vec<ControlEvent> {
		self.events.read().clone()
	}
}

#[async_trait]
impl ControlEventEmitter for RecordingEmitter {
	async fn publish(&self, event: ControlEvent) -> Result<(), PublishError> {
		if let Some(error) = self.fail_with.read().clone() {
			return Err(error);
		}
		self.events.write().push(event);
		Ok(())
	}
}
