// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant lifecycle propagation.
//!
//! When a grant on a data set is created, destroyed or changes its sharing
//! capability, every active set derived directly from that set is checked.
//! Children whose access to the parent comes from this very grant receive an
//! `activate` or `pause` control event. Children covered by default org
//! administration or by some other grant get nothing.
//!
//! Lookup failures during the check deny rather than abort, and publish
//! failures are logged and counted without failing the lifecycle change.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::accessor::Accessor;
use crate::error::{PublishError, Result};
use crate::grant::Grant;
use crate::resource::DataSet;
use crate::store::{MembershipStore, ResourceStore};
use crate::types::{GrantId, OrgId, ResourceRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlEventKind {
	Activate,
	Pause,
}

impl fmt::Display for ControlEventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ControlEventKind::Activate => write!(f, "activate"),
			ControlEventKind::Pause => write!(f, "pause"),
		}
	}
}

impl FromStr for ControlEventKind {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"activate" => Ok(ControlEventKind::Activate),
			"pause" => Ok(ControlEventKind::Pause),
			other => Err(format!("unknown control event kind '{other}'")),
		}
	}
}

/// A request to the pipeline control plane to change a resource's runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
	pub id: Uuid,
	pub resource: ResourceRef,
	pub kind: ControlEventKind,
	/// Grant whose lifecycle change caused the event.
	pub grant_id: GrantId,
	pub created_at: DateTime<Utc>,
}

impl ControlEvent {
	pub fn new(resource: ResourceRef, kind: ControlEventKind, grant_id: GrantId) -> Self {
		Self {
			id: Uuid::new_v4(),
			resource,
			kind,
			grant_id,
			created_at: Utc::now(),
		}
	}
}

/// Publishes control events to the pipeline runtime.
///
/// Delivery is the emitter's concern; callers never retry.
#[async_trait]
pub trait ControlEventEmitter: Send + Sync {
	async fn publish(&self, event: ControlEvent) -> std::result::Result<(), PublishError>;
}

/// What a single propagation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
	/// Events accepted by the emitter.
	pub events: Vec<ControlEvent>,
	/// Events the emitter refused.
	pub failed: usize,
	/// Children skipped because they are not active.
	pub inactive: usize,
}

impl PropagationReport {
	pub fn is_empty(&self) -> bool {
		self.events.is_empty() && self.failed == 0
	}

	pub fn published(&self) -> usize {
		self.events.len()
	}

	pub fn merge(&mut self, other: PropagationReport) {
		self.events.extend(other.events);
		self.failed += other.failed;
		self.inactive += other.inactive;
	}
}

#[derive(Clone)]
pub struct AclPropagator {
	resources: Arc<dyn ResourceStore>,
	memberships: Arc<dyn MembershipStore>,
	emitter: Arc<dyn ControlEventEmitter>,
}

impl AclPropagator {
	pub fn new(
		resources: Arc<dyn ResourceStore>,
		memberships: Arc<dyn MembershipStore>,
		emitter: Arc<dyn ControlEventEmitter>,
	) -> Self {
		Self {
			resources,
			memberships,
			emitter,
		}
	}

	pub async fn on_grant_created(&self, grant: &Grant) -> Result<PropagationReport> {
		self.handle_change(grant, false).await
	}

	pub async fn on_grant_destroyed(&self, grant: &Grant) -> Result<PropagationReport> {
		self.handle_change(grant, true).await
	}

	/// Propagates an in-place role change when it flips the sharing capability.
	///
	/// A promotion is evaluated as a creation of `after`, a demotion as the
	/// destruction of `before`. Changes that keep sharing on or off emit nothing.
	pub async fn on_grant_updated(&self, before: &Grant, after: &Grant) -> Result<PropagationReport> {
		match (before.enables_sharing(), after.enables_sharing()) {
			(false, true) => self.handle_change(after, false).await,
			(true, false) => self.handle_change(before, true).await,
			_ => {
				tracing::debug!(grant_id = %after.id, from = %before.role, to = %after.role, "role change keeps sharing state");
				Ok(PropagationReport::default())
			}
		}
	}

	/// Emits activate or pause events for the children enabled by `grant`.
	#[instrument(skip(self, grant), fields(grant_id = %grant.id, resource = %grant.resource, role = %grant.role))]
	pub async fn handle_change(&self, grant: &Grant, is_destroy: bool) -> Result<PropagationReport> {
		let mut report = PropagationReport::default();
		let sharing_enabled = !is_destroy && grant.enables_sharing();

		let Some(parent_id) = grant.resource.as_set() else {
			tracing::trace!("grant target has no derived children");
			return Ok(report);
		};

		// Without the parent the default-admin check cannot run, so no child is enabled.
		let parent_org = match self.resources.get_data_set(parent_id).await {
			Ok(Some(parent)) => parent.org_id,
			Ok(None) => {
				tracing::warn!(set_id = %parent_id, "parent data set missing, nothing propagated");
				return Ok(report);
			}
			Err(e) => {
				tracing::warn!(set_id = %parent_id, error = %e, "parent lookup failed, nothing propagated");
				return Ok(report);
			}
		};

		let kind = if sharing_enabled {
			ControlEventKind::Activate
		} else {
			ControlEventKind::Pause
		};

		for child in self.resources.child_sets(parent_id).await? {
			if !child.status.is_active() {
				tracing::trace!(child_id = %child.id, status = %child.status, "inactive child skipped");
				report.inactive += 1;
				continue;
			}
			if !self.grant_enables_child(grant, parent_org, &child).await {
				continue;
			}

			let event = ControlEvent::new(child.id.into(), kind, grant.id);
			match self.emitter.publish(event.clone()).await {
				Ok(()) => {
					tracing::debug!(child_id = %child.id, kind = %kind, "control event published");
					report.events.push(event);
				}
				Err(e) => {
					tracing::warn!(child_id = %child.id, kind = %kind, error = %e, "failed to publish control event");
					report.failed += 1;
				}
			}
		}

		if !report.is_empty() {
			tracing::info!(
				published = report.published(),
				failed = report.failed,
				kind = %kind,
				"grant change propagated"
			);
		}
		Ok(report)
	}

	/// Whether `child`'s access to its parent is established by `grant`.
	pub async fn grant_enables_child(
		&self,
		grant: &Grant,
		parent_org: Option<OrgId>,
		child: &DataSet,
	) -> bool {
		if let Some(org) = parent_org.filter(|org| child.org_id == Some(*org)) {
			match self.memberships.org_role(org, child.owner_id).await {
				Ok(Some(role)) if role.is_admin() => {
					tracing::trace!(child_id = %child.id, "child owner administers the org, default access applies");
					return false;
				}
				Ok(_) => {}
				Err(e) => {
					tracing::warn!(child_id = %child.id, error = %e, "org role lookup failed, denying");
					return false;
				}
			}
		}

		if !grant.enables_sharing() || grant.accessor_org_id != child.org_id {
			return false;
		}

		let owner = child.owner_id;
		let enabled = match grant.accessor {
			Accessor::User(user) => Ok(owner == user),
			Accessor::Team(team) => self.memberships.is_team_member(team, owner).await,
			Accessor::Org(org) => match self.memberships.org_exists(org).await {
				Ok(true) => self
					.memberships
					.org_role(org, owner)
					.await
					.map(|role| role.is_some()),
				other => other,
			},
		};

		match enabled {
			Ok(enabled) => enabled,
			Err(e) => {
				tracing::warn!(child_id = %child.id, accessor = %grant.accessor, error = %e, "accessor lookup failed, denying");
				false
			}
		}
	}
}
