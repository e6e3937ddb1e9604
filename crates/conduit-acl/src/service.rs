// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant mutations followed by lifecycle propagation.
//!
//! Every mutation writes to the [`GrantStore`] first and only then asks the
//! [`AclPropagator`] for control events. A propagation failure never undoes
//! the stored change.

use std::sync::Arc;

use tracing::instrument;

use crate::accessor::Accessor;
use crate::error::{AclError, Result};
use crate::grant::Grant;
use crate::propagate::{AclPropagator, PropagationReport};
use crate::role::Role;
use crate::store::GrantStore;
use crate::types::{GrantId, OrgId, ResourceRef};

/// A stored grant change and what its propagation emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantChange {
	pub grant: Grant,
	pub report: PropagationReport,
}

#[derive(Clone)]
pub struct GrantService {
	grants: Arc<dyn GrantStore>,
	propagator: AclPropagator,
}

impl GrantService {
	pub fn new(grants: Arc<dyn GrantStore>, propagator: AclPropagator) -> Self {
		Self { grants, propagator }
	}

	#[instrument(skip(self), fields(accessor = %accessor, resource = %resource, role = %role))]
	pub async fn share(
		&self,
		accessor: Accessor,
		accessor_org_id: Option<OrgId>,
		resource: ResourceRef,
		role: Role,
	) -> Result<GrantChange> {
		let grant = Grant::new(accessor, accessor_org_id, resource, role);
		self.grants.create_grant(&grant).await?;
		tracing::info!(grant_id = %grant.id, "grant created");

		let report = settle(grant.id, self.propagator.on_grant_created(&grant).await);
		Ok(GrantChange { grant, report })
	}

	/// Changes a grant's role in place.
	///
	/// # Errors
	/// Returns [`AclError::NotFound`] if the grant does not exist.
	#[instrument(skip(self), fields(grant_id = %id, role = %role))]
	pub async fn change_role(&self, id: GrantId, role: Role) -> Result<GrantChange> {
		let before = self
			.grants
			.get_grant(id)
			.await?
			.ok_or_else(|| grant_not_found(id))?;
		if before.role == role {
			return Ok(GrantChange {
				grant: before,
				report: PropagationReport::default(),
			});
		}

		let after = self
			.grants
			.update_grant_role(id, role)
			.await?
			.ok_or_else(|| grant_not_found(id))?;
		tracing::info!(from = %before.role, "grant role changed");

		let report = settle(id, self.propagator.on_grant_updated(&before, &after).await);
		Ok(GrantChange {
			grant: after,
			report,
		})
	}

	/// Deletes a grant.
	///
	/// # Errors
	/// Returns [`AclError::NotFound`] if the grant does not exist.
	#[instrument(skip(self), fields(grant_id = %id))]
	pub async fn revoke(&self, id: GrantId) -> Result<GrantChange> {
		let grant = self
			.grants
			.delete_grant(id)
			.await?
			.ok_or_else(|| grant_not_found(id))?;
		tracing::info!(resource = %grant.resource, "grant revoked");

		let report = settle(id, self.propagator.on_grant_destroyed(&grant).await);
		Ok(GrantChange { grant, report })
	}

	/// Deletes every grant on `resource`, for use when the resource itself is deleted.
	///
	/// Call this before the resource row is removed. Once a data set is gone
	/// its children can no longer be checked and receive no pause events.
	#[instrument(skip(self), fields(resource = %resource))]
	pub async fn revoke_all_for_resource(&self, resource: ResourceRef) -> Result<Vec<GrantChange>> {
		let removed = self.grants.delete_grants_for_resource(resource).await?;
		tracing::info!(count = removed.len(), "grants removed with resource");

		let mut changes = Vec::with_capacity(removed.len());
		for grant in removed {
			let report = settle(grant.id, self.propagator.on_grant_destroyed(&grant).await);
			changes.push(GrantChange { grant, report });
		}
		Ok(changes)
	}
}

fn grant_not_found(id: GrantId) -> AclError {
	AclError::NotFound(format!("grant {id}"))
}

fn settle(grant_id: GrantId, result: Result<PropagationReport>) -> PropagationReport {
	match result {
		Ok(report) => report,
		Err(e) => {
			tracing::warn!(grant_id = %grant_id, error = %e, "propagation failed after grant change");
			PropagationReport::default()
		}
	}
}
