// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant lookup and effective-role evaluation.
//!
//! [`AccessControl`] answers three questions on top of the injected stores:
//!
//! 1. Which grants apply to a set of accessor tuples ([`AccessControl::grants_for`])
//! 2. Which role a set of tuples holds on one resource ([`AccessControl::effective_role`])
//! 3. Whether a [`Viewpoint`] may see or act on a node, combining default
//!    visibility with grants ([`AccessControl::effective_access`])
//!
//! Status filtering is applied after grant lookup because status lives on
//! the resource, not on the grant.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::instrument;

use crate::accessor::{any_tuple_matches, AccessorTuple};
use crate::error::{AclError, Result};
use crate::grant::Grant;
use crate::resource::ResourceNode;
use crate::role::Role;
use crate::store::{GrantStore, ResourceStore};
use crate::types::{ResourceRef, ResourceStatus};
use crate::viewpoint::Viewpoint;

#[derive(Clone)]
pub struct AccessControl {
	grants: Arc<dyn GrantStore>,
	resources: Arc<dyn ResourceStore>,
}

impl AccessControl {
	pub fn new(grants: Arc<dyn GrantStore>, resources: Arc<dyn ResourceStore>) -> Self {
		Self { grants, resources }
	}

	/// Returns the union of grants matching any tuple, deduplicated by id.
	#[instrument(skip(self, tuples), fields(tuple_count = tuples.len()))]
	pub async fn grants_for(&self, tuples: &[AccessorTuple]) -> Result<Vec<Grant>> {
		if tuples.is_empty() {
			return Ok(Vec::new());
		}

		let mut seen = HashSet::new();
		let grants: Vec<Grant> = self
			.grants
			.grants_for_tuples(tuples)
			.await?
			.into_iter()
			.filter(|g| any_tuple_matches(tuples, g))
			.filter(|g| seen.insert(g.id))
			.collect();

		tracing::debug!(count = grants.len(), "grants resolved for tuples");
		Ok(grants)
	}

	/// Returns the highest-capability role the tuples hold on `resource` through grants.
	///
	/// # Errors
	/// Returns [`AclError::NotFound`] if the resource does not exist.
	#[instrument(skip(self, tuples), fields(resource = %resource))]
	pub async fn effective_role(
		&self,
		tuples: &[AccessorTuple],
		resource: ResourceRef,
	) -> Result<Option<Role>> {
		if self.resources.get_node(resource).await?.is_none() {
			return Err(AclError::resource_not_found(resource));
		}
		self.granted_role(tuples, resource).await
	}

	async fn granted_role(
		&self,
		tuples: &[AccessorTuple],
		resource: ResourceRef,
	) -> Result<Option<Role>> {
		let role = self
			.grants
			.grants_for_resource(resource)
			.await?
			.into_iter()
			.filter(|g| any_tuple_matches(tuples, g))
			.map(|g| g.role)
			.max();
		Ok(role)
	}

	/// Keeps the grants whose target resource currently has `status`.
	///
	/// Grants on resources that no longer exist are dropped.
	#[instrument(skip(self, grants), fields(count = grants.len(), status = %status))]
	pub async fn filter_by_status(
		&self,
		grants: Vec<Grant>,
		status: ResourceStatus,
	) -> Result<Vec<Grant>> {
		let mut kept = Vec::with_capacity(grants.len());
		for grant in grants {
			match self.resources.get_node(grant.resource).await? {
				Some(node) if node.status() == status => kept.push(grant),
				Some(_) => {}
				None => {
					tracing::debug!(grant_id = %grant.id, resource = %grant.resource, "grant target missing, dropped");
				}
			}
		}
		Ok(kept)
	}

	/// The strongest role `viewpoint` holds on `node`, by default visibility or grant.
	pub async fn effective_access(
		&self,
		viewpoint: &Viewpoint,
		node: &ResourceNode,
	) -> Result<Option<Role>> {
		let default = viewpoint.default_role(node);
		if default == Some(Role::Owner) {
			return Ok(default);
		}
		let granted = self
			.granted_role(viewpoint.tuples(), node.resource_ref())
			.await?;
		Ok(default.max(granted))
	}

	/// Returns true if `viewpoint` may see `node`. Lookup failures deny.
	pub async fn can_view(&self, viewpoint: &Viewpoint, node: &ResourceNode) -> bool {
		match self.effective_access(viewpoint, node).await {
			Ok(role) => role.is_some_and(|r| r.enables(Role::Viewer)),
			Err(e) => {
				tracing::warn!(resource = %node.resource_ref(), error = %e, "visibility lookup failed, denying");
				false
			}
		}
	}

	/// Returns true if `viewpoint` holds at least `required` on `resource`.
	///
	/// # Errors
	/// Returns [`AclError::NotFound`] if the resource does not exist.
	#[instrument(skip(self, viewpoint), fields(principal = %viewpoint.accessor(), resource = %resource, required = %required))]
	pub async fn check(
		&self,
		viewpoint: &Viewpoint,
		resource: ResourceRef,
		required: Role,
	) -> Result<bool> {
		let node = self
			.resources
			.get_node(resource)
			.await?
			.ok_or_else(|| AclError::resource_not_found(resource))?;
		let role = self.effective_access(viewpoint, &node).await?;
		let allowed = role.is_some_and(|r| r.enables(required));
		tracing::debug!(?role, allowed, "access check evaluated");
		Ok(allowed)
	}
}
