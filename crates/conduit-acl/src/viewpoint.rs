// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The resolved identity a request evaluates access from.
//!
//! A [`Viewpoint`] is computed once per request: it carries the principal,
//! the org context, every applicable accessor tuple and whether the
//! principal administers the org. Default visibility (ownership and org
//! administration) is evaluated here without touching grants.

use serde::Serialize;
use uuid::Uuid;

use crate::accessor::{resolve_accessor_tuples, Accessor, AccessorTuple, Principal};
use crate::error::Result;
use crate::resource::ResourceNode;
use crate::role::Role;
use crate::store::MembershipStore;
use crate::types::OrgId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Viewpoint {
	principal: Principal,
	org_id: Option<OrgId>,
	tuples: Vec<AccessorTuple>,
	org_admin: bool,
}

impl Viewpoint {
	/// Resolves the accessor tuples and org-admin status of `principal` in `org`.
	pub async fn resolve(
		principal: Principal,
		org: Option<OrgId>,
		memberships: &dyn MembershipStore,
	) -> Result<Self> {
		let tuples = resolve_accessor_tuples(&principal, org, memberships).await?;
		let org_admin = match (&principal, org) {
			(Principal::User { id }, Some(org_id)) => memberships
				.org_role(org_id, *id)
				.await?
				.map(|role| role.is_admin())
				.unwrap_or(false),
			(Principal::Org { id }, Some(org_id)) => *id == org_id,
			_ => false,
		};

		Ok(Self {
			principal,
			org_id: org,
			tuples,
			org_admin,
		})
	}

	/// Builds a viewpoint from already-resolved parts.
	pub fn from_parts(
		principal: Principal,
		org_id: Option<OrgId>,
		tuples: Vec<AccessorTuple>,
		org_admin: bool,
	) -> Self {
		Self {
			principal,
			org_id,
			tuples,
			org_admin,
		}
	}

	pub fn principal(&self) -> &Principal {
		&self.principal
	}

	pub fn accessor(&self) -> Accessor {
		self.principal.accessor()
	}

	pub fn principal_id(&self) -> Uuid {
		self.accessor().id()
	}

	pub fn org_id(&self) -> Option<OrgId> {
		self.org_id
	}

	pub fn tuples(&self) -> &[AccessorTuple] {
		&self.tuples
	}

	pub fn is_org_admin(&self) -> bool {
		self.org_admin
	}

	/// The role implied by ownership or org administration, ignoring grants.
	pub fn default_role(&self, node: &ResourceNode) -> Option<Role> {
		match &self.principal {
			Principal::User { id } => {
				if node.owner_id() == *id {
					return Some(Role::Owner);
				}
				if self.org_admin && self.org_id.is_some() && node.org_id() == self.org_id {
					return Some(Role::Admin);
				}
				None
			}
			Principal::Org { id } => (node.org_id() == Some(*id)).then_some(Role::Admin),
			Principal::Team { .. } => None,
		}
	}
}
