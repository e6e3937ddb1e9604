// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Accessors and accessor-tuple resolution.
//!
//! An [`Accessor`] is anything that can hold a grant: a user, a team or an
//! organization. A request is evaluated against every [`AccessorTuple`] that
//! applies to its [`Principal`] in the request's org context, and grants are
//! OR-combined across those tuples.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::grant::Grant;
use crate::membership::Team;
use crate::store::MembershipStore;
use crate::types::{OrgId, TeamId, UserId};

/// The kind of an accessor, as stored on grant rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorKind {
	User,
	Team,
	Org,
}

impl fmt::Display for AccessorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AccessorKind::User => write!(f, "user"),
			AccessorKind::Team => write!(f, "team"),
			AccessorKind::Org => write!(f, "org"),
		}
	}
}

impl FromStr for AccessorKind {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"user" => Ok(AccessorKind::User),
			"team" => Ok(AccessorKind::Team),
			"org" => Ok(AccessorKind::Org),
			other => Err(format!("unknown accessor kind '{other}'")),
		}
	}
}

/// A principal able to hold grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Accessor {
	User(UserId),
	Team(TeamId),
	Org(OrgId),
}

impl Accessor {
	pub fn kind(&self) -> AccessorKind {
		match self {
			Accessor::User(_) => AccessorKind::User,
			Accessor::Team(_) => AccessorKind::Team,
			Accessor::Org(_) => AccessorKind::Org,
		}
	}

	pub fn id(&self) -> Uuid {
		match self {
			Accessor::User(id) => id.into_inner(),
			Accessor::Team(id) => id.into_inner(),
			Accessor::Org(id) => id.into_inner(),
		}
	}

	pub fn from_parts(kind: AccessorKind, id: Uuid) -> Self {
		match kind {
			AccessorKind::User => Accessor::User(UserId::new(id)),
			AccessorKind::Team => Accessor::Team(TeamId::new(id)),
			AccessorKind::Org => Accessor::Org(OrgId::new(id)),
		}
	}
}

impl fmt::Display for Accessor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind(), self.id())
	}
}

/// One accessor identity that applies to a request.
///
/// `org_id` is only set on user tuples and must equal the grant's
/// `accessor_org_id` for the grant to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccessorTuple {
	pub accessor: Accessor,
	pub org_id: Option<OrgId>,
}

impl AccessorTuple {
	pub fn user(user_id: UserId, org_id: Option<OrgId>) -> Self {
		Self {
			accessor: Accessor::User(user_id),
			org_id,
		}
	}

	pub fn team(team_id: TeamId) -> Self {
		Self {
			accessor: Accessor::Team(team_id),
			org_id: None,
		}
	}

	pub fn org(org_id: OrgId) -> Self {
		Self {
			accessor: Accessor::Org(org_id),
			org_id: None,
		}
	}

	/// Returns true if `grant` was issued to this tuple.
	pub fn matches(&self, grant: &Grant) -> bool {
		if grant.accessor != self.accessor {
			return false;
		}
		match self.accessor {
			Accessor::User(_) => grant.accessor_org_id == self.org_id,
			Accessor::Team(_) | Accessor::Org(_) => true,
		}
	}
}

/// Returns true if any tuple matches the grant.
pub fn any_tuple_matches(tuples: &[AccessorTuple], grant: &Grant) -> bool {
	tuples.iter().any(|t| t.matches(grant))
}

/// The identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
	User { id: UserId },
	Team { team: Team },
	Org { id: OrgId },
}

impl Principal {
	pub fn user(id: UserId) -> Self {
		Principal::User { id }
	}

	pub fn team(team: Team) -> Self {
		Principal::Team { team }
	}

	pub fn org(id: OrgId) -> Self {
		Principal::Org { id }
	}

	/// The principal as a grant accessor.
	pub fn accessor(&self) -> Accessor {
		match self {
			Principal::User { id } => Accessor::User(*id),
			Principal::Team { team } => Accessor::Team(team.id),
			Principal::Org { id } => Accessor::Org(*id),
		}
	}

	pub fn user_id(&self) -> Option<UserId> {
		match self {
			Principal::User { id } => Some(*id),
			_ => None,
		}
	}
}

/// Enumerates every accessor tuple that applies to `principal` in `org`.
///
/// - Org principal: the org tuple.
/// - Team principal: the team tuple, plus the org tuple when the team belongs to `org`.
/// - User principal: the user tuple scoped to `org`, one team tuple per team the user
///   belongs to inside `org`, plus the org tuple when `org` is present.
///
/// The result is sorted and free of duplicates.
#[instrument(skip(principal, memberships), fields(principal = %principal.accessor(), org_id = ?org))]
pub async fn resolve_accessor_tuples(
	principal: &Principal,
	org: Option<OrgId>,
	memberships: &dyn MembershipStore,
) -> Result<Vec<AccessorTuple>> {
	let mut tuples = BTreeSet::new();

	match principal {
		Principal::Org { id } => {
			tuples.insert(AccessorTuple::org(*id));
		}
		Principal::Team { team } => {
			tuples.insert(AccessorTuple::team(team.id));
			if org == Some(team.org_id) {
				tuples.insert(AccessorTuple::org(team.org_id));
			}
		}
		Principal::User { id } => {
			tuples.insert(AccessorTuple::user(*id, org));
			if let Some(org_id) = org {
				for team in memberships.teams_for_user(*id).await? {
					if team.org_id == org_id {
						tuples.insert(AccessorTuple::team(team.id));
					}
				}
				tuples.insert(AccessorTuple::org(org_id));
			}
		}
	}

	tracing::debug!(count = tuples.len(), "resolved accessor tuples");
	Ok(tuples.into_iter().collect())
}
