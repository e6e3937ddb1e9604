// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Teams and membership records consulted by the resolver and propagator.
//!
//! This module provides:
//! - [`Team`] - sub-groups within an organization
//! - [`TeamMembership`] - links users to teams with roles
//! - [`OrgMembership`] - links users to organizations with roles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OrgId, OrgRole, TeamId, TeamRole, UserId};

/// A team within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
	pub id: TeamId,

	/// The organization this team belongs to.
	pub org_id: OrgId,

	pub name: String,

	pub created_at: DateTime<Utc>,
}

impl Team {
	/// Creates a new team with a generated id.
	pub fn new(org_id: OrgId, name: impl Into<String>) -> Self {
		Self {
			id: TeamId::generate(),
			org_id,
			name: name.into(),
			created_at: Utc::now(),
		}
	}
}

/// A user's membership in a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
	pub team_id: TeamId,
	pub user_id: UserId,
	pub role: TeamRole,
	pub created_at: DateTime<Utc>,
}

impl TeamMembership {
	pub fn new(team_id: TeamId, user_id: UserId, role: TeamRole) -> Self {
		Self {
			team_id,
			user_id,
			role,
			created_at: Utc::now(),
		}
	}
}

/// A user's membership in an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMembership {
	pub org_id: OrgId,
	pub user_id: UserId,
	pub role: OrgRole,
	pub created_at: DateTime<Utc>,
}

impl OrgMembership {
	pub fn new(org_id: OrgId, user_id: UserId, role: OrgRole) -> Self {
		Self {
			org_id,
			user_id,
			role,
			created_at: Utc::now(),
		}
	}

	/// Returns true if this member gets default access to every org resource.
	pub fn is_admin(&self) -> bool {
		self.role.is_admin()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_team_generates_unique_ids() {
		let org_id = OrgId::generate();
		let a = Team::new(org_id, "Ingest");
		let b = Team::new(org_id, "Ingest");
		assert_ne!(a.id, b.id);
		assert_eq!(a.org_id, org_id);
	}

	#[test]
	fn org_membership_admin_flag_follows_role() {
		let org_id = OrgId::generate();
		let user_id = UserId::generate();
		assert!(OrgMembership::new(org_id, user_id, OrgRole::Owner).is_admin());
		assert!(OrgMembership::new(org_id, user_id, OrgRole::Admin).is_admin());
		assert!(!OrgMembership::new(org_id, user_id, OrgRole::Member).is_admin());
	}

	#[test]
	fn team_membership_serializes_role() {
		let membership = TeamMembership::new(TeamId::generate(), UserId::generate(), TeamRole::Member);
		let json = serde_json::to_string(&membership).unwrap();
		assert!(json.contains("\"role\":\"member\""));
	}
}
