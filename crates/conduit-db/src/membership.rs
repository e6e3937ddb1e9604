// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization and team membership repository.
//!
//! This module provides database access for:
//! - Organizations
//! - Org memberships (owners, admins, members)
//! - Teams and team memberships

use async_trait::async_trait;
use chrono::Utc;
use conduit_acl::{
	MembershipStore, OrgId, OrgMembership, OrgRole, StoreError, Team, TeamId, TeamMembership,
	TeamRole, UserId,
};
use sqlx::{
	sqlite::{SqlitePool, SqliteRow},
	Row,
};

use crate::error::{conflict_on_unique, DbError};
use crate::rows;

#[derive(Clone)]
pub struct MembershipRepository {
	pool: SqlitePool,
}

impl MembershipRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, name), fields(org_id = %id))]
	pub async fn create_org(&self, id: OrgId, name: &str) -> Result<(), DbError> {
		sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?, ?, ?)")
			.bind(id.to_string())
			.bind(name)
			.bind(Utc::now().to_rfc3339())
			.execute(&self.pool)
			.await
			.map_err(|e| conflict_on_unique(e, format!("organization {id} already exists")))?;

		tracing::debug!(org_id = %id, "organization created");
		Ok(())
	}

	/// Add a member to an organization.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the user is already a member.
	#[tracing::instrument(skip(self, membership), fields(org_id = %membership.org_id, user_id = %membership.user_id, role = %membership.role))]
	pub async fn add_org_member(&self, membership: &OrgMembership) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO org_memberships (org_id, user_id, role, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(membership.org_id.to_string())
		.bind(membership.user_id.to_string())
		.bind(membership.role.to_string())
		.bind(membership.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| {
			conflict_on_unique(
				e,
				format!("user {} is already a member of {}", membership.user_id, membership.org_id),
			)
		})?;

		tracing::debug!("member added to organization");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id, role = %role))]
	pub async fn update_org_member_role(
		&self,
		org_id: OrgId,
		user_id: UserId,
		role: OrgRole,
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE org_memberships
			SET role = ?
			WHERE org_id = ? AND user_id = ?
			"#,
		)
		.bind(role.to_string())
		.bind(org_id.to_string())
		.bind(user_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	/// Remove a member from an organization.
	///
	/// # Returns
	/// `true` if a member was removed, `false` if not found.
	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id))]
	pub async fn remove_org_member(&self, org_id: OrgId, user_id: UserId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM org_memberships WHERE org_id = ? AND user_id = ?")
			.bind(org_id.to_string())
			.bind(user_id.to_string())
			.execute(&self.pool)
			.await?;

		let removed = result.rows_affected() > 0;
		if removed {
			tracing::debug!(org_id = %org_id, user_id = %user_id, "member removed from organization");
		}
		Ok(removed)
	}

	#[tracing::instrument(skip(self, team), fields(team_id = %team.id, org_id = %team.org_id))]
	pub async fn create_team(&self, team: &Team) -> Result<(), DbError> {
		sqlx::query("INSERT INTO teams (id, org_id, name, created_at) VALUES (?, ?, ?, ?)")
			.bind(team.id.to_string())
			.bind(team.org_id.to_string())
			.bind(&team.name)
			.bind(team.created_at.to_rfc3339())
			.execute(&self.pool)
			.await
			.map_err(|e| conflict_on_unique(e, format!("team {} already exists", team.id)))?;
		Ok(())
	}

	#[tracing::instrument(skip(self, membership), fields(team_id = %membership.team_id, user_id = %membership.user_id))]
	pub async fn add_team_member(&self, membership: &TeamMembership) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO team_memberships (team_id, user_id, role, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(membership.team_id.to_string())
		.bind(membership.user_id.to_string())
		.bind(membership.role.to_string())
		.bind(membership.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| {
			conflict_on_unique(
				e,
				format!("user {} is already in team {}", membership.user_id, membership.team_id),
			)
		})?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(team_id = %team_id, user_id = %user_id))]
	pub async fn remove_team_member(&self, team_id: TeamId, user_id: UserId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM team_memberships WHERE team_id = ? AND user_id = ?")
			.bind(team_id.to_string())
			.bind(user_id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(team_id = %team_id, user_id = %user_id))]
	pub async fn get_team_role(
		&self,
		team_id: TeamId,
		user_id: UserId,
	) -> Result<Option<TeamRole>, DbError> {
		let row = sqlx::query("SELECT role FROM team_memberships WHERE team_id = ? AND user_id = ?")
			.bind(team_id.to_string())
			.bind(user_id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| rows::parsed(&r, "role")).transpose()
	}

	#[tracing::instrument(skip(self), fields(team_id = %id))]
	pub async fn find_team(&self, id: TeamId) -> Result<Option<Team>, DbError> {
		let row = sqlx::query("SELECT id, org_id, name, created_at FROM teams WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| row_to_team(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user))]
	pub async fn list_teams_for_user(&self, user: UserId) -> Result<Vec<Team>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT t.id, t.org_id, t.name, t.created_at
			FROM teams t
			JOIN team_memberships tm ON tm.team_id = t.id
			WHERE tm.user_id = ?
			ORDER BY t.created_at, t.id
			"#,
		)
		.bind(user.to_string())
		.fetch_all(&self.pool)
		.await?;
		rows.iter().map(row_to_team).collect()
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id))]
	pub async fn get_org_role(
		&self,
		org_id: OrgId,
		user_id: UserId,
	) -> Result<Option<OrgRole>, DbError> {
		let row = sqlx::query("SELECT role FROM org_memberships WHERE org_id = ? AND user_id = ?")
			.bind(org_id.to_string())
			.bind(user_id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| rows::parsed(&r, "role")).transpose()
	}

	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn org_exists(&self, id: OrgId) -> Result<bool, DbError> {
		let row = sqlx::query("SELECT COUNT(*) AS count FROM organizations WHERE id = ?")
			.bind(id.to_string())
			.fetch_one(&self.pool)
			.await?;
		let count: i64 = row.get("count");
		Ok(count > 0)
	}
}

fn row_to_team(row: &SqliteRow) -> Result<Team, DbError> {
	Ok(Team {
		id: TeamId::new(rows::uuid(row, "id")?),
		org_id: OrgId::new(rows::uuid(row, "org_id")?),
		name: row.get("name"),
		created_at: rows::timestamp(row, "created_at")?,
	})
}

#[async_trait]
impl MembershipStore for MembershipRepository {
	async fn get_team(&self, id: TeamId) -> Result<Option<Team>, StoreError> {
		Ok(self.find_team(id).await?)
	}

	async fn teams_for_user(&self, user: UserId) -> Result<Vec<Team>, StoreError> {
		Ok(self.list_teams_for_user(user).await?)
	}

	async fn is_team_member(&self, team: TeamId, user: UserId) -> Result<bool, StoreError> {
		Ok(self.get_team_role(team, user).await?.is_some())
	}

	async fn org_exists(&self, org: OrgId) -> Result<bool, StoreError> {
		Ok(MembershipRepository::org_exists(self, org).await?)
	}

	async fn org_role(&self, org: OrgId, user: UserId) -> Result<Option<OrgRole>, StoreError> {
		Ok(self.get_org_role(org, user).await?)
	}
}
