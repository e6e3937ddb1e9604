// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant repository.
//!
//! Grants are stored in `access_controls`, one row per grant, with the
//! target resource in exactly one of `data_source_id`, `data_set_id` or
//! `data_sink_id`. Rows are converted through [`GrantRecord`] so a malformed
//! row surfaces as [`DbError::Internal`] instead of a wrong grant.

use async_trait::async_trait;
use chrono::Utc;
use conduit_acl::{
	AccessorKind, AccessorTuple, Grant, GrantId, GrantRecord, GrantStore, ResourceKind,
	ResourceRef, Role, StoreError,
};
use sqlx::{
	sqlite::{SqlitePool, SqliteRow},
	Row,
};

use crate::error::{conflict_on_unique, DbError};
use crate::rows;

const GRANT_COLUMNS: &str = "id, accessor_kind, accessor_id, accessor_org_id, data_source_id, data_set_id, data_sink_id, role_index, created_at, updated_at";

fn resource_column(resource: ResourceRef) -> &'static str {
	match resource.kind() {
		ResourceKind::Source => "data_source_id",
		ResourceKind::Set => "data_set_id",
		ResourceKind::Sink => "data_sink_id",
	}
}

/// Repository for access-control grants.
#[derive(Clone)]
pub struct GrantRepository {
	pool: SqlitePool,
}

impl GrantRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a grant.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if a grant with the same id exists.
	#[tracing::instrument(skip(self, grant), fields(grant_id = %grant.id, resource = %grant.resource))]
	pub async fn create_grant(&self, grant: &Grant) -> Result<(), DbError> {
		let record = GrantRecord::from(grant);
		sqlx::query(
			r#"
			INSERT INTO access_controls (id, accessor_kind, accessor_id, accessor_org_id, data_source_id, data_set_id, data_sink_id, role_index, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(record.id.to_string())
		.bind(record.accessor_kind.to_string())
		.bind(record.accessor_id.to_string())
		.bind(record.accessor_org_id.map(|id| id.to_string()))
		.bind(record.data_source_id.map(|id| id.to_string()))
		.bind(record.data_set_id.map(|id| id.to_string()))
		.bind(record.data_sink_id.map(|id| id.to_string()))
		.bind(i64::from(record.role_index))
		.bind(record.created_at.to_rfc3339())
		.bind(record.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, format!("grant {} already exists", grant.id)))?;

		tracing::debug!(grant_id = %grant.id, "grant created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(grant_id = %id))]
	pub async fn get_grant(&self, id: GrantId) -> Result<Option<Grant>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {GRANT_COLUMNS} FROM access_controls WHERE id = ?"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_grant(&r)).transpose()
	}

	/// Set a grant's role, returning the updated grant.
	#[tracing::instrument(skip(self), fields(grant_id = %id, role = %role))]
	pub async fn update_grant_role(&self, id: GrantId, role: Role) -> Result<Option<Grant>, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE access_controls
			SET role_index = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(i64::from(role.index()))
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Ok(None);
		}
		self.get_grant(id).await
	}

	/// Delete a grant, returning the removed row.
	#[tracing::instrument(skip(self), fields(grant_id = %id))]
	pub async fn delete_grant(&self, id: GrantId) -> Result<Option<Grant>, DbError> {
		let mut tx = self.pool.begin().await?;
		let row = sqlx::query(&format!(
			"SELECT {GRANT_COLUMNS} FROM access_controls WHERE id = ?"
		))
		.bind(id.to_string())
		.fetch_optional(&mut *tx)
		.await?;
		let Some(row) = row else {
			return Ok(None);
		};
		let grant = row_to_grant(&row)?;

		sqlx::query("DELETE FROM access_controls WHERE id = ?")
			.bind(id.to_string())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		tracing::debug!(grant_id = %id, "grant deleted");
		Ok(Some(grant))
	}

	/// Delete every grant on `resource`, returning the removed rows.
	#[tracing::instrument(skip(self), fields(resource = %resource))]
	pub async fn delete_grants_for_resource(&self, resource: ResourceRef) -> Result<Vec<Grant>, DbError> {
		let column = resource_column(resource);
		let mut tx = self.pool.begin().await?;
		let rows = sqlx::query(&format!(
			"SELECT {GRANT_COLUMNS} FROM access_controls WHERE {column} = ? ORDER BY created_at, id"
		))
		.bind(resource.id().to_string())
		.fetch_all(&mut *tx)
		.await?;
		let grants = rows.iter().map(row_to_grant).collect::<Result<Vec<_>, _>>()?;

		sqlx::query(&format!("DELETE FROM access_controls WHERE {column} = ?"))
			.bind(resource.id().to_string())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		tracing::debug!(count = grants.len(), "grants deleted for resource");
		Ok(grants)
	}

	/// Grants matching any tuple.
	///
	/// Each tuple becomes one OR-ed clause; user tuples also pin
	/// `accessor_org_id` with a NULL-safe `IS` comparison.
	#[tracing::instrument(skip(self, tuples), fields(tuple_count = tuples.len()))]
	pub async fn grants_for_tuples(&self, tuples: &[AccessorTuple]) -> Result<Vec<Grant>, DbError> {
		if tuples.is_empty() {
			return Ok(Vec::new());
		}

		let clauses: Vec<&str> = tuples
			.iter()
			.map(|t| match t.accessor.kind() {
				AccessorKind::User => "(accessor_kind = ? AND accessor_id = ? AND accessor_org_id IS ?)",
				AccessorKind::Team | AccessorKind::Org => "(accessor_kind = ? AND accessor_id = ?)",
			})
			.collect();
		let sql = format!(
			"SELECT {GRANT_COLUMNS} FROM access_controls WHERE {} ORDER BY created_at, id",
			clauses.join(" OR ")
		);

		let mut query = sqlx::query(&sql);
		for tuple in tuples {
			query = query
				.bind(tuple.accessor.kind().to_string())
				.bind(tuple.accessor.id().to_string());
			if tuple.accessor.kind() == AccessorKind::User {
				query = query.bind(tuple.org_id.map(|id| id.to_string()));
			}
		}

		let rows = query.fetch_all(&self.pool).await?;
		rows.iter().map(row_to_grant).collect()
	}

	#[tracing::instrument(skip(self), fields(resource = %resource))]
	pub async fn grants_for_resource(&self, resource: ResourceRef) -> Result<Vec<Grant>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {GRANT_COLUMNS} FROM access_controls WHERE {} = ? ORDER BY created_at, id",
			resource_column(resource)
		))
		.bind(resource.id().to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_grant).collect()
	}
}

fn row_to_grant(row: &SqliteRow) -> Result<Grant, DbError> {
	let role_index: i64 = row.get("role_index");
	let record = GrantRecord {
		id: rows::uuid(row, "id")?,
		accessor_kind: rows::parsed(row, "accessor_kind")?,
		accessor_id: rows::uuid(row, "accessor_id")?,
		accessor_org_id: rows::opt_uuid(row, "accessor_org_id")?,
		data_source_id: rows::opt_uuid(row, "data_source_id")?,
		data_set_id: rows::opt_uuid(row, "data_set_id")?,
		data_sink_id: rows::opt_uuid(row, "data_sink_id")?,
		role_index: u8::try_from(role_index)
			.map_err(|_| DbError::Internal(format!("Invalid role_index: {role_index}")))?,
		created_at: rows::timestamp(row, "created_at")?,
		updated_at: rows::timestamp(row, "updated_at")?,
	};
	Grant::try_from(record).map_err(|e| DbError::Internal(e.to_string()))
}

#[async_trait]
impl GrantStore for GrantRepository {
	async fn create_grant(&self, grant: &Grant) -> Result<(), StoreError> {
		Ok(self.create_grant(grant).await?)
	}

	async fn get_grant(&self, id: GrantId) -> Result<Option<Grant>, StoreError> {
		Ok(self.get_grant(id).await?)
	}

	async fn update_grant_role(&self, id: GrantId, role: Role) -> Result<Option<Grant>, StoreError> {
		Ok(self.update_grant_role(id, role).await?)
	}

	async fn delete_grant(&self, id: GrantId) -> Result<Option<Grant>, StoreError> {
		Ok(self.delete_grant(id).await?)
	}

	async fn delete_grants_for_resource(
		&self,
		resource: ResourceRef,
	) -> Result<Vec<Grant>, StoreError> {
		Ok(self.delete_grants_for_resource(resource).await?)
	}

	async fn grants_for_tuples(&self, tuples: &[AccessorTuple]) -> Result<Vec<Grant>, StoreError> {
		Ok(self.grants_for_tuples(tuples).await?)
	}

	async fn grants_for_resource(&self, resource: ResourceRef) -> Result<Vec<Grant>, StoreError> {
		Ok(self.grants_for_resource(resource).await?)
	}
}
