// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Table definitions for grants, the resource graph and memberships.
//!
//! All ids are UUID strings and all timestamps RFC 3339 strings. Grant rows
//! carry one nullable foreign key per resource kind; a CHECK constraint keeps
//! exactly one of them set.

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS organizations (
		id TEXT PRIMARY KEY,
		name TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS org_memberships (
		org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
		user_id TEXT NOT NULL,
		role TEXT NOT NULL,
		created_at TEXT NOT NULL,
		PRIMARY KEY (org_id, user_id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS teams (
		id TEXT PRIMARY KEY,
		org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
		name TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS team_memberships (
		team_id TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
		user_id TEXT NOT NULL,
		role TEXT NOT NULL,
		created_at TEXT NOT NULL,
		PRIMARY KEY (team_id, user_id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS data_sources (
		id TEXT PRIMARY KEY,
		owner_id TEXT NOT NULL,
		org_id TEXT,
		name TEXT NOT NULL,
		status TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS data_sets (
		id TEXT PRIMARY KEY,
		owner_id TEXT NOT NULL,
		org_id TEXT,
		name TEXT NOT NULL,
		status TEXT NOT NULL,
		data_source_id TEXT,
		parent_set_id TEXT,
		created_at TEXT NOT NULL
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_data_sets_parent ON data_sets(parent_set_id)",
	"CREATE INDEX IF NOT EXISTS idx_data_sets_source ON data_sets(data_source_id)",
	r#"
	CREATE TABLE IF NOT EXISTS data_sinks (
		id TEXT PRIMARY KEY,
		owner_id TEXT NOT NULL,
		org_id TEXT,
		name TEXT NOT NULL,
		status TEXT NOT NULL,
		data_set_id TEXT,
		created_at TEXT NOT NULL
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_data_sinks_set ON data_sinks(data_set_id)",
	r#"
	CREATE TABLE IF NOT EXISTS flow_links (
		id TEXT PRIMARY KEY,
		sink_id TEXT NOT NULL,
		source_id TEXT NOT NULL,
		UNIQUE(sink_id, source_id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS access_controls (
		id TEXT PRIMARY KEY,
		accessor_kind TEXT NOT NULL,
		accessor_id TEXT NOT NULL,
		accessor_org_id TEXT,
		data_source_id TEXT,
		data_set_id TEXT,
		data_sink_id TEXT,
		role_index INTEGER NOT NULL,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL,
		CHECK (
			(data_source_id IS NOT NULL) + (data_set_id IS NOT NULL) + (data_sink_id IS NOT NULL) = 1
		)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_access_controls_accessor ON access_controls(accessor_kind, accessor_id)",
	"CREATE INDEX IF NOT EXISTS idx_access_controls_set ON access_controls(data_set_id)",
];

/// Creates every table and index if missing.
#[tracing::instrument(skip(pool))]
pub async fn apply_schema(pool: &SqlitePool) -> Result<(), DbError> {
	for statement in STATEMENTS {
		sqlx::query(statement).execute(pool).await?;
	}
	tracing::debug!(statements = STATEMENTS.len(), "schema applied");
	Ok(())
}
