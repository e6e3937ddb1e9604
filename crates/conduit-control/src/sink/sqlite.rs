// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Outbox sink: control events are written to `control_events` and picked up
//! by the pipeline runtime, which marks them delivered.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_acl::{ControlEvent, ControlEventKind, GrantId, ResourceKind, ResourceRef};
use sqlx::{
	sqlite::{SqlitePool, SqliteRow},
	Row,
};
use uuid::Uuid;

use super::{ControlSink, ControlSinkError};

pub struct SqliteControlSink {
	pool: SqlitePool,
}

impl SqliteControlSink {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Creates the outbox table if missing.
	#[tracing::instrument(skip(self))]
	pub async fn ensure_table(&self) -> Result<(), ControlSinkError> {
		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS control_events (
				id TEXT PRIMARY KEY,
				resource_kind TEXT NOT NULL,
				resource_id TEXT NOT NULL,
				kind TEXT NOT NULL,
				grant_id TEXT NOT NULL,
				created_at TEXT NOT NULL,
				delivered_at TEXT
			)
			"#,
		)
		.execute(&self.pool)
		.await
		.map_err(sink_error)?;

		sqlx::query(
			"CREATE INDEX IF NOT EXISTS idx_control_events_pending ON control_events(delivered_at, created_at)",
		)
		.execute(&self.pool)
		.await
		.map_err(sink_error)?;
		Ok(())
	}

	/// Undelivered events, oldest first.
	#[tracing::instrument(skip(self))]
	pub async fn pending(&self, limit: u32) -> Result<Vec<ControlEvent>, ControlSinkError> {
		let rows = sqlx::query(
			r#"
			SELECT id, resource_kind, resource_id, kind, grant_id, created_at
			FROM control_events
			WHERE delivered_at IS NULL
			ORDER BY created_at, rowid
			LIMIT ?
			"#,
		)
		.bind(i64::from(limit))
		.fetch_all(&self.pool)
		.await
		.map_err(sink_error)?;

		rows.iter().map(row_to_event).collect()
	}

	/// Marks an event delivered. Returns false if it was unknown or already delivered.
	#[tracing::instrument(skip(self), fields(event_id = %id))]
	pub async fn mark_delivered(&self, id: Uuid) -> Result<bool, ControlSinkError> {
		let result = sqlx::query(
			"UPDATE control_events SET delivered_at = ? WHERE id = ? AND delivered_at IS NULL",
		)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&self.pool)
		.await
		.map_err(sink_error)?;
		Ok(result.rows_affected() > 0)
	}
}

#[async_trait]
impl ControlSink for SqliteControlSink {
	fn name(&self) -> &str {
		"sqlite"
	}

	async fn publish(&self, event: Arc<ControlEvent>) -> Result<(), ControlSinkError> {
		sqlx::query(
			r#"
			INSERT INTO control_events (id, resource_kind, resource_id, kind, grant_id, created_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(event.id.to_string())
		.bind(event.resource.kind().to_string())
		.bind(event.resource.id().to_string())
		.bind(event.kind.to_string())
		.bind(event.grant_id.to_string())
		.bind(event.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(sink_error)?;

		Ok(())
	}

	async fn health_check(&self) -> Result<(), ControlSinkError> {
		sqlx::query("SELECT 1")
			.execute(&self.pool)
			.await
			.map_err(|e| ControlSinkError::Transient(format!("health check failed: {e}")))?;
		Ok(())
	}
}

fn sink_error(e: sqlx::Error) -> ControlSinkError {
	if is_transient_error(&e) {
		ControlSinkError::Transient(format!("database error: {e}"))
	} else {
		ControlSinkError::Permanent(format!("database error: {e}"))
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) => true,
		sqlx::Error::PoolTimedOut => true,
		sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked") || msg.contains("timeout")
		}
		_ => false,
	}
}

fn row_to_event(row: &SqliteRow) -> Result<ControlEvent, ControlSinkError> {
	let corrupt = |what: &str, e: String| ControlSinkError::Permanent(format!("invalid {what}: {e}"));

	let id: String = row.get("id");
	let resource_kind: String = row.get("resource_kind");
	let resource_id: String = row.get("resource_id");
	let kind: String = row.get("kind");
	let grant_id: String = row.get("grant_id");
	let created_at: String = row.get("created_at");

	let resource_kind: ResourceKind = resource_kind.parse().map_err(|e| corrupt("resource_kind", e))?;
	let resource_id = Uuid::parse_str(&resource_id).map_err(|e| corrupt("resource_id", e.to_string()))?;

	Ok(ControlEvent {
		id: Uuid::parse_str(&id).map_err(|e| corrupt("id", e.to_string()))?,
		resource: ResourceRef::from_parts(resource_kind, resource_id),
		kind: kind
			.parse::<ControlEventKind>()
			.map_err(|e| corrupt("kind", e))?,
		grant_id: GrantId::new(
			Uuid::parse_str(&grant_id).map_err(|e| corrupt("grant_id", e.to_string()))?,
		),
		created_at: DateTime::parse_from_rfc3339(&created_at)
			.map(|dt| dt.with_timezone(&Utc))
			.map_err(|e| corrupt("created_at", e.to_string()))?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use conduit_acl::{SetId, SinkId};
	use sqlx::sqlite::SqlitePoolOptions;

	async fn sink() -> SqliteControlSink {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect(":memory:")
			.await
			.unwrap();
		let sink = SqliteControlSink::new(pool);
		sink.ensure_table().await.unwrap();
		sink
	}

	#[tokio::test]
	async fn published_events_are_pending_until_delivered() {
		let sink = sink().await;
		let first = ControlEvent::new(SetId::generate().into(), ControlEventKind::Activate, GrantId::generate());
		let second = ControlEvent::new(SinkId::generate().into(), ControlEventKind::Pause, GrantId::generate());
		sink.publish(Arc::new(first.clone())).await.unwrap();
		sink.publish(Arc::new(second.clone())).await.unwrap();

		let pending = sink.pending(10).await.unwrap();
		assert_eq!(pending.len(), 2);
		assert_eq!(pending[0].id, first.id);
		assert_eq!(pending[0].resource, first.resource);
		assert_eq!(pending[1].kind, ControlEventKind::Pause);
		assert_eq!(pending[1].grant_id, second.grant_id);

		assert!(sink.mark_delivered(first.id).await.unwrap());
		assert!(!sink.mark_delivered(first.id).await.unwrap());

		let pending = sink.pending(10).await.unwrap();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].id, second.id);
	}

	#[tokio::test]
	async fn duplicate_event_is_permanent_failure() {
		let sink = sink().await;
		let event = Arc::new(ControlEvent::new(
			SetId::generate().into(),
			ControlEventKind::Activate,
			GrantId::generate(),
		));
		sink.publish(Arc::clone(&event)).await.unwrap();
		let err = sink.publish(event).await.unwrap_err();
		assert!(matches!(err, ControlSinkError::Permanent(_)));
	}

	#[tokio::test]
	async fn ensure_table_is_idempotent() {
		let sink = sink().await;
		sink.ensure_table().await.unwrap();
		assert!(sink.health_check().await.is_ok());
	}
}
