// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository for sources, sets, sinks and the flow links between them.

use async_trait::async_trait;
use conduit_acl::{
	DataSet, DataSink, DataSource, FlowLink, FlowLinkId, OrgId, ResourceNode, ResourceRef,
	ResourceStatus, ResourceStore, SetId, SinkId, SourceId, StoreError, UserId,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};

use crate::error::{conflict_on_unique, DbError};
use crate::rows;

const SOURCE_COLUMNS: &str = "id, owner_id, org_id, name, status, created_at";
const SET_COLUMNS: &str =
	"id, owner_id, org_id, name, status, data_source_id, parent_set_id, created_at";
const SINK_COLUMNS: &str = "id, owner_id, org_id, name, status, data_set_id, created_at";

#[derive(Clone)]
pub struct ResourceRepository {
	pool: SqlitePool,
}

impl ResourceRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, source), fields(source_id = %source.id))]
	pub async fn create_source(&self, source: &DataSource) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO data_sources (id, owner_id, org_id, name, status, created_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(source.id.to_string())
		.bind(source.owner_id.to_string())
		.bind(source.org_id.map(|id| id.to_string()))
		.bind(&source.name)
		.bind(source.status.to_string())
		.bind(source.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, format!("source {} already exists", source.id)))?;
		Ok(())
	}

	/// Insert a data set.
	///
	/// # Errors
	/// Returns `DbError::Internal` if the set names neither a source nor a
	/// parent set.
	#[tracing::instrument(skip(self, set), fields(set_id = %set.id))]
	pub async fn create_set(&self, set: &DataSet) -> Result<(), DbError> {
		if set.data_source_id.is_none() && set.parent_set_id.is_none() {
			return Err(DbError::Internal(format!(
				"set {} has neither a source nor a parent",
				set.id
			)));
		}

		sqlx::query(
			r#"
			INSERT INTO data_sets (id, owner_id, org_id, name, status, data_source_id, parent_set_id, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(set.id.to_string())
		.bind(set.owner_id.to_string())
		.bind(set.org_id.map(|id| id.to_string()))
		.bind(&set.name)
		.bind(set.status.to_string())
		.bind(set.data_source_id.map(|id| id.to_string()))
		.bind(set.parent_set_id.map(|id| id.to_string()))
		.bind(set.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, format!("set {} already exists", set.id)))?;
		Ok(())
	}

	#[tracing::instrument(skip(self, sink), fields(sink_id = %sink.id))]
	pub async fn create_sink(&self, sink: &DataSink) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO data_sinks (id, owner_id, org_id, name, status, data_set_id, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(sink.id.to_string())
		.bind(sink.owner_id.to_string())
		.bind(sink.org_id.map(|id| id.to_string()))
		.bind(&sink.name)
		.bind(sink.status.to_string())
		.bind(sink.data_set_id.map(|id| id.to_string()))
		.bind(sink.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, format!("sink {} already exists", sink.id)))?;
		Ok(())
	}

	/// Insert a flow link.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the sink already feeds the source.
	#[tracing::instrument(skip(self, link), fields(sink_id = %link.sink_id, source_id = %link.source_id))]
	pub async fn create_flow_link(&self, link: &FlowLink) -> Result<(), DbError> {
		sqlx::query("INSERT INTO flow_links (id, sink_id, source_id) VALUES (?, ?, ?)")
			.bind(link.id.to_string())
			.bind(link.sink_id.to_string())
			.bind(link.source_id.to_string())
			.execute(&self.pool)
			.await
			.map_err(|e| {
				conflict_on_unique(
					e,
					format!("sink {} already feeds source {}", link.sink_id, link.source_id),
				)
			})?;
		Ok(())
	}

	/// Set the status of any resource. Returns false if it does not exist.
	#[tracing::instrument(skip(self), fields(resource = %resource, status = %status))]
	pub async fn update_status(
		&self,
		resource: ResourceRef,
		status: ResourceStatus,
	) -> Result<bool, DbError> {
		let table = match resource {
			ResourceRef::Source(_) => "data_sources",
			ResourceRef::Set(_) => "data_sets",
			ResourceRef::Sink(_) => "data_sinks",
		};
		let result = sqlx::query(&format!("UPDATE {table} SET status = ? WHERE id = ?"))
			.bind(status.to_string())
			.bind(resource.id().to_string())
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(source_id = %id))]
	pub async fn get_source(&self, id: SourceId) -> Result<Option<DataSource>, DbError> {
		let row = sqlx::query(&format!("SELECT {SOURCE_COLUMNS} FROM data_sources WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| row_to_source(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(set_id = %id))]
	pub async fn get_set(&self, id: SetId) -> Result<Option<DataSet>, DbError> {
		let row = sqlx::query(&format!("SELECT {SET_COLUMNS} FROM data_sets WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| row_to_set(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(sink_id = %id))]
	pub async fn get_sink(&self, id: SinkId) -> Result<Option<DataSink>, DbError> {
		let row = sqlx::query(&format!("SELECT {SINK_COLUMNS} FROM data_sinks WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| row_to_sink(&r)).transpose()
	}

	async fn sets_where(&self, clause: &str, id: String) -> Result<Vec<DataSet>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {SET_COLUMNS} FROM data_sets WHERE {clause} ORDER BY id"
		))
		.bind(id)
		.fetch_all(&self.pool)
		.await?;
		rows.iter().map(row_to_set).collect()
	}

	async fn links_where(&self, column: &str, id: String) -> Result<Vec<FlowLink>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT id, sink_id, source_id FROM flow_links WHERE {column} = ? ORDER BY id"
		))
		.bind(id)
		.fetch_all(&self.pool)
		.await?;
		rows.iter().map(row_to_link).collect()
	}

	#[tracing::instrument(skip(self), fields(owner_id = %owner))]
	pub async fn list_sources_owned_by(
		&self,
		owner: UserId,
		org: Option<OrgId>,
	) -> Result<Vec<DataSource>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {SOURCE_COLUMNS} FROM data_sources WHERE owner_id = ? AND org_id IS ? ORDER BY id"
		))
		.bind(owner.to_string())
		.bind(org.map(|id| id.to_string()))
		.fetch_all(&self.pool)
		.await?;
		rows.iter().map(row_to_source).collect()
	}
}

fn row_to_source(row: &SqliteRow) -> Result<DataSource, DbError> {
	Ok(DataSource {
		id: SourceId::new(rows::uuid(row, "id")?),
		owner_id: UserId::new(rows::uuid(row, "owner_id")?),
		org_id: rows::opt_uuid(row, "org_id")?.map(OrgId::new),
		name: sqlx::Row::get(row, "name"),
		status: rows::parsed(row, "status")?,
		created_at: rows::timestamp(row, "created_at")?,
	})
}

fn row_to_set(row: &SqliteRow) -> Result<DataSet, DbError> {
	Ok(DataSet {
		id: SetId::new(rows::uuid(row, "id")?),
		owner_id: UserId::new(rows::uuid(row, "owner_id")?),
		org_id: rows::opt_uuid(row, "org_id")?.map(OrgId::new),
		name: sqlx::Row::get(row, "name"),
		status: rows::parsed(row, "status")?,
		data_source_id: rows::opt_uuid(row, "data_source_id")?.map(SourceId::new),
		parent_set_id: rows::opt_uuid(row, "parent_set_id")?.map(SetId::new),
		created_at: rows::timestamp(row, "created_at")?,
	})
}

fn row_to_sink(row: &SqliteRow) -> Result<DataSink, DbError> {
	Ok(DataSink {
		id: SinkId::new(rows::uuid(row, "id")?),
		owner_id: UserId::new(rows::uuid(row, "owner_id")?),
		org_id: rows::opt_uuid(row, "org_id")?.map(OrgId::new),
		name: sqlx::Row::get(row, "name"),
		status: rows::parsed(row, "status")?,
		data_set_id: rows::opt_uuid(row, "data_set_id")?.map(SetId::new),
		created_at: rows::timestamp(row, "created_at")?,
	})
}

fn row_to_link(row: &SqliteRow) -> Result<FlowLink, DbError> {
	Ok(FlowLink {
		id: FlowLinkId::new(rows::uuid(row, "id")?),
		sink_id: SinkId::new(rows::uuid(row, "sink_id")?),
		source_id: SourceId::new(rows::uuid(row, "source_id")?),
	})
}

#[async_trait]
impl ResourceStore for ResourceRepository {
	async fn get_node(&self, resource: ResourceRef) -> Result<Option<ResourceNode>, StoreError> {
		let node = match resource {
			ResourceRef::Source(id) => self.get_source(id).await?.map(ResourceNode::Source),
			ResourceRef::Set(id) => self.get_set(id).await?.map(ResourceNode::Set),
			ResourceRef::Sink(id) => self.get_sink(id).await?.map(ResourceNode::Sink),
		};
		Ok(node)
	}

	async fn get_data_set(&self, id: SetId) -> Result<Option<DataSet>, StoreError> {
		Ok(self.get_set(id).await?)
	}

	async fn child_sets(&self, parent: SetId) -> Result<Vec<DataSet>, StoreError> {
		Ok(self.sets_where("parent_set_id = ?", parent.to_string()).await?)
	}

	async fn sets_for_source(&self, source: SourceId) -> Result<Vec<DataSet>, StoreError> {
		Ok(self
			.sets_where("data_source_id = ? AND parent_set_id IS NULL", source.to_string())
			.await?)
	}

	async fn sinks_for_set(&self, set: SetId) -> Result<Vec<DataSink>, StoreError> {
		let rows = sqlx::query(&format!(
			"SELECT {SINK_COLUMNS} FROM data_sinks WHERE data_set_id = ? ORDER BY id"
		))
		.bind(set.to_string())
		.fetch_all(&self.pool)
		.await
		.map_err(DbError::from)?;
		Ok(rows.iter().map(row_to_sink).collect::<Result<Vec<_>, _>>()?)
	}

	async fn flow_links_from_sink(&self, sink: SinkId) -> Result<Vec<FlowLink>, StoreError> {
		Ok(self.links_where("sink_id", sink.to_string()).await?)
	}

	async fn flow_links_to_source(&self, source: SourceId) -> Result<Vec<FlowLink>, StoreError> {
		Ok(self.links_where("source_id", source.to_string()).await?)
	}

	async fn sources_owned_by(
		&self,
		owner: UserId,
		org: Option<OrgId>,
	) -> Result<Vec<DataSource>, StoreError> {
		Ok(self.list_sources_owned_by(owner, org).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	async fn repo() -> ResourceRepository {
		ResourceRepository::new(create_test_pool().await)
	}

	#[tokio::test]
	async fn nodes_round_trip() {
		let repo = repo().await;
		let owner = UserId::generate();
		let org = Some(OrgId::generate());
		let source = DataSource::new(owner, org, "orders").with_status(ResourceStatus::Active);
		let set = DataSet::from_source(owner, org, "orders raw", source.id);
		let sink = DataSink::new(owner, None, "warehouse", set.id);
		repo.create_source(&source).await.unwrap();
		repo.create_set(&set).await.unwrap();
		repo.create_sink(&sink).await.unwrap();

		let node = repo.get_node(source.id.into()).await.unwrap().unwrap();
		assert_eq!(node.owner_id(), owner);
		assert_eq!(node.org_id(), org);
		assert_eq!(node.status(), ResourceStatus::Active);

		let loaded = repo.get_data_set(set.id).await.unwrap().unwrap();
		assert_eq!(loaded.data_source_id, Some(source.id));
		assert!(loaded.parent_set_id.is_none());

		let node = repo.get_node(sink.id.into()).await.unwrap().unwrap();
		assert!(matches!(node, ResourceNode::Sink(s) if s.data_set_id == Some(set.id) && s.org_id.is_none()));

		assert!(repo.get_node(SetId::generate().into()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn only_root_sets_belong_to_a_source() {
		let repo = repo().await;
		let owner = UserId::generate();
		let source = DataSource::new(owner, None, "events");
		let root = DataSet::from_source(owner, None, "events raw", source.id);
		let mut child = DataSet::derived_from(owner, None, "events hourly", root.id);
		child.data_source_id = Some(source.id);
		repo.create_source(&source).await.unwrap();
		repo.create_set(&root).await.unwrap();
		repo.create_set(&child).await.unwrap();

		let roots = repo.sets_for_source(source.id).await.unwrap();
		assert_eq!(roots.len(), 1);
		assert_eq!(roots[0].id, root.id);

		let children = repo.child_sets(root.id).await.unwrap();
		assert_eq!(children.len(), 1);
		assert_eq!(children[0].id, child.id);
	}

	#[tokio::test]
	async fn set_without_parentage_is_rejected() {
		let repo = repo().await;
		let mut set = DataSet::from_source(UserId::generate(), None, "orphan", SourceId::generate());
		set.data_source_id = None;
		let err = repo.create_set(&set).await.unwrap_err();
		assert!(matches!(err, DbError::Internal(_)));
	}

	#[tokio::test]
	async fn flow_links_are_unique_per_pair() {
		let repo = repo().await;
		let sink = SinkId::generate();
		let source = SourceId::generate();
		repo.create_flow_link(&FlowLink::new(sink, source)).await.unwrap();
		let err = repo
			.create_flow_link(&FlowLink::new(sink, source))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));

		assert_eq!(repo.flow_links_from_sink(sink).await.unwrap().len(), 1);
		assert_eq!(repo.flow_links_to_source(source).await.unwrap().len(), 1);
		assert!(repo.flow_links_to_source(SourceId::generate()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn owned_sources_match_org_exactly() {
		let repo = repo().await;
		let owner = UserId::generate();
		let org = OrgId::generate();
		let personal = DataSource::new(owner, None, "personal");
		let scoped = DataSource::new(owner, Some(org), "scoped");
		repo.create_source(&personal).await.unwrap();
		repo.create_source(&scoped).await.unwrap();

		let in_org = repo.sources_owned_by(owner, Some(org)).await.unwrap();
		assert_eq!(in_org.len(), 1);
		assert_eq!(in_org[0].id, scoped.id);

		let none = repo.sources_owned_by(owner, None).await.unwrap();
		assert_eq!(none.len(), 1);
		assert_eq!(none[0].id, personal.id);
	}

	#[tokio::test]
	async fn status_updates() {
		let repo = repo().await;
		let sink = DataSink::new(UserId::generate(), None, "s3", SetId::generate());
		repo.create_sink(&sink).await.unwrap();

		assert!(repo.update_status(sink.id.into(), ResourceStatus::Paused).await.unwrap());
		let loaded = repo.get_sink(sink.id).await.unwrap().unwrap();
		assert_eq!(loaded.status, ResourceStatus::Paused);
		assert_eq!(repo.sinks_for_set(sink.data_set_id.unwrap()).await.unwrap().len(), 1);

		assert!(!repo
			.update_status(SourceId::generate().into(), ResourceStatus::Active)
			.await
			.unwrap());
	}
}
