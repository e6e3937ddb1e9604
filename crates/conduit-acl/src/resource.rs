// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource nodes of the flow graph.
//!
//! A flow starts at a [`DataSource`], passes through one or more [`DataSet`]s
//! (each set either reads its source directly or derives from a parent set)
//! and ends in [`DataSink`]s. A [`FlowLink`] chains a sink into the source of
//! another flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
	FlowLinkId, OrgId, ResourceRef, ResourceStatus, SetId, SinkId, SourceId, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
	pub id: SourceId,
	pub owner_id: UserId,
	pub org_id: Option<OrgId>,
	pub name: String,
	pub status: ResourceStatus,
	pub created_at: DateTime<Utc>,
}

impl DataSource {
	pub fn new(owner_id: UserId, org_id: Option<OrgId>, name: impl Into<String>) -> Self {
		Self {
			id: SourceId::generate(),
			owner_id,
			org_id,
			name: name.into(),
			status: ResourceStatus::Init,
			created_at: Utc::now(),
		}
	}

	pub fn with_status(mut self, status: ResourceStatus) -> Self {
		self.status = status;
		self
	}
}

/// A data set. Root sets read a source; derived sets read a parent set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSet {
	pub id: SetId,
	pub owner_id: UserId,
	pub org_id: Option<OrgId>,
	pub name: String,
	pub status: ResourceStatus,
	pub data_source_id: Option<SourceId>,
	pub parent_set_id: Option<SetId>,
	pub created_at: DateTime<Utc>,
}

impl DataSet {
	/// Creates a root set reading `source`.
	pub fn from_source(
		owner_id: UserId,
		org_id: Option<OrgId>,
		name: impl Into<String>,
		source: SourceId,
	) -> Self {
		Self {
			id: SetId::generate(),
			owner_id,
			org_id,
			name: name.into(),
			status: ResourceStatus::Init,
			data_source_id: Some(source),
			parent_set_id: None,
			created_at: Utc::now(),
		}
	}

	/// Creates a set derived from `parent`.
	pub fn derived_from(
		owner_id: UserId,
		org_id: Option<OrgId>,
		name: impl Into<String>,
		parent: SetId,
	) -> Self {
		Self {
			id: SetId::generate(),
			owner_id,
			org_id,
			name: name.into(),
			status: ResourceStatus::Init,
			data_source_id: None,
			parent_set_id: Some(parent),
			created_at: Utc::now(),
		}
	}

	pub fn with_status(mut self, status: ResourceStatus) -> Self {
		self.status = status;
		self
	}

	pub fn is_derived(&self) -> bool {
		self.parent_set_id.is_some()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSink {
	pub id: SinkId,
	pub owner_id: UserId,
	pub org_id: Option<OrgId>,
	pub name: String,
	pub status: ResourceStatus,
	pub data_set_id: Option<SetId>,
	pub created_at: DateTime<Utc>,
}

impl DataSink {
	pub fn new(
		owner_id: UserId,
		org_id: Option<OrgId>,
		name: impl Into<String>,
		data_set_id: SetId,
	) -> Self {
		Self {
			id: SinkId::generate(),
			owner_id,
			org_id,
			name: name.into(),
			status: ResourceStatus::Init,
			data_set_id: Some(data_set_id),
			created_at: Utc::now(),
		}
	}

	pub fn with_status(mut self, status: ResourceStatus) -> Self {
		self.status = status;
		self
	}
}

/// A persisted edge feeding a sink's output into the source of another flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLink {
	pub id: FlowLinkId,
	pub sink_id: SinkId,
	pub source_id: SourceId,
}

impl FlowLink {
	pub fn new(sink_id: SinkId, source_id: SourceId) -> Self {
		Self {
			id: FlowLinkId::generate(),
			sink_id,
			source_id,
		}
	}
}

/// Any node of the flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceNode {
	Source(DataSource),
	Set(DataSet),
	Sink(DataSink),
}

impl ResourceNode {
	pub fn resource_ref(&self) -> ResourceRef {
		match self {
			ResourceNode::Source(s) => ResourceRef::Source(s.id),
			ResourceNode::Set(s) => ResourceRef::Set(s.id),
			ResourceNode::Sink(s) => ResourceRef::Sink(s.id),
		}
	}

	pub fn owner_id(&self) -> UserId {
		match self {
			ResourceNode::Source(s) => s.owner_id,
			ResourceNode::Set(s) => s.owner_id,
			ResourceNode::Sink(s) => s.owner_id,
		}
	}

	pub fn org_id(&self) -> Option<OrgId> {
		match self {
			ResourceNode::Source(s) => s.org_id,
			ResourceNode::Set(s) => s.org_id,
			ResourceNode::Sink(s) => s.org_id,
		}
	}

	pub fn status(&self) -> ResourceStatus {
		match self {
			ResourceNode::Source(s) => s.status,
			ResourceNode::Set(s) => s.status,
			ResourceNode::Sink(s) => s.status,
		}
	}

	/// Returns true when `other` has a different owner or org.
	pub fn crosses_boundary(&self, other: &ResourceNode) -> bool {
		self.owner_id() != other.owner_id() || self.org_id() != other.org_id()
	}
}

impl From<DataSource> for ResourceNode {
	fn from(source: DataSource) -> Self {
		ResourceNode::Source(source)
	}
}

impl From<DataSet> for ResourceNode {
	fn from(set: DataSet) -> Self {
		ResourceNode::Set(set)
	}
}

impl From<DataSink> for ResourceNode {
	fn from(sink: DataSink) -> Self {
		ResourceNode::Sink(sink)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn derived_set_has_no_source() {
		let owner = UserId::generate();
		let root = DataSet::from_source(owner, None, "raw", SourceId::generate());
		let child = DataSet::derived_from(owner, None, "clean", root.id);
		assert!(!root.is_derived());
		assert!(child.is_derived());
		assert_eq!(child.data_source_id, None);
		assert_eq!(child.parent_set_id, Some(root.id));
	}

	#[test]
	fn node_accessors_follow_variant() {
		let owner = UserId::generate();
		let org = OrgId::generate();
		let sink = DataSink::new(owner, Some(org), "warehouse", SetId::generate())
			.with_status(ResourceStatus::Active);
		let node = ResourceNode::from(sink.clone());
		assert_eq!(node.resource_ref(), ResourceRef::Sink(sink.id));
		assert_eq!(node.owner_id(), owner);
		assert_eq!(node.org_id(), Some(org));
		assert_eq!(node.status(), ResourceStatus::Active);
	}

	#[test]
	fn boundary_detects_owner_or_org_change() {
		let owner = UserId::generate();
		let org = OrgId::generate();
		let a: ResourceNode = DataSource::new(owner, Some(org), "a").into();
		let same: ResourceNode = DataSource::new(owner, Some(org), "b").into();
		let other_owner: ResourceNode = DataSource::new(UserId::generate(), Some(org), "c").into();
		let other_org: ResourceNode = DataSource::new(owner, None, "d").into();
		assert!(!a.crosses_boundary(&same));
		assert!(a.crosses_boundary(&other_owner));
		assert!(a.crosses_boundary(&other_org));
	}
}
