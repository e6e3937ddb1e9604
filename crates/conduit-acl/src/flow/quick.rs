// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Owner-batched flow building for large listings.
//!
//! Instead of one traversal per grant, source entries are grouped by their
//! (owner, org) and each group is traversed in a single walk that shares
//! node and visibility lookups between its sources. Depth is still measured
//! from each source, so the merged result and any depth error match the
//! per-entry path.

use std::collections::{BTreeMap, BTreeSet};

use tracing::instrument;

use crate::error::{AclError, Result};
use crate::flow::builder::{FlowBuilder, FlowOptions};
use crate::flow::cache::FlowCache;
use crate::flow::graph::Flow;
use crate::resource::ResourceNode;
use crate::types::{OrgId, ResourceRef, SourceId, UserId};
use crate::viewpoint::Viewpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerKey {
	pub owner_id: UserId,
	pub org_id: Option<OrgId>,
}

/// Entries split into per-owner source batches and everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerGroups {
	pub groups: BTreeMap<OwnerKey, BTreeSet<SourceId>>,
	/// Non-source entries, built one at a time.
	pub others: BTreeSet<ResourceRef>,
}

impl OwnerGroups {
	pub fn source_count(&self) -> usize {
		self.groups.values().map(BTreeSet::len).sum()
	}
}

impl FlowBuilder {
	/// Groups source entries by owner and org. Sources that no longer exist are dropped.
	#[instrument(skip(self, entries), fields(entries = entries.len()))]
	pub async fn group_sources_by_owner(&self, entries: &[ResourceRef]) -> Result<OwnerGroups> {
		let mut grouped = OwnerGroups::default();

		for &entry in entries {
			let ResourceRef::Source(id) = entry else {
				grouped.others.insert(entry);
				continue;
			};
			match self.resources().get_node(entry).await? {
				Some(ResourceNode::Source(source)) => {
					let key = OwnerKey {
						owner_id: source.owner_id,
						org_id: source.org_id,
					};
					grouped.groups.entry(key).or_default().insert(id);
				}
				_ => {
					tracing::debug!(source_id = %id, "grouped source missing, skipped");
				}
			}
		}

		tracing::debug!(
			groups = grouped.groups.len(),
			sources = grouped.source_count(),
			others = grouped.others.len(),
			"sources grouped by owner"
		);
		Ok(grouped)
	}

	/// Builds one flow per owner group, plus a cached per-entry flow for
	/// every non-source entry, and merges them.
	#[instrument(skip(self, cache, groups, viewpoint), fields(groups = groups.groups.len(), principal = %viewpoint.accessor()))]
	pub async fn build_flows_quick(
		&self,
		cache: &mut FlowCache,
		groups: &OwnerGroups,
		viewpoint: &Viewpoint,
		options: FlowOptions,
	) -> Result<Flow> {
		let mut merged = Flow::new();

		for (key, sources) in &groups.groups {
			let entries: Vec<ResourceRef> = sources.iter().map(|id| ResourceRef::Source(*id)).collect();
			let flow = self.traverse(&entries, viewpoint, options).await?;
			tracing::trace!(owner_id = %key.owner_id, nodes = flow.node_count(), "owner group traversed");
			merged.merge(&flow);
		}

		for &entry in &groups.others {
			match self.build_flow(cache, entry, viewpoint, options).await {
				Ok(flow) => merged.merge(&flow),
				Err(AclError::NotFound(_)) => {
					tracing::debug!(entry = %entry, "entry missing, skipped");
				}
				Err(e) => return Err(e),
			}
		}

		Ok(merged)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::accessor::{Accessor, Principal};
	use crate::error::GraphError;
	use crate::acl::AccessControl;
	use crate::flow::graph::merge_flows;
	use crate::grant::Grant;
	use crate::memory::InMemoryStore;
	use crate::resource::{DataSet, DataSink, DataSource, FlowLink};
	use crate::role::Role;
	use std::sync::Arc;

	struct Fixture {
		store: Arc<InMemoryStore>,
		viewer: UserId,
		entries: Vec<ResourceRef>,
	}

	fn fixture() -> Fixture {
		let store = Arc::new(InMemoryStore::new());
		let a = UserId::generate();
		let b = UserId::generate();
		let org = OrgId::generate();
		let viewer = UserId::generate();

		let src1 = DataSource::new(a, None, "a1");
		let set1 = DataSet::from_source(a, None, "a1 raw", src1.id);
		let child1 = DataSet::derived_from(a, None, "a1 clean", set1.id);
		let sink1 = DataSink::new(a, None, "a1 out", child1.id);
		let src2 = DataSource::new(a, None, "a2");
		let set2 = DataSet::from_source(a, None, "a2 raw", src2.id);
		let src3 = DataSource::new(b, Some(org), "b1");
		let set3 = DataSet::from_source(b, Some(org), "b1 raw", src3.id);
		store.add_flow_link(FlowLink::new(sink1.id, src2.id));

		let entries: Vec<ResourceRef> = vec![
			src1.id.into(),
			src2.id.into(),
			src3.id.into(),
			child1.id.into(),
			sink1.id.into(),
		];
		for entry in &entries {
			store.add_grant(Grant::new(Accessor::User(viewer), None, *entry, Role::Viewer));
		}

		store.add_source(src1);
		store.add_set(set1);
		store.add_set(child1);
		store.add_sink(sink1);
		store.add_source(src2);
		store.add_set(set2);
		store.add_source(src3);
		store.add_set(set3);

		Fixture {
			store,
			viewer,
			entries,
		}
	}

	fn builder(store: &Arc<InMemoryStore>) -> FlowBuilder {
		FlowBuilder::new(store.clone(), AccessControl::new(store.clone(), store.clone()))
	}

	#[tokio::test]
	async fn groups_sources_by_owner_and_org() {
		let f = fixture();
		let groups = builder(&f.store)
			.group_sources_by_owner(&f.entries)
			.await
			.unwrap();

		assert_eq!(groups.groups.len(), 2);
		assert_eq!(groups.source_count(), 3);
		assert_eq!(groups.others.len(), 2);
	}

	#[tokio::test]
	async fn missing_sources_are_dropped() {
		let f = fixture();
		let mut entries = f.entries.clone();
		entries.push(SourceId::generate().into());
		let groups = builder(&f.store)
			.group_sources_by_owner(&entries)
			.await
			.unwrap();
		assert_eq!(groups.source_count(), 3);
	}

	#[tokio::test]
	async fn quick_matches_per_entry_merge() {
		let f = fixture();
		let b = builder(&f.store);
		let vp = Viewpoint::resolve(Principal::user(f.viewer), None, f.store.as_ref())
			.await
			.unwrap();

		for options in [
			FlowOptions::default(),
			FlowOptions::full_tree(),
			FlowOptions::downstream_only(),
		] {
			let mut cache = FlowCache::new();
			let mut per_entry = Vec::new();
			for entry in &f.entries {
				per_entry.push(b.build_flow(&mut cache, *entry, &vp, options).await.unwrap());
			}
			let expected = merge_flows(per_entry);

			let mut quick_cache = FlowCache::new();
			let groups = b.group_sources_by_owner(&f.entries).await.unwrap();
			let quick = b
				.build_flows_quick(&mut quick_cache, &groups, &vp, options)
				.await
				.unwrap();

			assert_eq!(quick, expected, "options {options:?}");
		}
	}

	#[tokio::test]
	async fn depth_is_measured_from_each_source_in_a_group() {
		let store = Arc::new(InMemoryStore::new());
		let owner = UserId::generate();

		// deep: source -> d1 -> d2 -> sink -> shared (4 hops), shared -> x1 (5)
		// near: source -> n1 -> sink -> shared (3 hops), shared -> x1 (4)
		let shared = DataSource::new(owner, None, "shared");
		let x1 = DataSet::from_source(owner, None, "shared raw", shared.id);
		let deep = DataSource::new(owner, None, "deep");
		let d1 = DataSet::from_source(owner, None, "deep raw", deep.id);
		let d2 = DataSet::derived_from(owner, None, "deep clean", d1.id);
		let deep_out = DataSink::new(owner, None, "deep out", d2.id);
		let near = DataSource::new(owner, None, "near");
		let n1 = DataSet::from_source(owner, None, "near raw", near.id);
		let near_out = DataSink::new(owner, None, "near out", n1.id);
		store.add_flow_link(FlowLink::new(deep_out.id, shared.id));
		store.add_flow_link(FlowLink::new(near_out.id, shared.id));
		let (deep_id, near_id) = (deep.id, near.id);
		store.add_source(shared);
		store.add_set(x1);
		store.add_source(deep);
		store.add_set(d1);
		store.add_set(d2);
		store.add_sink(deep_out);
		store.add_source(near);
		store.add_set(n1);
		store.add_sink(near_out);

		let b = builder(&store).with_max_depth(4);
		let vp = Viewpoint::resolve(Principal::user(owner), None, store.as_ref())
			.await
			.unwrap();
		let options = FlowOptions::downstream_only();

		let mut cache = FlowCache::new();
		let per_entry = b.build_flow(&mut cache, deep_id.into(), &vp, options).await;
		assert!(matches!(
			per_entry,
			Err(AclError::InvalidGraph(GraphError::DepthExceeded { limit: 4 }))
		));
		assert!(b.build_flow(&mut cache, near_id.into(), &vp, options).await.is_ok());

		let entries = vec![deep_id.into(), near_id.into()];
		let groups = b.group_sources_by_owner(&entries).await.unwrap();
		assert_eq!(groups.groups.len(), 1);
		let quick = b
			.build_flows_quick(&mut FlowCache::new(), &groups, &vp, options)
			.await;
		assert!(matches!(
			quick,
			Err(AclError::InvalidGraph(GraphError::DepthExceeded { limit: 4 }))
		));
	}
}
