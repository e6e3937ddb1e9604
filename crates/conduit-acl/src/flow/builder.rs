// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flow graph traversal.
//!
//! A traversal starts at one or more entry nodes and runs in two phases:
//!
//! 1. **Upstream**: sink to its set, set up its parent chain to the
//!    originating source, source back to any sink linked into it. Skipped
//!    when `downstream_only` is set.
//! 2. **Downstream**: breadth-first from the roots (the entries, or every
//!    node reached upstream when `full_tree` is set) through child sets,
//!    sinks and flow links.
//!
//! Edges that cross an ownership boundary are only followed when the
//! viewpoint can see the far node. Parent-chain cycles and paths longer than
//! the configured depth are reported as [`GraphError`]s.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::acl::AccessControl;
use crate::error::{AclError, GraphError, Result};
use crate::flow::cache::{FlowCache, FlowCacheKey};
use crate::flow::graph::{Flow, FlowEdge};
use crate::resource::{DataSet, ResourceNode};
use crate::store::ResourceStore;
use crate::types::{ResourceRef, SetId};
use crate::viewpoint::Viewpoint;

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Traversal direction flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowOptions {
	/// Only follow edges away from the entry.
	pub downstream_only: bool,
	/// Also include branches hanging off the entry's ancestors.
	pub full_tree: bool,
}

impl FlowOptions {
	pub fn downstream_only() -> Self {
		Self {
			downstream_only: true,
			full_tree: false,
		}
	}

	pub fn full_tree() -> Self {
		Self {
			downstream_only: false,
			full_tree: true,
		}
	}
}

#[derive(Clone)]
pub struct FlowBuilder {
	resources: Arc<dyn ResourceStore>,
	access: AccessControl,
	max_depth: usize,
}

impl FlowBuilder {
	pub fn new(resources: Arc<dyn ResourceStore>, access: AccessControl) -> Self {
		Self {
			resources,
			access,
			max_depth: DEFAULT_MAX_DEPTH,
		}
	}

	pub fn with_max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth;
		self
	}

	pub fn max_depth(&self) -> usize {
		self.max_depth
	}

	pub fn access(&self) -> &AccessControl {
		&self.access
	}

	pub(crate) fn resources(&self) -> &dyn ResourceStore {
		self.resources.as_ref()
	}

	/// Builds the flow around `entry` as seen from `viewpoint`, memoized in `cache`.
	#[instrument(skip(self, cache, viewpoint), fields(entry = %entry, principal = %viewpoint.accessor()))]
	pub async fn build_flow(
		&self,
		cache: &mut FlowCache,
		entry: ResourceRef,
		viewpoint: &Viewpoint,
		options: FlowOptions,
	) -> Result<Arc<Flow>> {
		let key = FlowCacheKey {
			resource: entry,
			principal: viewpoint.accessor(),
			org_id: viewpoint.org_id(),
			options,
		};
		cache
			.get_or_compute(key, || async move {
				self
					.traverse(std::slice::from_ref(&entry), viewpoint, options)
					.await
			})
			.await
	}

	/// Traverses from every entry, without caching.
	///
	/// Node and visibility lookups are shared between entries, but each entry
	/// is walked with its own depth budget, so the result and any error match
	/// building the entries one at a time.
	///
	/// # Errors
	/// - [`AclError::NotFound`] if an entry does not exist
	/// - [`AclError::InvalidGraph`] on a derivation cycle or depth overflow
	#[instrument(skip(self, entries, viewpoint), fields(entries = entries.len(), principal = %viewpoint.accessor()))]
	pub async fn traverse(
		&self,
		entries: &[ResourceRef],
		viewpoint: &Viewpoint,
		options: FlowOptions,
	) -> Result<Flow> {
		let mut walk = Walk::new(self, viewpoint);

		for &entry in entries {
			walk.restart();
			let node = walk
				.node(entry)
				.await?
				.ok_or_else(|| AclError::resource_not_found(entry))?;
			walk.flow.insert_node(entry);

			let roots = if options.downstream_only {
				if let ResourceNode::Set(set) = &node {
					walk.check_lineage(set).await?;
				}
				vec![entry]
			} else {
				let reached = walk.upstream(node).await?;
				if options.full_tree {
					reached
				} else {
					vec![entry]
				}
			};

			walk.downstream(roots).await?;
		}

		tracing::debug!(
			nodes = walk.flow.node_count(),
			edges = walk.flow.edge_count(),
			"flow traversed"
		);
		Ok(walk.flow)
	}
}

/// State of a single traversal.
struct Walk<'a> {
	resources: &'a dyn ResourceStore,
	access: &'a AccessControl,
	viewpoint: &'a Viewpoint,
	max_depth: usize,
	nodes: HashMap<ResourceRef, Option<ResourceNode>>,
	visible: HashMap<ResourceRef, bool>,
	climbed: HashSet<ResourceRef>,
	expanded: HashSet<ResourceRef>,
	flow: Flow,
}

impl<'a> Walk<'a> {
	fn new(builder: &'a FlowBuilder, viewpoint: &'a Viewpoint) -> Self {
		Self {
			resources: builder.resources.as_ref(),
			access: &builder.access,
			viewpoint,
			max_depth: builder.max_depth,
			nodes: HashMap::new(),
			visible: HashMap::new(),
			climbed: HashSet::new(),
			expanded: HashSet::new(),
			flow: Flow::new(),
		}
	}

	/// Forgets which nodes were walked so the next entry starts at depth zero.
	fn restart(&mut self) {
		self.climbed.clear();
		self.expanded.clear();
	}

	async fn node(&mut self, resource: ResourceRef) -> Result<Option<ResourceNode>> {
		if let Some(node) = self.nodes.get(&resource) {
			return Ok(node.clone());
		}
		let node = self.resources.get_node(resource).await?;
		self.nodes.insert(resource, node.clone());
		Ok(node)
	}

	async fn set(&mut self, id: SetId) -> Result<Option<DataSet>> {
		match self.node(id.into()).await? {
			Some(ResourceNode::Set(set)) => Ok(Some(set)),
			_ => Ok(None),
		}
	}

	fn remember(&mut self, node: &ResourceNode) {
		self
			.nodes
			.insert(node.resource_ref(), Some(node.clone()));
	}

	fn descend(&self, depth: usize) -> Result<usize> {
		let next = depth + 1;
		if next > self.max_depth {
			return Err(GraphError::DepthExceeded {
				limit: self.max_depth,
			}
			.into());
		}
		Ok(next)
	}

	/// Whether the edge from `near` to `far` may appear in the flow.
	async fn admit(&mut self, near: &ResourceNode, far: &ResourceNode) -> bool {
		if !near.crosses_boundary(far) {
			return true;
		}
		let key = far.resource_ref();
		if let Some(visible) = self.visible.get(&key) {
			return *visible;
		}
		let visible = self.access.can_view(self.viewpoint, far).await;
		if !visible {
			tracing::debug!(from = %near.resource_ref(), to = %key, "boundary edge hidden from viewpoint");
		}
		self.visible.insert(key, visible);
		visible
	}

	/// Walks towards the origins of `entry`, returning every node reached.
	async fn upstream(&mut self, entry: ResourceNode) -> Result<Vec<ResourceRef>> {
		let mut reached = Vec::new();
		let mut stack = vec![(entry, 0usize)];

		while let Some((node, depth)) = stack.pop() {
			let here = node.resource_ref();
			if !self.climbed.insert(here) {
				continue;
			}
			reached.push(here);

			match &node {
				ResourceNode::Sink(sink) => {
					let Some(set_id) = sink.data_set_id else {
						continue;
					};
					let next = self.descend(depth)?;
					let Some(set) = self.set(set_id).await? else {
						continue;
					};
					let set = ResourceNode::Set(set);
					if self.admit(&node, &set).await {
						self.flow.insert_edge(FlowEdge::output(set_id, sink.id));
						stack.push((set, next));
					}
				}
				ResourceNode::Set(set) => {
					if let Some(origin) = self.climb_lineage(set, depth, &mut reached).await? {
						stack.push(origin);
					}
				}
				ResourceNode::Source(source) => {
					for link in self.resources.flow_links_to_source(source.id).await? {
						let next = self.descend(depth)?;
						let Some(sink) = self.node(link.sink_id.into()).await? else {
							continue;
						};
						if self.admit(&node, &sink).await {
							self.flow.insert_edge(FlowEdge::link(link.sink_id, source.id));
							stack.push((sink, next));
						}
					}
				}
			}
		}

		Ok(reached)
	}

	/// Follows the parent chain of `start`, returning its originating source
	/// when the chain reaches one that is visible.
	async fn climb_lineage(
		&mut self,
		start: &DataSet,
		depth: usize,
		reached: &mut Vec<ResourceRef>,
	) -> Result<Option<(ResourceNode, usize)>> {
		let mut chain = HashSet::from([start.id]);
		let mut current = start.clone();
		let mut depth = depth;

		loop {
			let near = ResourceNode::Set(current.clone());
			let Some(parent_id) = current.parent_set_id else {
				let Some(source_id) = current.data_source_id else {
					return Ok(None);
				};
				let next = self.descend(depth)?;
				let Some(source) = self.node(source_id.into()).await? else {
					return Ok(None);
				};
				if !self.admit(&near, &source).await {
					return Ok(None);
				}
				self.flow.insert_edge(FlowEdge::origin(source_id, current.id));
				return Ok(Some((source, next)));
			};

			if !chain.insert(parent_id) {
				tracing::warn!(set_id = %parent_id, "derivation cycle detected");
				return Err(GraphError::Cycle { set_id: parent_id }.into());
			}
			depth = self.descend(depth)?;

			let Some(parent) = self.set(parent_id).await? else {
				tracing::debug!(set_id = %current.id, parent_id = %parent_id, "parent set missing, lineage ends");
				return Ok(None);
			};
			if !self.admit(&near, &ResourceNode::Set(parent.clone())).await {
				return Ok(None);
			}
			self.flow.insert_edge(FlowEdge::derivation(parent_id, current.id));
			if !self.climbed.insert(parent_id.into()) {
				return Ok(None);
			}
			reached.push(parent_id.into());
			current = parent;
		}
	}

	/// Checks the parent chain of `start` for cycles without adding anything to the flow.
	async fn check_lineage(&mut self, start: &DataSet) -> Result<()> {
		let mut chain = HashSet::from([start.id]);
		let mut parent = start.parent_set_id;
		let mut depth = 0;

		while let Some(id) = parent {
			if !chain.insert(id) {
				tracing::warn!(set_id = %id, "derivation cycle detected");
				return Err(GraphError::Cycle { set_id: id }.into());
			}
			depth = self.descend(depth)?;
			parent = self.set(id).await?.and_then(|set| set.parent_set_id);
		}
		Ok(())
	}

	async fn downstream(&mut self, roots: Vec<ResourceRef>) -> Result<()> {
		let mut queue: VecDeque<(ResourceRef, usize)> = roots.into_iter().map(|r| (r, 0)).collect();

		while let Some((here, depth)) = queue.pop_front() {
			if !self.expanded.insert(here) {
				continue;
			}
			let Some(node) = self.node(here).await? else {
				continue;
			};
			self.flow.insert_node(here);

			match &node {
				ResourceNode::Source(source) => {
					for set in self.resources.sets_for_source(source.id).await? {
						let edge = FlowEdge::origin(source.id, set.id);
						self.follow(&node, set.into(), edge, depth, &mut queue).await?;
					}
				}
				ResourceNode::Set(set) => {
					for child in self.resources.child_sets(set.id).await? {
						let edge = FlowEdge::derivation(set.id, child.id);
						self.follow(&node, child.into(), edge, depth, &mut queue).await?;
					}
					for sink in self.resources.sinks_for_set(set.id).await? {
						let edge = FlowEdge::output(set.id, sink.id);
						self.follow(&node, sink.into(), edge, depth, &mut queue).await?;
					}
				}
				ResourceNode::Sink(sink) => {
					for link in self.resources.flow_links_from_sink(sink.id).await? {
						let Some(source) = self.node(link.source_id.into()).await? else {
							continue;
						};
						let edge = FlowEdge::link(sink.id, link.source_id);
						self.follow(&node, source, edge, depth, &mut queue).await?;
					}
				}
			}
		}

		Ok(())
	}

	async fn follow(
		&mut self,
		near: &ResourceNode,
		far: ResourceNode,
		edge: FlowEdge,
		depth: usize,
		queue: &mut VecDeque<(ResourceRef, usize)>,
	) -> Result<()> {
		if !self.admit(near, &far).await {
			return Ok(());
		}
		let target = far.resource_ref();
		self.flow.insert_edge(edge);
		if self.expanded.contains(&target) {
			return Ok(());
		}
		let next = self.descend(depth)?;
		self.remember(&far);
		queue.push_back((target, next));
		Ok(())
	}
}
