// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{ResourceRef, SetId, SinkId, SourceId};

/// How two nodes of a flow are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
	/// Source feeding a root set.
	Origin,
	/// Parent set to derived set.
	Derivation,
	/// Set feeding a sink.
	Output,
	/// Sink feeding the source of another flow.
	Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowEdge {
	pub from: ResourceRef,
	pub to: ResourceRef,
	pub kind: EdgeKind,
}

impl FlowEdge {
	pub fn origin(source: SourceId, set: SetId) -> Self {
		Self {
			from: source.into(),
			to: set.into(),
			kind: EdgeKind::Origin,
		}
	}

	pub fn derivation(parent: SetId, child: SetId) -> Self {
		Self {
			from: parent.into(),
			to: child.into(),
			kind: EdgeKind::Derivation,
		}
	}

	pub fn output(set: SetId, sink: SinkId) -> Self {
		Self {
			from: set.into(),
			to: sink.into(),
			kind: EdgeKind::Output,
		}
	}

	pub fn link(sink: SinkId, source: SourceId) -> Self {
		Self {
			from: sink.into(),
			to: source.into(),
			kind: EdgeKind::Link,
		}
	}
}

/// The sources, sets and sinks reachable from one or more entry points,
/// with the edges connecting them.
///
/// Node and edge sets are ordered so two flows with the same content
/// compare and serialize identically regardless of traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
	pub sources: BTreeSet<SourceId>,
	pub sets: BTreeSet<SetId>,
	pub sinks: BTreeSet<SinkId>,
	pub edges: BTreeSet<FlowEdge>,
}

impl Flow {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.sources.is_empty() && self.sets.is_empty() && self.sinks.is_empty()
	}

	pub fn node_count(&self) -> usize {
		self.sources.len() + self.sets.len() + self.sinks.len()
	}

	pub fn edge_count(&self) -> usize {
		self.edges.len()
	}

	pub fn contains(&self, node: ResourceRef) -> bool {
		match node {
			ResourceRef::Source(id) => self.sources.contains(&id),
			ResourceRef::Set(id) => self.sets.contains(&id),
			ResourceRef::Sink(id) => self.sinks.contains(&id),
		}
	}

	/// Adds a node, returning false if it was already present.
	pub fn insert_node(&mut self, node: ResourceRef) -> bool {
		match node {
			ResourceRef::Source(id) => self.sources.insert(id),
			ResourceRef::Set(id) => self.sets.insert(id),
			ResourceRef::Sink(id) => self.sinks.insert(id),
		}
	}

	/// Adds an edge along with both of its endpoints.
	pub fn insert_edge(&mut self, edge: FlowEdge) -> bool {
		self.insert_node(edge.from);
		self.insert_node(edge.to);
		self.edges.insert(edge)
	}

	pub fn nodes(&self) -> impl Iterator<Item = ResourceRef> + '_ {
		self
			.sources
			.iter()
			.map(|id| ResourceRef::Source(*id))
			.chain(self.sets.iter().map(|id| ResourceRef::Set(*id)))
			.chain(self.sinks.iter().map(|id| ResourceRef::Sink(*id)))
	}

	/// Unions `other` into this flow.
	pub fn merge(&mut self, other: &Flow) {
		self.sources.extend(other.sources.iter().copied());
		self.sets.extend(other.sets.iter().copied());
		self.sinks.extend(other.sinks.iter().copied());
		self.edges.extend(other.edges.iter().copied());
	}
}

impl AsRef<Flow> for Flow {
	fn as_ref(&self) -> &Flow {
		self
	}
}

/// Unions any number of flows into one.
///
/// Commutative and idempotent over node and edge sets.
pub fn merge_flows<I>(flows: I) -> Flow
where
	I: IntoIterator,
	I::Item: AsRef<Flow>,
{
	flows.into_iter().fold(Flow::new(), |mut acc, flow| {
		acc.merge(flow.as_ref());
		acc
	})
}
