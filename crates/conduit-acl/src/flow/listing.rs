// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeSet;

use tracing::instrument;

use crate::accessor::Principal;
use crate::error::{AclError, Result};
use crate::flow::builder::{FlowBuilder, FlowOptions};
use crate::flow::cache::FlowCache;
use crate::flow::graph::Flow;
use crate::types::{ResourceRef, ResourceStatus};
use crate::viewpoint::Viewpoint;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFlowsOptions {
	/// Batch source entries by owner instead of traversing each one.
	pub quick: bool,
	/// Only list flows entered through resources in this status.
	pub status: Option<ResourceStatus>,
	pub traversal: FlowOptions,
}

/// Lists every flow a viewpoint can reach through its grants and owned sources.
#[derive(Clone)]
pub struct FlowService {
	builder: FlowBuilder,
}

impl FlowService {
	pub fn new(builder: FlowBuilder) -> Self {
		Self { builder }
	}

	pub fn builder(&self) -> &FlowBuilder {
		&self.builder
	}

	#[instrument(skip(self, cache, viewpoint), fields(principal = %viewpoint.accessor(), org_id = ?viewpoint.org_id()))]
	pub async fn list_visible_flows(
		&self,
		cache: &mut FlowCache,
		viewpoint: &Viewpoint,
		options: ListFlowsOptions,
	) -> Result<Flow> {
		let entries = self.entry_points(viewpoint, options.status).await?;

		let flow = if options.quick {
			let groups = self.builder.group_sources_by_owner(&entries).await?;
			self
				.builder
				.build_flows_quick(cache, &groups, viewpoint, options.traversal)
				.await?
		} else {
			let mut merged = Flow::new();
			for entry in entries {
				match self
					.builder
					.build_flow(cache, entry, viewpoint, options.traversal)
					.await
				{
					Ok(flow) => merged.merge(&flow),
					Err(AclError::NotFound(_)) => {
						tracing::debug!(entry = %entry, "entry missing, skipped");
					}
					Err(e) => return Err(e),
				}
			}
			merged
		};

		tracing::info!(
			nodes = flow.node_count(),
			edges = flow.edge_count(),
			quick = options.quick,
			"visible flows listed"
		);
		Ok(flow)
	}

	/// Granted resources plus the sources the viewing user owns in the context org.
	async fn entry_points(
		&self,
		viewpoint: &Viewpoint,
		status: Option<ResourceStatus>,
	) -> Result<Vec<ResourceRef>> {
		let access = self.builder.access();
		let mut grants = access.grants_for(viewpoint.tuples()).await?;
		if let Some(status) = status {
			grants = access.filter_by_status(grants, status).await?;
		}

		let mut entries: BTreeSet<ResourceRef> = grants.iter().map(|g| g.resource).collect();

		if let Principal::User { id } = viewpoint.principal() {
			let owned = self
				.builder
				.resources()
				.sources_owned_by(*id, viewpoint.org_id())
				.await?;
			entries.extend(
				owned
					.into_iter()
					.filter(|source| status.is_none_or(|s| source.status == s))
					.map(|source| ResourceRef::Source(source.id)),
			);
		}

		Ok(entries.into_iter().collect())
	}
}
