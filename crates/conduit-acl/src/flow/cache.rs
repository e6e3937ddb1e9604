// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-scoped memoization of flow traversals.
//!
//! A [`FlowCache`] is created at the start of one logical request and
//! dropped at its end. It is passed by `&mut` through the call chain, so it
//! is never shared between tasks and needs no locking.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::accessor::Accessor;
use crate::error::Result;
use crate::flow::builder::FlowOptions;
use crate::flow::graph::Flow;
use crate::types::{OrgId, ResourceRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowCacheKey {
	pub resource: ResourceRef,
	pub principal: Accessor,
	pub org_id: Option<OrgId>,
	pub options: FlowOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
	pub entries: usize,
	pub hits: u64,
	pub misses: u64,
}

#[derive(Debug, Default)]
pub struct FlowCache {
	entries: HashMap<FlowCacheKey, Arc<Flow>>,
	hits: u64,
	misses: u64,
}

impl FlowCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &FlowCacheKey) -> Option<Arc<Flow>> {
		self.entries.get(key).cloned()
	}

	/// Returns the cached flow for `key`, or runs `compute` and caches its result.
	///
	/// Failed computations are not cached.
	pub async fn get_or_compute<F, Fut>(&mut self, key: FlowCacheKey, compute: F) -> Result<Arc<Flow>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Flow>>,
	{
		if let Some(flow) = self.entries.get(&key) {
			self.hits += 1;
			tracing::trace!(resource = %key.resource, principal = %key.principal, "flow cache hit");
			return Ok(Arc::clone(flow));
		}

		self.misses += 1;
		let flow = Arc::new(compute().await?);
		self.entries.insert(key, Arc::clone(&flow));
		Ok(flow)
	}

	/// Drops every cached flow computed from `resource`.
	pub fn invalidate(&mut self, resource: ResourceRef) {
		self.entries.retain(|key, _| key.resource != resource);
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn stats(&self) -> CacheStats {
		CacheStats {
			entries: self.entries.len(),
			hits: self.hits,
			misses: self.misses,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{AclError, GraphError};
	use crate::flow::graph::FlowEdge;
	use crate::types::{SetId, SourceId, UserId};
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn key(resource: ResourceRef, principal: Accessor) -> FlowCacheKey {
		FlowCacheKey {
			resource,
			principal,
			org_id: None,
			options: FlowOptions::default(),
		}
	}

	fn sample_flow() -> Flow {
		let mut flow = Flow::new();
		flow.insert_edge(FlowEdge::origin(SourceId::generate(), SetId::generate()));
		flow
	}

	#[tokio::test]
	async fn identical_key_computes_once() {
		let mut cache = FlowCache::new();
		let calls = AtomicUsize::new(0);
		let k = key(SetId::generate().into(), Accessor::User(UserId::generate()));

		let first = cache
			.get_or_compute(k, || async {
				calls.fetch_add(1, Ordering::SeqCst);
				Ok(sample_flow())
			})
			.await
			.unwrap();
		let second = cache
			.get_or_compute(k, || async {
				calls.fetch_add(1, Ordering::SeqCst);
				Ok(sample_flow())
			})
			.await
			.unwrap();

		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(
			cache.stats(),
			CacheStats {
				entries: 1,
				hits: 1,
				misses: 1
			}
		);
	}

	#[tokio::test]
	async fn different_principals_never_share_entries() {
		let mut cache = FlowCache::new();
		let resource: ResourceRef = SetId::generate().into();
		let a = key(resource, Accessor::User(UserId::generate()));
		let b = key(resource, Accessor::User(UserId::generate()));

		let first = cache.get_or_compute(a, || async { Ok(sample_flow()) }).await.unwrap();
		let second = cache.get_or_compute(b, || async { Ok(sample_flow()) }).await.unwrap();

		assert!(!Arc::ptr_eq(&first, &second));
		assert_ne!(*first, *second);
		assert_eq!(cache.len(), 2);
	}

	#[tokio::test]
	async fn options_are_part_of_the_key() {
		let mut cache = FlowCache::new();
		let base = key(SetId::generate().into(), Accessor::User(UserId::generate()));
		let downstream = FlowCacheKey {
			options: FlowOptions {
				downstream_only: true,
				full_tree: false,
			},
			..base
		};

		cache.get_or_compute(base, || async { Ok(sample_flow()) }).await.unwrap();
		assert!(cache.get(&downstream).is_none());
	}

	#[tokio::test]
	async fn errors_are_not_cached() {
		let mut cache = FlowCache::new();
		let k = key(SetId::generate().into(), Accessor::User(UserId::generate()));

		let err = cache
			.get_or_compute(k, || async {
				Err(AclError::InvalidGraph(GraphError::DepthExceeded { limit: 1 }))
			})
			.await
			.unwrap_err();
		assert!(matches!(err, AclError::InvalidGraph(_)));
		assert!(cache.is_empty());

		cache.get_or_compute(k, || async { Ok(Flow::new()) }).await.unwrap();
		assert_eq!(cache.len(), 1);
	}

	#[tokio::test]
	async fn invalidate_drops_only_matching_resource() {
		let mut cache = FlowCache::new();
		let user = Accessor::User(UserId::generate());
		let a = key(SetId::generate().into(), user);
		let b = key(SetId::generate().into(), user);
		cache.get_or_compute(a, || async { Ok(Flow::new()) }).await.unwrap();
		cache.get_or_compute(b, || async { Ok(Flow::new()) }).await.unwrap();

		cache.invalidate(a.resource);
		assert!(cache.get(&a).is_none());
		assert!(cache.get(&b).is_some());

		cache.clear();
		assert!(cache.is_empty());
	}
}
