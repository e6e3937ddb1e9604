// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant lifecycle changes flowing through the control plane into the outbox.

use std::sync::Arc;

use conduit_acl::memory::InMemoryStore;
use conduit_acl::{
	Accessor, AclPropagator, ControlEventKind, DataSet, DataSource, GrantService, OrgId, OrgRole,
	ResourceRef, ResourceStatus, Role, UserId,
};
use conduit_control::{ControlConfig, ControlPlaneService, QueueOverflowPolicy, SqliteControlSink};
use sqlx::sqlite::SqlitePoolOptions;

#[tokio::test]
async fn share_and_revoke_land_in_outbox_in_order() {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect(":memory:")
		.await
		.unwrap();

	let config = ControlConfig {
		queue_capacity: 8,
		overflow_policy: QueueOverflowPolicy::Block,
		tracing_sink: true,
		sqlite_sink: true,
	};
	let control = Arc::new(
		ControlPlaneService::from_config(&config, Some(pool.clone()))
			.await
			.unwrap(),
	);

	let store = Arc::new(InMemoryStore::new());
	let org = OrgId::generate();
	let parent_owner = UserId::generate();
	let child_owner = UserId::generate();
	store.add_org_member(org, parent_owner, OrgRole::Member);
	store.add_org_member(org, child_owner, OrgRole::Member);
	let source = DataSource::new(parent_owner, Some(org), "clicks");
	let parent = DataSet::from_source(parent_owner, Some(org), "sessions", source.id);
	let child = DataSet::derived_from(child_owner, Some(org), "funnels", parent.id)
		.with_status(ResourceStatus::Active);
	let (parent_id, child_id) = (parent.id, child.id);
	store.add_source(source);
	store.add_set(parent);
	store.add_set(child);

	let grants = GrantService::new(
		store.clone(),
		AclPropagator::new(store.clone(), store.clone(), control.clone()),
	);
	let shared = grants
		.share(Accessor::User(child_owner), Some(org), parent_id.into(), Role::Sharer)
		.await
		.unwrap();
	assert_eq!(shared.report.published(), 1);
	let revoked = grants.revoke(shared.grant.id).await.unwrap();
	assert_eq!(revoked.report.published(), 1);

	drop(grants);
	let control = Arc::try_unwrap(control).ok().unwrap();
	control.shutdown().await;

	let outbox = SqliteControlSink::new(pool);
	let pending = outbox.pending(10).await.unwrap();
	assert_eq!(pending.len(), 2);
	assert!(pending.iter().all(|e| e.resource == ResourceRef::Set(child_id)));
	assert!(pending.iter().all(|e| e.grant_id == shared.grant.id));
	assert_eq!(pending[0].kind, ControlEventKind::Activate);
	assert_eq!(pending[1].kind, ControlEventKind::Pause);
}
