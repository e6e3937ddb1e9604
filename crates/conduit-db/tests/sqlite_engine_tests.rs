// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The access-control engine running against the SQLite repositories.

use std::sync::Arc;

use conduit_acl::memory::RecordingEmitter;
use conduit_acl::{
	AccessControl, Accessor, AclPropagator, ControlEventKind, DataSet, DataSink, DataSource,
	FlowBuilder, FlowCache, FlowLink, FlowService, GrantService, ListFlowsOptions, OrgId,
	OrgMembership, OrgRole, Principal, ResourceRef, ResourceStatus, Role, UserId, Viewpoint,
};
use conduit_db::testing::create_test_pool;
use conduit_db::{GrantRepository, MembershipRepository, ResourceRepository};

struct Repos {
	grants: Arc<GrantRepository>,
	resources: Arc<ResourceRepository>,
	memberships: Arc<MembershipRepository>,
}

async fn repos() -> Repos {
	let pool = create_test_pool().await;
	Repos {
		grants: Arc::new(GrantRepository::new(pool.clone())),
		resources: Arc::new(ResourceRepository::new(pool.clone())),
		memberships: Arc::new(MembershipRepository::new(pool)),
	}
}

#[tokio::test]
async fn shared_set_lists_with_upstream_and_linked_flow() {
	let r = repos().await;
	let org = OrgId::generate();
	let producer = UserId::generate();
	let analyst = UserId::generate();
	r.memberships.create_org(org, "Acme").await.unwrap();
	for user in [producer, analyst] {
		r
			.memberships
			.add_org_member(&OrgMembership::new(org, user, OrgRole::Member))
			.await
			.unwrap();
	}

	let orders = DataSource::new(producer, Some(org), "orders");
	let raw = DataSet::from_source(producer, Some(org), "orders raw", orders.id);
	let export = DataSink::new(producer, Some(org), "orders export", raw.id);
	let feed = DataSource::new(producer, Some(org), "feed");
	let feed_raw = DataSet::from_source(producer, Some(org), "feed raw", feed.id);
	r.resources.create_source(&orders).await.unwrap();
	r.resources.create_set(&raw).await.unwrap();
	r.resources.create_sink(&export).await.unwrap();
	r.resources.create_source(&feed).await.unwrap();
	r.resources.create_set(&feed_raw).await.unwrap();
	r
		.resources
		.create_flow_link(&FlowLink::new(export.id, feed.id))
		.await
		.unwrap();

	let emitter = Arc::new(RecordingEmitter::new());
	let grants = GrantService::new(
		r.grants.clone(),
		AclPropagator::new(r.resources.clone(), r.memberships.clone(), emitter.clone()),
	);
	grants
		.share(Accessor::User(analyst), Some(org), raw.id.into(), Role::Viewer)
		.await
		.unwrap();

	let access = AccessControl::new(r.grants.clone(), r.resources.clone());
	let flows = FlowService::new(FlowBuilder::new(r.resources.clone(), access));
	let vp = Viewpoint::resolve(Principal::user(analyst), Some(org), r.memberships.as_ref())
		.await
		.unwrap();

	let mut cache = FlowCache::new();
	let flow = flows
		.list_visible_flows(&mut cache, &vp, ListFlowsOptions::default())
		.await
		.unwrap();
	assert!(flow.contains(ResourceRef::Source(orders.id)));
	assert!(flow.contains(ResourceRef::Sink(export.id)));
	assert!(flow.contains(ResourceRef::Set(feed_raw.id)));

	let mut cache = FlowCache::new();
	let quick = flows
		.list_visible_flows(
			&mut cache,
			&vp,
			ListFlowsOptions {
				quick: true,
				..Default::default()
			},
		)
		.await
		.unwrap();
	assert_eq!(quick, flow);

	let outsider = Viewpoint::resolve(Principal::user(UserId::generate()), Some(org), r.memberships.as_ref())
		.await
		.unwrap();
	let mut cache = FlowCache::new();
	let nothing = flows
		.list_visible_flows(&mut cache, &outsider, ListFlowsOptions::default())
		.await
		.unwrap();
	assert!(nothing.is_empty());
}

#[tokio::test]
async fn share_and_revoke_signal_the_derived_set() {
	let r = repos().await;
	let org = OrgId::generate();
	let parent_owner = UserId::generate();
	let child_owner = UserId::generate();
	r.memberships.create_org(org, "Acme").await.unwrap();
	for user in [parent_owner, child_owner] {
		r
			.memberships
			.add_org_member(&OrgMembership::new(org, user, OrgRole::Member))
			.await
			.unwrap();
	}

	let source = DataSource::new(parent_owner, Some(org), "clicks");
	let parent = DataSet::from_source(parent_owner, Some(org), "sessions", source.id)
		.with_status(ResourceStatus::Active);
	let child = DataSet::derived_from(child_owner, Some(org), "funnels", parent.id)
		.with_status(ResourceStatus::Active);
	r.resources.create_source(&source).await.unwrap();
	r.resources.create_set(&parent).await.unwrap();
	r.resources.create_set(&child).await.unwrap();

	let emitter = Arc::new(RecordingEmitter::new());
	let grants = GrantService::new(
		r.grants.clone(),
		AclPropagator::new(r.resources.clone(), r.memberships.clone(), emitter.clone()),
	);

	let shared = grants
		.share(Accessor::User(child_owner), Some(org), parent.id.into(), Role::Sharer)
		.await
		.unwrap();
	assert_eq!(shared.report.published(), 1);

	let demoted = grants.change_role(shared.grant.id, Role::Viewer).await.unwrap();
	assert_eq!(demoted.report.events[0].kind, ControlEventKind::Pause);

	let promoted = grants.change_role(shared.grant.id, Role::Admin).await.unwrap();
	assert_eq!(promoted.report.events[0].kind, ControlEventKind::Activate);

	let removed = grants
		.revoke_all_for_resource(parent.id.into())
		.await
		.unwrap();
	assert_eq!(removed.len(), 1);
	assert_eq!(removed[0].report.events[0].kind, ControlEventKind::Pause);

	let kinds: Vec<_> = emitter.events().iter().map(|e| e.kind).collect();
	assert_eq!(
		kinds,
		vec![
			ControlEventKind::Activate,
			ControlEventKind::Pause,
			ControlEventKind::Activate,
			ControlEventKind::Pause,
		]
	);
	assert!(emitter
		.events()
		.iter()
		.all(|e| e.resource == ResourceRef::Set(child.id)));
}
