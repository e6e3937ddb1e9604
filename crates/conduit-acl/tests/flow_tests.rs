// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flow resolution from accessor tuples through listing.

use std::sync::Arc;

use conduit_acl::memory::InMemoryStore;
use conduit_acl::{
	resolve_accessor_tuples, AccessControl, Accessor, AccessorTuple, DataSet, DataSink, DataSource,
	FlowBuilder, FlowCache, FlowEdge, FlowLink, FlowOptions, FlowService, Grant, ListFlowsOptions,
	OrgId, OrgRole, Principal, Role, Team, TeamRole, UserId, Viewpoint,
};

fn flow_service(store: &Arc<InMemoryStore>) -> FlowService {
	let access = AccessControl::new(store.clone(), store.clone());
	FlowService::new(FlowBuilder::new(store.clone(), access))
}

#[tokio::test]
async fn user_tuples_cover_teams_in_context_org_only() {
	let store = InMemoryStore::new();
	let user = UserId::generate();
	let org = OrgId::generate();
	let elsewhere = OrgId::generate();
	let ops = Team::new(org, "Ops");
	let data = Team::new(org, "Data");
	let foreign = Team::new(elsewhere, "Foreign");
	let (ops_id, data_id, foreign_id) = (ops.id, data.id, foreign.id);
	for team in [ops, data, foreign] {
		let id = team.id;
		store.add_team(team);
		store.add_team_member(id, user, TeamRole::Member);
	}

	let tuples = resolve_accessor_tuples(&Principal::user(user), Some(org), &store)
		.await
		.unwrap();

	assert_eq!(tuples.len(), 4);
	assert!(tuples.contains(&AccessorTuple::user(user, Some(org))));
	assert!(tuples.contains(&AccessorTuple::team(ops_id)));
	assert!(tuples.contains(&AccessorTuple::team(data_id)));
	assert!(tuples.contains(&AccessorTuple::org(org)));
	assert!(!tuples.contains(&AccessorTuple::team(foreign_id)));
}

#[tokio::test]
async fn team_grant_exposes_chained_flows() {
	let store = Arc::new(InMemoryStore::new());
	let org = OrgId::generate();
	let producer = UserId::generate();
	let analyst = UserId::generate();
	store.add_org_member(org, producer, OrgRole::Member);
	store.add_org_member(org, analyst, OrgRole::Member);
	let team = Team::new(org, "Analysts");
	let team_id = team.id;
	store.add_team(team);
	store.add_team_member(team_id, analyst, TeamRole::Member);

	let orders = DataSource::new(producer, Some(org), "orders");
	let raw = DataSet::from_source(producer, Some(org), "orders raw", orders.id);
	let daily = DataSet::derived_from(producer, Some(org), "orders daily", raw.id);
	let export = DataSink::new(producer, Some(org), "daily export", daily.id);
	let reports = DataSource::new(producer, Some(org), "report feed");
	let summary = DataSet::from_source(producer, Some(org), "summary", reports.id);
	store.add_flow_link(FlowLink::new(export.id, reports.id));
	store.add_grant(Grant::new(Accessor::Team(team_id), None, daily.id.into(), Role::Viewer));

	let (orders_id, raw_id, daily_id, export_id, reports_id, summary_id) =
		(orders.id, raw.id, daily.id, export.id, reports.id, summary.id);
	store.add_source(orders);
	store.add_set(raw);
	store.add_set(daily);
	store.add_sink(export);
	store.add_source(reports);
	store.add_set(summary);

	let vp = Viewpoint::resolve(Principal::user(analyst), Some(org), store.as_ref())
		.await
		.unwrap();
	let svc = flow_service(&store);

	let mut cache = FlowCache::new();
	let flow = svc
		.list_visible_flows(&mut cache, &vp, ListFlowsOptions::default())
		.await
		.unwrap();

	assert_eq!(flow.sources, [orders_id, reports_id].into_iter().collect());
	assert_eq!(flow.sets, [raw_id, daily_id, summary_id].into_iter().collect());
	assert!(flow.edges.contains(&FlowEdge::link(export_id, reports_id)));

	let mut cache = FlowCache::new();
	let quick = svc
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

	let mut cache = FlowCache::new();
	let downstream = svc
		.list_visible_flows(
			&mut cache,
			&vp,
			ListFlowsOptions {
				traversal: FlowOptions::downstream_only(),
				..Default::default()
			},
		)
		.await
		.unwrap();
	assert!(!downstream.sources.contains(&orders_id));
	assert!(downstream.sets.contains(&summary_id));
}

#[tokio::test]
async fn cache_is_scoped_to_the_request() {
	let store = Arc::new(InMemoryStore::new());
	let owner = UserId::generate();
	let source = DataSource::new(owner, None, "metrics");
	let set = DataSet::from_source(owner, None, "metrics raw", source.id);
	let source_id = source.id;
	store.add_source(source);
	store.add_set(set);

	let vp = Viewpoint::resolve(Principal::user(owner), None, store.as_ref())
		.await
		.unwrap();
	let svc = flow_service(&store);

	let mut first_request = FlowCache::new();
	let before = svc
		.builder()
		.build_flow(&mut first_request, source_id.into(), &vp, FlowOptions::default())
		.await
		.unwrap();
	assert_eq!(before.sets.len(), 1);

	store.add_set(DataSet::from_source(owner, None, "metrics sampled", source_id));

	let cached = svc
		.builder()
		.build_flow(&mut first_request, source_id.into(), &vp, FlowOptions::default())
		.await
		.unwrap();
	assert!(Arc::ptr_eq(&before, &cached));

	let mut second_request = FlowCache::new();
	let fresh = svc
		.builder()
		.build_flow(&mut second_request, source_id.into(), &vp, FlowOptions::default())
		.await
		.unwrap();
	assert_eq!(fresh.sets.len(), 2);
}
