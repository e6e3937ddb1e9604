// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory database helpers for tests.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::schema::apply_schema;

/// A single-connection `:memory:` pool with the full schema applied.
///
/// One connection keeps every query on the same in-memory database.
pub async fn create_test_pool() -> SqlitePool {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect(":memory:")
		.await
		.unwrap();
	apply_schema(&pool).await.unwrap();
	pool
}
