// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use conduit_acl::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for StoreError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::NotFound(msg) => StoreError::NotFound(msg),
			DbError::Internal(msg) => StoreError::Corrupt(msg),
			other => StoreError::Backend(other.to_string()),
		}
	}
}

/// Maps unique-constraint violations to [`DbError::Conflict`].
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: impl Into<String>) -> DbError {
	match &err {
		sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Conflict(what.into()),
		_ => DbError::Sqlx(err),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn internal_errors_are_corrupt_records() {
		let err: StoreError = DbError::Internal("Invalid grant ID".to_string()).into();
		assert!(matches!(err, StoreError::Corrupt(_)));
	}

	#[test]
	fn conflicts_are_backend_errors() {
		let err: StoreError = DbError::Conflict("grant exists".to_string()).into();
		assert!(matches!(err, StoreError::Backend(msg) if msg.contains("grant exists")));
	}

	#[test]
	fn not_found_is_preserved() {
		let err: StoreError = DbError::NotFound("team".to_string()).into();
		assert!(matches!(err, StoreError::NotFound(_)));
	}
}
