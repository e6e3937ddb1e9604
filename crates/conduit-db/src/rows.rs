// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Column decoding shared by the repositories.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::error::DbError;

pub(crate) fn uuid(row: &SqliteRow, column: &str) -> Result<Uuid, DbError> {
	let raw: String = row.get(column);
	Uuid::parse_str(&raw).map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>, DbError> {
	let raw: Option<String> = row.get(column);
	raw
		.map(|s| Uuid::parse_str(&s).map_err(|e| DbError::Internal(format!("Invalid {column}: {e}"))))
		.transpose()
}

pub(crate) fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, DbError> {
	let raw: String = row.get(column);
	DateTime::parse_from_rfc3339(&raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn parsed<T>(row: &SqliteRow, column: &str) -> Result<T, DbError>
where
	T: FromStr<Err = String>,
{
	let raw: String = row.get(column);
	raw.parse().map_err(DbError::Internal)
}
