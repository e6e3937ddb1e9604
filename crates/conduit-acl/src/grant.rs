// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access-control grants.
//!
//! A [`Grant`] binds one accessor to exactly one resource at one [`Role`].
//! In memory the target is a [`ResourceRef`]; on disk it is a
//! [`GrantRecord`] with one nullable foreign key per resource kind. The
//! conversion from a record is checked so a row can never target zero or
//! several resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accessor::{Accessor, AccessorKind};
use crate::error::AclError;
use crate::role::Role;
use crate::types::{GrantId, OrgId, ResourceRef, SetId, SinkId, SourceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
	pub id: GrantId,
	pub accessor: Accessor,
	/// Org the accessor was acting in when the grant was issued.
	pub accessor_org_id: Option<OrgId>,
	pub resource: ResourceRef,
	pub role: Role,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Grant {
	/// Creates a new grant with a generated id.
	pub fn new(
		accessor: Accessor,
		accessor_org_id: Option<OrgId>,
		resource: ResourceRef,
		role: Role,
	) -> Self {
		let now = Utc::now();
		Self {
			id: GrantId::generate(),
			accessor,
			accessor_org_id,
			resource,
			role,
			created_at: now,
			updated_at: now,
		}
	}

	/// Returns true if this grant lets derived resources build on its target.
	pub fn enables_sharing(&self) -> bool {
		self.role.can_share()
	}

	/// Returns a copy of this grant carrying `role`.
	pub fn with_role(&self, role: Role) -> Self {
		Self {
			role,
			updated_at: Utc::now(),
			..self.clone()
		}
	}
}

/// The persisted shape of a grant row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
	pub id: Uuid,
	pub accessor_kind: AccessorKind,
	pub accessor_id: Uuid,
	pub accessor_org_id: Option<Uuid>,
	pub data_source_id: Option<Uuid>,
	pub data_set_id: Option<Uuid>,
	pub data_sink_id: Option<Uuid>,
	pub role_index: u8,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl From<&Grant> for GrantRecord {
	fn from(grant: &Grant) -> Self {
		let (data_source_id, data_set_id, data_sink_id) = match grant.resource {
			ResourceRef::Source(id) => (Some(id.into_inner()), None, None),
			ResourceRef::Set(id) => (None, Some(id.into_inner()), None),
			ResourceRef::Sink(id) => (None, None, Some(id.into_inner())),
		};
		Self {
			id: grant.id.into_inner(),
			accessor_kind: grant.accessor.kind(),
			accessor_id: grant.accessor.id(),
			accessor_org_id: grant.accessor_org_id.map(OrgId::into_inner),
			data_source_id,
			data_set_id,
			data_sink_id,
			role_index: grant.role.index(),
			created_at: grant.created_at,
			updated_at: grant.updated_at,
		}
	}
}

impl TryFrom<GrantRecord> for Grant {
	type Error = AclError;

	fn try_from(record: GrantRecord) -> Result<Self, Self::Error> {
		let resource = match (record.data_source_id, record.data_set_id, record.data_sink_id) {
			(Some(id), None, None) => ResourceRef::Source(SourceId::new(id)),
			(None, Some(id), None) => ResourceRef::Set(SetId::new(id)),
			(None, None, Some(id)) => ResourceRef::Sink(SinkId::new(id)),
			_ => {
				return Err(AclError::InvalidGrant(format!(
					"grant {} must reference exactly one resource",
					record.id
				)))
			}
		};
		let role = Role::from_index(record.role_index).ok_or_else(|| {
			AclError::InvalidGrant(format!(
				"grant {} has unknown role index {}",
				record.id, record.role_index
			))
		})?;

		Ok(Self {
			id: GrantId::new(record.id),
			accessor: Accessor::from_parts(record.accessor_kind, record.accessor_id),
			accessor_org_id: record.accessor_org_id.map(OrgId::new),
			resource,
			role,
			created_at: record.created_at,
			updated_at: record.updated_at,
		})
	}
}
