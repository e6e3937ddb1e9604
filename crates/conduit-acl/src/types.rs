// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions shared by the access-control engine.
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs for principals
//!   ([`UserId`], [`TeamId`], [`OrgId`]) and resources ([`SourceId`],
//!   [`SetId`], [`SinkId`]) so ids of different kinds cannot be mixed up
//! - **Membership roles**: [`OrgRole`] and [`TeamRole`]
//! - **Resource references**: [`ResourceRef`], a closed tagged variant over
//!   the three resource kinds in the flow graph
//! - **Resource status**: [`ResourceStatus`]
//!
//! All ID types serialize transparently as UUID strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(
			Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
		)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(OrgId, "Unique identifier for an organization.");
define_id_type!(TeamId, "Unique identifier for a team.");
define_id_type!(SourceId, "Unique identifier for a data source.");
define_id_type!(SetId, "Unique identifier for a data set.");
define_id_type!(SinkId, "Unique identifier for a data sink.");
define_id_type!(GrantId, "Unique identifier for an access-control grant.");
define_id_type!(FlowLinkId, "Unique identifier for a persisted flow link.");

// =============================================================================
// Organization Roles
// =============================================================================

/// Roles within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
	/// Full org control.
	Owner,
	/// Manage members and every resource in the org.
	Admin,
	/// Standard member access.
	Member,
}

impl OrgRole {
	/// Returns true if this role grants default access to all org resources.
	pub fn is_admin(&self) -> bool {
		matches!(self, OrgRole::Owner | OrgRole::Admin)
	}
}

impl fmt::Display for OrgRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrgRole::Owner => write!(f, "owner"),
			OrgRole::Admin => write!(f, "admin"),
			OrgRole::Member => write!(f, "member"),
		}
	}
}

impl FromStr for OrgRole {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"owner" => Ok(OrgRole::Owner),
			"admin" => Ok(OrgRole::Admin),
			"member" => Ok(OrgRole::Member),
			other => Err(format!("unknown org role '{other}'")),
		}
	}
}

// =============================================================================
// Team Roles
// =============================================================================

/// Roles within a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
	/// Can manage team members.
	Maintainer,
	/// Standard team member.
	Member,
}

impl fmt::Display for TeamRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TeamRole::Maintainer => write!(f, "maintainer"),
			TeamRole::Member => write!(f, "member"),
		}
	}
}

impl FromStr for TeamRole {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"maintainer" => Ok(TeamRole::Maintainer),
			"member" => Ok(TeamRole::Member),
			other => Err(format!("unknown team role '{other}'")),
		}
	}
}

// =============================================================================
// Resources
// =============================================================================

/// The kinds of resource that make up a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
	Source,
	Set,
	Sink,
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ResourceKind::Source => write!(f, "source"),
			ResourceKind::Set => write!(f, "set"),
			ResourceKind::Sink => write!(f, "sink"),
		}
	}
}

impl FromStr for ResourceKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"source" => Ok(ResourceKind::Source),
			"set" => Ok(ResourceKind::Set),
			"sink" => Ok(ResourceKind::Sink),
			other => Err(format!("unknown resource kind '{other}'")),
		}
	}
}

/// A reference to exactly one resource in the flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceRef {
	Source(SourceId),
	Set(SetId),
	Sink(SinkId),
}

impl ResourceRef {
	pub fn kind(&self) -> ResourceKind {
		match self {
			ResourceRef::Source(_) => ResourceKind::Source,
			ResourceRef::Set(_) => ResourceKind::Set,
			ResourceRef::Sink(_) => ResourceKind::Sink,
		}
	}

	pub fn id(&self) -> Uuid {
		match self {
			ResourceRef::Source(id) => id.into_inner(),
			ResourceRef::Set(id) => id.into_inner(),
			ResourceRef::Sink(id) => id.into_inner(),
		}
	}

	/// Rebuilds a reference from its kind and raw id.
	pub fn from_parts(kind: ResourceKind, id: Uuid) -> Self {
		match kind {
			ResourceKind::Source => ResourceRef::Source(SourceId::new(id)),
			ResourceKind::Set => ResourceRef::Set(SetId::new(id)),
			ResourceKind::Sink => ResourceRef::Sink(SinkId::new(id)),
		}
	}

	pub fn as_set(&self) -> Option<SetId> {
		match self {
			ResourceRef::Set(id) => Some(*id),
			_ => None,
		}
	}
}

impl fmt::Display for ResourceRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind(), self.id())
	}
}

impl From<SourceId> for ResourceRef {
	fn from(id: SourceId) -> Self {
		ResourceRef::Source(id)
	}
}

impl From<SetId> for ResourceRef {
	fn from(id: SetId) -> Self {
		ResourceRef::Set(id)
	}
}

impl From<SinkId> for ResourceRef {
	fn from(id: SinkId) -> Self {
		ResourceRef::Sink(id)
	}
}

/// Lifecycle status of a resource in the pipeline runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
	/// Created but never published to the runtime.
	#[default]
	Init,
	/// Running in the pipeline.
	Active,
	/// Stopped; keeps its configuration.
	Paused,
}

impl ResourceStatus {
	pub fn is_active(&self) -> bool {
		matches!(self, ResourceStatus::Active)
	}
}

impl fmt::Display for ResourceStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ResourceStatus::Init => write!(f, "init"),
			ResourceStatus::Active => write!(f, "active"),
			ResourceStatus::Paused => write!(f, "paused"),
		}
	}
}

impl FromStr for ResourceStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"init" => Ok(ResourceStatus::Init),
			"active" => Ok(ResourceStatus::Active),
			"paused" => Ok(ResourceStatus::Paused),
			other => Err(format!("unknown resource status '{other}'")),
		}
	}
}
