// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant roles and the capabilities they enable.
//!
//! Roles are stored by index on grant rows. Each role maps to a
//! [`Capabilities`] set, and one role enables another when its capability
//! set is a superset of the other's. The deployed table is ordinal: every
//! level carries the capabilities of all levels below it plus its own, so
//! [`Capabilities::SHARE`] is held by `sharer` and everything above it.
//!
//! ```text
//! viewer(0)  READ
//! editor(1)  READ | WRITE
//! sharer(2)  READ | WRITE | SHARE
//! admin(3)   READ | WRITE | SHARE | ADMINISTER
//! owner(4)   READ | WRITE | SHARE | ADMINISTER | TRANSFER
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
	/// Capabilities a role can enable on a resource.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
	pub struct Capabilities: u8 {
		/// See the resource and include it in flows.
		const READ       = 0b0000_0001;
		/// Change the resource configuration.
		const WRITE      = 0b0000_0010;
		/// Let derived resources of other owners build on this one.
		const SHARE      = 0b0000_0100;
		/// Manage grants on the resource.
		const ADMINISTER = 0b0000_1000;
		/// Transfer or delete the resource.
		const TRANSFER   = 0b0001_0000;
	}
}

/// Role held through a grant. Ordered by capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Role {
	Viewer = 0,
	Editor = 1,
	Sharer = 2,
	Admin = 3,
	Owner = 4,
}

impl Role {
	/// Returns all roles in ascending capability order.
	pub fn all() -> &'static [Role] {
		&[Role::Viewer, Role::Editor, Role::Sharer, Role::Admin, Role::Owner]
	}

	/// The persisted role index.
	pub fn index(self) -> u8 {
		self as u8
	}

	/// Looks up a role by its persisted index.
	pub fn from_index(index: u8) -> Option<Role> {
		Role::all().get(index as usize).copied()
	}

	pub fn capabilities(self) -> Capabilities {
		match self {
			Role::Viewer => Capabilities::READ,
			Role::Editor => Role::Viewer.capabilities() | Capabilities::WRITE,
			Role::Sharer => Role::Editor.capabilities() | Capabilities::SHARE,
			Role::Admin => Role::Sharer.capabilities() | Capabilities::ADMINISTER,
			Role::Owner => Role::Admin.capabilities() | Capabilities::TRANSFER,
		}
	}

	/// Returns true if this role carries every capability of `required`.
	pub fn enables(self, required: Role) -> bool {
		self.capabilities().contains(required.capabilities())
	}

	pub fn has_capability(self, capability: Capabilities) -> bool {
		self.capabilities().contains(capability)
	}

	/// Returns true if this role lets derived resources build on the grant's target.
	pub fn can_share(self) -> bool {
		self.has_capability(Capabilities::SHARE)
	}
}

/// Returns true if the role stored at `granted_role_index` enables `required`.
///
/// Unknown indices enable nothing.
pub fn enables_role(granted_role_index: u8, required: Role) -> bool {
	Role::from_index(granted_role_index)
		.map(|granted| granted.enables(required))
		.unwrap_or(false)
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Role::Viewer => write!(f, "viewer"),
			Role::Editor => write!(f, "editor"),
			Role::Sharer => write!(f, "sharer"),
			Role::Admin => write!(f, "admin"),
			Role::Owner => write!(f, "owner"),
		}
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Role::all()
			.iter()
			.copied()
			.find(|r| r.to_string() == s)
			.ok_or_else(|| format!("unknown role '{s}'"))
	}
}
