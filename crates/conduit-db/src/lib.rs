// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite repositories backing the Conduit access-control engine.
//!
//! Each repository implements one of the store traits from `conduit-acl`:
//! [`GrantRepository`] for grants, [`ResourceRepository`] for the flow graph
//! and [`MembershipRepository`] for orgs and teams.

pub mod error;
pub mod grant;
pub mod membership;
pub mod pool;
pub mod resource;
mod rows;
pub mod schema;
pub mod testing;

pub use error::{DbError, Result};
pub use grant::GrantRepository;
pub use membership::MembershipRepository;
pub use pool::create_pool;
pub use resource::ResourceRepository;
pub use schema::apply_schema;
