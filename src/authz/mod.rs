//! Role-based authorization over the relational permission graph.
//!
//! The request path is [`web`] -> [`engine::authorize`] -> [`resolver`] ->
//! [`crate::storage`]. [`seed`] runs independently at startup and writes the
//! rows the resolver reads. Nothing here caches: every guarded request does a
//! fresh lookup, so revocations apply on the next request.

pub mod engine;
pub mod errors;
pub mod resolver;
pub mod seed;
pub mod types;
pub mod web;

pub use engine::{authorize, Decision};
pub use errors::{AuthzError, Denial};
pub use resolver::{DbPermissionResolver, PermissionResolver};
pub use types::{AuthorizationRequirement, PermissionSet, Principal, RouteAuthorization};
