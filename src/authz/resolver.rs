use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::authz::errors::{AuthzError, Denial};
use crate::authz::types::PermissionSet;
use crate::storage;

/// Loads a role's effective permission set.
///
/// Implementations must not cache: a revoked association has to be visible
/// on the very next call.
#[async_trait]
pub trait PermissionResolver: Send + Sync {
    /// An unknown role resolves to the empty set. A disabled role fails with
    /// [`Denial::RoleDisabled`].
    async fn resolve(&self, role_name: &str) -> Result<PermissionSet, AuthzError>;
}

/// Resolver backed by the relational store.
#[derive(Clone)]
pub struct DbPermissionResolver {
    db: DatabaseConnection,
}

impl DbPermissionResolver {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionResolver for DbPermissionResolver {
    async fn resolve(&self, role_name: &str) -> Result<PermissionSet, AuthzError> {
        let Some(grants) = storage::load_role_grants(&self.db, role_name).await? else {
            tracing::debug!(role = role_name, "Unknown role resolves to no permissions");
            return Ok(PermissionSet::new());
        };

        if !grants.enabled {
            return Err(Denial::RoleDisabled {
                role: role_name.to_string(),
            }
            .into());
        }

        Ok(PermissionSet::from(grants.permissions))
    }
}
