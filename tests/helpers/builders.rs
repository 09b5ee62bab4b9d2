use gatehouse::entities;
use gatehouse::storage::{self, NewPermission, NewRole};
use sea_orm::DatabaseConnection;

/// Builder for creating test roles together with their permissions
#[allow(dead_code)]
pub struct RoleBuilder {
    name: String,
    enabled: bool,
    permissions: Vec<String>,
}

#[allow(dead_code)]
impl RoleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            permissions: Vec::new(),
        }
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.permissions.push(permission.to_string());
        self
    }

    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.permissions
            .extend(permissions.iter().map(|p| p.to_string()));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> entities::role::Model {
        storage::upsert_role(
            db,
            &NewRole {
                name: self.name.clone(),
                display_name: self.name.clone(),
                description: None,
                is_system: false,
                sort_order: 0,
                enabled: self.enabled,
            },
        )
        .await
        .expect("Failed to create test role");

        let role = storage::get_role_by_name(db, &self.name)
            .await
            .expect("Failed to get role")
            .expect("Role not found");

        for name in &self.permissions {
            let (resource, action) = name.split_once(':').unwrap_or((name.as_str(), ""));
            storage::upsert_permission(
                db,
                &NewPermission {
                    name: name.clone(),
                    resource: resource.to_string(),
                    action: action.to_string(),
                    display_name: name.clone(),
                    description: None,
                    is_system: false,
                    group_name: None,
                    sort_order: 0,
                },
            )
            .await
            .expect("Failed to create test permission");

            let permission = storage::get_permission_by_name(db, name)
                .await
                .expect("Failed to get permission")
                .expect("Permission not found");

            storage::upsert_role_permission(db, role.id, permission.id)
                .await
                .expect("Failed to link role and permission");
        }

        role
    }
}
