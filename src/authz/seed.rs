//! Baseline roles, permissions and role-permission links, ensured once at
//! startup.
//!
//! Every write is an insert that does nothing on a unique-key conflict, so
//! rows edited by an administrator after the first run are left alone and
//! replicas booting at the same time cannot trip over each other.

use sea_orm::{DatabaseConnection, DbErr, SqlErr, TransactionTrait};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::authz::types::{Action, PermissionName, Resource};
use crate::storage::{self, NewPermission, NewRole};

pub struct ResourceDef {
    pub resource: Resource,
    pub label: &'static str,
    pub group: &'static str,
}

pub struct RoleDef {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

const fn res(resource: Resource, label: &'static str, group: &'static str) -> ResourceDef {
    ResourceDef {
        resource,
        label,
        group,
    }
}

pub const RESOURCES: &[ResourceDef] = &[
    res(Resource::User, "users", "System"),
    res(Resource::Role, "roles", "System"),
    res(Resource::Permission, "permissions", "System"),
    res(Resource::Config, "configuration", "System"),
    res(Resource::Question, "questions", "Teaching"),
    res(Resource::Content, "content", "Teaching"),
    res(Resource::Exam, "exams", "Teaching"),
    res(Resource::File, "files", "Files"),
    res(Resource::Notification, "notifications", "Messaging"),
];

/// Number of system permissions a fully seeded store holds. When the store
/// already has at least this many, the seed is skipped without writing.
pub const EXPECTED_SYSTEM_PERMISSIONS: usize = RESOURCES.len() * Action::ALL.len();

pub const ROLES: &[RoleDef] = &[
    RoleDef {
        name: "admin",
        display_name: "Administrator",
        description: "Full access to every resource",
    },
    RoleDef {
        name: "teacher",
        display_name: "Teacher",
        description: "Manages teaching material and exams",
    },
    RoleDef {
        name: "student",
        display_name: "Student",
        description: "Reads teaching material and takes exams",
    },
];

pub const ROLE_PERMISSIONS: &[(&str, &[&str])] = &[
    (
        "admin",
        &[
            "user:manage",
            "role:manage",
            "permission:manage",
            "config:manage",
            "question:manage",
            "content:manage",
            "exam:manage",
            "file:manage",
            "notification:manage",
        ],
    ),
    (
        "teacher",
        &[
            "question:manage",
            "content:manage",
            "exam:manage",
            "file:create",
            "file:read",
            "user:read",
            "notification:read",
        ],
    ),
    (
        "student",
        &[
            "question:read",
            "content:read",
            "exam:read",
            "file:read",
            "user:read",
            "notification:read",
        ],
    ),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// The store already held the expected permission count; nothing written.
    pub skipped: bool,
    pub permissions_created: usize,
    pub roles_created: usize,
    pub associations_created: usize,
}

/// Expand [`RESOURCES`] into one permission row per action.
pub fn permission_catalog() -> Vec<NewPermission> {
    let mut out = Vec::with_capacity(EXPECTED_SYSTEM_PERMISSIONS);
    for (r_idx, def) in RESOURCES.iter().enumerate() {
        for (a_idx, action) in Action::ALL.iter().enumerate() {
            let verb = match action {
                Action::Create => "Create",
                Action::Read => "View",
                Action::Update => "Edit",
                Action::Delete => "Delete",
                Action::Manage => "Manage",
            };
            let sort_order = r_idx * Action::ALL.len() + a_idx;
            out.push(NewPermission {
                name: PermissionName::format(def.resource, *action),
                resource: def.resource.as_str().to_string(),
                action: action.as_str().to_string(),
                display_name: format!("{verb} {}", def.label),
                description: if *action == Action::Manage {
                    Some(format!("Every action on {}", def.label))
                } else {
                    None
                },
                is_system: true,
                group_name: Some(def.group.to_string()),
                sort_order: i32::try_from(sort_order).unwrap_or(i32::MAX),
            });
        }
    }
    out
}

pub fn role_catalog() -> Vec<NewRole> {
    ROLES
        .iter()
        .zip(0..)
        .map(|(def, sort_order)| NewRole {
            name: def.name.to_string(),
            display_name: def.display_name.to_string(),
            description: Some(def.description.to_string()),
            is_system: true,
            sort_order,
            enabled: true,
        })
        .collect()
}

/// Ensure the baseline permission graph exists, inside one transaction.
/// Any error rolls back everything written by this run.
pub async fn seed(db: &DatabaseConnection) -> Result<SeedReport, DbErr> {
    let txn = db.begin().await?;

    let existing = storage::count_system_permissions(&txn).await?;
    if existing >= EXPECTED_SYSTEM_PERMISSIONS as u64 {
        txn.commit().await?;
        return Ok(SeedReport {
            skipped: true,
            ..Default::default()
        });
    }

    let mut report = SeedReport::default();

    for permission in permission_catalog() {
        if storage::upsert_permission(&txn, &permission).await? {
            report.permissions_created += 1;
        }
    }

    for role in role_catalog() {
        if storage::upsert_role(&txn, &role).await? {
            report.roles_created += 1;
        }
    }

    let role_names: Vec<&str> = ROLE_PERMISSIONS.iter().map(|(role, _)| *role).collect();
    let permission_names: Vec<&str> = ROLE_PERMISSIONS
        .iter()
        .flat_map(|(_, perms)| perms.iter().copied())
        .collect();
    let role_ids = storage::role_ids_by_name(&txn, &role_names).await?;
    let permission_ids = storage::permission_ids_by_name(&txn, &permission_names).await?;

    for (role, perms) in ROLE_PERMISSIONS {
        let role_id = *role_ids
            .get(*role)
            .ok_or_else(|| DbErr::RecordNotFound(format!("seeded role `{role}`")))?;
        for perm in perms.iter() {
            let permission_id = *permission_ids
                .get(*perm)
                .ok_or_else(|| DbErr::RecordNotFound(format!("seeded permission `{perm}`")))?;
            if storage::upsert_role_permission(&txn, role_id, permission_id).await? {
                report.associations_created += 1;
            }
        }
    }

    txn.commit().await?;
    Ok(report)
}

/// True when a seed failed on a unique key, which means another instance
/// inserted the same rows first.
pub fn lost_seed_race(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Startup hook: run [`seed`] and log the outcome. Never fails; a store left
/// under-seeded only produces denials.
pub async fn bootstrap(db: &DatabaseConnection) -> Option<SeedReport> {
    match seed(db).await {
        Ok(report) if report.skipped => {
            info!(
                expected = EXPECTED_SYSTEM_PERMISSIONS,
                "Authorization seed skipped: system permissions already present"
            );
            Some(report)
        }
        Ok(report) => {
            info!(
                permissions = report.permissions_created,
                roles = report.roles_created,
                associations = report.associations_created,
                "Authorization seed complete"
            );
            Some(report)
        }
        Err(e) if lost_seed_race(&e) => {
            warn!(
                error = %e,
                "Authorization seed raced another instance; treating as already seeded"
            );
            None
        }
        Err(e) => {
            error!(error = %e, "Authorization seed failed; continuing with existing role data");
            None
        }
    }
}
