use crate::entities::{permission, role, role_permission};
use crate::errors::GatehouseError;
use crate::settings::Database as DbCfg;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, IntoActiveModel, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub sort_order: i32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPermission {
    pub name: String,
    pub resource: String,
    pub action: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub group_name: Option<String>,
    pub sort_order: i32,
}

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, GatehouseError> {
    let db = Database::connect(&cfg.url).await?;
    Ok(db)
}

/// Apply any pending schema migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), GatehouseError> {
    Migrator::up(db, None).await?;
    Ok(())
}

pub async fn get_role_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<role::Model>, DbErr> {
    role::Entity::find()
        .filter(role::Column::Name.eq(name))
        .one(db)
        .await
}

pub async fn get_permission_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<permission::Model>, DbErr> {
    permission::Entity::find()
        .filter(permission::Column::Name.eq(name))
        .one(db)
        .await
}

/// Names of every permission associated with the role, in one join over
/// `role_permissions` and `permissions`.
pub async fn load_effective_permissions<C: ConnectionTrait>(
    db: &C,
    role_id: i32,
) -> Result<BTreeSet<String>, DbErr> {
    let names: Vec<String> = permission::Entity::find()
        .select_only()
        .column(permission::Column::Name)
        .inner_join(role_permission::Entity)
        .filter(role_permission::Column::RoleId.eq(role_id))
        .into_tuple()
        .all(db)
        .await?;
    Ok(names.into_iter().collect())
}

/// A role's enablement flag and permission names as read in one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrants {
    pub enabled: bool,
    pub permissions: BTreeSet<String>,
}

/// Enablement and effective permissions of the named role in a single
/// left-joined read over `roles`, `role_permissions` and `permissions`.
/// `None` when no role has that name.
pub async fn load_role_grants<C: ConnectionTrait>(
    db: &C,
    role_name: &str,
) -> Result<Option<RoleGrants>, DbErr> {
    let rows: Vec<(i64, Option<String>)> = role::Entity::find()
        .select_only()
        .column_as(role::Column::IsEnabled, "is_enabled")
        .column_as(permission::Column::Name, "permission_name")
        .join(JoinType::LeftJoin, role::Relation::RolePermission.def())
        .join(JoinType::LeftJoin, role_permission::Relation::Permission.def())
        .filter(role::Column::Name.eq(role_name))
        .into_tuple()
        .all(db)
        .await?;

    let Some((is_enabled, _)) = rows.first() else {
        return Ok(None);
    };
    let enabled = *is_enabled == 1;
    let permissions = rows.into_iter().filter_map(|(_, name)| name).collect();
    Ok(Some(RoleGrants {
        enabled,
        permissions,
    }))
}

/// The role together with its associated permissions, fetched in a single
/// joined query. `None` when no role has that name.
pub async fn list_role_permissions<C: ConnectionTrait>(
    db: &C,
    role_name: &str,
) -> Result<Option<(role::Model, Vec<permission::Model>)>, DbErr> {
    let mut rows = role::Entity::find()
        .filter(role::Column::Name.eq(role_name))
        .find_with_related(permission::Entity)
        .order_by_asc(permission::Column::SortOrder)
        .all(db)
        .await?;
    Ok(rows.pop())
}

pub async fn count_system_permissions<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
    permission::Entity::find()
        .filter(permission::Column::IsSystem.eq(1))
        .count(db)
        .await
}

/// Insert the permission unless one with the same name exists. Returns true
/// when a row was created. Existing rows are never overwritten.
pub async fn upsert_permission<C: ConnectionTrait>(
    db: &C,
    input: &NewPermission,
) -> Result<bool, DbErr> {
    let now = Utc::now().timestamp();
    let model = permission::ActiveModel {
        name: Set(input.name.clone()),
        resource: Set(input.resource.clone()),
        action: Set(input.action.clone()),
        display_name: Set(input.display_name.clone()),
        description: Set(input.description.clone()),
        is_system: Set(i64::from(input.is_system)),
        group_name: Set(input.group_name.clone()),
        sort_order: Set(input.sort_order),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let inserted = permission::Entity::insert(model)
        .on_conflict(
            OnConflict::column(permission::Column::Name)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(inserted > 0)
}

/// Insert the role unless one with the same name exists. Returns true when a
/// row was created.
pub async fn upsert_role<C: ConnectionTrait>(db: &C, input: &NewRole) -> Result<bool, DbErr> {
    let now = Utc::now().timestamp();
    let model = role::ActiveModel {
        name: Set(input.name.clone()),
        display_name: Set(input.display_name.clone()),
        description: Set(input.description.clone()),
        is_system: Set(i64::from(input.is_system)),
        sort_order: Set(input.sort_order),
        is_enabled: Set(i64::from(input.enabled)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let inserted = role::Entity::insert(model)
        .on_conflict(OnConflict::column(role::Column::Name).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;
    Ok(inserted > 0)
}

/// Link a role to a permission unless the pair is already linked.
pub async fn upsert_role_permission<C: ConnectionTrait>(
    db: &C,
    role_id: i32,
    permission_id: i32,
) -> Result<bool, DbErr> {
    let model = role_permission::ActiveModel {
        role_id: Set(role_id),
        permission_id: Set(permission_id),
        created_at: Set(Utc::now().timestamp()),
        ..Default::default()
    };

    let inserted = role_permission::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                role_permission::Column::RoleId,
                role_permission::Column::PermissionId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(inserted > 0)
}

/// name -> id for the given role names that exist.
pub async fn role_ids_by_name<C: ConnectionTrait>(
    db: &C,
    names: &[&str],
) -> Result<HashMap<String, i32>, DbErr> {
    let rows = role::Entity::find()
        .filter(role::Column::Name.is_in(names.iter().copied()))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|r| (r.name, r.id)).collect())
}

/// name -> id for the given permission names that exist.
pub async fn permission_ids_by_name<C: ConnectionTrait>(
    db: &C,
    names: &[&str],
) -> Result<HashMap<String, i32>, DbErr> {
    let rows = permission::Entity::find()
        .filter(permission::Column::Name.is_in(names.iter().copied()))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|p| (p.name, p.id)).collect())
}

/// Flip a role's enablement flag. Returns false when the role does not exist.
pub async fn set_role_enabled<C: ConnectionTrait>(
    db: &C,
    name: &str,
    enabled: bool,
) -> Result<bool, DbErr> {
    let Some(existing) = get_role_by_name(db, name).await? else {
        return Ok(false);
    };

    let mut active: role::ActiveModel = existing.into_active_model();
    active.is_enabled = Set(i64::from(enabled));
    active.updated_at = Set(Utc::now().timestamp());
    active.update(db).await?;
    Ok(true)
}
