pub mod permission;
pub mod role;
pub mod role_permission;

pub use permission::Entity as Permission;
pub use role::Entity as Role;
pub use role_permission::Entity as RolePermission;
