pub mod builders;
pub mod db;

#[allow(unused_imports)]
pub use builders::RoleBuilder;
pub use db::TestDb;
