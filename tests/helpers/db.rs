use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        // Create temporary SQLite database file
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        // Connect to database
        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        // Run migrations
        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

/// Snapshot of every row name in the three stores, sorted, for comparing
/// database states.
#[allow(dead_code)]
pub async fn row_snapshot(db: &DatabaseConnection) -> (Vec<String>, Vec<String>, Vec<(i32, i32)>) {
    use gatehouse::entities::{permission, role, role_permission};
    use sea_orm::EntityTrait;

    let mut roles: Vec<String> = role::Entity::find()
        .all(db)
        .await
        .expect("Failed to list roles")
        .into_iter()
        .map(|r| r.name)
        .collect();
    roles.sort();

    let mut permissions: Vec<String> = permission::Entity::find()
        .all(db)
        .await
        .expect("Failed to list permissions")
        .into_iter()
        .map(|p| p.name)
        .collect();
    permissions.sort();

    let mut links: Vec<(i32, i32)> = role_permission::Entity::find()
        .all(db)
        .await
        .expect("Failed to list role permissions")
        .into_iter()
        .map(|l| (l.role_id, l.permission_id))
        .collect();
    links.sort();

    (roles, permissions, links)
}
