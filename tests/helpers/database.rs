use sqlx::SqlitePool;

use vigil::adapters::sqlite::{all_embedded_migrations, create_test_pool, Migrator};

/// Create an in-memory SQLite database with the full schema applied.
#[allow(dead_code)]
pub async fn setup_test_db() -> SqlitePool {
    let pool = create_test_pool().await.expect("failed to create test database");

    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .expect("failed to run migrations");

    pool
}

/// Teardown test database.
#[allow(dead_code)]
pub async fn teardown_test_db(pool: SqlitePool) {
    pool.close().await;
}
