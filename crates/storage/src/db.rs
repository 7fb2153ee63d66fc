use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

/// Open (creating if needed) the on-disk database and bootstrap the schema.
pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000))
        .pragma("cache_size", "-32000");

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    tracing::info!("Database ready at {}", path.display());
    Ok(pool)
}

/// Private in-memory database, used by tests and throwaway runs. A single
/// connection that never expires keeps the data alive for the pool's lifetime.
pub async fn connect_in_memory() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Cheap liveness probe.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vendors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            api_endpoint TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS districts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            definition TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS proccodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vendor_id INTEGER NOT NULL,
            template_id INTEGER NOT NULL,
            code TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            api_params TEXT NOT NULL DEFAULT '{}',
            is_active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (vendor_id) REFERENCES vendors(id),
            FOREIGN KEY (template_id) REFERENCES templates(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            email TEXT,
            role TEXT NOT NULL,
            district_id INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (district_id) REFERENCES districts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consolidation_batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            district_id INTEGER NOT NULL,
            proccode_id INTEGER NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            item_count INTEGER NOT NULL,
            valid_count INTEGER NOT NULL,
            total_amount_cents INTEGER NOT NULL,
            is_complete INTEGER NOT NULL,
            created_by INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY (district_id) REFERENCES districts(id),
            FOREIGN KEY (proccode_id) REFERENCES proccodes(id),
            FOREIGN KEY (created_by) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consolidation_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id INTEGER NOT NULL,
            trx_date TEXT NOT NULL,
            response_code TEXT,
            is_valid INTEGER NOT NULL,
            amount_cents INTEGER,
            payload TEXT NOT NULL,
            FOREIGN KEY (batch_id) REFERENCES consolidation_batches(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reconciliation_submissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reference TEXT NOT NULL UNIQUE,
            subject TEXT NOT NULL,
            body TEXT NOT NULL,
            status TEXT NOT NULL,
            created_by INTEGER,
            created_at TEXT NOT NULL,
            sent_at TEXT,
            FOREIGN KEY (created_by) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submission_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            submission_id INTEGER NOT NULL,
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            FOREIGN KEY (submission_id) REFERENCES reconciliation_submissions(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submission_destinations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            submission_id INTEGER NOT NULL,
            email TEXT NOT NULL,
            name TEXT,
            status TEXT NOT NULL,
            error TEXT,
            attempted_at TEXT,
            UNIQUE (submission_id, email),
            FOREIGN KEY (submission_id) REFERENCES reconciliation_submissions(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_batches_scope ON consolidation_batches (district_id, proccode_id, start_date)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_batch ON consolidation_items (batch_id, trx_date)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_db_on_disk_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rekon.db");

        let pool = create_db(&path).await.unwrap();
        pool.close().await;
        // Second open re-runs the bootstrap against existing tables.
        let pool = create_db(&path).await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "consolidation_batches",
                "consolidation_items",
                "districts",
                "proccodes",
                "reconciliation_submissions",
                "submission_destinations",
                "submission_files",
                "templates",
                "users",
                "vendors",
            ]
        );
    }

    #[tokio::test]
    async fn ping_succeeds_on_open_pool() {
        let pool = connect_in_memory().await.unwrap();
        assert!(ping(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let pool = connect_in_memory().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO proccodes (vendor_id, template_id, code) VALUES (999, 999, 'X')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
