//! Database migrations and initialization.

use crate::domain::AffiliateSettings;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Initialize the SQLite database with schema, pragmas and seed data.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { configure_pragmas_conn(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    run_migrations(&pool).await?;
    seed_default_settings(&pool).await?;

    info!("Database initialized successfully at {}", db_path);
    Ok(pool)
}

/// Run all database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");
    let schema_sql = include_str!("schema.sql");

    for statement in schema_sql.split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }

    info!("Migrations completed successfully");
    Ok(())
}

/// Insert the default settings row when none exists yet.
async fn seed_default_settings(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let defaults = AffiliateSettings::default_settings();
    let tiers_json =
        serde_json::to_string(&defaults.tiers).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    sqlx::query(
        r#"
        INSERT INTO affiliate_settings (id, min_withdrawal_amount_minor, tiers)
        VALUES (1, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(defaults.min_withdrawal_amount.to_minor())
    .bind(tiers_json)
    .execute(pool)
    .await?;

    Ok(())
}

/// Configure SQLite pragmas for reliability under concurrent writers.
async fn configure_pragmas_conn(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    use sqlx::Row;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // journal_mode returns the actual mode set; must use fetch to get result
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    info!("SQLite journal_mode set to: {}", journal_mode);

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_db() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let (pool, _tmp) = temp_db().await;

        for table in [
            "users",
            "affiliates",
            "orders",
            "commissions",
            "withdrawals",
            "commission_outbox",
            "affiliate_settings",
        ] {
            let result: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("query failed");
            assert_eq!(result.0, 1, "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let (pool, _tmp) = temp_db().await;

        run_migrations(&pool)
            .await
            .expect("second migration run failed");
        seed_default_settings(&pool)
            .await
            .expect("second seed run failed");

        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM affiliate_settings")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    async fn test_default_settings_seeded() {
        let (pool, _tmp) = temp_db().await;

        let (min_minor, tiers): (i64, String) = sqlx::query_as(
            "SELECT min_withdrawal_amount_minor, tiers FROM affiliate_settings WHERE id = 1",
        )
        .fetch_one(&pool)
        .await
        .expect("query failed");
        assert_eq!(min_minor, 50000);

        let tiers: Vec<crate::domain::CommissionTier> = serde_json::from_str(&tiers).unwrap();
        assert_eq!(tiers.len(), 4);
        assert_eq!(tiers[0].level, 1);
    }

    #[tokio::test]
    async fn test_pragmas_configured() {
        let (pool, _tmp) = temp_db().await;

        let result: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 1);

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        // `journal_mode=WAL` is best-effort; SQLite can fall back depending on environment.
        assert!(
            matches!(result.0.as_str(), "wal" | "delete"),
            "unexpected journal_mode: {}",
            result.0
        );
    }
}
