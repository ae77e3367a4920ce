//! Persistent store: SQLite connection pool, migrations and fixed-point binding helpers

use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use shared::units::{money_to_fixed, quantity_to_fixed};

/// Open the connection pool described by the configuration
pub async fn connect(config: &DatabaseConfig) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(config.create_if_missing)
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    tracing::info!(url = %config.url, "Connecting to database...");
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;
    tracing::info!("Database connection established");

    Ok(pool)
}

/// Apply pending schema migrations
pub async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrations completed");
    Ok(())
}

/// Private in-memory database with the schema applied.
///
/// A single connection is kept alive for the lifetime of the pool since every
/// new in-memory connection would start from an empty database.
pub async fn memory_pool() -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Convert a quantity or volume into its stored integer form
pub fn quantity_to_db(field: &str, value: Decimal) -> AppResult<i64> {
    quantity_to_fixed(value).ok_or_else(|| {
        AppError::validation(field, "Quantity is out of range", "Количество вне допустимого диапазона")
    })
}

/// Convert a volume that must stay positive once stored.
///
/// Values below the storage resolution of 0.001 round to zero and are rejected.
pub fn volume_to_db(field: &str, value: Decimal) -> AppResult<i64> {
    let raw = quantity_to_db(field, value)?;
    if raw <= 0 {
        return Err(AppError::validation(
            field,
            "Value must be at least 0.001",
            "Значение должно быть не меньше 0,001",
        ));
    }
    Ok(raw)
}

/// Convert a money amount into its stored integer form
pub fn money_to_db(field: &str, value: Decimal) -> AppResult<i64> {
    money_to_fixed(value).ok_or_else(|| {
        AppError::validation(field, "Amount is out of range", "Сумма вне допустимого диапазона")
    })
}

/// Case-insensitive substring match used by the list searches.
///
/// SQLite's LIKE folds ASCII only, so Cyrillic names are compared here instead.
pub fn matches_search(value: &str, search: Option<&str>) -> bool {
    match search.map(str::trim) {
        None | Some("") => true,
        Some(needle) => value.to_lowercase().contains(&needle.to_lowercase()),
    }
}
