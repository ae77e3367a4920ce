//! Price-change audit trail

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::units::money_from_fixed;
use shared::{AuditedTable, Capability, PriceChange};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::db::money_to_db;
use crate::error::AppResult;
use crate::services::access::Session;

/// Read access to the price history
#[derive(Clone)]
pub struct AuditService {
    db: SqlitePool,
}

#[derive(Debug, FromRow)]
struct PriceChangeRow {
    id: i64,
    table_name: String,
    record_id: i64,
    old_price: i64,
    new_price: i64,
    changed_by: String,
    changed_at: DateTime<Utc>,
}

impl PriceChangeRow {
    fn into_price_change(self) -> AppResult<PriceChange> {
        Ok(PriceChange {
            id: self.id,
            table: self.table_name.parse()?,
            record_id: self.record_id,
            old_price: money_from_fixed(self.old_price),
            new_price: money_from_fixed(self.new_price),
            changed_by: self.changed_by,
            changed_at: self.changed_at,
        })
    }
}

/// Append a price change inside the editing transaction.
///
/// Nothing is written when the price did not actually change. Returns whether
/// an entry was recorded.
pub async fn record_price_change(
    conn: &mut SqliteConnection,
    table: AuditedTable,
    record_id: i64,
    old_price: Decimal,
    new_price: Decimal,
    changed_by: &str,
) -> AppResult<bool> {
    let old_raw = money_to_db("old_price", old_price)?;
    let new_raw = money_to_db("new_price", new_price)?;
    if old_raw == new_raw {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO price_changes (table_name, record_id, old_price, new_price, changed_by, changed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(table.as_str())
    .bind(record_id)
    .bind(old_raw)
    .bind(new_raw)
    .bind(changed_by)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        table = %table,
        record_id,
        old = %old_price,
        new = %new_price,
        by = %changed_by,
        "price change recorded"
    );
    Ok(true)
}

impl AuditService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Price history, newest first, optionally narrowed to a table or record
    pub async fn list_price_changes(
        &self,
        session: &Session,
        table: Option<AuditedTable>,
        record_id: Option<i64>,
    ) -> AppResult<Vec<PriceChange>> {
        session.require(Capability::ViewAuditLog)?;

        let rows = sqlx::query_as::<_, PriceChangeRow>(
            r#"
            SELECT id, table_name, record_id, old_price, new_price, changed_by, changed_at
            FROM price_changes
            WHERE (? IS NULL OR table_name = ?)
              AND (? IS NULL OR record_id = ?)
            ORDER BY changed_at DESC, id DESC
            "#,
        )
        .bind(table.map(|t| t.as_str()))
        .bind(table.map(|t| t.as_str()))
        .bind(record_id)
        .bind(record_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(PriceChangeRow::into_price_change).collect()
    }
}
