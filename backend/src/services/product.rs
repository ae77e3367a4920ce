//! Finished-product inventory queries

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::units::{money_from_fixed, quantity_from_fixed};
use shared::{Capability, DateRange, FinishedProduct};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::db::money_to_db;
use crate::error::{AppError, AppResult};
use crate::services::access::Session;

/// Finished-product service
#[derive(Clone)]
pub struct ProductService {
    db: SqlitePool,
}

/// Product search as offered on the products screen
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Production date within the range
    pub production_range: Option<DateRange>,
    /// Exact production date
    pub production_date: Option<NaiveDate>,
    /// Exact price per liter
    pub price_per_liter: Option<Decimal>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ProductRow {
    pub id: i64,
    pub batch_id: i64,
    pub volume: i64,
    pub available_volume: i64,
    pub production_date: NaiveDate,
    pub price_per_liter: i64,
}

impl From<ProductRow> for FinishedProduct {
    fn from(row: ProductRow) -> Self {
        FinishedProduct {
            id: row.id,
            batch_id: row.batch_id,
            volume: quantity_from_fixed(row.volume),
            available_volume: quantity_from_fixed(row.available_volume),
            production_date: row.production_date,
            price_per_liter: money_from_fixed(row.price_per_liter),
        }
    }
}

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, batch_id, volume, available_volume, production_date, price_per_liter";

/// The product materialized from a batch, if any
pub(crate) async fn fetch_product_for_batch(
    conn: &mut SqliteConnection,
    batch_id: i64,
) -> AppResult<Option<ProductRow>> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {} FROM finished_products WHERE batch_id = ?",
        PRODUCT_COLUMNS
    ))
    .bind(batch_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Load a product within an open transaction
pub(crate) async fn fetch_product(conn: &mut SqliteConnection, id: i64) -> AppResult<ProductRow> {
    sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {} FROM finished_products WHERE id = ?",
        PRODUCT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {}", id)))
}

impl ProductService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// List products, newest production first
    pub async fn list_products(
        &self,
        session: &Session,
        filter: &ProductFilter,
    ) -> AppResult<Vec<FinishedProduct>> {
        session.require(Capability::ViewProducts)?;
        let price = filter
            .price_per_liter
            .map(|p| money_to_db("price_per_liter", p))
            .transpose()?;
        let range = filter.production_range;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {} FROM finished_products
            WHERE (? IS NULL OR production_date BETWEEN ? AND ?)
              AND (? IS NULL OR production_date = ?)
              AND (? IS NULL OR price_per_liter = ?)
            ORDER BY production_date DESC, id DESC
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .bind(filter.production_date)
        .bind(filter.production_date)
        .bind(price)
        .bind(price)
        .fetch_all(&self.db)
        .await?;

        tracing::debug!(count = rows.len(), "products listed");
        Ok(rows.into_iter().map(FinishedProduct::from).collect())
    }

    pub async fn get_product(&self, session: &Session, id: i64) -> AppResult<FinishedProduct> {
        session.require(Capability::ViewProducts)?;
        let mut conn = self.db.acquire().await?;
        fetch_product(&mut *conn, id).await.map(FinishedProduct::from)
    }

    /// The product made from a batch, `None` while the batch is fermenting
    pub async fn product_for_batch(
        &self,
        session: &Session,
        batch_id: i64,
    ) -> AppResult<Option<FinishedProduct>> {
        if !session.has_capability(Capability::ViewProducts) {
            session.require(Capability::ManageBatches)?;
        }
        let mut conn = self.db.acquire().await?;
        let row = fetch_product_for_batch(&mut *conn, batch_id).await?;
        Ok(row.map(FinishedProduct::from))
    }
}
