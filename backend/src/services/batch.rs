//! Batch lifecycle service
//!
//! A batch consumes its recipe's base material when it is started and
//! ferments until it is moved to `Ready`, which materializes exactly one
//! finished product holding the batch volume.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::units::{money_from_fixed, quantity_from_fixed};
use shared::{
    fermentation_end, validate_non_negative, validate_positive, AuditedTable, Batch, BatchStatus,
    Capability, DateRange, FinishedProduct,
};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::db::{money_to_db, quantity_to_db, volume_to_db};
use crate::error::{AppError, AppResult};
use crate::services::access::Session;
use crate::services::audit::record_price_change;
use crate::services::ensure;
use crate::services::material::{consume_raw_material, restore_raw_material};
use crate::services::product::{fetch_product_for_batch, PRODUCT_COLUMNS, ProductRow};
use crate::services::recipe::fetch_recipe;

/// Batch lifecycle service
#[derive(Clone)]
pub struct BatchService {
    db: SqlitePool,
}

/// Input for starting or editing a batch
#[derive(Debug, Clone, Deserialize)]
pub struct BatchInput {
    pub recipe_id: i64,
    pub volume: Decimal,
    pub start_date: NaiveDate,
    pub price_per_liter: Decimal,
}

/// Batch list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchFilter {
    pub status: Option<BatchStatus>,
    /// Start date within the range
    pub start_range: Option<DateRange>,
}

#[derive(Debug, FromRow)]
pub(crate) struct BatchRow {
    pub id: i64,
    pub recipe_id: i64,
    pub volume: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub price_per_liter: i64,
    pub user_id: i64,
}

impl BatchRow {
    pub(crate) fn into_batch(self) -> AppResult<Batch> {
        Ok(Batch {
            id: self.id,
            recipe_id: self.recipe_id,
            volume: quantity_from_fixed(self.volume),
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status.parse()?,
            price_per_liter: money_from_fixed(self.price_per_liter),
            user_id: self.user_id,
        })
    }
}

pub(crate) const BATCH_COLUMNS: &str =
    "id, recipe_id, volume, start_date, end_date, status, price_per_liter, user_id";

#[derive(Debug, FromRow)]
struct ConsumptionRow {
    material_id: i64,
    quantity_used: i64,
}

async fn fetch_batch_row(conn: &mut SqliteConnection, id: i64) -> AppResult<BatchRow> {
    sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {} FROM batches WHERE id = ?",
        BATCH_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Batch {}", id)))
}

/// Consume the recipe's base material for a batch and record what was used
async fn consume_for_batch(
    conn: &mut SqliteConnection,
    batch_id: i64,
    recipe_id: i64,
    volume: Decimal,
) -> AppResult<()> {
    let recipe = fetch_recipe(&mut *conn, recipe_id).await?;
    let material = consume_raw_material(&mut *conn, &recipe.base_material, volume).await?;

    sqlx::query(
        "INSERT INTO batch_materials (batch_id, material_id, quantity_used) VALUES (?, ?, ?)",
    )
    .bind(batch_id)
    .bind(material.id)
    .bind(quantity_to_db("volume", volume)?)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Credit every recorded consumption of a batch back to the ledger
async fn release_batch_materials(conn: &mut SqliteConnection, batch_id: i64) -> AppResult<()> {
    let used = sqlx::query_as::<_, ConsumptionRow>(
        "SELECT material_id, quantity_used FROM batch_materials WHERE batch_id = ?",
    )
    .bind(batch_id)
    .fetch_all(&mut *conn)
    .await?;

    for row in used {
        restore_raw_material(&mut *conn, row.material_id, row.quantity_used).await?;
    }

    sqlx::query("DELETE FROM batch_materials WHERE batch_id = ?")
        .bind(batch_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn locked_batch(batch_id: i64) -> AppError {
    AppError::InvalidStateTransition(format!(
        "batch {} already produced a finished product and can no longer be changed",
        batch_id
    ))
}

impl BatchInput {
    fn validate(&self) -> AppResult<()> {
        ensure(
            "volume",
            validate_positive(self.volume),
            "Объём должен быть больше нуля",
        )?;
        ensure(
            "price_per_liter",
            validate_non_negative(self.price_per_liter),
            "Цена не может быть отрицательной",
        )
    }
}

impl BatchService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Start a batch, consuming its volume of the recipe's base material.
    ///
    /// Either the batch is stored and the material deducted, or neither.
    pub async fn create_batch(&self, session: &Session, input: BatchInput) -> AppResult<Batch> {
        session.require(Capability::ManageBatches)?;
        input.validate()?;

        let volume_raw = volume_to_db("volume", input.volume)?;
        let price_raw = money_to_db("price_per_liter", input.price_per_liter)?;
        let end_date = fermentation_end(input.start_date);

        let mut tx = self.db.begin().await?;

        // Fail on a missing recipe before touching the ledger
        fetch_recipe(&mut *tx, input.recipe_id).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO batches (recipe_id, volume, start_date, end_date, status, price_per_liter, user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(input.recipe_id)
        .bind(volume_raw)
        .bind(input.start_date)
        .bind(end_date)
        .bind(BatchStatus::Fermenting.as_str())
        .bind(price_raw)
        .bind(session.user_id())
        .fetch_one(&mut *tx)
        .await?;

        consume_for_batch(&mut *tx, id, input.recipe_id, input.volume).await?;

        tx.commit().await?;

        tracing::info!(
            batch_id = id,
            recipe_id = input.recipe_id,
            volume = %input.volume,
            by = %session.login(),
            "batch started"
        );

        Ok(Batch {
            id,
            recipe_id: input.recipe_id,
            volume: quantity_from_fixed(volume_raw),
            start_date: input.start_date,
            end_date,
            status: BatchStatus::Fermenting,
            price_per_liter: money_from_fixed(price_raw),
            user_id: session.user_id(),
        })
    }

    /// Mark a batch ready and materialize its finished product.
    ///
    /// Calling this again for a ready batch returns the existing product.
    pub async fn transition_to_ready(
        &self,
        session: &Session,
        batch_id: i64,
    ) -> AppResult<FinishedProduct> {
        session.require(Capability::ManageBatches)?;

        let mut tx = self.db.begin().await?;
        let batch = fetch_batch_row(&mut *tx, batch_id).await?.into_batch()?;

        // Another session may have materialized the product first; keep theirs
        let inserted = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO finished_products (batch_id, volume, available_volume, production_date, price_per_liter)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(batch_id) DO NOTHING
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(batch_id)
        .bind(quantity_to_db("volume", batch.volume)?)
        .bind(quantity_to_db("volume", batch.volume)?)
        .bind(batch.end_date)
        .bind(money_to_db("price_per_liter", batch.price_per_liter)?)
        .fetch_optional(&mut *tx)
        .await?;

        let product = match inserted {
            Some(row) => {
                tracing::info!(batch_id, product_id = row.id, volume = %batch.volume, "finished product created");
                row
            }
            None => fetch_product_for_batch(&mut *tx, batch_id).await?.ok_or_else(|| {
                AppError::Internal(format!("product for batch {} vanished", batch_id))
            })?,
        };

        if batch.status != BatchStatus::Ready {
            sqlx::query("UPDATE batches SET status = ? WHERE id = ?")
                .bind(BatchStatus::Ready.as_str())
                .bind(batch_id)
                .execute(&mut *tx)
                .await?;
            tracing::info!(batch_id, by = %session.login(), "batch ready");
        }

        tx.commit().await?;
        Ok(FinishedProduct::from(product))
    }

    /// Switch the status of a batch as requested from the batch editor
    pub async fn set_status(
        &self,
        session: &Session,
        batch_id: i64,
        status: BatchStatus,
    ) -> AppResult<Batch> {
        session.require(Capability::ManageBatches)?;
        let current = self.get_batch(session, batch_id).await?;

        if !current.status.can_transition_to(status) {
            tracing::warn!(batch_id, from = %current.status, to = %status, "status change rejected");
            return Err(AppError::InvalidStateTransition(format!(
                "batch {} cannot go from {} back to {}",
                batch_id, current.status, status
            )));
        }

        if status == BatchStatus::Ready {
            self.transition_to_ready(session, batch_id).await?;
            return self.get_batch(session, batch_id).await;
        }
        Ok(current)
    }

    /// Edit a fermenting batch.
    ///
    /// Consumed material is credited back and the new volume consumed from the
    /// (possibly different) recipe's base material. A changed price is written
    /// to the price history.
    pub async fn update_batch(
        &self,
        session: &Session,
        batch_id: i64,
        input: BatchInput,
    ) -> AppResult<Batch> {
        session.require(Capability::ManageBatches)?;
        input.validate()?;

        let volume_raw = volume_to_db("volume", input.volume)?;
        let price_raw = money_to_db("price_per_liter", input.price_per_liter)?;
        let end_date = fermentation_end(input.start_date);

        let mut tx = self.db.begin().await?;
        let current = fetch_batch_row(&mut *tx, batch_id).await?.into_batch()?;

        if fetch_product_for_batch(&mut *tx, batch_id).await?.is_some() {
            return Err(locked_batch(batch_id));
        }

        if current.recipe_id != input.recipe_id || current.volume != quantity_from_fixed(volume_raw)
        {
            release_batch_materials(&mut *tx, batch_id).await?;
            consume_for_batch(&mut *tx, batch_id, input.recipe_id, input.volume).await?;
        }

        sqlx::query(
            r#"
            UPDATE batches
            SET recipe_id = ?, volume = ?, start_date = ?, end_date = ?, price_per_liter = ?
            WHERE id = ?
            "#,
        )
        .bind(input.recipe_id)
        .bind(volume_raw)
        .bind(input.start_date)
        .bind(end_date)
        .bind(price_raw)
        .bind(batch_id)
        .execute(&mut *tx)
        .await?;

        record_price_change(
            &mut *tx,
            AuditedTable::Batches,
            batch_id,
            current.price_per_liter,
            input.price_per_liter,
            session.login(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(batch_id, by = %session.login(), "batch updated");
        Ok(Batch {
            id: batch_id,
            recipe_id: input.recipe_id,
            volume: quantity_from_fixed(volume_raw),
            start_date: input.start_date,
            end_date,
            status: current.status,
            price_per_liter: money_from_fixed(price_raw),
            user_id: current.user_id,
        })
    }

    /// Delete a fermenting batch, crediting its material back to the ledger
    pub async fn delete_batch(&self, session: &Session, batch_id: i64) -> AppResult<()> {
        session.require(Capability::ManageBatches)?;

        let mut tx = self.db.begin().await?;
        fetch_batch_row(&mut *tx, batch_id).await?;

        if fetch_product_for_batch(&mut *tx, batch_id).await?.is_some() {
            return Err(locked_batch(batch_id));
        }

        release_batch_materials(&mut *tx, batch_id).await?;
        sqlx::query("DELETE FROM batches WHERE id = ?")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(batch_id, by = %session.login(), "batch deleted");
        Ok(())
    }

    /// Batches matching the filter, newest start first
    pub async fn list_batches(
        &self,
        session: &Session,
        filter: &BatchFilter,
    ) -> AppResult<Vec<Batch>> {
        session.require(Capability::ManageBatches)?;
        let status = filter.status.map(|s| s.as_str());
        let range = filter.start_range;

        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT {} FROM batches
            WHERE (? IS NULL OR status = ?)
              AND (? IS NULL OR start_date BETWEEN ? AND ?)
            ORDER BY start_date DESC, id DESC
            "#,
            BATCH_COLUMNS
        ))
        .bind(status)
        .bind(status)
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(BatchRow::into_batch).collect()
    }

    pub async fn get_batch(&self, session: &Session, batch_id: i64) -> AppResult<Batch> {
        session.require(Capability::ManageBatches)?;
        let mut conn = self.db.acquire().await?;
        fetch_batch_row(&mut *conn, batch_id).await?.into_batch()
    }
}
