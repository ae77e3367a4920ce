//! Raw-material ledger: purchases, edits and consumption by production

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::units::{money_from_fixed, quantity_from_fixed};
use shared::{
    validate_non_negative, validate_not_blank, AuditedTable, Capability, RawMaterial, Unit,
};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::config::InventoryConfig;
use crate::db::{matches_search, money_to_db, quantity_to_db};
use crate::error::{AppError, AppResult};
use crate::services::access::Session;
use crate::services::audit::record_price_change;
use crate::services::ensure;

/// Raw-material ledger service
#[derive(Clone)]
pub struct MaterialService {
    db: SqlitePool,
    default_min_quantity: Decimal,
}

/// Input for recording a purchase. Buying a material that is already stocked
/// adds to its quantity.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseMaterialInput {
    pub name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub cost_per_unit: Decimal,
    pub purchase_date: NaiveDate,
    pub min_quantity: Option<Decimal>,
}

/// Input for editing a material record
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMaterialInput {
    pub name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub cost_per_unit: Decimal,
    pub purchase_date: NaiveDate,
    pub min_quantity: Decimal,
}

#[derive(Debug, FromRow)]
pub(crate) struct MaterialRow {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit: String,
    pub cost_per_unit: i64,
    pub purchase_date: NaiveDate,
    pub min_quantity: i64,
}

impl MaterialRow {
    pub(crate) fn into_material(self) -> AppResult<RawMaterial> {
        Ok(RawMaterial {
            id: self.id,
            name: self.name,
            quantity: quantity_from_fixed(self.quantity),
            unit: self.unit.parse()?,
            cost_per_unit: money_from_fixed(self.cost_per_unit),
            purchase_date: self.purchase_date,
            min_quantity: quantity_from_fixed(self.min_quantity),
        })
    }
}

const MATERIAL_COLUMNS: &str =
    "id, name, quantity, unit, cost_per_unit, purchase_date, min_quantity";

/// Deduct `amount` of the named material inside the caller's transaction.
///
/// A missing material counts as zero stock. The decrement is conditional on
/// the stored quantity, so a concurrent consumer cannot drive it negative.
pub async fn consume_raw_material(
    conn: &mut SqliteConnection,
    name: &str,
    amount: Decimal,
) -> AppResult<RawMaterial> {
    let amount_raw = quantity_to_db("volume", amount)?;
    let required = quantity_from_fixed(amount_raw);

    let updated = sqlx::query_as::<_, MaterialRow>(&format!(
        "UPDATE raw_materials SET quantity = quantity - ? WHERE name = ? AND quantity >= ? RETURNING {}",
        MATERIAL_COLUMNS
    ))
    .bind(amount_raw)
    .bind(name)
    .bind(amount_raw)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = updated {
        let material = row.into_material()?;
        tracing::debug!(material = %material.name, consumed = %required, left = %material.quantity, "raw material consumed");
        return Ok(material);
    }

    let available: Option<i64> =
        sqlx::query_scalar("SELECT quantity FROM raw_materials WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
    let available = quantity_from_fixed(available.unwrap_or(0));

    tracing::warn!(material = %name, required = %required, available = %available, "insufficient raw material");
    Err(AppError::InsufficientStock {
        material: name.to_string(),
        required,
        available,
    })
}

/// Credit consumed material back to the ledger
pub(crate) async fn restore_raw_material(
    conn: &mut SqliteConnection,
    material_id: i64,
    amount_raw: i64,
) -> AppResult<()> {
    sqlx::query("UPDATE raw_materials SET quantity = quantity + ? WHERE id = ?")
        .bind(amount_raw)
        .bind(material_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Materials whose quantity is below their threshold
pub(crate) async fn fetch_low_stock(db: &SqlitePool) -> AppResult<Vec<RawMaterial>> {
    let rows = sqlx::query_as::<_, MaterialRow>(&format!(
        "SELECT {} FROM raw_materials ORDER BY name",
        MATERIAL_COLUMNS
    ))
    .fetch_all(db)
    .await?;

    let mut low = Vec::new();
    for row in rows {
        let material = row.into_material()?;
        if material.is_below_minimum() {
            low.push(material);
        }
    }
    Ok(low)
}

fn validate_amounts(quantity: Decimal, cost: Decimal, min_quantity: Decimal) -> AppResult<()> {
    ensure(
        "quantity",
        validate_non_negative(quantity),
        "Количество не может быть отрицательным",
    )?;
    ensure(
        "cost_per_unit",
        validate_non_negative(cost),
        "Стоимость не может быть отрицательной",
    )?;
    ensure(
        "min_quantity",
        validate_non_negative(min_quantity),
        "Минимальный остаток не может быть отрицательным",
    )
}

impl MaterialService {
    pub fn new(db: SqlitePool, config: &InventoryConfig) -> Self {
        Self {
            db,
            default_min_quantity: config.default_min_quantity,
        }
    }

    /// Record a purchase of raw material
    pub async fn purchase_material(
        &self,
        session: &Session,
        input: PurchaseMaterialInput,
    ) -> AppResult<RawMaterial> {
        session.require(Capability::ManageMaterials)?;
        let name = input.name.trim();
        ensure("name", validate_not_blank(name), "Укажите название сырья")?;
        let min_quantity = input.min_quantity.unwrap_or(self.default_min_quantity);
        validate_amounts(input.quantity, input.cost_per_unit, min_quantity)?;

        let quantity_raw = quantity_to_db("quantity", input.quantity)?;
        let cost_raw = money_to_db("cost_per_unit", input.cost_per_unit)?;
        let min_raw = quantity_to_db("min_quantity", min_quantity)?;

        let mut tx = self.db.begin().await?;

        let existing = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {} FROM raw_materials WHERE name = ?",
            MATERIAL_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        let id = match existing {
            Some(row) => {
                let current = row.into_material()?;
                if current.unit != input.unit {
                    return Err(AppError::validation(
                        "unit",
                        "Unit does not match the stocked material",
                        "Единица измерения не совпадает с имеющимся сырьём",
                    ));
                }

                sqlx::query(
                    r#"
                    UPDATE raw_materials
                    SET quantity = quantity + ?, cost_per_unit = ?, purchase_date = ?,
                        min_quantity = COALESCE(?, min_quantity)
                    WHERE id = ?
                    "#,
                )
                .bind(quantity_raw)
                .bind(cost_raw)
                .bind(input.purchase_date)
                .bind(input.min_quantity.map(|_| min_raw))
                .bind(current.id)
                .execute(&mut *tx)
                .await?;

                record_price_change(
                    &mut *tx,
                    AuditedTable::RawMaterials,
                    current.id,
                    current.cost_per_unit,
                    input.cost_per_unit,
                    session.login(),
                )
                .await?;

                current.id
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO raw_materials (name, quantity, unit, cost_per_unit, purchase_date, min_quantity)
                    VALUES (?, ?, ?, ?, ?, ?)
                    RETURNING id
                    "#,
                )
                .bind(name)
                .bind(quantity_raw)
                .bind(input.unit.as_str())
                .bind(cost_raw)
                .bind(input.purchase_date)
                .bind(min_raw)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        tracing::info!(material = %name, quantity = %input.quantity, by = %session.login(), "raw material purchased");
        self.fetch_material(id).await
    }

    /// Edit a material record. A cost change is written to the price history.
    pub async fn update_material(
        &self,
        session: &Session,
        id: i64,
        input: UpdateMaterialInput,
    ) -> AppResult<RawMaterial> {
        session.require(Capability::ManageMaterials)?;
        let name = input.name.trim();
        ensure("name", validate_not_blank(name), "Укажите название сырья")?;
        validate_amounts(input.quantity, input.cost_per_unit, input.min_quantity)?;

        let current = self.fetch_material(id).await?;
        self.ensure_name_free(name, id).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE raw_materials
            SET name = ?, quantity = ?, unit = ?, cost_per_unit = ?, purchase_date = ?, min_quantity = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(quantity_to_db("quantity", input.quantity)?)
        .bind(input.unit.as_str())
        .bind(money_to_db("cost_per_unit", input.cost_per_unit)?)
        .bind(input.purchase_date)
        .bind(quantity_to_db("min_quantity", input.min_quantity)?)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        // Recipes follow a renamed base material
        if current.name != name {
            sqlx::query("UPDATE recipes SET base_material = ? WHERE base_material = ?")
                .bind(name)
                .bind(&current.name)
                .execute(&mut *tx)
                .await?;
        }

        record_price_change(
            &mut *tx,
            AuditedTable::RawMaterials,
            id,
            current.cost_per_unit,
            input.cost_per_unit,
            session.login(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(material_id = id, by = %session.login(), "raw material updated");
        self.fetch_material(id).await
    }

    /// Delete a material no batch or recipe refers to
    pub async fn delete_material(&self, session: &Session, id: i64) -> AppResult<()> {
        session.require(Capability::ManageMaterials)?;
        let material = self.fetch_material(id).await?;

        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM batch_materials WHERE material_id = ?)
                 + (SELECT COUNT(*) FROM recipes WHERE base_material = ?)
            "#,
        )
        .bind(id)
        .bind(&material.name)
        .fetch_one(&self.db)
        .await?;
        if references > 0 {
            tracing::warn!(material = %material.name, "delete blocked: material in use");
            return Err(AppError::MaterialInUse);
        }

        sqlx::query("DELETE FROM raw_materials WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(material = %material.name, by = %session.login(), "raw material deleted");
        Ok(())
    }

    /// Materials whose name contains the search text
    pub async fn list_materials(
        &self,
        session: &Session,
        search: Option<&str>,
    ) -> AppResult<Vec<RawMaterial>> {
        session.require(Capability::ManageMaterials)?;
        let rows = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {} FROM raw_materials ORDER BY name",
            MATERIAL_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .filter(|row| matches_search(&row.name, search))
            .map(MaterialRow::into_material)
            .collect()
    }

    pub async fn get_material(&self, session: &Session, id: i64) -> AppResult<RawMaterial> {
        session.require(Capability::ManageMaterials)?;
        self.fetch_material(id).await
    }

    /// Materials below their minimum quantity
    pub async fn low_stock(&self, session: &Session) -> AppResult<Vec<RawMaterial>> {
        session.require(Capability::ManageMaterials)?;
        fetch_low_stock(&self.db).await
    }

    async fn fetch_material(&self, id: i64) -> AppResult<RawMaterial> {
        sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {} FROM raw_materials WHERE id = ?",
            MATERIAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Raw material".to_string()))?
        .into_material()
    }

    async fn ensure_name_free(&self, name: &str, except_id: i64) -> AppResult<()> {
        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM raw_materials WHERE name = ? AND id != ?")
                .bind(name)
                .bind(except_id)
                .fetch_one(&self.db)
                .await?;
        if taken > 0 {
            return Err(AppError::conflict(
                "name",
                "A material with this name already exists",
                "Сырьё с таким названием уже существует",
            ));
        }
        Ok(())
    }
}
