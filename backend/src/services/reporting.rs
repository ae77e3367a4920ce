//! Reporting service for report tables, chart data and export
//! Provides material purchases, production, sales and income projections

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::units::{money_from_fixed, quantity_from_fixed};
use shared::{BatchStatus, Capability, DateRange, OrderStatus, RawMaterial, Unit};
use sqlx::{FromRow, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::services::access::Session;
use crate::services::material::MaterialRow;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: SqlitePool,
}

/// Material purchase report line
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MaterialReportRow {
    pub id: i64,
    pub name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub cost_per_unit: Decimal,
    pub purchase_date: NaiveDate,
}

impl From<RawMaterial> for MaterialReportRow {
    fn from(m: RawMaterial) -> Self {
        Self {
            id: m.id,
            name: m.name,
            quantity: m.quantity,
            unit: m.unit,
            cost_per_unit: m.cost_per_unit,
            purchase_date: m.purchase_date,
        }
    }
}

/// Production report line
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchReportRow {
    pub id: i64,
    pub recipe: String,
    pub volume: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BatchStatus,
    pub price_per_liter: Decimal,
}

/// Sales report line
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderReportRow {
    pub id: i64,
    pub client: String,
    pub order_date: NaiveDate,
    pub status: OrderStatus,
    pub total_cost: Decimal,
}

/// Income for one day
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IncomePoint {
    pub date: NaiveDate,
    pub income: Decimal,
}

/// Remaining volume of a product, for the availability chart
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductAvailability {
    pub product_id: i64,
    pub available_volume: Decimal,
}

#[derive(Debug, FromRow)]
struct BatchReportQueryRow {
    id: i64,
    recipe: String,
    volume: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    price_per_liter: i64,
}

#[derive(Debug, FromRow)]
struct OrderReportQueryRow {
    id: i64,
    client: String,
    order_date: NaiveDate,
    status: String,
    total_cost: i64,
}

#[derive(Debug, FromRow)]
struct IncomeRow {
    order_date: NaiveDate,
    income: i64,
}

impl From<IncomeRow> for IncomePoint {
    fn from(row: IncomeRow) -> Self {
        Self {
            date: row.order_date,
            income: money_from_fixed(row.income),
        }
    }
}

const FULFILLED_STATUSES: [OrderStatus; 2] = [OrderStatus::Completed, OrderStatus::Finished];

impl ReportingService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Materials purchased within the range
    pub async fn materials_report(
        &self,
        session: &Session,
        range: DateRange,
    ) -> AppResult<Vec<MaterialReportRow>> {
        session.require(Capability::ViewReports)?;
        let rows = sqlx::query_as::<_, MaterialRow>(
            r#"
            SELECT id, name, quantity, unit, cost_per_unit, purchase_date, min_quantity
            FROM raw_materials
            WHERE purchase_date BETWEEN ? AND ?
            ORDER BY purchase_date, name
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| row.into_material().map(MaterialReportRow::from))
            .collect()
    }

    /// Batches started within the range
    pub async fn batches_report(
        &self,
        session: &Session,
        range: DateRange,
    ) -> AppResult<Vec<BatchReportRow>> {
        session.require(Capability::ViewReports)?;
        let rows = sqlx::query_as::<_, BatchReportQueryRow>(
            r#"
            SELECT b.id, r.name AS recipe, b.volume, b.start_date, b.end_date, b.status, b.price_per_liter
            FROM batches b
            JOIN recipes r ON r.id = b.recipe_id
            WHERE b.start_date BETWEEN ? AND ?
            ORDER BY b.start_date, b.id
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| -> AppResult<BatchReportRow> {
                Ok(BatchReportRow {
                    id: row.id,
                    recipe: row.recipe,
                    volume: quantity_from_fixed(row.volume),
                    start_date: row.start_date,
                    end_date: row.end_date,
                    status: row.status.parse()?,
                    price_per_liter: money_from_fixed(row.price_per_liter),
                })
            })
            .collect()
    }

    /// Orders placed within the range, optionally of one status
    pub async fn orders_report(
        &self,
        session: &Session,
        range: DateRange,
        status: Option<OrderStatus>,
    ) -> AppResult<Vec<OrderReportRow>> {
        session.require(Capability::ViewReports)?;
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, OrderReportQueryRow>(
            r#"
            SELECT o.id, c.name AS client, o.order_date, o.status, o.total_cost
            FROM orders o
            JOIN clients c ON c.id = o.client_id
            WHERE o.order_date BETWEEN ? AND ?
              AND (? IS NULL OR o.status = ?)
            ORDER BY o.order_date, o.id
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(status)
        .bind(status)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| -> AppResult<OrderReportRow> {
                Ok(OrderReportRow {
                    id: row.id,
                    client: row.client,
                    order_date: row.order_date,
                    status: row.status.parse()?,
                    total_cost: money_from_fixed(row.total_cost),
                })
            })
            .collect()
    }

    /// Daily income from fulfilled orders within the range
    pub async fn income_by_date(
        &self,
        session: &Session,
        range: DateRange,
    ) -> AppResult<Vec<IncomePoint>> {
        session.require(Capability::ViewReports)?;
        self.income(Some(range)).await
    }

    /// Daily income from fulfilled orders over all time, for the income chart
    pub async fn income_series(&self, session: &Session) -> AppResult<Vec<IncomePoint>> {
        session.require(Capability::ViewReports)?;
        self.income(None).await
    }

    /// Available volume per product, for the stock chart
    pub async fn product_availability(
        &self,
        session: &Session,
    ) -> AppResult<Vec<ProductAvailability>> {
        session.require(Capability::ViewReports)?;
        let rows: Vec<(i64, i64)> =
            sqlx::query_as("SELECT id, available_volume FROM finished_products ORDER BY id")
                .fetch_all(&self.db)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, available)| ProductAvailability {
                product_id,
                available_volume: quantity_from_fixed(available),
            })
            .collect())
    }

    async fn income(&self, range: Option<DateRange>) -> AppResult<Vec<IncomePoint>> {
        let rows = sqlx::query_as::<_, IncomeRow>(
            r#"
            SELECT order_date, SUM(total_cost) AS income
            FROM orders
            WHERE status IN (?, ?)
              AND (? IS NULL OR order_date BETWEEN ? AND ?)
            GROUP BY order_date
            ORDER BY order_date
            "#,
        )
        .bind(FULFILLED_STATUSES[0].as_str())
        .bind(FULFILLED_STATUSES[1].as_str())
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(IncomePoint::from).collect())
    }

    /// Export report rows to CSV
    pub fn export_csv<T: Serialize>(rows: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in rows {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}
