//! Order fulfillment service
//!
//! Orders draw volume from finished products. Creating an order and deleting
//! it are each a single transaction, and deletion is the exact inverse of
//! creation as far as product availability is concerned.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::units::{money_from_fixed, quantity_from_fixed};
use shared::{
    line_cost, order_total, validate_positive, Capability, DateRange, Order, OrderItem,
    OrderStatus, OrderWithItems,
};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;

use crate::db::{matches_search, money_to_db, volume_to_db};
use crate::error::{AppError, AppResult};
use crate::services::access::Session;
use crate::services::ensure;
use crate::services::product::fetch_product;

/// Order service
#[derive(Clone)]
pub struct OrderService {
    db: SqlitePool,
}

/// One requested order line
#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineInput {
    pub product_id: i64,
    pub volume: Decimal,
}

/// Input for placing an order
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderInput {
    pub client_id: i64,
    pub order_date: NaiveDate,
    pub items: Vec<OrderLineInput>,
}

/// Order list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    /// Substring of the client name
    pub client_search: Option<String>,
    pub date_range: Option<DateRange>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, FromRow)]
pub(crate) struct OrderRow {
    pub id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub order_date: NaiveDate,
    pub status: String,
    pub user_id: i64,
    pub total_cost: i64,
}

impl OrderRow {
    pub(crate) fn into_order(self) -> AppResult<Order> {
        Ok(Order {
            id: self.id,
            client_id: self.client_id,
            order_date: self.order_date,
            status: self.status.parse()?,
            user_id: self.user_id,
            total_cost: money_from_fixed(self.total_cost),
        })
    }
}

pub(crate) const ORDER_SELECT: &str = r#"
    SELECT o.id, o.client_id, c.name AS client_name, o.order_date, o.status, o.user_id, o.total_cost
    FROM orders o
    JOIN clients c ON c.id = o.client_id
"#;

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    volume: i64,
    cost: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            volume: quantity_from_fixed(row.volume),
            cost: money_from_fixed(row.cost),
        }
    }
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: i64) -> AppResult<Vec<OrderItemRow>> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, order_id, product_id, volume, cost FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

fn insufficient(product_id: i64, requested_raw: i64, available_raw: i64) -> AppError {
    tracing::warn!(product_id, requested_raw, available_raw, "insufficient product volume");
    AppError::InsufficientProduct {
        product_id,
        requested: quantity_from_fixed(requested_raw),
        available: quantity_from_fixed(available_raw),
    }
}

fn out_of_range() -> AppError {
    AppError::validation(
        "volume",
        "Order amount is out of range",
        "Сумма заказа вне допустимого диапазона",
    )
}

impl OrderService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Place an order and draw its volume from the products.
    ///
    /// Every line is checked against availability first, with repeated
    /// products summed. The order, its lines and the volume decrements are
    /// committed together or not at all.
    pub async fn create_order(
        &self,
        session: &Session,
        input: CreateOrderInput,
    ) -> AppResult<OrderWithItems> {
        session.require(Capability::ManageOrders)?;

        if input.items.is_empty() {
            return Err(AppError::validation(
                "items",
                "An order needs at least one item",
                "Добавьте в заказ хотя бы одну позицию",
            ));
        }

        let mut lines = Vec::with_capacity(input.items.len());
        let mut requested: BTreeMap<i64, i64> = BTreeMap::new();
        for item in &input.items {
            ensure(
                "volume",
                validate_positive(item.volume),
                "Объём должен быть больше нуля",
            )?;
            let volume_raw = volume_to_db("volume", item.volume)?;
            let total = requested.entry(item.product_id).or_insert(0);
            *total = total.checked_add(volume_raw).ok_or_else(out_of_range)?;
            lines.push((item.product_id, volume_raw));
        }

        let mut tx = self.db.begin().await?;

        let client: Option<i64> = sqlx::query_scalar("SELECT id FROM clients WHERE id = ?")
            .bind(input.client_id)
            .fetch_optional(&mut *tx)
            .await?;
        if client.is_none() {
            return Err(AppError::NotFound("Client".to_string()));
        }

        let mut prices = BTreeMap::new();
        for (&product_id, &total_raw) in &requested {
            let product = fetch_product(&mut *tx, product_id).await?;
            if product.available_volume < total_raw {
                return Err(insufficient(product_id, total_raw, product.available_volume));
            }
            prices.insert(product_id, money_from_fixed(product.price_per_liter));
        }

        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (client_id, order_date, status, user_id, total_cost)
            VALUES (?, ?, ?, ?, 0)
            RETURNING id
            "#,
        )
        .bind(input.client_id)
        .bind(input.order_date)
        .bind(OrderStatus::Pending.as_str())
        .bind(session.user_id())
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (product_id, volume_raw) in lines {
            let price = prices.get(&product_id).copied().ok_or_else(|| {
                AppError::Internal(format!("no price loaded for product {}", product_id))
            })?;
            let volume = quantity_from_fixed(volume_raw);
            let cost = line_cost(volume, price).ok_or_else(out_of_range)?;

            let decremented = sqlx::query(
                r#"
                UPDATE finished_products
                SET available_volume = available_volume - ?
                WHERE id = ? AND available_volume >= ?
                "#,
            )
            .bind(volume_raw)
            .bind(product_id)
            .bind(volume_raw)
            .execute(&mut *tx)
            .await?;
            if decremented.rows_affected() == 0 {
                let available: i64 =
                    sqlx::query_scalar("SELECT available_volume FROM finished_products WHERE id = ?")
                        .bind(product_id)
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(insufficient(product_id, volume_raw, available));
            }

            let item_id: i64 = sqlx::query_scalar(
                "INSERT INTO order_items (order_id, product_id, volume, cost) VALUES (?, ?, ?, ?) RETURNING id",
            )
            .bind(order_id)
            .bind(product_id)
            .bind(volume_raw)
            .bind(money_to_db("cost", cost)?)
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderItem {
                id: item_id,
                order_id,
                product_id,
                volume,
                cost,
            });
        }

        let total = order_total(&items).ok_or_else(out_of_range)?;
        sqlx::query("UPDATE orders SET total_cost = ? WHERE id = ?")
            .bind(money_to_db("total_cost", total)?)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            order_id,
            client_id = input.client_id,
            items = items.len(),
            total = %total,
            by = %session.login(),
            "order created"
        );

        Ok(OrderWithItems {
            order: Order {
                id: order_id,
                client_id: input.client_id,
                order_date: input.order_date,
                status: OrderStatus::Pending,
                user_id: session.user_id(),
                total_cost: total,
            },
            items,
        })
    }

    /// Change the status of an order. Availability is not affected.
    pub async fn update_order_status(
        &self,
        session: &Session,
        order_id: i64,
        status: OrderStatus,
    ) -> AppResult<Order> {
        session.require(Capability::ManageOrders)?;
        let result = sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(order_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Order {}", order_id)));
        }

        tracing::info!(order_id, status = %status, by = %session.login(), "order status changed");
        self.fetch_order(order_id).await
    }

    /// Delete an order and return its volume to the products
    pub async fn delete_order(&self, session: &Session, order_id: i64) -> AppResult<()> {
        session.require(Capability::ManageOrders)?;

        let mut tx = self.db.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM orders WHERE id = ?")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Order {}", order_id)));
        }

        let items = fetch_items(&mut *tx, order_id).await?;
        for item in &items {
            sqlx::query(
                "UPDATE finished_products SET available_volume = available_volume + ? WHERE id = ?",
            )
            .bind(item.volume)
            .bind(item.product_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = ?")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(order_id, items = items.len(), by = %session.login(), "order deleted");
        Ok(())
    }

    /// Orders matching the filter, newest first
    pub async fn list_orders(
        &self,
        session: &Session,
        filter: &OrderFilter,
    ) -> AppResult<Vec<Order>> {
        session.require(Capability::ManageOrders)?;
        let status = filter.status.map(|s| s.as_str());
        let range = filter.date_range;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            {}
            WHERE (? IS NULL OR o.status = ?)
              AND (? IS NULL OR o.order_date BETWEEN ? AND ?)
            ORDER BY o.order_date DESC, o.id DESC
            "#,
            ORDER_SELECT
        ))
        .bind(status)
        .bind(status)
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .filter(|row| matches_search(&row.client_name, filter.client_search.as_deref()))
            .map(OrderRow::into_order)
            .collect()
    }

    /// An order with its lines
    pub async fn get_order(&self, session: &Session, order_id: i64) -> AppResult<OrderWithItems> {
        session.require(Capability::ManageOrders)?;
        let order = self.fetch_order(order_id).await?;
        let mut conn = self.db.acquire().await?;
        let items = fetch_items(&mut *conn, order_id).await?;
        Ok(OrderWithItems {
            order,
            items: items.into_iter().map(OrderItem::from).collect(),
        })
    }

    async fn fetch_order(&self, order_id: i64) -> AppResult<Order> {
        sqlx::query_as::<_, OrderRow>(&format!("{} WHERE o.id = ?", ORDER_SELECT))
            .bind(order_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {}", order_id)))?
            .into_order()
    }
}
