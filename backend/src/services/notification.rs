//! Notification feed derived from current stock, batch and order state

use chrono::NaiveDate;
use shared::{BatchStatus, Notification, OrderStatus};
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::services::access::Session;
use crate::services::material::fetch_low_stock;

/// Notification feed service. Nothing is stored; the feed is recomputed on
/// every call.
#[derive(Clone)]
pub struct NotificationService {
    db: SqlitePool,
}

impl NotificationService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Alerts for `today`: low stock first, then batches that became ready
    /// today, then orders still pending
    pub async fn feed(&self, session: &Session, today: NaiveDate) -> AppResult<Vec<Notification>> {
        let mut feed: Vec<Notification> = fetch_low_stock(&self.db)
            .await?
            .into_iter()
            .map(|m| Notification::LowStock {
                material_id: m.id,
                name: m.name,
                quantity: m.quantity,
                min_quantity: m.min_quantity,
                unit: m.unit,
            })
            .collect();

        let ready: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM batches WHERE status = ? AND end_date = ? ORDER BY id")
                .bind(BatchStatus::Ready.as_str())
                .bind(today)
                .fetch_all(&self.db)
                .await?;
        feed.extend(
            ready
                .into_iter()
                .map(|batch_id| Notification::BatchReady { batch_id }),
        );

        let pending: Vec<(i64, i64)> =
            sqlx::query_as("SELECT id, client_id FROM orders WHERE status = ? ORDER BY order_date, id")
                .bind(OrderStatus::Pending.as_str())
                .fetch_all(&self.db)
                .await?;
        feed.extend(
            pending
                .into_iter()
                .map(|(order_id, client_id)| Notification::PendingOrder { order_id, client_id }),
        );

        tracing::debug!(login = %session.login(), count = feed.len(), "notification feed built");
        Ok(feed)
    }
}
