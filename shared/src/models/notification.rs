//! Notification feed entries

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Unit;

/// A derived, read-only alert shown to the user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Material quantity fell below its minimum threshold
    LowStock {
        material_id: i64,
        name: String,
        quantity: Decimal,
        min_quantity: Decimal,
        unit: Unit,
    },
    /// Batch finished fermenting today
    BatchReady { batch_id: i64 },
    /// Order still waiting to be fulfilled
    PendingOrder { order_id: i64, client_id: i64 },
}

impl Notification {
    /// Russian text as shown in the notification bar
    pub fn message_ru(&self) -> String {
        match self {
            Notification::LowStock {
                name,
                quantity,
                min_quantity,
                unit,
                ..
            } => format!(
                "{} < {} {} (осталось {} {})",
                name,
                min_quantity,
                unit.label_ru(),
                quantity,
                unit.label_ru()
            ),
            Notification::BatchReady { batch_id } => format!("Партия №{} готова", batch_id),
            Notification::PendingOrder { order_id, .. } => {
                format!("Заказ №{} ожидает выполнения", order_id)
            }
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::LowStock {
                name,
                quantity,
                min_quantity,
                unit,
                ..
            } => write!(
                f,
                "{} below minimum: {} {} left (minimum {})",
                name, quantity, unit, min_quantity
            ),
            Notification::BatchReady { batch_id } => write!(f, "Batch #{} is ready", batch_id),
            Notification::PendingOrder { order_id, .. } => {
                write!(f, "Order #{} is pending", order_id)
            }
        }
    }
}
