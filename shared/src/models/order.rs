//! Client, order and order item models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::UnknownVariant;
use crate::units::{round_to, MONEY_SCALE};

/// A customer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub client_type: ClientType,
    pub contact: String,
    /// Taxpayer number (ИНН), 10 or 12 digits
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Individual,
    LegalEntity,
    Entrepreneur,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Individual => "individual",
            ClientType::LegalEntity => "legal_entity",
            ClientType::Entrepreneur => "entrepreneur",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(ClientType::Individual),
            "legal_entity" => Ok(ClientType::LegalEntity),
            "entrepreneur" => Ok(ClientType::Entrepreneur),
            other => Err(UnknownVariant::new("client type", other)),
        }
    }
}

/// A customer order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    pub client_id: i64,
    pub order_date: NaiveDate,
    pub status: OrderStatus,
    pub user_id: i64,
    /// Sum of the item costs
    pub total_cost: Decimal,
}

/// One line of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub volume: Decimal,
    pub cost: Decimal,
}

/// An order together with its lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Finished,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Finished => "finished",
        }
    }

    /// Orders in these states count as realized income
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Finished)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "finished" => Ok(OrderStatus::Finished),
            other => Err(UnknownVariant::new("order status", other)),
        }
    }
}

/// Cost of an order line, rounded to kopecks. `None` when the product
/// overflows a decimal.
pub fn line_cost(volume: Decimal, price_per_liter: Decimal) -> Option<Decimal> {
    volume
        .checked_mul(price_per_liter)
        .map(|cost| round_to(cost, MONEY_SCALE))
}

/// Order total as the sum of its line costs. `None` on overflow.
pub fn order_total(items: &[OrderItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.cost))
}
