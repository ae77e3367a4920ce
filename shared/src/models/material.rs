//! Raw material and recipe models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::UnknownVariant;

/// Ingredient consumed by batches when a recipe does not name another one
pub const DEFAULT_BASE_MATERIAL: &str = "Мед";

/// A raw material kept in stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawMaterial {
    pub id: i64,
    pub name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub cost_per_unit: Decimal,
    pub purchase_date: NaiveDate,
    /// Quantity below which the material shows up in the notification feed
    pub min_quantity: Decimal,
}

impl RawMaterial {
    pub fn is_below_minimum(&self) -> bool {
        self.quantity < self.min_quantity
    }
}

/// Unit of measure for raw materials
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Kg,
    L,
    Pcs,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::L => "l",
            Unit::Pcs => "pcs",
        }
    }

    pub fn label_ru(&self) -> &'static str {
        match self {
            Unit::Kg => "кг",
            Unit::L => "л",
            Unit::Pcs => "шт",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kg" => Ok(Unit::Kg),
            "l" => Ok(Unit::L),
            "pcs" => Ok(Unit::Pcs),
            other => Err(UnknownVariant::new("unit", other)),
        }
    }
}

/// A production recipe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Name of the raw material consumed by batches of this recipe
    pub base_material: String,
}
