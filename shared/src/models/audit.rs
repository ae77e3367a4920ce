//! Price-change audit models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::UnknownVariant;

/// Tables whose prices are audited
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditedTable {
    RawMaterials,
    Batches,
}

impl AuditedTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditedTable::RawMaterials => "raw_materials",
            AuditedTable::Batches => "batches",
        }
    }
}

impl fmt::Display for AuditedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditedTable {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw_materials" => Ok(AuditedTable::RawMaterials),
            "batches" => Ok(AuditedTable::Batches),
            other => Err(UnknownVariant::new("audited table", other)),
        }
    }
}

/// One historical price edit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceChange {
    pub id: i64,
    pub table: AuditedTable,
    pub record_id: i64,
    pub old_price: Decimal,
    pub new_price: Decimal,
    /// Login of the user who made the edit
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}
