//! Production batch and finished product models

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::UnknownVariant;

/// Days a batch ferments before it is expected to be ready
pub const FERMENTATION_DAYS: i64 = 14;

/// Expected completion date for a batch started on `start`
pub fn fermentation_end(start: NaiveDate) -> NaiveDate {
    start + Duration::days(FERMENTATION_DAYS)
}

/// One production run of a recipe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: i64,
    pub recipe_id: i64,
    pub volume: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BatchStatus,
    pub price_per_liter: Decimal,
    pub user_id: i64,
}

/// Lifecycle state of a batch. `Ready` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Fermenting,
    Ready,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Fermenting => "fermenting",
            BatchStatus::Ready => "ready",
        }
    }

    /// Whether a batch in this state may move to `next`.
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Fermenting, _) | (BatchStatus::Ready, BatchStatus::Ready)
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fermenting" => Ok(BatchStatus::Fermenting),
            "ready" => Ok(BatchStatus::Ready),
            other => Err(UnknownVariant::new("batch status", other)),
        }
    }
}

/// Sellable inventory materialized from a ready batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinishedProduct {
    pub id: i64,
    pub batch_id: i64,
    pub volume: Decimal,
    pub available_volume: Decimal,
    pub production_date: NaiveDate,
    pub price_per_liter: Decimal,
}
