use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How parallel relationships between the same node pair are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
    /// Keep every parallel relationship.
    #[default]
    None,
    /// Keep one relationship carrying the sum of the values.
    Sum,
    /// Keep one relationship carrying the smallest value.
    Min,
    /// Keep one relationship carrying the largest value.
    Max,
    /// Keep the first relationship seen, drop the rest.
    Single,
}

impl Aggregation {
    /// Whether duplicates are folded into one relationship.
    pub fn folds(self) -> bool {
        self != Aggregation::None
    }

    /// Folds `value` into the running `current` value.
    pub fn merge(self, current: f64, value: f64) -> f64 {
        match self {
            Aggregation::Sum => current + value,
            Aggregation::Min => current.min(value),
            Aggregation::Max => current.max(value),
            Aggregation::None | Aggregation::Single => current,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Aggregation::None => "NONE",
            Aggregation::Sum => "SUM",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
            Aggregation::Single => "SINGLE",
        }
    }
}

/// Rejects property aggregations that mix `NONE` with folding policies.
///
/// Folding relationships for one property while keeping duplicates for another
/// would misalign the property arrays.
pub fn validate_aggregations(keys: &[String], aggregations: &[Aggregation]) -> Result<()> {
    let folding = aggregations.iter().filter(|aggregation| aggregation.folds()).count();
    if folding == 0 || folding == aggregations.len() {
        return Ok(());
    }
    let described = keys
        .iter()
        .zip(aggregations)
        .map(|(key, aggregation)| format!("{key}: {}", aggregation.name()))
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::AggregationMismatch(format!(
        "NONE cannot be combined with other aggregations ({described})"
    )))
}
