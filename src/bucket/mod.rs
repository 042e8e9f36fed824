//! Chart-ready bucketing of open-ended result sets.

pub mod category;
pub mod numeric;

use serde::{Deserialize, Serialize};

pub use category::CategoryBucketer;
pub use numeric::{NumericRangeBucketer, Range, RangeSet};

/// A named, counted slot of a chart series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
    pub name: String,
    pub value: u64,
}

impl BucketEntry {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self { name: name.into(), value }
    }
}

/// Sum of all bucket values.
pub fn total(entries: &[BucketEntry]) -> u64 {
    entries.iter().map(|e| e.value).sum()
}
