//! Numeric range bucketing of currency-like strings.
//!
//! Raw amounts arrive as `"$1.5B"`, `"250K"`, `"10,000,000"`, `"75"` or `"-"`.
//! [`parse_amount`] is the single place such strings are interpreted; amounts
//! are normalized to millions, the unit the ranges are expressed in.

use serde::{Deserialize, Serialize};

use super::BucketEntry;
use crate::error::{QueryError, QueryResult};

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// Suffixes and their factor into millions, longest first.
const MAGNITUDES: [(&str, f64); 6] = [
    ("thousand", 0.001),
    ("billion", 1000.0),
    ("million", 1.0),
    ("k", 0.001),
    ("b", 1000.0),
    ("m", 1.0),
];

/// Parse a currency-like amount into millions.
///
/// Returns `None` for empty input, the `"-"` placeholder, or anything that
/// is not a finite number once symbols and suffixes are removed.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        return None;
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let (number, factor) = MAGNITUDES
        .iter()
        .find_map(|(suffix, factor)| cleaned.strip_suffix(suffix).map(|n| (n, *factor)))
        .unwrap_or((cleaned.as_str(), 1.0));

    number
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n * factor)
}

/// One labelled interval `[lower, upper)`. `upper = None` is open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub label: String,
    pub lower: f64,
    #[serde(default)]
    pub upper: Option<f64>,
}

impl Range {
    pub fn new(label: impl Into<String>, lower: f64, upper: Option<f64>) -> Self {
        Self { label: label.into(), lower, upper }
    }

    fn contains(&self, amount: f64) -> bool {
        amount >= self.lower && self.upper.map_or(true, |upper| amount < upper)
    }
}

/// Ordered, contiguous ranges ending in an open-ended range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Range>", into = "Vec<Range>")]
pub struct RangeSet {
    ranges: Vec<Range>,
}

impl RangeSet {
    pub fn new(ranges: Vec<Range>) -> QueryResult<Self> {
        let Some(last) = ranges.last() else {
            return Err(QueryError::InvalidRanges("no ranges given".to_string()));
        };
        if last.upper.is_some() {
            return Err(QueryError::InvalidRanges(format!(
                "last range '{}' must be open-ended",
                last.label
            )));
        }

        for range in &ranges {
            if !range.lower.is_finite() {
                return Err(QueryError::InvalidRanges(format!(
                    "range '{}' has a non-finite lower bound",
                    range.label
                )));
            }
            if let Some(upper) = range.upper {
                if !(upper > range.lower) {
                    return Err(QueryError::InvalidRanges(format!(
                        "range '{}' is empty: [{}, {})",
                        range.label, range.lower, upper
                    )));
                }
            }
        }

        for pair in ranges.windows(2) {
            match pair[0].upper {
                Some(upper) if upper == pair[1].lower => {}
                Some(upper) => {
                    return Err(QueryError::InvalidRanges(format!(
                        "range '{}' ends at {} but '{}' starts at {}",
                        pair[0].label, upper, pair[1].label, pair[1].lower
                    )))
                }
                None => {
                    return Err(QueryError::InvalidRanges(format!(
                        "only the last range may be open-ended, '{}' is not last",
                        pair[0].label
                    )))
                }
            }
        }

        Ok(Self { ranges })
    }

    /// Funding ranges in millions.
    pub fn funding_millions() -> Self {
        Self {
            ranges: vec![
                Range::new("<$1M", 0.0, Some(1.0)),
                Range::new("$1M-$10M", 1.0, Some(10.0)),
                Range::new("$10M-$50M", 10.0, Some(50.0)),
                Range::new("$50M-$100M", 50.0, Some(100.0)),
                Range::new("$100M-$500M", 100.0, Some(500.0)),
                Range::new("$500M-$1B", 500.0, Some(1000.0)),
                Range::new("$1B+", 1000.0, None),
            ],
        }
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Index of the range holding `amount`. Unknown or too-small amounts
    /// belong to the lowest range.
    pub fn index_of(&self, amount: Option<f64>) -> usize {
        amount
            .and_then(|a| self.ranges.iter().position(|r| r.contains(a)))
            .unwrap_or(0)
    }
}

impl TryFrom<Vec<Range>> for RangeSet {
    type Error = QueryError;

    fn try_from(ranges: Vec<Range>) -> Result<Self, Self::Error> {
        Self::new(ranges)
    }
}

impl From<RangeSet> for Vec<Range> {
    fn from(set: RangeSet) -> Self {
        set.ranges
    }
}

/// Counts raw amounts into a fixed set of ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericRangeBucketer {
    ranges: RangeSet,
}

impl Default for NumericRangeBucketer {
    fn default() -> Self {
        Self::new(RangeSet::funding_millions())
    }
}

impl NumericRangeBucketer {
    pub fn new(ranges: RangeSet) -> Self {
        Self { ranges }
    }

    pub fn ranges(&self) -> &RangeSet {
        &self.ranges
    }

    /// The range a single raw value falls into.
    pub fn assign(&self, raw: Option<&str>) -> &Range {
        let amount = raw.and_then(parse_amount);
        if amount.is_none() {
            log::trace!("unparseable amount {:?}, counting in lowest range", raw);
        }
        &self.ranges.ranges[self.ranges.index_of(amount)]
    }

    /// One entry per range, in range order, zero counts included.
    pub fn bucket<I, S>(&self, raw_values: I) -> Vec<BucketEntry>
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let mut counts = vec![0u64; self.ranges.ranges.len()];
        for raw in raw_values {
            let amount = raw.as_ref().and_then(|s| parse_amount(s.as_ref()));
            counts[self.ranges.index_of(amount)] += 1;
        }

        self.ranges
            .ranges
            .iter()
            .zip(counts)
            .map(|(range, value)| BucketEntry::new(range.label.clone(), value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::total;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1.5B"), Some(1500.0));
        assert_eq!(parse_amount("250K"), Some(0.25));
        assert_eq!(parse_amount("75"), Some(75.0));
        assert_eq!(parse_amount("10m"), Some(10.0));
        assert_eq!(parse_amount(" € 2,500 "), Some(2500.0));
        assert_eq!(parse_amount("$3 billion"), Some(3000.0));
        assert_eq!(parse_amount("-"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("undisclosed"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn test_every_input_assigned_exactly_once() {
        let bucketer = NumericRangeBucketer::default();
        let raw = vec![None, Some("-"), Some("$1.5B"), Some("250K"), Some("75")];
        let result = bucketer.bucket(raw.clone());

        assert_eq!(result.len(), bucketer.ranges().ranges().len());
        assert_eq!(total(&result), raw.len() as u64);

        let by_name = |name: &str| result.iter().find(|e| e.name == name).unwrap().value;
        // null, "-" and 250K (0.25M) all land in the lowest range.
        assert_eq!(by_name("<$1M"), 3);
        assert_eq!(by_name("$50M-$100M"), 1);
        assert_eq!(by_name("$1B+"), 1);
    }

    #[test]
    fn test_bounds_are_lower_inclusive() {
        let bucketer = NumericRangeBucketer::default();
        assert_eq!(bucketer.assign(Some("10M")).label, "$10M-$50M");
        assert_eq!(bucketer.assign(Some("9.99M")).label, "$1M-$10M");
        assert_eq!(bucketer.assign(Some("1B")).label, "$1B+");
        assert_eq!(bucketer.assign(Some("-5")).label, "<$1M");
    }

    #[test]
    fn test_range_set_validation() {
        assert!(RangeSet::new(vec![]).is_err());
        assert!(RangeSet::new(vec![Range::new("a", 0.0, Some(1.0))]).is_err());
        assert!(RangeSet::new(vec![
            Range::new("a", 0.0, Some(1.0)),
            Range::new("b", 2.0, None),
        ])
        .is_err());
        assert!(RangeSet::new(vec![
            Range::new("a", 0.0, None),
            Range::new("b", 1.0, None),
        ])
        .is_err());
        assert!(RangeSet::new(vec![
            Range::new("a", 5.0, Some(5.0)),
            Range::new("b", 5.0, None),
        ])
        .is_err());

        let set = RangeSet::new(vec![
            Range::new("small", 0.0, Some(100.0)),
            Range::new("large", 100.0, None),
        ])
        .unwrap();
        assert_eq!(set.index_of(Some(100.0)), 1);
        assert_eq!(set.index_of(None), 0);
    }

    #[test]
    fn test_range_set_deserialization_validates() {
        let ok: RangeSet = serde_json::from_str(
            r#"[{"label": "low", "lower": 0, "upper": 10}, {"label": "high", "lower": 10}]"#,
        )
        .unwrap();
        assert_eq!(ok.ranges().len(), 2);

        let gapped = serde_json::from_str::<RangeSet>(
            r#"[{"label": "low", "lower": 0, "upper": 10}, {"label": "high", "lower": 20}]"#,
        );
        assert!(gapped.is_err());
    }
}
