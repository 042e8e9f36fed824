//! Attribute conditions: the structured filter language sent to the search backend.
//!
//! A [`ConditionSet`] is an ordered list of [`Condition`]s. Each condition
//! carries its own [`Operator`] describing how it combines with the conditions
//! around it, so a single set may mix AND and OR. The field is kept and
//! transmitted verbatim; see `sql_compiler` for the one place it is evaluated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::bucket::numeric::parse_amount;

/// Value of a UI filter that means "no filter applied".
pub const NO_FILTER: &str = "all";

/// How a condition combines with the other conditions of its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Or,
    And,
}

/// Comparison applied between the attribute and each of the condition's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Sign {
    #[default]
    Equals,
    ExactEquals,
    Greater,
    Lower,
    NotEquals,
}

/// One filter clause. Multiple `values` are an implicit OR within the clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub operator: Operator,
    pub sign: Sign,
    pub values: Vec<String>,
}

impl Condition {
    /// Build a condition, trimming the attribute and every value.
    ///
    /// Returns `None` for a void condition: empty attribute, or no values left
    /// after trimming.
    pub fn new<A, I, V>(attribute: A, operator: Operator, sign: Sign, values: I) -> Option<Self>
    where
        A: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let attribute = attribute.into().trim().to_string();
        let values: Vec<String> = values
            .into_iter()
            .map(|v| v.into().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        let condition = Self { attribute, operator, sign, values };
        if condition.is_void() {
            log::debug!("dropping void condition on '{}'", condition.attribute);
            None
        } else {
            Some(condition)
        }
    }

    /// A void condition must never be transmitted upstream.
    pub fn is_void(&self) -> bool {
        self.attribute.trim().is_empty() || self.values.iter().all(|v| v.trim().is_empty())
    }
}

/// Ordered sequence of conditions. Order is significant and survives
/// serialization; void conditions never enter the set, deserialized or not.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Condition>", into = "Vec<Condition>")]
pub struct ConditionSet(Vec<Condition>);

impl From<Vec<Condition>> for ConditionSet {
    fn from(conditions: Vec<Condition>) -> Self {
        conditions.into_iter().collect()
    }
}

impl From<ConditionSet> for Vec<Condition> {
    fn from(set: ConditionSet) -> Self {
        set.0
    }
}

impl ConditionSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a condition, ignoring it if void.
    pub fn push(&mut self, condition: Condition) {
        if !condition.is_void() {
            self.0.push(condition);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Condition] {
        &self.0
    }

    pub fn last(&self) -> Option<&Condition> {
        self.0.last()
    }

    /// Build a condition set from UI filter selections, in selection order.
    ///
    /// Filters whose value is `"all"` or empty are skipped. Keys the schema
    /// does not know become a plain `equals` condition on an attribute of the
    /// same name.
    pub fn from_filters<I, K>(selections: I, schema: &FilterSchema) -> Self
    where
        I: IntoIterator<Item = (K, FilterValue)>,
        K: AsRef<str>,
    {
        let mut set = Self::new();
        for (key, value) in selections {
            let key = key.as_ref();
            let values = value.selected();
            if values.is_empty() {
                continue;
            }

            match schema.kind_for(key) {
                FilterKind::Match { attribute, sign } => {
                    if let Some(c) = Condition::new(attribute, Operator::And, sign, values) {
                        set.push(c);
                    }
                }
                FilterKind::Range { attribute } => {
                    // A range filter carries exactly one selected bucket, e.g. "10M-50M".
                    if values.len() > 1 {
                        log::debug!(
                            "range filter '{}' takes one bucket, ignoring {:?}",
                            key,
                            &values[1..]
                        );
                    }
                    match parse_range_bounds(&values[0]) {
                        Some((lower, upper)) => {
                            if let Some(c) =
                                Condition::new(attribute.clone(), Operator::And, Sign::Greater, [lower])
                            {
                                set.push(c);
                            }
                            if let Some(upper) = upper {
                                if let Some(c) =
                                    Condition::new(attribute, Operator::And, Sign::Lower, [upper])
                                {
                                    set.push(c);
                                }
                            }
                        }
                        None => log::debug!("dropping unparseable range '{}' for '{}'", values[0], key),
                    }
                }
            }
        }
        set
    }
}

impl FromIterator<Condition> for ConditionSet {
    fn from_iter<T: IntoIterator<Item = Condition>>(iter: T) -> Self {
        let mut set = Self::new();
        for condition in iter {
            set.push(condition);
        }
        set
    }
}

impl IntoIterator for ConditionSet {
    type Item = Condition;
    type IntoIter = std::vec::IntoIter<Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConditionSet {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Selected value(s) of one UI filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    /// Trimmed values with the "no filter" sentinels removed.
    pub fn selected(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            FilterValue::One(v) => vec![v.as_str()],
            FilterValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(NO_FILTER))
            .map(str::to_string)
            .collect()
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::One(value.to_string())
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        FilterValue::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// How a UI filter key translates into conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FilterKind {
    /// One condition with the given sign.
    Match {
        attribute: String,
        #[serde(default)]
        sign: Sign,
    },
    /// A `greater`/`lower` pair on the same attribute.
    Range { attribute: String },
}

/// Maps UI filter keys to the kind of condition they produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSchema {
    pub filters: HashMap<String, FilterKind>,
}

impl FilterSchema {
    pub fn insert(&mut self, key: impl Into<String>, kind: FilterKind) {
        self.filters.insert(key.into(), kind);
    }

    /// Kind configured for `key`, or a plain `equals` match on `key` itself.
    pub fn kind_for(&self, key: &str) -> FilterKind {
        self.filters.get(key).cloned().unwrap_or_else(|| FilterKind::Match {
            attribute: key.to_string(),
            sign: Sign::Equals,
        })
    }
}

/// Split a range selection into its bounds.
///
/// `"10-50"` gives `("10", Some("50"))`, `"100+"` gives `("100", None)`.
/// Both bounds must parse as amounts.
fn parse_range_bounds(value: &str) -> Option<(String, Option<String>)> {
    let value = value.trim();
    if let Some(lower) = value.strip_suffix('+') {
        let lower = lower.trim();
        parse_amount(lower)?;
        return Some((lower.to_string(), None));
    }

    // Skip the first character so a leading minus is not taken as the separator.
    let split = value.char_indices().skip(1).find(|&(_, c)| c == '-').map(|(i, _)| i)?;
    let (lower, upper) = (value[..split].trim(), value[split + 1..].trim());
    parse_amount(lower)?;
    parse_amount(upper)?;
    Some((lower.to_string(), Some(upper.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema() -> FilterSchema {
        let mut schema = FilterSchema::default();
        schema.insert(
            "funding",
            FilterKind::Range { attribute: "total_funding".to_string() },
        );
        schema.insert(
            "country",
            FilterKind::Match { attribute: "hq_country".to_string(), sign: Sign::ExactEquals },
        );
        schema
    }

    #[test]
    fn test_condition_new_trims_and_rejects_void() {
        let c = Condition::new(" industry ", Operator::Or, Sign::Equals, ["  SaaS ", " "]).unwrap();
        assert_eq!(c.attribute, "industry");
        assert_eq!(c.values, vec!["SaaS".to_string()]);

        assert!(Condition::new("industry", Operator::Or, Sign::Equals, ["", "  "]).is_none());
        assert!(Condition::new("  ", Operator::Or, Sign::Equals, ["SaaS"]).is_none());
    }

    #[test]
    fn test_from_filters_skips_all_and_empty() {
        let selections = vec![
            ("industry", FilterValue::from("all")),
            ("stage", FilterValue::from("")),
            ("sector", FilterValue::from("Fintech")),
            ("tags", FilterValue::from(vec!["all", " "])),
        ];
        let set = ConditionSet::from_filters(selections, &FilterSchema::default());

        assert_eq!(set.len(), 1);
        let c = &set.as_slice()[0];
        assert_eq!(c.attribute, "sector");
        assert_eq!(c.sign, Sign::Equals);
        assert!(set.iter().all(|c| c.values.iter().all(|v| v != "all" && !v.is_empty())));
    }

    #[test]
    fn test_from_filters_preserves_selection_order() {
        let selections = vec![
            ("b_key", FilterValue::from("2")),
            ("a_key", FilterValue::from("1")),
            ("c_key", FilterValue::from(vec!["x", "y"])),
        ];
        let set = ConditionSet::from_filters(selections, &FilterSchema::default());
        let attrs: Vec<_> = set.iter().map(|c| c.attribute.as_str()).collect();
        assert_eq!(attrs, vec!["b_key", "a_key", "c_key"]);
        assert_eq!(set.as_slice()[2].values, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_schema_match_uses_configured_sign() {
        let set = ConditionSet::from_filters(vec![("country", FilterValue::from("Germany"))], &schema());
        assert_eq!(
            set.as_slice()[0],
            Condition {
                attribute: "hq_country".to_string(),
                operator: Operator::And,
                sign: Sign::ExactEquals,
                values: vec!["Germany".to_string()],
            }
        );
    }

    #[test]
    fn test_range_filter_produces_greater_lower_pair() {
        let set = ConditionSet::from_filters(vec![("funding", FilterValue::from("10M-50M"))], &schema());
        assert_eq!(set.len(), 2);
        let (lo, hi) = (&set.as_slice()[0], &set.as_slice()[1]);
        assert_eq!(lo.attribute, "total_funding");
        assert_eq!(hi.attribute, "total_funding");
        assert_eq!((lo.sign, lo.values[0].as_str()), (Sign::Greater, "10M"));
        assert_eq!((hi.sign, hi.values[0].as_str()), (Sign::Lower, "50M"));
    }

    #[test]
    fn test_range_filter_uses_first_bucket_only() {
        let set = ConditionSet::from_filters(
            vec![("funding", FilterValue::from(vec!["10M-50M", "1B+"]))],
            &schema(),
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice()[0].values, vec!["10M".to_string()]);
        assert_eq!(set.as_slice()[1].values, vec!["50M".to_string()]);
    }

    #[test]
    fn test_deserialize_drops_void_conditions() {
        let set: ConditionSet = serde_json::from_str(
            r#"[
                {"attribute": "industry", "operator": "and", "sign": "equals", "values": []},
                {"attribute": "country", "operator": "and", "sign": "exactEquals", "values": ["UK"]},
                {"attribute": "", "operator": "or", "sign": "equals", "values": ["x"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].attribute, "country");
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            serde_json::json!([{"attribute": "country", "operator": "and", "sign": "exactEquals", "values": ["UK"]}])
        );
    }

    #[test]
    fn test_open_ended_range_and_garbage_range() {
        let set = ConditionSet::from_filters(vec![("funding", FilterValue::from("1B+"))], &schema());
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].sign, Sign::Greater);

        let set = ConditionSet::from_filters(vec![("funding", FilterValue::from("lots"))], &schema());
        assert!(set.is_empty());
    }

    #[test]
    fn test_serialized_field_layout() {
        let c = Condition::new("industry", Operator::Or, Sign::ExactEquals, ["SaaS"]).unwrap();
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "attribute": "industry",
                "operator": "or",
                "sign": "exactEquals",
                "values": ["SaaS"]
            })
        );
    }

    #[test]
    fn test_push_ignores_void_condition() {
        let mut set = ConditionSet::new();
        set.push(Condition {
            attribute: "industry".to_string(),
            operator: Operator::And,
            sign: Sign::Equals,
            values: vec![],
        });
        assert!(set.is_empty());
    }
}
