//! Pagination envelope normalization.
//!
//! Two backend response shapes coexist:
//!
//! ```text
//! Shape A: { "companies": [...], "pagination": { "page", "pageSize", "total", "hasMore" } }
//! Shape B: { "companies": [...], "page", "pageSize", "total", "hasMore" }
//! ```
//!
//! Both are resolved once into [`EnvelopeShape`] and converted into a
//! [`PaginationDescriptor`]. Nothing downstream branches on the shape again.
//! Malformed input never panics: missing or out-of-range fields fall back to
//! their defaults and the anomaly is logged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Number of page-number controls shown at once.
pub const MAX_VISIBLE_PAGES: u32 = 5;

/// Keys under which a result envelope may carry its records.
const RECORD_KEYS: [&str; 2] = ["companies", "data"];

const PAGINATION_KEYS: [&str; 4] = ["page", "pageSize", "total", "hasMore"];

/// Canonical pagination state rendered by page controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDescriptor {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub has_more: bool,
}

impl Default for PaginationDescriptor {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            total: 0,
            has_more: false,
        }
    }
}

impl PaginationDescriptor {
    /// `ceil(total / pageSize)`, and 0 when there are no items.
    pub fn total_pages(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size.max(1)))
    }

    /// Visible page-number controls around the current page.
    pub fn window(&self, max_visible: u32) -> PageWindow {
        page_window(u64::from(self.page), self.total_pages(), u64::from(max_visible))
    }
}

/// Inclusive range of page-number controls to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub start: u64,
    pub end: u64,
    /// More pages exist past `end`.
    pub ellipsis: bool,
}

impl PageWindow {
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<u64> {
        self.start..=self.end
    }
}

/// Window `[max(1, current - max_visible/2), min(total_pages, start + max_visible - 1)]`.
pub fn page_window(current: u64, total_pages: u64, max_visible: u64) -> PageWindow {
    let max_visible = max_visible.max(1);
    let start = current.saturating_sub(max_visible / 2).max(1);
    let end = total_pages.min(start + max_visible - 1);
    PageWindow {
        start,
        end,
        ellipsis: end < total_pages,
    }
}

/// The pagination layout detected in a raw envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeShape<'a> {
    /// Shape A: a nested `pagination` object.
    Nested(&'a Map<String, Value>),
    /// Shape B: pagination fields directly on the envelope.
    Flat(&'a Map<String, Value>),
    Unrecognized,
}

impl<'a> EnvelopeShape<'a> {
    pub fn detect(envelope: &'a Value) -> Self {
        let Some(object) = envelope.as_object() else {
            return EnvelopeShape::Unrecognized;
        };

        match object.get("pagination") {
            Some(Value::Object(nested)) if has_pagination_key(nested) => {
                return EnvelopeShape::Nested(nested)
            }
            Some(other) if !other.is_null() => {
                log::warn!("ignoring malformed pagination field: {}", other);
            }
            _ => {}
        }

        if has_pagination_key(object) {
            EnvelopeShape::Flat(object)
        } else {
            EnvelopeShape::Unrecognized
        }
    }

    /// Convert into the canonical descriptor.
    pub fn descriptor(self) -> PaginationDescriptor {
        match self {
            EnvelopeShape::Nested(fields) | EnvelopeShape::Flat(fields) => read_fields(fields),
            EnvelopeShape::Unrecognized => {
                log::warn!("envelope matches no known pagination shape, using defaults");
                PaginationDescriptor::default()
            }
        }
    }
}

/// Normalize either envelope shape into a [`PaginationDescriptor`].
pub fn normalize(envelope: &Value) -> PaginationDescriptor {
    EnvelopeShape::detect(envelope).descriptor()
}

/// Records and pagination of one backend response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultEnvelope {
    pub records: Vec<Value>,
    pub pagination: PaginationDescriptor,
}

impl ResultEnvelope {
    pub fn from_value(envelope: &Value) -> Self {
        let records = RECORD_KEYS
            .iter()
            .find_map(|key| envelope.get(*key).and_then(Value::as_array))
            .cloned()
            .unwrap_or_else(|| {
                log::debug!("envelope carries no record array");
                Vec::new()
            });
        Self {
            records,
            pagination: normalize(envelope),
        }
    }
}

fn has_pagination_key(fields: &Map<String, Value>) -> bool {
    PAGINATION_KEYS.iter().any(|key| fields.contains_key(*key))
}

fn read_fields(fields: &Map<String, Value>) -> PaginationDescriptor {
    let defaults = PaginationDescriptor::default();

    let page = match integer_field(fields, "page") {
        Some(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
        Some(n) => {
            log::warn!("page {} out of range, using {}", n, DEFAULT_PAGE);
            defaults.page
        }
        None => defaults.page,
    };

    let page_size = match integer_field(fields, "pageSize") {
        Some(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
        Some(n) => {
            log::warn!("pageSize {} out of range, using {}", n, DEFAULT_PAGE_SIZE);
            defaults.page_size
        }
        None => defaults.page_size,
    };

    let total = match integer_field(fields, "total") {
        Some(n) if n >= 0 => n as u64,
        Some(n) => {
            log::warn!("negative total {}, using 0", n);
            defaults.total
        }
        None => defaults.total,
    };

    let has_more = match fields.get("hasMore") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
        Some(Value::Null) | None => defaults.has_more,
        Some(other) => {
            log::warn!("unreadable hasMore {}, using false", other);
            defaults.has_more
        }
    };

    PaginationDescriptor { page, page_size, total, has_more }
}

/// Integers, integral floats and numeric strings are accepted.
fn integer_field(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = fields.get(key)?;
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Null => return None,
        _ => None,
    };
    if parsed.is_none() {
        log::warn!("unreadable pagination field {}: {}", key, value);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_flat_shape() {
        let descriptor = normalize(&json!({"total": 47, "pageSize": 20, "page": 2, "hasMore": true}));
        assert_eq!(
            descriptor,
            PaginationDescriptor { page: 2, page_size: 20, total: 47, has_more: true }
        );
        assert_eq!(descriptor.total_pages(), 3);
    }

    #[test]
    fn test_nested_shape_wins_over_flat_fields() {
        let envelope = json!({
            "companies": [],
            "page": 9,
            "pagination": {"page": 3, "pageSize": 10, "total": 100, "hasMore": true}
        });
        assert!(matches!(EnvelopeShape::detect(&envelope), EnvelopeShape::Nested(_)));
        let descriptor = normalize(&envelope);
        assert_eq!(descriptor.page, 3);
        assert_eq!(descriptor.total_pages(), 10);
    }

    #[test]
    fn test_empty_nested_object_falls_through_to_flat_fields() {
        let envelope = json!({"pagination": {}, "total": 47, "page": 2, "pageSize": 20, "hasMore": true});
        assert!(matches!(EnvelopeShape::detect(&envelope), EnvelopeShape::Flat(_)));
        assert_eq!(
            normalize(&envelope),
            PaginationDescriptor { page: 2, page_size: 20, total: 47, has_more: true }
        );

        let unrelated = json!({"pagination": {"cursor": "abc"}, "total": 5});
        assert_eq!(normalize(&unrelated).total, 5);
    }

    #[test]
    fn test_both_shapes_render_identically() {
        let a = json!({"companies": [], "pagination": {"page": 4, "pageSize": 25, "total": 310, "hasMore": true}});
        let b = json!({"companies": [], "page": 4, "pageSize": 25, "total": 310, "hasMore": true});
        assert_eq!(normalize(&a), normalize(&b));
    }

    #[test]
    fn test_defaults_for_missing_and_malformed() {
        assert_eq!(normalize(&json!({"companies": []})), PaginationDescriptor::default());
        assert_eq!(normalize(&json!([1, 2, 3])), PaginationDescriptor::default());
        assert_eq!(normalize(&json!(null)), PaginationDescriptor::default());

        // Non-object pagination falls through to the flat fields.
        let descriptor = normalize(&json!({"pagination": "oops", "total": 5}));
        assert_eq!(descriptor.total, 5);
        assert_eq!(descriptor.page, DEFAULT_PAGE);

        let descriptor = normalize(&json!({"page": 0, "pageSize": -3, "total": "abc", "hasMore": 7}));
        assert_eq!(descriptor, PaginationDescriptor::default());
    }

    #[test]
    fn test_lenient_numbers() {
        let descriptor = normalize(&json!({"page": "2", "pageSize": 20.0, "total": 41}));
        assert_eq!(descriptor.page, 2);
        assert_eq!(descriptor.page_size, 20);
        assert_eq!(descriptor.total_pages(), 3);
    }

    #[test]
    fn test_total_pages_law() {
        for total in 0..200u64 {
            for page_size in 1..30u32 {
                let d = PaginationDescriptor { page: 1, page_size, total, has_more: false };
                let expected = if total == 0 {
                    0
                } else {
                    (total as f64 / page_size as f64).ceil() as u64
                };
                assert_eq!(d.total_pages(), expected, "total={} page_size={}", total, page_size);
            }
        }
    }

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(1, 10, 5), PageWindow { start: 1, end: 5, ellipsis: true });
        assert_eq!(page_window(6, 10, 5), PageWindow { start: 4, end: 8, ellipsis: true });
        assert_eq!(page_window(10, 10, 5), PageWindow { start: 8, end: 10, ellipsis: false });
        assert_eq!(page_window(2, 3, 5), PageWindow { start: 1, end: 3, ellipsis: false });
        assert_eq!(page_window(3, 3, 5).pages().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_page_window_without_pages_is_empty() {
        let window = PaginationDescriptor::default().window(MAX_VISIBLE_PAGES);
        assert!(window.is_empty());
        assert!(!window.ellipsis);
    }

    #[test]
    fn test_result_envelope_records() {
        let envelope = ResultEnvelope::from_value(&json!({
            "companies": [{"name": "Acme"}, {"name": "Globex"}],
            "total": 2
        }));
        assert_eq!(envelope.records.len(), 2);
        assert_eq!(envelope.pagination.total, 2);

        let envelope = ResultEnvelope::from_value(&json!({"data": [{"name": "Initech"}]}));
        assert_eq!(envelope.records.len(), 1);
    }
}
