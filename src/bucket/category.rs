//! Top-N categorical bucketing with an "Others" tail.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::BucketEntry;

pub const DEFAULT_TOP_N: usize = 15;
pub const GENERAL_LABEL: &str = "General/Various";
pub const OTHERS_LABEL: &str = "Others";

/// Catch-all labels that carry no information on their own.
const STOPLIST: [&str; 5] = ["agnostic", "general", "various", "multiple", "all"];

/// Reduces any number of `(label, count)` pairs to at most `top_n + 1`
/// sorted entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBucketer {
    pub top_n: usize,
    /// Re-map generic labels into [`GENERAL_LABEL`].
    pub use_stoplist: bool,
}

impl Default for CategoryBucketer {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}

impl CategoryBucketer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n, use_stoplist: true }
    }

    pub fn without_stoplist(mut self) -> Self {
        self.use_stoplist = false;
        self
    }

    /// Bucket pre-counted labels. `None` and blank labels are skipped.
    ///
    /// An input label spelled like [`OTHERS_LABEL`] is folded into the
    /// trailing tail entry, so the output holds at most one of it.
    pub fn bucket<I, L>(&self, entries: I) -> Vec<BucketEntry>
    where
        I: IntoIterator<Item = (Option<L>, u64)>,
        L: AsRef<str>,
    {
        let mut counts: IndexMap<String, u64> = IndexMap::new();
        let mut reserved: u64 = 0;
        for (label, count) in entries {
            let Some(label) = label else { continue };
            let Some(name) = self.canonical_label(label.as_ref()) else {
                continue;
            };
            if name.eq_ignore_ascii_case(OTHERS_LABEL) {
                reserved += count;
                continue;
            }
            *counts.entry(name).or_insert(0) += count;
        }

        let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
        // Stable sort keeps first-seen order among equal counts.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let split = ranked.len().min(self.top_n);
        let others: u64 = reserved + ranked[split..].iter().map(|(_, c)| c).sum::<u64>();
        ranked.truncate(split);

        let mut buckets: Vec<BucketEntry> = ranked
            .into_iter()
            .map(|(name, value)| BucketEntry { name, value })
            .collect();
        if others > 0 {
            buckets.push(BucketEntry::new(OTHERS_LABEL, others));
        }
        buckets
    }

    /// Bucket raw per-record labels, counting one per occurrence.
    pub fn bucket_labels<I, L>(&self, labels: I) -> Vec<BucketEntry>
    where
        I: IntoIterator<Item = Option<L>>,
        L: AsRef<str>,
    {
        self.bucket(labels.into_iter().map(|label| (label, 1)))
    }

    fn canonical_label(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if self.use_stoplist && is_generic(trimmed) {
            return Some(GENERAL_LABEL.to_string());
        }
        Some(capitalize_first(trimmed))
    }
}

fn is_generic(label: &str) -> bool {
    label.chars().count() <= 2 || STOPLIST.iter().any(|s| label.eq_ignore_ascii_case(s))
}

fn capitalize_first(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
