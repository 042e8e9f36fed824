//! Structured company search: attribute conditions, query-mode dispatch,
//! pagination normalization and chart bucketing for the dashboard backend.

pub mod bucket;
pub mod combiner;
pub mod condition;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pagination;
pub mod repl;
pub mod sql_compiler;

pub use bucket::{BucketEntry, CategoryBucketer, NumericRangeBucketer, RangeSet};
pub use combiner::{combine, AI_SEARCH_ATTRIBUTE};
pub use condition::{Condition, ConditionSet, FilterKind, FilterSchema, FilterValue, Operator, Sign};
pub use config::DashboardConfig;
pub use dispatcher::{Dispatcher, QueryMode, ResultCache, SearchBackend, SearchOutcome, SearchRequest};
pub use error::{QueryError, QueryResult};
pub use pagination::{normalize, PaginationDescriptor};
