//! SQL compiler that turns a condition set into PostgreSQL queries using sea-query.
//!
//! Conditions fold left to right: every condition after the first joins the
//! expression built so far with its own `operator`. The first condition's
//! operator has no left operand and is ignored. `ai.search` conditions are not
//! compiled; their prompt is handed back for the semantic search capability.

use sea_query::{
    Asterisk, Expr, Func, Iden, LikeExpr, PostgresQueryBuilder, SelectStatement, SimpleExpr, Value,
    Values,
};
use std::collections::HashMap;

use crate::bucket::numeric::parse_amount;
use crate::combiner::split_prompt;
use crate::condition::{Condition, ConditionSet, Operator, Sign};
use crate::config::DashboardConfig;
use crate::error::{QueryError, QueryResult};

/// Configuration for SQL optimization
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// Minimum number of exact values before an OR chain becomes an IN clause
    pub max_or_conditions_for_in: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_or_conditions_for_in: 5,
        }
    }
}

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
}

/// Result of SQL compilation
#[derive(Debug, Clone)]
pub struct CompileResult {
    /// SQL with values inlined, for display and logging.
    pub sql: String,
    /// Parameterised SQL and its bound values, for execution.
    pub statement: String,
    pub values: Values,
    pub optimizations: Vec<Optimization>,
    /// Free text carried by `ai.search` conditions.
    pub semantic_prompt: Option<String>,
}

/// A page of results plus the matching total count query.
#[derive(Debug, Clone)]
pub struct PagedQuery {
    pub select: CompileResult,
    pub count_sql: String,
}

/// SQL Compiler that converts condition sets to SQL queries
pub struct SqlCompiler {
    config: OptimizationConfig,
    /// Maps condition attributes to column names
    column_mapping: HashMap<String, String>,
    /// Multiplier from millions to each column's stored unit
    column_scale: HashMap<String, f64>,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self {
            config: OptimizationConfig::default(),
            column_mapping: HashMap::new(),
            column_scale: HashMap::new(),
        }
    }

    pub fn with_config(config: OptimizationConfig) -> Self {
        Self {
            config,
            column_mapping: HashMap::new(),
            column_scale: HashMap::new(),
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            config: OptimizationConfig::default(),
            column_mapping: config.column_mapping.clone(),
            column_scale: config.column_scale.clone(),
        }
    }

    /// Set column mapping for attribute names
    pub fn set_column_mapping(&mut self, mapping: HashMap<String, String>) {
        self.column_mapping = mapping;
    }

    /// Set the per-column multiplier applied to `greater`/`lower` amounts
    pub fn set_column_scale(&mut self, scale: HashMap<String, f64>) {
        self.column_scale = scale;
    }

    /// Get the actual column name for an attribute
    fn get_column_name(&self, attribute: &str) -> String {
        self.column_mapping
            .get(attribute)
            .cloned()
            .unwrap_or_else(|| attribute.to_string())
    }

    /// Compile a condition set into a `SELECT` over `table`
    pub fn compile(&self, conditions: &ConditionSet, table: &str) -> QueryResult<CompileResult> {
        let (select, optimizations, semantic_prompt) = self.build_select(conditions, table)?;
        Ok(Self::finish(&select, optimizations, semantic_prompt))
    }

    /// Compile one page of results and the count query sharing its filter
    pub fn compile_page(
        &self,
        conditions: &ConditionSet,
        table: &str,
        page: u32,
        page_size: u32,
    ) -> QueryResult<PagedQuery> {
        if page == 0 || page_size == 0 {
            return Err(QueryError::Compile(format!(
                "page and page size must be positive, got page {} size {}",
                page, page_size
            )));
        }

        let (mut select, optimizations, semantic_prompt) = self.build_select(conditions, table)?;

        let mut count = SelectStatement::new();
        count
            .expr(Func::count(Expr::col(Asterisk)))
            .from(TableName(table.to_string()));
        if let Some(filter) = self.where_clause(conditions)?.0 {
            count.and_where(filter);
        }

        select
            .limit(u64::from(page_size))
            .offset(u64::from(page - 1) * u64::from(page_size));

        Ok(PagedQuery {
            select: Self::finish(&select, optimizations, semantic_prompt),
            count_sql: count.to_string(PostgresQueryBuilder),
        })
    }

    fn build_select(
        &self,
        conditions: &ConditionSet,
        table: &str,
    ) -> QueryResult<(SelectStatement, Vec<Optimization>, Option<String>)> {
        if table.trim().is_empty() {
            return Err(QueryError::Compile("table name is empty".to_string()));
        }

        let (filter, optimizations, semantic_prompt) = self.where_clause(conditions)?;

        let mut select = SelectStatement::new();
        select.column(Asterisk).from(TableName(table.to_string()));
        if let Some(filter) = filter {
            select.and_where(filter);
        }
        Ok((select, optimizations, semantic_prompt))
    }

    fn finish(
        select: &SelectStatement,
        optimizations: Vec<Optimization>,
        semantic_prompt: Option<String>,
    ) -> CompileResult {
        let (statement, values) = select.build(PostgresQueryBuilder);
        let sql = select.to_string(PostgresQueryBuilder);
        log::debug!("compiled SQL: {}", sql);
        CompileResult {
            sql,
            statement,
            values,
            optimizations,
            semantic_prompt,
        }
    }

    /// Fold structured conditions into one `WHERE` expression
    fn where_clause(
        &self,
        conditions: &ConditionSet,
    ) -> QueryResult<(Option<SimpleExpr>, Vec<Optimization>, Option<String>)> {
        let (structured, semantic_prompt) = split_prompt(conditions);
        let mut optimizations = Vec::new();
        let mut combined: Option<SimpleExpr> = None;

        for condition in &structured {
            let (expr, mut opts) = self.compile_condition(condition)?;
            optimizations.append(&mut opts);
            combined = Some(match combined {
                None => expr,
                Some(acc) => match condition.operator {
                    Operator::And => acc.and(expr),
                    Operator::Or => acc.or(expr),
                },
            });
        }

        Ok((combined, optimizations, semantic_prompt))
    }

    /// Compile a single condition; its values are ORed together
    fn compile_condition(&self, condition: &Condition) -> QueryResult<(SimpleExpr, Vec<Optimization>)> {
        if condition.is_void() {
            return Err(QueryError::Compile(format!(
                "condition on '{}' has no values",
                condition.attribute
            )));
        }

        let column = self.get_column_name(&condition.attribute);
        let scale = self.column_scale.get(&column).copied().unwrap_or(1.0);
        let values = &condition.values;

        match condition.sign {
            Sign::ExactEquals if values.len() >= self.config.max_or_conditions_for_in => {
                let in_values: Vec<Value> = values.iter().map(|v| text_value(v)).collect();
                let optimization = Optimization::OrToIn {
                    field: column.clone(),
                    value_count: in_values.len(),
                };
                Ok((Expr::col(ColumnName(column)).is_in(in_values), vec![optimization]))
            }
            Sign::NotEquals if values.len() > 1 => {
                let in_values: Vec<Value> = values.iter().map(|v| text_value(v)).collect();
                Ok((Expr::col(ColumnName(column)).is_not_in(in_values), Vec::new()))
            }
            sign => {
                let expr = values
                    .iter()
                    .map(|v| compile_comparison(&column, sign, v, scale))
                    .reduce(|acc, expr| acc.or(expr))
                    .ok_or_else(|| QueryError::Compile("empty value list".to_string()))?;
                Ok((expr, Vec::new()))
            }
        }
    }
}

/// Compile a comparison between a column and one value
fn compile_comparison(column: &str, sign: Sign, value: &str, scale: f64) -> SimpleExpr {
    let col = Expr::col(ColumnName(column.to_string()));
    match sign {
        Sign::Equals => {
            let pattern = format!("%{}%", escape_like(&value.to_lowercase()));
            Expr::expr(Func::lower(Expr::col(ColumnName(column.to_string()))))
                .like(LikeExpr::new(pattern).escape('\\'))
        }
        Sign::ExactEquals => col.eq(text_value(value)),
        Sign::NotEquals => col.ne(text_value(value)),
        Sign::Greater => col.gt(numeric_value(value, scale)),
        Sign::Lower => col.lt(numeric_value(value, scale)),
    }
}

fn text_value(value: &str) -> Value {
    Value::String(Some(Box::new(value.to_string())))
}

/// Amounts parse in millions and bind as doubles in the column's unit;
/// anything else stays text
fn numeric_value(value: &str, scale: f64) -> Value {
    match parse_amount(value) {
        Some(amount) => Value::Double(Some(amount * scale)),
        None => text_value(value),
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
