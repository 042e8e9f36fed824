//! Interactive session behind the `query_dispatcher` binary.
//!
//! Each input line is one [`Command`]. The session keeps the UI filter
//! selections in insertion order and rebuilds an immutable
//! [`SearchRequest`] whenever they change.

use anyhow::{anyhow, bail, Context};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::bucket::{BucketEntry, CategoryBucketer, NumericRangeBucketer};
use crate::condition::{ConditionSet, FilterValue};
use crate::config::DashboardConfig;
use crate::dispatcher::{plan, SearchRequest};
use crate::pagination::{ResultEnvelope, MAX_VISIBLE_PAGES};
use crate::sql_compiler::SqlCompiler;

pub const HELP: &str = "\
commands:
  filter <key>=<value>[,<value>...]   select a filter value (\"all\" clears it)
  unfilter <key>                      remove a filter
  prompt [text]                       set or clear the free-text prompt
  page <n>                            request another page
  plan                                show the query mode and request parameters
  sql                                 show the compiled SQL for the current page
  load <file>                         normalize a JSON result envelope
  categories <file> <field>           bucket a categorical field of an envelope
  ranges <file> <field>               bucket a funding-like field of an envelope
  help                                show this text
  quit                                leave";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Filter { key: String, value: FilterValue },
    Unfilter(String),
    Prompt(String),
    Page(u32),
    Plan,
    Sql,
    Load(PathBuf),
    Categories(PathBuf, String),
    Ranges(PathBuf, String),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match word.to_ascii_lowercase().as_str() {
            "filter" => {
                let (key, value) = rest
                    .split_once('=')
                    .ok_or_else(|| anyhow!("usage: filter <key>=<value>"))?;
                let value = if value.contains(',') {
                    FilterValue::Many(value.split(',').map(|v| v.trim().to_string()).collect())
                } else {
                    FilterValue::One(value.trim().to_string())
                };
                Command::Filter { key: key.trim().to_string(), value }
            }
            "unfilter" if !rest.is_empty() => Command::Unfilter(rest.to_string()),
            "prompt" => Command::Prompt(rest.to_string()),
            "page" => Command::Page(
                rest.parse()
                    .with_context(|| format!("invalid page number '{}'", rest))?,
            ),
            "plan" => Command::Plan,
            "sql" => Command::Sql,
            "load" if !rest.is_empty() => Command::Load(PathBuf::from(rest)),
            "categories" | "ranges" => {
                let (file, field) = rest
                    .rsplit_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("usage: {} <file> <field>", word))?;
                let (file, field) = (PathBuf::from(file.trim()), field.trim().to_string());
                if word.eq_ignore_ascii_case("categories") {
                    Command::Categories(file, field)
                } else {
                    Command::Ranges(file, field)
                }
            }
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => bail!("unknown command '{}', type 'help'", line),
        };
        Ok(command)
    }
}

pub struct Session {
    config: DashboardConfig,
    compiler: SqlCompiler,
    selections: IndexMap<String, FilterValue>,
    request: SearchRequest,
}

impl Session {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            compiler: SqlCompiler::from_config(&config),
            request: SearchRequest::new(config.page_size),
            selections: IndexMap::new(),
            config,
        }
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Run one command and return its printable output.
    pub fn execute(&mut self, command: Command) -> anyhow::Result<String> {
        match command {
            Command::Filter { key, value } => {
                self.selections.insert(key, value);
                self.rebuild_conditions();
                Ok(self.describe_conditions())
            }
            Command::Unfilter(key) => {
                if self.selections.shift_remove(&key).is_none() {
                    bail!("no filter named '{}'", key);
                }
                self.rebuild_conditions();
                Ok(self.describe_conditions())
            }
            Command::Prompt(text) => {
                self.request = self.request.with_prompt(text);
                Ok(format!("prompt: {:?}", self.request.prompt()))
            }
            Command::Page(page) => {
                self.request = self.request.with_page(page);
                Ok(format!("page: {}", self.request.page()))
            }
            Command::Plan => self.describe_plan(),
            Command::Sql => self.describe_sql(),
            Command::Load(path) => {
                let envelope = ResultEnvelope::from_value(&read_json(&path)?);
                Ok(describe_envelope(&envelope))
            }
            Command::Categories(path, field) => {
                let envelope = ResultEnvelope::from_value(&read_json(&path)?);
                let labels = envelope.records.iter().flat_map(|r| field_labels(r, &field));
                let buckets = CategoryBucketer::new(self.config.top_n).bucket_labels(labels);
                Ok(describe_buckets(&buckets))
            }
            Command::Ranges(path, field) => {
                let envelope = ResultEnvelope::from_value(&read_json(&path)?);
                let amounts = envelope.records.iter().map(|r| field_text(r, &field));
                let buckets = NumericRangeBucketer::new(self.config.funding_ranges.clone()).bucket(amounts);
                Ok(describe_buckets(&buckets))
            }
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
        }
    }

    fn rebuild_conditions(&mut self) {
        let selections = self.selections.iter().map(|(k, v)| (k.as_str(), v.clone()));
        let conditions = ConditionSet::from_filters(selections, &self.config.filters);
        self.request = self.request.with_conditions(conditions);
    }

    fn describe_conditions(&self) -> String {
        let conditions = self.request.conditions();
        if conditions.is_empty() {
            return "no active conditions".to_string();
        }
        let mut out = String::new();
        for (i, c) in conditions.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} {:?} {:?} {:?}",
                i + 1,
                c.attribute,
                c.operator,
                c.sign,
                c.values
            );
        }
        out.trim_end().to_string()
    }

    fn describe_plan(&self) -> anyhow::Result<String> {
        let Some(params) = plan(&self.request)? else {
            return Ok("mode: Idle (no active search)".to_string());
        };
        let mut out = format!("mode: {:?}", params.mode);
        for (name, value) in params.to_pairs() {
            let _ = write!(out, "\n  {}={}", name, value);
        }
        Ok(out)
    }

    fn describe_sql(&self) -> anyhow::Result<String> {
        let paged = self.compiler.compile_page(
            &combined_conditions(&self.request),
            &self.config.table,
            self.request.page(),
            self.request.page_size(),
        )?;
        let mut out = format!("{}\n{}", paged.select.sql, paged.count_sql);
        if let Some(prompt) = paged.select.semantic_prompt {
            let _ = write!(out, "\nsemantic prompt: {}", prompt);
        }
        for optimization in &paged.select.optimizations {
            let _ = write!(out, "\noptimization: {:?}", optimization);
        }
        Ok(out)
    }
}

fn combined_conditions(request: &SearchRequest) -> ConditionSet {
    crate::combiner::combine(request.conditions(), request.prompt())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Labels of one record's field; arrays contribute one label per element.
fn field_labels(record: &Value, field: &str) -> Vec<Option<String>> {
    match record.get(field) {
        Some(Value::Array(items)) => items.iter().map(scalar_text).collect(),
        Some(value) => vec![scalar_text(value)],
        None => vec![None],
    }
}

fn field_text(record: &Value, field: &str) -> Option<String> {
    record.get(field).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn describe_envelope(envelope: &ResultEnvelope) -> String {
    let p = &envelope.pagination;
    let window = p.window(MAX_VISIBLE_PAGES);
    let mut controls: Vec<String> = window
        .pages()
        .map(|n| if n == u64::from(p.page) { format!("[{}]", n) } else { n.to_string() })
        .collect();
    if window.ellipsis {
        controls.push("…".to_string());
    }
    format!(
        "{} records, page {} of {} ({} total, {} per page, more: {})\npages: {}",
        envelope.records.len(),
        p.page,
        p.total_pages(),
        p.total,
        p.page_size,
        p.has_more,
        controls.join(" ")
    )
}

fn describe_buckets(buckets: &[BucketEntry]) -> String {
    if buckets.is_empty() {
        return "no data".to_string();
    }
    buckets
        .iter()
        .map(|b| format!("{:<20} {}", b.name, b.value))
        .collect::<Vec<_>>()
        .join("\n")
}
