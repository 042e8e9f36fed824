//! 配置模块，负责加载仪表盘的JSON配置文件

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::bucket::category::DEFAULT_TOP_N;
use crate::bucket::RangeSet;
use crate::condition::{FilterKind, FilterSchema, Sign};
use crate::error::{QueryError, QueryResult};
use crate::pagination::DEFAULT_PAGE_SIZE;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.json";

/// 仪表盘配置结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    /// 查询所针对的表名
    #[serde(default = "default_table")]
    pub table: String,
    /// 每页条数
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// 图表保留的类别数量，其余合并为 "Others"
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// UI 过滤键到条件类型的映射
    #[serde(default)]
    pub filters: FilterSchema,
    /// 条件属性名到数据库列名的映射
    #[serde(default)]
    pub column_mapping: HashMap<String, String>,
    /// 列的存储单位相对于"百万"的倍数，例如以美元存储的列为 1000000
    #[serde(default)]
    pub column_scale: HashMap<String, f64>,
    /// 融资金额区间（单位：百万）
    #[serde(default = "RangeSet::funding_millions")]
    pub funding_ranges: RangeSet,
}

fn default_table() -> String {
    "external_companies".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl DashboardConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> QueryResult<Self> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(QueryError::Config(format!(
                "配置文件不存在: {}",
                path_ref.display()
            )));
        }

        let content = fs::read_to_string(path_ref).map_err(|e| {
            QueryError::Config(format!("无法读取配置文件 {}: {}", path_ref.display(), e))
        })?;

        let config: DashboardConfig = serde_json::from_str(&content).map_err(|e| {
            QueryError::Config(format!("无法解析JSON配置文件 {}: {}", path_ref.display(), e))
        })?;

        if config.page_size == 0 {
            return Err(QueryError::Config("pageSize 必须大于 0".to_string()));
        }

        if let Some((column, scale)) = config
            .column_scale
            .iter()
            .find(|(_, scale)| !scale.is_finite() || **scale <= 0.0)
        {
            return Err(QueryError::Config(format!(
                "列 {} 的倍数必须为正数，实际为 {}",
                column, scale
            )));
        }

        log::debug!(
            "loaded {} filter definitions and {} column mappings from {}",
            config.filters.filters.len(),
            config.column_mapping.len(),
            path_ref.display()
        );
        Ok(config)
    }
}

impl Default for DashboardConfig {
    /// 内置配置（用于测试或fallback）
    fn default() -> Self {
        let mut filters = FilterSchema::default();
        filters.insert(
            "industry",
            FilterKind::Match { attribute: "industry".to_string(), sign: Sign::Equals },
        );
        filters.insert(
            "country",
            FilterKind::Match { attribute: "country".to_string(), sign: Sign::ExactEquals },
        );
        filters.insert(
            "stage",
            FilterKind::Match { attribute: "funding_stage".to_string(), sign: Sign::ExactEquals },
        );
        filters.insert("funding", FilterKind::Range { attribute: "total_funding".to_string() });
        filters.insert("founded", FilterKind::Range { attribute: "founded_year".to_string() });

        let mut column_mapping = HashMap::new();
        column_mapping.insert("total_funding".to_string(), "total_funding_usd".to_string());
        column_mapping.insert("country".to_string(), "hq_country".to_string());

        let mut column_scale = HashMap::new();
        column_scale.insert("total_funding_usd".to_string(), 1_000_000.0);

        Self {
            table: default_table(),
            page_size: DEFAULT_PAGE_SIZE,
            top_n: DEFAULT_TOP_N,
            filters,
            column_mapping,
            column_scale,
            funding_ranges: RangeSet::funding_millions(),
        }
    }
}
