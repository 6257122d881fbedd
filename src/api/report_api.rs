// ==========================================
// 共享设备预约系统 - 报表接口
// ==========================================
// 职责: 暴露利用率报表 + 四个子报表各自独立的列排序与分页
// 排序: 数值列按数值比较；字符串列大小写不敏感自然序
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::engine::collaborators::ModelLookup;
use crate::engine::reporting::{
    CategoryUtilizationRow, DailyTrendRow, HourlyDemandRow, ModelUtilizationRow,
    UtilizationAggregator, UtilizationReport,
};
use crate::repository::report_repo::ReportRepository;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

/// 单页最大行数
const MAX_PAGE_LIMIT: i64 = 20_000;

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// 列排序值：数值优先，字符串回退
#[derive(Debug, Clone)]
pub enum SortValue {
    Number(f64),
    Text(String),
}

/// 支持列排序的报表行
pub trait SortableRow {
    /// 取列值；未知列返回 None（调用方报无效输入）
    fn sort_value(&self, column: &str) -> Option<SortValue>;
}

impl SortableRow for ModelUtilizationRow {
    fn sort_value(&self, column: &str) -> Option<SortValue> {
        match column {
            "model_id" => Some(SortValue::Number(self.model_id as f64)),
            "model_name" => Some(SortValue::Text(self.model_name.clone())),
            "unit_hours" => Some(SortValue::Number(self.unit_hours)),
            "share_pct" => Some(SortValue::Number(self.share_pct)),
            _ => None,
        }
    }
}

impl SortableRow for CategoryUtilizationRow {
    fn sort_value(&self, column: &str) -> Option<SortValue> {
        match column {
            "category" => Some(SortValue::Text(self.category.clone())),
            "unit_hours" => Some(SortValue::Number(self.unit_hours)),
            "share_pct" => Some(SortValue::Number(self.share_pct)),
            _ => None,
        }
    }
}

impl SortableRow for HourlyDemandRow {
    fn sort_value(&self, column: &str) -> Option<SortValue> {
        match column {
            "hour" => Some(SortValue::Number(self.hour as f64)),
            "unit_minutes" => Some(SortValue::Number(self.unit_minutes as f64)),
            "avg_concurrent_units" => Some(SortValue::Number(self.avg_concurrent_units)),
            _ => None,
        }
    }
}

impl SortableRow for DailyTrendRow {
    fn sort_value(&self, column: &str) -> Option<SortValue> {
        match column {
            "day" => Some(SortValue::Text(self.day.format("%Y-%m-%d").to_string())),
            "cancelled" => Some(SortValue::Number(self.cancelled as f64)),
            "missed" => Some(SortValue::Number(self.missed as f64)),
            _ => None,
        }
    }
}

// ==========================================
// ReportApi - 报表接口
// ==========================================
pub struct ReportApi<M>
where
    M: ModelLookup,
{
    aggregator: UtilizationAggregator<M>,
}

impl<M> ReportApi<M>
where
    M: ModelLookup,
{
    /// 从共享连接装配报表接口
    pub fn new(conn: Arc<Mutex<Connection>>, models: Arc<M>) -> Self {
        Self {
            aggregator: UtilizationAggregator::new(Arc::new(ReportRepository::new(conn)), models),
        }
    }

    /// 生成日期范围 [from, to]（含两端）的利用率报表
    ///
    /// 子报表相互独立：单个子报表失败只产生 warnings 条目，
    /// 其余子报表照常渲染；空结果是“无数据”而不是错误。
    pub async fn get_utilization_report(&self, from: NaiveDate, to: NaiveDate) -> UtilizationReport {
        self.aggregator.get_utilization_report(from, to).await
    }
}

/// 对单个子报表的行集独立排序 + 分页
///
/// # 参数
/// - column: 行类型支持的列名，未知列返回无效输入
/// - limit: 1..=20000；None 表示不分页
/// - offset: ≥ 0
pub fn sort_and_page<T>(
    mut rows: Vec<T>,
    column: &str,
    direction: SortDirection,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult<Vec<T>>
where
    T: SortableRow,
{
    if let Some(first) = rows.first() {
        if first.sort_value(column).is_none() {
            return Err(ApiError::InvalidInput(format!("未知排序列: {}", column)));
        }
    }
    if let Some(limit) = limit {
        if limit <= 0 || limit > MAX_PAGE_LIMIT {
            return Err(ApiError::InvalidInput(format!(
                "limit必须在1-{}之间",
                MAX_PAGE_LIMIT
            )));
        }
    }
    if let Some(offset) = offset {
        if offset < 0 {
            return Err(ApiError::InvalidInput("offset不能为负数".to_string()));
        }
    }

    rows.sort_by(|a, b| {
        let ord = compare_sort_values(a.sort_value(column), b.sort_value(column));
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });

    let offset = offset.unwrap_or(0) as usize;
    let rows: Vec<T> = match limit {
        Some(limit) => rows.into_iter().skip(offset).take(limit as usize).collect(),
        None => rows.into_iter().skip(offset).collect(),
    };
    Ok(rows)
}

fn compare_sort_values(a: Option<SortValue>, b: Option<SortValue>) -> Ordering {
    match (a, b) {
        (Some(SortValue::Number(x)), Some(SortValue::Number(y))) => {
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(SortValue::Text(x)), Some(SortValue::Text(y))) => natural_compare(&x, &y),
        // 混合类型: 数值排在文本之前
        (Some(SortValue::Number(_)), Some(SortValue::Text(_))) => Ordering::Less,
        (Some(SortValue::Text(_)), Some(SortValue::Number(_))) => Ordering::Greater,
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

/// 大小写不敏感的自然序比较（"item2" < "item10"）
pub fn natural_compare(a: &str, b: &str) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ac), Some(bc)) => {
                if ac.is_ascii_digit() && bc.is_ascii_digit() {
                    // 取出连续数字串按数值比较
                    let mut an: u64 = 0;
                    while let Some(c) = ai.peek().copied().filter(|c| c.is_ascii_digit()) {
                        an = an.saturating_mul(10).saturating_add(c as u64 - '0' as u64);
                        ai.next();
                    }
                    let mut bn: u64 = 0;
                    while let Some(c) = bi.peek().copied().filter(|c| c.is_ascii_digit()) {
                        bn = bn.saturating_mul(10).saturating_add(c as u64 - '0' as u64);
                        bi.next();
                    }
                    match an.cmp(&bn) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    match ac.cmp(&bc) {
                        Ordering::Equal => {
                            ai.next();
                            bi.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}
