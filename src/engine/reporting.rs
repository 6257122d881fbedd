// ==========================================
// 共享设备预约系统 - 利用率与需求聚合引擎
// ==========================================
// 红线: 纯读分析，不修改任何预约数据
// 口径:
// - 日期范围 [from, to] 含两端，展开为半开时间窗 [from 00:00, to+1d 00:00)
// - 利用率状态口径: PENDING/CONFIRMED/COMPLETED/MISSED
// - 单位货币: unit-minutes（数量 × 重叠分钟），展示为 unit-hours
// - 四个子报表相互独立，单个失败不影响其余渲染
// ==========================================

use crate::engine::collaborators::ModelLookup;
use crate::repository::report_repo::{ReportRepository, ReservationActivityRow};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{instrument, warn};

/// 按型号利用率行
#[derive(Debug, Clone, Serialize)]
pub struct ModelUtilizationRow {
    pub model_id: i64,
    pub model_name: String,
    pub unit_hours: f64,
    pub share_pct: f64,
}

/// 按类目汇总行
#[derive(Debug, Clone, Serialize)]
pub struct CategoryUtilizationRow {
    pub category: String,
    pub unit_hours: f64,
    pub share_pct: f64,
}

/// 按时段需求行（hour ∈ 0..24）
#[derive(Debug, Clone, Serialize)]
pub struct HourlyDemandRow {
    pub hour: u32,
    pub unit_minutes: i64,
    /// unit_minutes / (范围天数 × 60)
    pub avg_concurrent_units: f64,
}

/// 取消/爽约按日趋势行
#[derive(Debug, Clone, Serialize)]
pub struct DailyTrendRow {
    pub day: NaiveDate,
    pub cancelled: i64,
    pub missed: i64,
}

/// 利用率报表
///
/// 不变式: Σ category_rows.unit_hours == Σ model_rows.unit_hours
/// （两者均派生自同一份按型号分钟数）
#[derive(Debug, Clone, Default, Serialize)]
pub struct UtilizationReport {
    pub model_rows: Vec<ModelUtilizationRow>,
    pub category_rows: Vec<CategoryUtilizationRow>,
    pub hourly_rows: Vec<HourlyDemandRow>,
    pub daily_rows: Vec<DailyTrendRow>,
    pub peak_hour: Option<u32>,
    /// 类目反查失败计数（计入 "Unknown category" 桶）
    pub category_lookup_failures: u64,
    /// 旧数据按数量 1 回退的预约计数（可观测性）
    pub legacy_fallback_count: u64,
    /// 子报表级失败告警；空数据不是失败
    pub warnings: Vec<String>,
}

// ==========================================
// UtilizationAggregator - 聚合引擎
// ==========================================
pub struct UtilizationAggregator<M>
where
    M: ModelLookup,
{
    report_repo: Arc<ReportRepository>,
    models: Arc<M>,
}

impl<M> UtilizationAggregator<M>
where
    M: ModelLookup,
{
    /// 创建新的 UtilizationAggregator 实例
    pub fn new(report_repo: Arc<ReportRepository>, models: Arc<M>) -> Self {
        Self { report_repo, models }
    }

    /// 生成日期范围 [from, to]（含两端）的利用率报表
    #[instrument(skip(self))]
    pub async fn get_utilization_report(&self, from: NaiveDate, to: NaiveDate) -> UtilizationReport {
        let mut report = UtilizationReport::default();

        if to < from {
            report
                .warnings
                .push(format!("Invalid date range: {} .. {}", from, to));
            return report;
        }

        let range_start = from.and_hms_opt(0, 0, 0).expect("midnight is valid");
        let range_end = (to + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid");
        let range_days = (to - from).num_days() + 1;

        // === 子报表 1+2: 按型号利用率 + 按类目汇总 ===
        match self.compute_utilization(range_start, range_end).await {
            Ok((model_rows, category_rows, lookup_failures)) => {
                report.model_rows = model_rows;
                report.category_rows = category_rows;
                report.category_lookup_failures = lookup_failures;
            }
            Err(e) => {
                warn!(error = %e, "利用率子报表计算失败");
                report
                    .warnings
                    .push(format!("Utilization sub-report failed: {}", e));
            }
        }

        // === 子报表 3: 按时段需求 ===
        match self.compute_hourly_demand(range_start, range_end, range_days) {
            Ok((hourly_rows, peak_hour, legacy_fallbacks)) => {
                report.hourly_rows = hourly_rows;
                report.peak_hour = peak_hour;
                report.legacy_fallback_count = legacy_fallbacks;
            }
            Err(e) => {
                warn!(error = %e, "时段需求子报表计算失败");
                report
                    .warnings
                    .push(format!("Hourly demand sub-report failed: {}", e));
            }
        }

        // === 子报表 4: 取消/爽约趋势 ===
        match self.compute_daily_trend(range_start, range_end) {
            Ok(daily_rows) => report.daily_rows = daily_rows,
            Err(e) => {
                warn!(error = %e, "取消/爽约趋势子报表计算失败");
                report
                    .warnings
                    .push(format!("Cancellation trend sub-report failed: {}", e));
            }
        }

        report
    }

    /// 按型号累计 unit-minutes，并按类目归集
    async fn compute_utilization(
        &self,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<
        (Vec<ModelUtilizationRow>, Vec<CategoryUtilizationRow>, u64),
        crate::repository::RepositoryError,
    > {
        let items = self.report_repo.items_overlapping(range_start, range_end)?;

        // model_id → (名称快照, unit_minutes)
        let mut per_model: BTreeMap<i64, (String, i64)> = BTreeMap::new();
        for item in &items {
            let minutes = clipped_minutes(item.start_at, item.end_at, range_start, range_end);
            if minutes <= 0 {
                continue;
            }
            let entry = per_model
                .entry(item.model_id)
                .or_insert_with(|| (item.model_name.clone(), 0));
            entry.1 += minutes * item.qty;
        }

        let total_minutes: i64 = per_model.values().map(|(_, m)| *m).sum();
        let share = |minutes: i64| -> f64 {
            if total_minutes == 0 {
                0.0
            } else {
                minutes as f64 / total_minutes as f64 * 100.0
            }
        };

        let model_rows = per_model
            .iter()
            .map(|(&model_id, (name, minutes))| ModelUtilizationRow {
                model_id,
                model_name: name.clone(),
                unit_hours: *minutes as f64 / 60.0,
                share_pct: share(*minutes),
            })
            .collect();

        // 类目归集：反查失败计入 Unknown category 桶并计数
        let mut lookup_failures = 0u64;
        let mut per_category: BTreeMap<String, i64> = BTreeMap::new();
        for (&model_id, (_, minutes)) in &per_model {
            let category = match self.models.get_model(model_id).await {
                Ok(model) => model.category,
                Err(e) => {
                    warn!(model_id, error = %e, "类目反查失败，归入 Unknown category");
                    lookup_failures += 1;
                    "Unknown category".to_string()
                }
            };
            *per_category.entry(category).or_insert(0) += minutes;
        }

        let category_rows = per_category
            .into_iter()
            .map(|(category, minutes)| CategoryUtilizationRow {
                category,
                unit_hours: minutes as f64 / 60.0,
                share_pct: share(minutes),
            })
            .collect();

        Ok((model_rows, category_rows, lookup_failures))
    }

    /// 按 0-23 时段桶累计 unit-minutes
    ///
    /// 跨天预约在途经的每一天都会命中同一时段桶一次。
    fn compute_hourly_demand(
        &self,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
        range_days: i64,
    ) -> Result<(Vec<HourlyDemandRow>, Option<u32>, u64), crate::repository::RepositoryError> {
        let reservations = self
            .report_repo
            .reservations_overlapping(range_start, range_end)?;

        let mut buckets = [0i64; 24];
        let mut legacy_fallbacks = 0u64;

        for reservation in &reservations {
            let qty = match effective_qty(reservation) {
                Some(EffectiveQty::Items(q)) => q,
                Some(EffectiveQty::LegacyFallback) => {
                    legacy_fallbacks += 1;
                    1
                }
                None => continue,
            };

            let clip_start = reservation.start_at.max(range_start);
            let clip_end = reservation.end_at.min(range_end);

            // 沿日历小时边界切块累加
            let mut cursor = clip_start;
            while cursor < clip_end {
                let next_boundary = hour_floor(cursor) + Duration::hours(1);
                let chunk_end = next_boundary.min(clip_end);
                let chunk_minutes = (chunk_end - cursor).num_minutes();
                buckets[cursor.hour() as usize] += chunk_minutes * qty;
                cursor = chunk_end;
            }
        }

        let denominator = (range_days * 60) as f64;
        let hourly_rows: Vec<HourlyDemandRow> = (0..24)
            .map(|hour| HourlyDemandRow {
                hour,
                unit_minutes: buckets[hour as usize],
                avg_concurrent_units: buckets[hour as usize] as f64 / denominator,
            })
            .collect();

        let peak_hour = buckets
            .iter()
            .enumerate()
            .filter(|(_, &minutes)| minutes > 0)
            .max_by_key(|(hour, &minutes)| (minutes, std::cmp::Reverse(*hour)))
            .map(|(hour, _)| hour as u32);

        Ok((hourly_rows, peak_hour, legacy_fallbacks))
    }

    /// 取消/爽约按开始日历日计数
    fn compute_daily_trend(
        &self,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<Vec<DailyTrendRow>, crate::repository::RepositoryError> {
        let counts = self
            .report_repo
            .cancelled_missed_by_day(range_start, range_end)?;

        let mut per_day: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
        for row in counts {
            let entry = per_day.entry(row.day).or_insert((0, 0));
            match row.status {
                crate::domain::types::ReservationStatus::Cancelled => entry.0 += row.count,
                crate::domain::types::ReservationStatus::Missed => entry.1 += row.count,
                _ => {}
            }
        }

        Ok(per_day
            .into_iter()
            .map(|(day, (cancelled, missed))| DailyTrendRow {
                day,
                cancelled,
                missed,
            })
            .collect())
    }
}

/// 预约的有效数量口径
enum EffectiveQty {
    Items(i64),
    /// 无明细 + 直连资产的旧数据，按数量 1 回退
    LegacyFallback,
}

fn effective_qty(reservation: &ReservationActivityRow) -> Option<EffectiveQty> {
    if reservation.total_qty > 0 {
        Some(EffectiveQty::Items(reservation.total_qty))
    } else if reservation.legacy_asset_id.is_some() {
        Some(EffectiveQty::LegacyFallback)
    } else {
        None
    }
}

/// 与报表窗口的裁剪重叠分钟数（≥ 0）
fn clipped_minutes(
    start: NaiveDateTime,
    end: NaiveDateTime,
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
) -> i64 {
    let clip_start = start.max(range_start);
    let clip_end = end.min(range_end);
    (clip_end - clip_start).num_minutes().max(0)
}

/// 截断到整点
fn hour_floor(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date()
        .and_hms_opt(ts.hour(), 0, 0)
        .expect("hour within range")
}
