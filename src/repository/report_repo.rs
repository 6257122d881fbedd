// ==========================================
// 共享设备预约系统 - 报表读模型仓储
// ==========================================
// 红线: 只读，不修改任何预约数据
// 职责: 为利用率/需求聚合引擎提供窗口内的活动行
// ==========================================

use crate::domain::types::ReservationStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::reservation_repo::{fmt_ts, TS_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 与报表窗口重叠的明细活动行
#[derive(Debug, Clone)]
pub struct ItemActivityRow {
    pub model_id: i64,
    pub model_name: String,
    pub qty: i64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
}

/// 与报表窗口重叠的预约活动行（按预约聚合数量）
#[derive(Debug, Clone)]
pub struct ReservationActivityRow {
    pub reservation_id: i64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    /// 明细数量之和；无明细时为 0
    pub total_qty: i64,
    /// 旧数据: 直连资产、无明细行（报表按数量 1 回退）
    pub legacy_asset_id: Option<i64>,
}

/// 取消/爽约按日计数行
#[derive(Debug, Clone)]
pub struct DailyStatusCount {
    pub day: NaiveDate,
    pub status: ReservationStatus,
    pub count: i64,
}

// ==========================================
// ReportRepository - 报表读模型仓储
// ==========================================
pub struct ReportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReportRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 窗口内的明细活动（利用率口径）
    ///
    /// 口径: 父预约状态 ∈ {PENDING, CONFIRMED, COMPLETED, MISSED}，严格半开重叠
    pub fn items_overlapping(
        &self,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> RepositoryResult<Vec<ItemActivityRow>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT ri.model_id, ri.model_name, ri.qty, r.start_at, r.end_at
               FROM reservation_item ri
               JOIN reservation r ON r.reservation_id = ri.reservation_id
               WHERE r.status IN ('PENDING', 'CONFIRMED', 'COMPLETED', 'MISSED')
                 AND r.start_at < ?1
                 AND r.end_at > ?2
               ORDER BY ri.model_id, ri.item_id"#,
        )?;

        let rows = stmt
            .query_map(params![fmt_ts(range_end), fmt_ts(range_start)], |row| {
                Ok(ItemActivityRow {
                    model_id: row.get(0)?,
                    model_name: row.get(1)?,
                    qty: row.get(2)?,
                    start_at: parse_ts(row, 3)?,
                    end_at: parse_ts(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// 窗口内的预约活动（小时需求口径，含无明细的旧数据行）
    pub fn reservations_overlapping(
        &self,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> RepositoryResult<Vec<ReservationActivityRow>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT r.reservation_id, r.start_at, r.end_at,
                      COALESCE(SUM(ri.qty), 0) AS total_qty,
                      r.legacy_asset_id
               FROM reservation r
               LEFT JOIN reservation_item ri ON ri.reservation_id = r.reservation_id
               WHERE r.status IN ('PENDING', 'CONFIRMED', 'COMPLETED', 'MISSED')
                 AND r.start_at < ?1
                 AND r.end_at > ?2
               GROUP BY r.reservation_id
               ORDER BY r.reservation_id"#,
        )?;

        let rows = stmt
            .query_map(params![fmt_ts(range_end), fmt_ts(range_start)], |row| {
                Ok(ReservationActivityRow {
                    reservation_id: row.get(0)?,
                    start_at: parse_ts(row, 1)?,
                    end_at: parse_ts(row, 2)?,
                    total_qty: row.get(3)?,
                    legacy_asset_id: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// 取消/爽约趋势：按开始日历日分组计数
    pub fn cancelled_missed_by_day(
        &self,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> RepositoryResult<Vec<DailyStatusCount>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT DATE(start_at) AS day, status, COUNT(*) AS cnt
               FROM reservation
               WHERE status IN ('CANCELLED', 'MISSED')
                 AND start_at >= ?1
                 AND start_at < ?2
               GROUP BY day, status
               ORDER BY day, status"#,
        )?;

        let rows = stmt
            .query_map(params![fmt_ts(range_start), fmt_ts(range_end)], |row| {
                let day_str: String = row.get(0)?;
                let day = NaiveDate::parse_from_str(&day_str, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                let status_str: String = row.get(1)?;
                let status = ReservationStatus::parse(&status_str).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        format!("invalid reservation status: {}", status_str).into(),
                    )
                })?;
                Ok(DailyStatusCount {
                    day,
                    status,
                    count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

fn parse_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&row.get::<_, String>(idx)?, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
