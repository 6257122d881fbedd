// ==========================================
// 共享设备预约系统 - 预约仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化，防止 SQL 注入
// 约束: 预约 + 明细必须在同一事务内写入，不允许部分提交
// ==========================================

use crate::domain::reservation::{NewReservation, NewReservationItem, Reservation, ReservationItem};
use crate::domain::types::ReservationStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 时间戳存储格式（字典序 == 时间序）
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 格式化时间戳为存储文本
pub fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

// ==========================================
// ReservationRepository - 预约仓储
// ==========================================
pub struct ReservationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationRepository {
    /// 创建新的ReservationRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建预约及其全部明细（单事务）
    ///
    /// # 参数
    /// - `reservation`: 新预约（状态固定为 PENDING）
    /// - `items`: 明细行，至少一条
    ///
    /// # 返回
    /// - `Ok(reservation_id)`: 提交成功
    /// - `Err`: 任一写入失败，整个事务回滚
    pub fn insert_with_items(
        &self,
        reservation: &NewReservation,
        items: &[NewReservationItem],
    ) -> RepositoryResult<i64> {
        if items.is_empty() {
            return Err(RepositoryError::ValidationError(
                "预约必须至少包含一条明细".to_string(),
            ));
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let reservation_id = {
            tx.execute(
                r#"INSERT INTO reservation (
                    requester_name, requester_email, requester_user_id,
                    start_at, end_at, status
                ) VALUES (?, ?, ?, ?, ?, 'PENDING')"#,
                params![
                    &reservation.requester_name,
                    &reservation.requester_email,
                    &reservation.requester_user_id,
                    &fmt_ts(reservation.start_at),
                    &fmt_ts(reservation.end_at),
                ],
            )?;
            let reservation_id = tx.last_insert_rowid();

            let mut stmt = tx.prepare(
                r#"INSERT INTO reservation_item (reservation_id, model_id, model_name, qty)
                   VALUES (?, ?, ?, ?)"#,
            )?;
            for item in items {
                stmt.execute(params![
                    reservation_id,
                    item.model_id,
                    &item.model_name,
                    item.qty,
                ])?;
            }

            reservation_id
        };

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(reservation_id)
    }

    /// 按ID查询预约
    pub fn find_by_id(&self, reservation_id: i64) -> RepositoryResult<Option<Reservation>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT reservation_id, requester_name, requester_email, requester_user_id,
                      start_at, end_at, status, legacy_asset_id, created_at
               FROM reservation
               WHERE reservation_id = ?"#,
            params![reservation_id],
            map_reservation_row,
        ) {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询预约的全部明细
    pub fn find_items(&self, reservation_id: i64) -> RepositoryResult<Vec<ReservationItem>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT item_id, reservation_id, model_id, model_name, qty
               FROM reservation_item
               WHERE reservation_id = ?
               ORDER BY item_id"#,
        )?;

        let items = stmt
            .query_map(params![reservation_id], |row| {
                Ok(ReservationItem {
                    item_id: row.get(0)?,
                    reservation_id: row.get(1)?,
                    model_id: row.get(2)?,
                    model_name: row.get(3)?,
                    qty: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// 统计某型号在查询窗口内已被占用的数量
    ///
    /// 口径:
    /// - 父预约状态 ∈ {PENDING, CONFIRMED}
    /// - 严格半开重叠: existing.start < window_end AND existing.end > window_start
    pub fn overlapping_booked_qty(
        &self,
        model_id: i64,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let qty: i64 = conn.query_row(
            r#"SELECT COALESCE(SUM(ri.qty), 0)
               FROM reservation_item ri
               JOIN reservation r ON r.reservation_id = ri.reservation_id
               WHERE ri.model_id = ?1
                 AND r.status IN ('PENDING', 'CONFIRMED')
                 AND r.start_at < ?2
                 AND r.end_at > ?3"#,
            params![model_id, fmt_ts(window_end), fmt_ts(window_start)],
            |row| row.get(0),
        )?;

        Ok(qty)
    }

    /// 统计目标用户在窗口内的重叠预约数（并发规则口径）
    ///
    /// 口径:
    /// - 状态 ∈ {PENDING, CONFIRMED, COMPLETED}
    /// - 有数字ID按ID匹配，否则按邮箱大小写不敏感匹配
    /// - 编辑场景下排除预约自身
    pub fn count_user_overlapping(
        &self,
        user_id: Option<i64>,
        email: &str,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        exclude_reservation_id: Option<i64>,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 = match user_id {
            Some(uid) => conn.query_row(
                r#"SELECT COUNT(*)
                   FROM reservation
                   WHERE requester_user_id = ?1
                     AND status IN ('PENDING', 'CONFIRMED', 'COMPLETED')
                     AND start_at < ?2
                     AND end_at > ?3
                     AND (?4 IS NULL OR reservation_id != ?4)"#,
                params![
                    uid,
                    fmt_ts(window_end),
                    fmt_ts(window_start),
                    exclude_reservation_id
                ],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                r#"SELECT COUNT(*)
                   FROM reservation
                   WHERE LOWER(requester_email) = LOWER(?1)
                     AND status IN ('PENDING', 'CONFIRMED', 'COMPLETED')
                     AND start_at < ?2
                     AND end_at > ?3
                     AND (?4 IS NULL OR reservation_id != ?4)"#,
                params![
                    email,
                    fmt_ts(window_end),
                    fmt_ts(window_start),
                    exclude_reservation_id
                ],
                |row| row.get(0),
            )?,
        };

        Ok(count)
    }

    /// 人工状态迁移（确认/取消/完成）
    ///
    /// 迁移表之外的请求返回 InvalidStateTransition，不落库。
    pub fn update_status(
        &self,
        reservation_id: i64,
        to: ReservationStatus,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let current: String = tx
            .query_row(
                "SELECT status FROM reservation WHERE reservation_id = ?",
                params![reservation_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                    entity: "Reservation".to_string(),
                    id: reservation_id.to_string(),
                },
                other => other.into(),
            })?;

        let from = ReservationStatus::parse(&current).ok_or_else(|| {
            RepositoryError::ValidationError(format!("未知预约状态: {}", current))
        })?;
        if !from.can_transition_to(to) {
            return Err(RepositoryError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        tx.execute(
            "UPDATE reservation SET status = ? WHERE reservation_id = ?",
            params![to.to_string(), reservation_id],
        )?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 爽约清扫：将开始时间早于 cutoff 的 PENDING/CONFIRMED 预约标记为 MISSED
    ///
    /// 单事务内“先选后改”，返回被标记的预约；谓词每次运行重新求值，
    /// 已 MISSED 的行不再命中，因此重复执行天然幂等。
    pub fn sweep_mark_missed(
        &self,
        cutoff: NaiveDateTime,
    ) -> RepositoryResult<Vec<Reservation>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let swept = {
            let mut stmt = tx.prepare(
                r#"SELECT reservation_id, requester_name, requester_email, requester_user_id,
                          start_at, end_at, status, legacy_asset_id, created_at
                   FROM reservation
                   WHERE status IN ('PENDING', 'CONFIRMED')
                     AND start_at < ?
                   ORDER BY reservation_id"#,
            )?;
            let swept = stmt
                .query_map(params![fmt_ts(cutoff)], map_reservation_row)?
                .collect::<Result<Vec<_>, _>>()?;

            tx.execute(
                r#"UPDATE reservation
                   SET status = 'MISSED'
                   WHERE status IN ('PENDING', 'CONFIRMED')
                     AND start_at < ?"#,
                params![fmt_ts(cutoff)],
            )?;

            swept
        };

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(swept)
    }
}

/// 映射数据库行到Reservation对象
fn map_reservation_row(row: &rusqlite::Row) -> rusqlite::Result<Reservation> {
    let status_str: String = row.get(6)?;
    let status = ReservationStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("invalid reservation status: {}", status_str).into(),
        )
    })?;

    Ok(Reservation {
        reservation_id: row.get(0)?,
        requester_name: row.get(1)?,
        requester_email: row.get(2)?,
        requester_user_id: row.get(3)?,
        start_at: parse_ts_col(row, 4)?,
        end_at: parse_ts_col(row, 5)?,
        status,
        legacy_asset_id: row.get(7)?,
        created_at: parse_ts_col(row, 8)?,
    })
}

/// 解析 TEXT 时间戳列
fn parse_ts_col(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&row.get::<_, String>(idx)?, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
