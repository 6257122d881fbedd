// ==========================================
// 测试数据构建器
// ==========================================
// 职责: 直接落库构造任意状态的预约数据（绕过策略/容量校验）
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDateTime;
use equip_reservation::repository::reservation_repo::fmt_ts;
use equip_reservation::ReservationStatus;
use rusqlite::{params, Connection};
use std::error::Error;

/// 预约种子数据构建器
///
/// 与 BookingCoordinator 不同，这里直接写库，
/// 用于预置 CONFIRMED / CANCELLED 等任意状态的历史数据。
pub struct ReservationBuilder {
    requester_name: String,
    requester_email: String,
    requester_user_id: Option<i64>,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
    status: ReservationStatus,
    legacy_asset_id: Option<i64>,
    items: Vec<(i64, String, i64)>,
}

impl ReservationBuilder {
    pub fn new(start_at: NaiveDateTime, end_at: NaiveDateTime) -> Self {
        Self {
            requester_name: "Alice".to_string(),
            requester_email: "alice@example.com".to_string(),
            requester_user_id: None,
            start_at,
            end_at,
            status: ReservationStatus::Pending,
            legacy_asset_id: None,
            items: Vec::new(),
        }
    }

    pub fn requester(mut self, name: &str, email: &str) -> Self {
        self.requester_name = name.to_string();
        self.requester_email = email.to_string();
        self
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.requester_user_id = Some(user_id);
        self
    }

    pub fn status(mut self, status: ReservationStatus) -> Self {
        self.status = status;
        self
    }

    /// 旧数据形态：无明细，直连资产
    pub fn legacy_asset(mut self, asset_id: i64) -> Self {
        self.legacy_asset_id = Some(asset_id);
        self
    }

    /// 追加一条明细行: (model_id, 名称快照, 数量)
    pub fn item(mut self, model_id: i64, model_name: &str, qty: i64) -> Self {
        self.items.push((model_id, model_name.to_string(), qty));
        self
    }

    /// 写入数据库，返回 reservation_id
    pub fn insert(self, conn: &Connection) -> Result<i64, Box<dyn Error>> {
        conn.execute(
            r#"INSERT INTO reservation (
                requester_name, requester_email, requester_user_id,
                start_at, end_at, status, legacy_asset_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &self.requester_name,
                &self.requester_email,
                &self.requester_user_id,
                &fmt_ts(self.start_at),
                &fmt_ts(self.end_at),
                &self.status.to_string(),
                &self.legacy_asset_id,
            ],
        )?;
        let reservation_id = conn.last_insert_rowid();

        for (model_id, model_name, qty) in &self.items {
            conn.execute(
                r#"INSERT INTO reservation_item (reservation_id, model_id, model_name, qty)
                   VALUES (?, ?, ?, ?)"#,
                params![reservation_id, model_id, model_name, qty],
            )?;
        }

        Ok(reservation_id)
    }
}
