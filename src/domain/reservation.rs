// ==========================================
// 共享设备预约系统 - 预约实体
// ==========================================
// 约束:
// - 区间为半开区间 [start_at, end_at)，end_at > start_at
// - ReservationItem 只在预约创建事务内产生，之后不可变
// - legacy_asset_id 仅用于旧数据的单资产直连预约（隐含数量 1），报表读取
// ==========================================

use crate::domain::types::ReservationStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Reservation - 预约
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: i64,
    pub requester_name: String,
    pub requester_email: String,
    /// 外部目录用户ID（可能缺失，此时以邮箱识别用户）
    pub requester_user_id: Option<i64>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub status: ReservationStatus,
    /// 旧数据: 直连单个资产、无明细行、隐含数量 1
    pub legacy_asset_id: Option<i64>,
    pub created_at: NaiveDateTime,
}

// ==========================================
// ReservationItem - 预约明细
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationItem {
    pub item_id: i64,
    pub reservation_id: i64,
    pub model_id: i64,
    /// 设备型号名称快照（下单时缓存，避免报表反查）
    pub model_name: String,
    pub qty: i64,
}

/// 新建预约的输入（尚无主键）
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub requester_name: String,
    pub requester_email: String,
    pub requester_user_id: Option<i64>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
}

/// 新建预约明细的输入
#[derive(Debug, Clone)]
pub struct NewReservationItem {
    pub model_id: i64,
    pub model_name: String,
    pub qty: i64,
}
