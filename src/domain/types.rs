// ==========================================
// 共享设备预约系统 - 领域类型定义
// ==========================================
// 红线: 状态机只允许表中列出的迁移
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 预约状态 (Reservation Status)
// ==========================================
// pending → {confirmed, cancelled, missed}
// confirmed → {completed, cancelled, missed}
// completed / cancelled / missed 为终态
// 唯一的自动迁移: pending/confirmed → missed (由清扫任务触发)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,   // 待确认
    Confirmed, // 已确认
    Completed, // 已完成
    Cancelled, // 已取消
    Missed,    // 爽约
}

impl ReservationStatus {
    /// 从数据库字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ReservationStatus::Pending),
            "CONFIRMED" => Some(ReservationStatus::Confirmed),
            "COMPLETED" => Some(ReservationStatus::Completed),
            "CANCELLED" => Some(ReservationStatus::Cancelled),
            "MISSED" => Some(ReservationStatus::Missed),
            _ => None,
        }
    }

    /// 状态迁移是否合法
    pub fn can_transition_to(self, to: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Pending, Missed)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
                | (Confirmed, Missed)
        )
    }

    /// 是否终态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed | ReservationStatus::Cancelled | ReservationStatus::Missed
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Pending => write!(f, "PENDING"),
            ReservationStatus::Confirmed => write!(f, "CONFIRMED"),
            ReservationStatus::Completed => write!(f, "COMPLETED"),
            ReservationStatus::Cancelled => write!(f, "CANCELLED"),
            ReservationStatus::Missed => write!(f, "MISSED"),
        }
    }
}

// ==========================================
// 策略规则 (Policy Rule)
// ==========================================
// 四条规则独立评估，互不短路
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyRule {
    Notice,     // 提前量
    Duration,   // 时长上下限
    Concurrent, // 并发预约上限
    Blackout,   // 封锁时段
}

impl PolicyRule {
    /// 配置键片段（booking/bypass/{rule}/{role}）
    pub fn as_key(self) -> &'static str {
        match self {
            PolicyRule::Notice => "notice",
            PolicyRule::Duration => "duration",
            PolicyRule::Concurrent => "concurrent",
            PolicyRule::Blackout => "blackout",
        }
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyRule::Notice => write!(f, "NOTICE"),
            PolicyRule::Duration => write!(f, "DURATION"),
            PolicyRule::Concurrent => write!(f, "CONCURRENT"),
            PolicyRule::Blackout => write!(f, "BLACKOUT"),
        }
    }
}
