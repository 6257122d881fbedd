// ==========================================
// 共享设备预约系统 - 预约策略值对象
// ==========================================
// 约束:
// - Policy 不单独落库，每次校验时由配置解析得到
// - bypass 为 (规则 × 角色) 的独立布尔表，规则之间不继承
// - 所有区间比较使用半开区间 [start, end)
// ==========================================

use crate::domain::types::PolicyRule;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ==========================================
// BlackoutSlot - 封锁时段
// ==========================================
// 不变式: end > start；按 (start, end) 精确去重，升序保存
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlackoutSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BlackoutSlot {
    /// 与查询窗口的严格半开重叠判定
    ///
    /// 恰好在 window_start 结束、或恰好在 window_end 开始的时段不算重叠。
    pub fn overlaps(&self, window_start: NaiveDateTime, window_end: NaiveDateTime) -> bool {
        self.start < window_end && self.end > window_start
    }
}

// ==========================================
// BypassTable - 规则豁免表
// ==========================================
/// 单条规则的角色豁免开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBypass {
    pub checkout_staff: bool,
    pub admin: bool,
}

/// (规则 × 角色) 豁免表
///
/// 管理员只有在该规则的 admin 开关打开时才豁免；
/// 出借台员工同理；代他人预约不改变豁免资格。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassTable {
    pub notice: RoleBypass,
    pub duration: RoleBypass,
    pub concurrent: RoleBypass,
    pub blackout: RoleBypass,
}

impl BypassTable {
    /// 按规则取对应的角色开关
    pub fn for_rule(&self, rule: PolicyRule) -> RoleBypass {
        match rule {
            PolicyRule::Notice => self.notice,
            PolicyRule::Duration => self.duration,
            PolicyRule::Concurrent => self.concurrent,
            PolicyRule::Blackout => self.blackout,
        }
    }
}

// ==========================================
// Policy - 预约策略
// ==========================================
// 0 一律表示“无限制/不启用”
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    pub notice_minutes: i64,
    pub min_duration_minutes: i64,
    /// 0 = 不限时长上限
    pub max_duration_minutes: i64,
    /// 0 = 不限并发预约数
    pub max_concurrent_reservations: i64,
    pub blackout_slots: Vec<BlackoutSlot>,
    pub bypass: BypassTable,
}

impl Policy {
    /// 配置归一化
    ///
    /// - 负值截断为 0
    /// - max_duration < min_duration 且两者均非 0 时，max 抬升到 min
    pub fn normalize(&mut self) {
        self.notice_minutes = self.notice_minutes.max(0);
        self.min_duration_minutes = self.min_duration_minutes.max(0);
        self.max_duration_minutes = self.max_duration_minutes.max(0);
        self.max_concurrent_reservations = self.max_concurrent_reservations.max(0);

        if self.max_duration_minutes > 0
            && self.min_duration_minutes > 0
            && self.max_duration_minutes < self.min_duration_minutes
        {
            warn!(
                max = self.max_duration_minutes,
                min = self.min_duration_minutes,
                "max_duration_minutes < min_duration_minutes, raising max to min"
            );
            self.max_duration_minutes = self.min_duration_minutes;
        }
    }
}

// ==========================================
// BookingCandidate - 待校验的预约请求
// ==========================================
#[derive(Debug, Clone)]
pub struct BookingCandidate {
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    /// 目标用户：有数字ID按ID匹配，否则按邮箱（大小写不敏感）
    pub user_id: Option<i64>,
    pub email: String,
    pub requester_name: String,
    pub is_admin: bool,
    pub is_staff: bool,
    /// 代他人预约标记（记录用途，不影响豁免资格）
    pub is_on_behalf: bool,
    /// 编辑既有预约时排除其自身的并发计数
    pub exclude_reservation_id: Option<i64>,
}

// ==========================================
// AvailabilitySnapshot - 可用性快照 (瞬时计算)
// ==========================================
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub model_id: i64,
    pub requested_qty: i64,
    /// 与窗口重叠的 PENDING/CONFIRMED 明细数量之和
    pub already_booked_qty: i64,
    pub total_requestable: i64,
    pub actively_issued: i64,
    /// max(0, total_requestable - actively_issued)
    pub available_now: i64,
}

impl AvailabilitySnapshot {
    /// 容量判定
    ///
    /// total_requestable == 0 表示该型号无受管实物台账，跳过容量检查
    /// （保留原系统行为，调用方会 warn 记录）。
    pub fn accepts(&self) -> bool {
        if self.total_requestable == 0 {
            return true;
        }
        self.already_booked_qty + self.requested_qty <= self.available_now
    }
}
