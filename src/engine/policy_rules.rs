// ==========================================
// 共享设备预约系统 - 策略规则引擎
// ==========================================
// 红线: 所有规则必须输出可读 reason
// 约束:
// - 四条规则独立评估，全部检查，结果累加（不短路）
// - 豁免按 (规则 × 角色) 独立判定；代他人预约不改变豁免资格
// - 时长/提前量以 天/小时/分钟 表达，省略为零的分量
// ==========================================

use crate::domain::policy::{BookingCandidate, Policy};
use crate::domain::types::PolicyRule;
use crate::repository::reservation_repo::ReservationRepository;
use crate::repository::RepositoryResult;
use chrono::{Duration, NaiveDateTime};
use std::sync::Arc;
use tracing::instrument;

/// 违规消息中的时间戳格式
const MSG_TS_FORMAT: &str = "%Y-%m-%d %H:%M";

// ==========================================
// PolicyRuleEngine - 策略规则引擎
// ==========================================
pub struct PolicyRuleEngine {
    reservation_repo: Arc<ReservationRepository>,
}

impl PolicyRuleEngine {
    /// 创建新的 PolicyRuleEngine 实例
    pub fn new(reservation_repo: Arc<ReservationRepository>) -> Self {
        Self { reservation_repo }
    }

    /// 校验候选预约，返回全部违规消息（空列表 = 通过）
    ///
    /// 规则顺序: 提前量 → 时长 → 并发 → 封锁时段
    #[instrument(skip(self, policy, candidate), fields(email = %candidate.email))]
    pub fn validate(
        &self,
        policy: &Policy,
        candidate: &BookingCandidate,
        now: NaiveDateTime,
    ) -> RepositoryResult<Vec<String>> {
        let mut violations = Vec::new();

        self.check_notice(policy, candidate, now, &mut violations);
        self.check_duration(policy, candidate, &mut violations);
        self.check_concurrency(policy, candidate, &mut violations)?;
        self.check_blackout(policy, candidate, &mut violations);

        Ok(violations)
    }

    /// 角色豁免判定
    ///
    /// 管理员仅在该规则 admin 开关打开时豁免，出借台员工同理；
    /// 两个开关相互独立，规则之间不继承。
    pub fn can_bypass(policy: &Policy, rule: PolicyRule, is_admin: bool, is_staff: bool) -> bool {
        let flags = policy.bypass.for_rule(rule);
        (is_admin && flags.admin) || (is_staff && flags.checkout_staff)
    }

    // === 规则 1: 提前量 ===
    fn check_notice(
        &self,
        policy: &Policy,
        candidate: &BookingCandidate,
        now: NaiveDateTime,
        violations: &mut Vec<String>,
    ) {
        if policy.notice_minutes <= 0 {
            return;
        }
        if Self::can_bypass(policy, PolicyRule::Notice, candidate.is_admin, candidate.is_staff) {
            return;
        }

        let earliest_start = now + Duration::minutes(policy.notice_minutes);
        if candidate.start_at < earliest_start {
            violations.push(format!(
                "Reservations must be made at least {} in advance",
                format_minutes(policy.notice_minutes)
            ));
        }
    }

    // === 规则 2: 时长上下限 ===
    // 配置归一化已保证 max >= min（两者均非 0 时）
    fn check_duration(
        &self,
        policy: &Policy,
        candidate: &BookingCandidate,
        violations: &mut Vec<String>,
    ) {
        if policy.min_duration_minutes <= 0 && policy.max_duration_minutes <= 0 {
            return;
        }
        if Self::can_bypass(policy, PolicyRule::Duration, candidate.is_admin, candidate.is_staff) {
            return;
        }

        let duration_minutes = (candidate.end_at - candidate.start_at).num_minutes();

        if policy.min_duration_minutes > 0 && duration_minutes < policy.min_duration_minutes {
            violations.push(format!(
                "Reservation must last at least {}",
                format_minutes(policy.min_duration_minutes)
            ));
        }
        if policy.max_duration_minutes > 0 && duration_minutes > policy.max_duration_minutes {
            violations.push(format!(
                "Reservation cannot be longer than {}",
                format_minutes(policy.max_duration_minutes)
            ));
        }
    }

    // === 规则 3: 并发预约上限 ===
    fn check_concurrency(
        &self,
        policy: &Policy,
        candidate: &BookingCandidate,
        violations: &mut Vec<String>,
    ) -> RepositoryResult<()> {
        if policy.max_concurrent_reservations <= 0 {
            return Ok(());
        }
        if Self::can_bypass(
            policy,
            PolicyRule::Concurrent,
            candidate.is_admin,
            candidate.is_staff,
        ) {
            return Ok(());
        }

        let count = self.reservation_repo.count_user_overlapping(
            candidate.user_id,
            &candidate.email,
            candidate.start_at,
            candidate.end_at,
            candidate.exclude_reservation_id,
        )?;

        if count >= policy.max_concurrent_reservations {
            violations.push(format!(
                "Concurrent reservation limit reached ({} of {} active)",
                count, policy.max_concurrent_reservations
            ));
        }
        Ok(())
    }

    // === 规则 4: 封锁时段 ===
    fn check_blackout(
        &self,
        policy: &Policy,
        candidate: &BookingCandidate,
        violations: &mut Vec<String>,
    ) {
        if Self::can_bypass(policy, PolicyRule::Blackout, candidate.is_admin, candidate.is_staff) {
            return;
        }

        // 一条规则一条消息，引用第一个命中的时段
        if let Some(slot) = policy
            .blackout_slots
            .iter()
            .find(|slot| slot.overlaps(candidate.start_at, candidate.end_at))
        {
            violations.push(format!(
                "Requested window falls inside a blackout period ({} -> {})",
                slot.start.format(MSG_TS_FORMAT),
                slot.end.format(MSG_TS_FORMAT)
            ));
        }
    }
}

/// 把总分钟数化为 "X days, Y hours, Z minutes"，省略为零的分量
pub fn format_minutes(total_minutes: i64) -> String {
    let total_minutes = total_minutes.max(0);
    let days = total_minutes / 1440;
    let hours = (total_minutes % 1440) / 60;
    let minutes = total_minutes % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{} day{}", days, if days == 1 { "" } else { "s" }));
    }
    if hours > 0 {
        parts.push(format!("{} hour{}", hours, if hours == 1 { "" } else { "s" }));
    }
    if minutes > 0 {
        parts.push(format!(
            "{} minute{}",
            minutes,
            if minutes == 1 { "" } else { "s" }
        ));
    }

    if parts.is_empty() {
        return "0 minutes".to_string();
    }
    parts.join(", ")
}
