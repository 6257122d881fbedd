// ==========================================
// 共享设备预约系统 - 爽约清扫引擎
// ==========================================
// 职责: 周期批处理，把逾期未到场的 PENDING/CONFIRMED 预约标记为 MISSED
// 约束:
// - 选改同事务；事务失败则本轮零标记，等待下一轮自然重试
// - 幂等来自谓词本身（已 MISSED 的行不再命中），不依赖互斥
// - 通知在提交后投递，失败计数不影响已提交的状态变更
// ==========================================

use crate::config::PolicyConfigManager;
use crate::engine::collaborators::NotificationSender;
use crate::engine::notify::fan_out;
use crate::repository::reservation_repo::ReservationRepository;
use crate::repository::RepositoryResult;
use chrono::{Duration, NaiveDateTime};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 单轮清扫结果
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// 本轮运行关联ID（日志排查用）
    pub sweep_id: Uuid,
    pub marked_count: u64,
    pub notified_count: u64,
    pub failed_count: u64,
}

// ==========================================
// MissedSweeper - 爽约清扫器
// ==========================================
pub struct MissedSweeper<N>
where
    N: NotificationSender,
{
    reservation_repo: Arc<ReservationRepository>,
    config: Arc<PolicyConfigManager>,
    notifier: Arc<N>,
}

impl<N> MissedSweeper<N>
where
    N: NotificationSender,
{
    /// 创建新的 MissedSweeper 实例
    pub fn new(
        reservation_repo: Arc<ReservationRepository>,
        config: Arc<PolicyConfigManager>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            reservation_repo,
            config,
            notifier,
        }
    }

    /// 按配置的 cutoff 运行一轮清扫
    pub async fn run_with_configured_cutoff(
        &self,
        now: NaiveDateTime,
    ) -> RepositoryResult<SweepOutcome> {
        let cutoff_minutes = self
            .config
            .get_sweep_cutoff_minutes()
            .map_err(|e| crate::repository::RepositoryError::InternalError(e.to_string()))?;
        self.run(cutoff_minutes, now).await
    }

    /// 运行一轮清扫
    ///
    /// # 参数
    /// - cutoff_minutes: 开始时间早于 now - cutoff 的预约视为爽约（最小 1）
    /// - now: 当前时刻
    ///
    /// # 返回
    /// - SweepOutcome: 标记数 / 已通知数 / 投递失败数
    #[instrument(skip(self), fields(cutoff_minutes))]
    pub async fn run(
        &self,
        cutoff_minutes: i64,
        now: NaiveDateTime,
    ) -> RepositoryResult<SweepOutcome> {
        let sweep_id = Uuid::new_v4();
        let cutoff = now - Duration::minutes(cutoff_minutes.max(1));

        let swept = self.reservation_repo.sweep_mark_missed(cutoff)?;

        let mut outcome = SweepOutcome {
            sweep_id,
            marked_count: swept.len() as u64,
            notified_count: 0,
            failed_count: 0,
        };

        if swept.is_empty() {
            info!(%sweep_id, "本轮无逾期预约");
            return Ok(outcome);
        }

        // 提交已完成，通知失败只计数
        let settings = match self.config.get_notification_settings() {
            Ok(s) => s,
            Err(e) => {
                warn!(%sweep_id, error = %e, "通知配置读取失败，本轮跳过全部投递");
                return Ok(outcome);
            }
        };

        for reservation in &swept {
            let subject = format!(
                "Reservation #{} marked as missed",
                reservation.reservation_id
            );
            let body_lines = vec![
                format!(
                    "Window: {} -> {}",
                    reservation.start_at.format("%Y-%m-%d %H:%M"),
                    reservation.end_at.format("%Y-%m-%d %H:%M")
                ),
                "The reservation start time passed without pickup.".to_string(),
            ];

            let result = fan_out(
                self.notifier.as_ref(),
                &settings,
                &reservation.requester_email,
                &reservation.requester_name,
                &subject,
                &body_lines,
            )
            .await;

            outcome.notified_count += result.notified;
            outcome.failed_count += result.failed;
        }

        info!(
            %sweep_id,
            marked = outcome.marked_count,
            notified = outcome.notified_count,
            failed = outcome.failed_count,
            "爽约清扫完成"
        );
        Ok(outcome)
    }
}
