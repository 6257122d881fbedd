// ==========================================
// 共享设备预约系统 - 预约事务协调器
// ==========================================
// 红线: 任一明细不满足即整单失败，绝不部分预约
// 约束:
// - 写入前完成全部前置校验（策略 → 型号存在 → 容量）
// - 预约 + 明细在单一数据库事务内提交
// - 通知在提交之后尽力投递，失败只记录
// ==========================================
// 已知缺口（保留原系统行为，未引入新并发控制机制）:
// 可用性读取与写入不在同一把跨进程锁内。进程内所有访问共享同一
// Arc<Mutex<Connection>>，天然串行；跨进程并发仍可能双双看到余量
// 并都提交，造成超订。
// ==========================================

use crate::config::PolicyConfigManager;
use crate::domain::policy::BookingCandidate;
use crate::domain::reservation::{NewReservation, NewReservationItem};
use crate::engine::availability::AvailabilityCalculator;
use crate::engine::collaborators::{
    CollaboratorError, InventoryProvider, ModelLookup, NotificationSender,
};
use crate::engine::notify::fan_out;
use crate::engine::policy_rules::PolicyRuleEngine;
use crate::repository::reservation_repo::ReservationRepository;
use crate::repository::RepositoryError;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// 预约提交错误
///
/// 仅 Persistence 对调用方可重试，其余需要修改输入。
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("{0}")]
    InvalidInput(String),

    /// 只携带第一条违规消息（现行契约；完整列表走 validate 接口）
    #[error("{0}")]
    PolicyViolation(String),

    #[error("Model {0} not found")]
    ModelNotFound(i64),

    #[error("Model {model_id}: Requested {requested}, already booked {already_booked}, total available {available}")]
    InsufficientAvailability {
        model_id: i64,
        requested: i64,
        already_booked: i64,
        available: i64,
    },

    #[error("Storage failure: {0}")]
    Persistence(String),
}

impl From<RepositoryError> for BookingError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                BookingError::InvalidInput(format!("{} {} not found", entity, id))
            }
            other => BookingError::Persistence(other.to_string()),
        }
    }
}

// ==========================================
// BookingCoordinator - 预约事务协调器
// ==========================================
pub struct BookingCoordinator<M, I, N>
where
    M: ModelLookup,
    I: InventoryProvider,
    N: NotificationSender,
{
    reservation_repo: Arc<ReservationRepository>,
    rule_engine: PolicyRuleEngine,
    availability: AvailabilityCalculator,
    config: Arc<PolicyConfigManager>,
    models: Arc<M>,
    inventory: Arc<I>,
    notifier: Arc<N>,
}

impl<M, I, N> BookingCoordinator<M, I, N>
where
    M: ModelLookup,
    I: InventoryProvider,
    N: NotificationSender,
{
    /// 创建新的 BookingCoordinator 实例
    pub fn new(
        reservation_repo: Arc<ReservationRepository>,
        config: Arc<PolicyConfigManager>,
        models: Arc<M>,
        inventory: Arc<I>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            rule_engine: PolicyRuleEngine::new(reservation_repo.clone()),
            availability: AvailabilityCalculator::new(reservation_repo.clone()),
            reservation_repo,
            config,
            models,
            inventory,
            notifier,
        }
    }

    /// 提交预约（原子）
    ///
    /// # 参数
    /// - candidate: 请求人上下文 + 预约窗口
    /// - basket: model_id → qty，调用方显式传入（不依赖会话态）
    /// - now: 当前时刻（提前量规则基准）
    ///
    /// # 返回
    /// - Ok(reservation_id): 预约已提交，状态 PENDING
    /// - Err: 无任何落库写入
    #[instrument(skip(self, candidate, basket), fields(email = %candidate.email, lines = basket.len()))]
    pub async fn submit_booking(
        &self,
        candidate: &BookingCandidate,
        basket: BTreeMap<i64, i64>,
        now: NaiveDateTime,
    ) -> Result<i64, BookingError> {
        // === 步骤 1: 前置校验（不触库） ===
        if candidate.end_at <= candidate.start_at {
            return Err(BookingError::InvalidInput(
                "Reservation end must be after start".to_string(),
            ));
        }
        if basket.is_empty() {
            return Err(BookingError::InvalidInput(
                "Reservation basket is empty".to_string(),
            ));
        }
        for (&model_id, &qty) in &basket {
            if model_id <= 0 || qty < 1 {
                return Err(BookingError::InvalidInput(format!(
                    "Invalid basket line: model_id={}, qty={}",
                    model_id, qty
                )));
            }
        }

        // === 步骤 2: 策略校验（第一条违规即整单拒绝，无写入） ===
        let policy = self
            .config
            .resolve_policy()
            .map_err(|e| BookingError::Persistence(e.to_string()))?;
        let violations = self.rule_engine.validate(&policy, candidate, now)?;
        if let Some(first) = violations.into_iter().next() {
            return Err(BookingError::PolicyViolation(first));
        }

        // === 步骤 3: 逐明细检查型号存在与容量（BTreeMap 保证确定顺序） ===
        let mut items = Vec::with_capacity(basket.len());
        for (&model_id, &qty) in &basket {
            let model = self.models.get_model(model_id).await.map_err(|e| match e {
                CollaboratorError::ModelNotFound(id) => BookingError::ModelNotFound(id),
                CollaboratorError::Unavailable(msg) => BookingError::Persistence(msg),
            })?;

            let total = self
                .inventory
                .total_requestable_units(model_id)
                .await
                .map_err(|e| BookingError::Persistence(e.to_string()))?;
            let issued = self
                .inventory
                .actively_issued_units(model_id)
                .await
                .map_err(|e| BookingError::Persistence(e.to_string()))?;

            let snapshot = self.availability.compute_headroom(
                model_id,
                candidate.start_at,
                candidate.end_at,
                total,
                issued,
                qty,
            )?;

            if !snapshot.accepts() {
                return Err(BookingError::InsufficientAvailability {
                    model_id,
                    requested: qty,
                    already_booked: snapshot.already_booked_qty,
                    available: snapshot.available_now,
                });
            }

            items.push(NewReservationItem {
                model_id,
                model_name: model.name,
                qty,
            });
        }

        // === 步骤 4: 单事务落库（预约 + 全部明细，失败整体回滚） ===
        let reservation = NewReservation {
            requester_name: candidate.requester_name.clone(),
            requester_email: candidate.email.clone(),
            requester_user_id: candidate.user_id,
            start_at: candidate.start_at,
            end_at: candidate.end_at,
        };
        let reservation_id = self
            .reservation_repo
            .insert_with_items(&reservation, &items)
            .map_err(|e| BookingError::Persistence(e.to_string()))?;

        info!(reservation_id, "预约已提交 (PENDING)");

        // === 步骤 5: 提交后通知（尽力而为，不回滚） ===
        self.notify_submitted(candidate, reservation_id, &items).await;

        Ok(reservation_id)
    }

    /// 投递“预约已提交”通知
    async fn notify_submitted(
        &self,
        candidate: &BookingCandidate,
        reservation_id: i64,
        items: &[NewReservationItem],
    ) {
        let settings = match self.config.get_notification_settings() {
            Ok(s) => s,
            Err(e) => {
                warn!(reservation_id, error = %e, "通知配置读取失败，跳过投递");
                return;
            }
        };

        let subject = format!("Reservation #{} submitted", reservation_id);
        let mut body_lines = vec![
            format!(
                "Window: {} -> {}",
                candidate.start_at.format("%Y-%m-%d %H:%M"),
                candidate.end_at.format("%Y-%m-%d %H:%M")
            ),
            "Status: PENDING".to_string(),
        ];
        for item in items {
            body_lines.push(format!("{} x {}", item.model_name, item.qty));
        }

        let result = fan_out(
            self.notifier.as_ref(),
            &settings,
            &candidate.email,
            &candidate.requester_name,
            &subject,
            &body_lines,
        )
        .await;

        if result.failed > 0 {
            warn!(
                reservation_id,
                failed = result.failed,
                "部分预约通知投递失败（预约本身已提交）"
            );
        }
    }
}
