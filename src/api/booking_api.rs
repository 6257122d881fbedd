// ==========================================
// 共享设备预约系统 - 预约接口
// ==========================================
// 职责: 输入守卫 + 委托引擎；对外只暴露单条可读失败消息
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::PolicyConfigManager;
use crate::domain::policy::BookingCandidate;
use crate::engine::booking::BookingCoordinator;
use crate::engine::collaborators::{InventoryProvider, ModelLookup, NotificationSender};
use crate::engine::policy_rules::PolicyRuleEngine;
use crate::repository::reservation_repo::ReservationRepository;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// BookingApi - 预约接口
// ==========================================
pub struct BookingApi<M, I, N>
where
    M: ModelLookup,
    I: InventoryProvider,
    N: NotificationSender,
{
    coordinator: BookingCoordinator<M, I, N>,
    rule_engine: PolicyRuleEngine,
    config: Arc<PolicyConfigManager>,
}

impl<M, I, N> BookingApi<M, I, N>
where
    M: ModelLookup,
    I: InventoryProvider,
    N: NotificationSender,
{
    /// 从共享连接装配预约接口
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        models: Arc<M>,
        inventory: Arc<I>,
        notifier: Arc<N>,
    ) -> Result<Self, Box<dyn Error>> {
        let reservation_repo = Arc::new(ReservationRepository::new(conn.clone()));
        let config = Arc::new(PolicyConfigManager::from_connection(conn)?);

        Ok(Self {
            coordinator: BookingCoordinator::new(
                reservation_repo.clone(),
                config.clone(),
                models,
                inventory,
                notifier,
            ),
            rule_engine: PolicyRuleEngine::new(reservation_repo),
            config,
        })
    }

    /// 提交预约
    ///
    /// # 参数
    /// - candidate: 请求人上下文 + 预约窗口（调用方负责认证）
    /// - basket: model_id → qty，显式载荷
    /// - now: 当前时刻
    ///
    /// # 返回
    /// - Ok(reservation_id): 预约已提交
    /// - Err(ApiError): 单条失败消息；任何失败均无落库写入
    pub async fn submit_booking(
        &self,
        candidate: &BookingCandidate,
        basket: BTreeMap<i64, i64>,
        now: NaiveDateTime,
    ) -> ApiResult<i64> {
        if candidate.email.trim().is_empty() {
            return Err(ApiError::InvalidInput("请求人邮箱不能为空".to_string()));
        }

        let reservation_id = self.coordinator.submit_booking(candidate, basket, now).await?;
        Ok(reservation_id)
    }

    /// 独立策略校验（提交前的界面反馈用）
    ///
    /// # 返回
    /// - Ok(violations): 全部违规消息，空列表 = 当前策略下可提交
    ///
    /// 性质: violations 为空 ⇔ 相同策略与容量状态下 submit_booking 不会
    /// 因策略规则失败（容量不足仍可能拒绝）。
    pub fn validate(
        &self,
        candidate: &BookingCandidate,
        now: NaiveDateTime,
    ) -> ApiResult<Vec<String>> {
        let policy = self
            .config
            .resolve_policy()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let violations = self.rule_engine.validate(&policy, candidate, now)?;
        Ok(violations)
    }
}
