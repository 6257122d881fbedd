// ==========================================
// 共享设备预约系统 - 外部协作方接口
// ==========================================
// 职责: 本核心不做认证/库存/消息投递，只定义边界 trait
// 约束: 外部松散结构在这里一次性解析为类型化对象，
//       之后不再传递未类型化数据
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// 协作方调用错误
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("设备型号不存在: model_id={0}")]
    ModelNotFound(i64),

    #[error("外部系统调用失败: {0}")]
    Unavailable(String),
}

/// 设备型号（外部目录返回的形状，边界处一次性解析）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentModel {
    pub id: i64,
    pub name: String,
    pub category: String,
}

// ==========================================
// ModelLookup - 型号目录
// ==========================================
#[async_trait]
pub trait ModelLookup: Send + Sync {
    /// 按ID查询型号；缺失返回 ModelNotFound
    async fn get_model(&self, model_id: i64) -> Result<EquipmentModel, CollaboratorError>;
}

// ==========================================
// InventoryProvider - 外部库存台账
// ==========================================
// 计数由外部系统维护，可能滞后/缓存
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// 可预约总台数（0 = 无受管实物台账）
    async fn total_requestable_units(&self, model_id: i64) -> Result<i64, CollaboratorError>;

    /// 当前已借出台数
    async fn actively_issued_units(&self, model_id: i64) -> Result<i64, CollaboratorError>;
}

// ==========================================
// NotificationSender - 消息投递
// ==========================================
// 尽力而为，失败只记录不回滚
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 返回 true 表示投递成功
    async fn send(&self, to_email: &str, to_name: &str, subject: &str, body_lines: &[String])
        -> bool;
}

// ==========================================
// 进程内简单实现（测试与独立运行使用）
// ==========================================

/// 基于 HashMap 的型号目录
#[derive(Debug, Default)]
pub struct InMemoryModelDirectory {
    models: HashMap<i64, EquipmentModel>,
}

impl InMemoryModelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, id: i64, name: &str, category: &str) -> Self {
        self.models.insert(
            id,
            EquipmentModel {
                id,
                name: name.to_string(),
                category: category.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl ModelLookup for InMemoryModelDirectory {
    async fn get_model(&self, model_id: i64) -> Result<EquipmentModel, CollaboratorError> {
        self.models
            .get(&model_id)
            .cloned()
            .ok_or(CollaboratorError::ModelNotFound(model_id))
    }
}

/// 基于 HashMap 的库存台账（未登记的型号计为 0 台）
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    counts: HashMap<i64, (i64, i64)>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记型号台账: (可预约总数, 已借出数)
    pub fn with_counts(mut self, model_id: i64, total: i64, issued: i64) -> Self {
        self.counts.insert(model_id, (total, issued));
        self
    }
}

#[async_trait]
impl InventoryProvider for InMemoryInventory {
    async fn total_requestable_units(&self, model_id: i64) -> Result<i64, CollaboratorError> {
        Ok(self.counts.get(&model_id).map(|c| c.0).unwrap_or(0))
    }

    async fn actively_issued_units(&self, model_id: i64) -> Result<i64, CollaboratorError> {
        Ok(self.counts.get(&model_id).map(|c| c.1).unwrap_or(0))
    }
}

/// 丢弃所有通知的空实现
#[derive(Debug, Default)]
pub struct NoOpNotificationSender;

#[async_trait]
impl NotificationSender for NoOpNotificationSender {
    async fn send(
        &self,
        _to_email: &str,
        _to_name: &str,
        _subject: &str,
        _body_lines: &[String],
    ) -> bool {
        true
    }
}

/// 记录投递并可模拟失败的计数实现（测试用）
#[derive(Debug, Default)]
pub struct CountingNotificationSender {
    sent: AtomicUsize,
    fail_all: bool,
    /// (to_email, subject)
    pub messages: Mutex<Vec<(String, String)>>,
}

impl CountingNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟全部投递失败
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// 已尝试投递次数
    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSender for CountingNotificationSender {
    async fn send(
        &self,
        to_email: &str,
        _to_name: &str,
        subject: &str,
        _body_lines: &[String],
    ) -> bool {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if self.fail_all {
            return false;
        }
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((to_email.to_string(), subject.to_string()));
        }
        true
    }
}
