// ==========================================
// 共享设备预约系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把内层错误转换为面向用户的单条消息
// 约束: 引擎产出的英文 reason 原样透传，不二次包装
// ==========================================

use crate::engine::booking::BookingError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("无效输入: {0}")]
    InvalidInput(String),

    /// 预约流程错误（策略违规/型号缺失/容量不足/存储失败），消息面向用户
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} id={}", entity, id))
            }
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
