// ==========================================
// 共享设备预约系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 预约排程与策略引擎（可用性/策略/事务/清扫/报表）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{PolicyRule, ReservationStatus};

// 领域实体
pub use domain::{
    AvailabilitySnapshot, BlackoutSlot, BookingCandidate, BypassTable, NewReservation,
    NewReservationItem, Policy, Reservation, ReservationItem, RoleBypass,
};

// 引擎
pub use engine::{
    AvailabilityCalculator, BlackoutParser, BookingCoordinator, BookingError, MissedSweeper,
    PolicyRuleEngine, SweepOutcome, UtilizationAggregator, UtilizationReport,
};

// API
pub use api::{ApiError, BookingApi, ReportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "共享设备预约系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

// ==========================================
// 预编译检查
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
