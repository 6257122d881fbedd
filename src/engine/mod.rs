// ==========================================
// 共享设备预约系统 - 引擎层
// ==========================================
// 职责: 实现预约业务规则，不拼 SQL
// 红线: Engine 不拼 SQL, 所有规则必须输出 reason
// ==========================================

pub mod availability;
pub mod blackout;
pub mod booking;
pub mod collaborators;
pub mod notify;
pub mod policy_rules;
pub mod reporting;
pub mod sweeper;

// 重导出核心引擎
pub use availability::AvailabilityCalculator;
pub use blackout::BlackoutParser;
pub use booking::{BookingCoordinator, BookingError};
pub use collaborators::{
    CollaboratorError, CountingNotificationSender, EquipmentModel, InMemoryInventory,
    InMemoryModelDirectory, InventoryProvider, ModelLookup, NoOpNotificationSender,
    NotificationSender,
};
pub use notify::{fan_out, FanOutResult};
pub use policy_rules::{format_minutes, PolicyRuleEngine};
pub use reporting::{
    CategoryUtilizationRow, DailyTrendRow, HourlyDemandRow, ModelUtilizationRow,
    UtilizationAggregator, UtilizationReport,
};
pub use sweeper::{MissedSweeper, SweepOutcome};
