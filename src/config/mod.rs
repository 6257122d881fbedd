// ==========================================
// 共享设备预约系统 - 配置层
// ==========================================
// 职责: 把 config_kv 原始键值解析为类型化策略对象
// ==========================================

pub mod policy_config;

pub use policy_config::{
    NotificationSettings, PolicyConfigManager, DEFAULT_DISPLAY_DATETIME_FORMAT,
    DEFAULT_SWEEP_CUTOFF_MINUTES,
};
