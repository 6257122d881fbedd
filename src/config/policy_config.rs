// ==========================================
// 共享设备预约系统 - 策略配置管理器
// ==========================================
// 职责: 配置加载、查询、归一化为 Policy 值对象
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::policy::{BypassTable, Policy, RoleBypass};
use crate::domain::types::PolicyRule;
use crate::engine::blackout::BlackoutParser;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 爽约清扫 cutoff 默认值（分钟）
pub const DEFAULT_SWEEP_CUTOFF_MINUTES: i64 = 60;

/// 默认展示用日期时间格式（封锁时段解析优先使用）
pub const DEFAULT_DISPLAY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// 通知开关与收件人配置
#[derive(Debug, Clone, Default)]
pub struct NotificationSettings {
    pub notify_requester: bool,
    /// 出借台/管理员角色收件人（邮箱）
    pub staff_recipients: Vec<String>,
    /// 额外配置的收件人（邮箱）
    pub extra_recipients: Vec<String>,
}

// ==========================================
// PolicyConfigManager - 策略配置管理器
// ==========================================
pub struct PolicyConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl PolicyConfigManager {
    /// 创建新的 PolicyConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 PolicyConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value, updated_at)
               VALUES ('global', ?1, ?2, datetime('now'))
               ON CONFLICT(scope_id, key) DO UPDATE
               SET value = excluded.value, updated_at = excluded.updated_at"#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取整数配置（解析失败回落默认值并告警）
    fn get_i64_or_default(&self, key: &str, default: i64) -> Result<i64, Box<dyn Error>> {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        match raw.trim().parse::<i64>() {
            Ok(v) => Ok(v),
            Err(_) => {
                warn!(key, raw = %raw, "配置值不是合法整数，使用默认值 {}", default);
                Ok(default)
            }
        }
    }

    /// 读取布尔配置（"1"/"true" 视为真）
    fn get_bool_or_default(&self, key: &str, default: bool) -> Result<bool, Box<dyn Error>> {
        let raw = self.get_config_or_default(key, if default { "1" } else { "0" })?;
        let v = raw.trim().to_ascii_lowercase();
        Ok(v == "1" || v == "true")
    }

    /// 读取单条规则的角色豁免开关
    fn get_rule_bypass(&self, rule: PolicyRule) -> Result<RoleBypass, Box<dyn Error>> {
        let staff_key = format!("booking/bypass/{}/checkout_staff", rule.as_key());
        let admin_key = format!("booking/bypass/{}/admin", rule.as_key());
        Ok(RoleBypass {
            checkout_staff: self.get_bool_or_default(&staff_key, false)?,
            admin: self.get_bool_or_default(&admin_key, false)?,
        })
    }

    /// 展示用日期时间格式
    pub fn get_display_datetime_format(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default("display/datetime_format", DEFAULT_DISPLAY_DATETIME_FORMAT)
    }

    /// 解析完整预约策略（每次校验时调用，不缓存）
    ///
    /// 归一化规则:
    /// - 负值截断为 0
    /// - max_duration < min_duration 且均非 0 时抬升 max 到 min
    /// - 封锁时段文本经 BlackoutParser 解析为规范化区间
    pub fn resolve_policy(&self) -> Result<Policy, Box<dyn Error>> {
        let display_format = self.get_display_datetime_format()?;
        let parser = BlackoutParser::new(&display_format);
        let blackout_raw = self.get_config_or_default("booking/blackout_slots", "")?;

        let mut policy = Policy {
            notice_minutes: self.get_i64_or_default("booking/notice_minutes", 0)?,
            min_duration_minutes: self.get_i64_or_default("booking/min_duration_minutes", 0)?,
            max_duration_minutes: self.get_i64_or_default("booking/max_duration_minutes", 0)?,
            max_concurrent_reservations: self.get_i64_or_default("booking/max_concurrent", 0)?,
            blackout_slots: parser.parse_text(&blackout_raw),
            bypass: BypassTable {
                notice: self.get_rule_bypass(PolicyRule::Notice)?,
                duration: self.get_rule_bypass(PolicyRule::Duration)?,
                concurrent: self.get_rule_bypass(PolicyRule::Concurrent)?,
                blackout: self.get_rule_bypass(PolicyRule::Blackout)?,
            },
        };
        policy.normalize();
        Ok(policy)
    }

    /// 爽约清扫 cutoff（分钟，最小 1）
    pub fn get_sweep_cutoff_minutes(&self) -> Result<i64, Box<dyn Error>> {
        let v = self.get_i64_or_default("sweep/cutoff_minutes", DEFAULT_SWEEP_CUTOFF_MINUTES)?;
        Ok(v.max(1))
    }

    /// 通知配置
    pub fn get_notification_settings(&self) -> Result<NotificationSettings, Box<dyn Error>> {
        let split_emails = |raw: String| -> Vec<String> {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        Ok(NotificationSettings {
            notify_requester: self.get_bool_or_default("notify/requester_enabled", true)?,
            staff_recipients: split_emails(
                self.get_config_or_default("notify/staff_emails", "")?,
            ),
            extra_recipients: split_emails(
                self.get_config_or_default("notify/extra_recipients", "")?,
            ),
        })
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 排障时记录策略评估所依据的完整配置
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }
}
