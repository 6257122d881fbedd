// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时测试数据库初始化、共享连接装配、常用测试值构造
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDateTime;
use equip_reservation::db;
use equip_reservation::domain::policy::BookingCandidate;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（与生产装配一致的 Arc<Mutex<Connection>>）
pub fn open_shared_connection(db_path: &str) -> Result<Arc<Mutex<Connection>>, Box<dyn Error>> {
    let conn = db::open_sqlite_connection(db_path)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 解析 "YYYY-MM-DD HH:MM" 为 NaiveDateTime
pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .unwrap_or_else(|e| panic!("invalid test timestamp {}: {}", s, e))
}

/// 构造普通用户的预约请求（无角色、无排除）
pub fn base_candidate(start_at: NaiveDateTime, end_at: NaiveDateTime) -> BookingCandidate {
    BookingCandidate {
        start_at,
        end_at,
        user_id: None,
        email: "alice@example.com".to_string(),
        requester_name: "Alice".to_string(),
        is_admin: false,
        is_staff: false,
        is_on_behalf: false,
        exclude_reservation_id: None,
    }
}
