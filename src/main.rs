// ==========================================
// 共享设备预约系统 - 清扫调度主入口
// ==========================================
// 职责: 初始化数据库与日志，按固定周期驱动爽约清扫
// 说明: 预约提交/报表由上层服务经 BookingApi / ReportApi 调用，
//       本进程只承担周期批处理
// ==========================================

use equip_reservation::config::PolicyConfigManager;
use equip_reservation::engine::collaborators::NoOpNotificationSender;
use equip_reservation::engine::sweeper::MissedSweeper;
use equip_reservation::repository::reservation_repo::ReservationRepository;
use equip_reservation::{db, i18n, logging};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认清扫周期（秒）
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;

/// 数据库默认路径: <data_dir>/equip-reservation/equip_reservation.db
fn default_db_path() -> String {
    if let Ok(path) = std::env::var("EQUIP_RESERVATION_DB") {
        return path;
    }

    let mut dir = dirs::data_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    dir.push("equip-reservation");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(error = %e, "数据目录创建失败，退回当前目录");
        return "equip_reservation.db".to_string();
    }
    dir.push("equip_reservation.db");
    dir.to_string_lossy().to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", i18n::t("app.started"));
    tracing::info!("系统版本: {}", equip_reservation::VERSION);
    tracing::info!("==================================================");

    let db_path = default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;
    match db::read_schema_version(&conn)? {
        Some(v) if v == db::CURRENT_SCHEMA_VERSION => {
            tracing::info!("{} (schema_version={})", i18n::t("app.db_ready"), v);
        }
        Some(v) => {
            tracing::warn!(
                "schema_version={} 与期望 {} 不一致，请检查迁移状态",
                v,
                db::CURRENT_SCHEMA_VERSION
            );
        }
        None => tracing::warn!("schema_version 表缺失"),
    }

    let conn = Arc::new(Mutex::new(conn));
    let reservation_repo = Arc::new(ReservationRepository::new(conn.clone()));
    let config = Arc::new(
        PolicyConfigManager::from_connection(conn)
            .map_err(|e| anyhow::anyhow!("配置管理器初始化失败: {}", e))?,
    );
    let sweeper = MissedSweeper::new(reservation_repo, config, Arc::new(NoOpNotificationSender));

    let interval_secs = std::env::var("SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&s| s > 0)
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
    tracing::info!("清扫周期: {}s", interval_secs);

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;

        let now = chrono::Local::now().naive_local();
        match sweeper.run_with_configured_cutoff(now).await {
            Ok(outcome) => {
                tracing::info!(
                    sweep_id = %outcome.sweep_id,
                    "{}",
                    i18n::t_with_args(
                        "sweep.completed",
                        &[("count", &outcome.marked_count.to_string())]
                    )
                );
            }
            Err(e) => {
                // 本轮失败零标记，下一轮自然重试
                tracing::error!(error = %e, "爽约清扫运行失败");
            }
        }
    }
}
