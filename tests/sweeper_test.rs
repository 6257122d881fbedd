// ==========================================
// 爽约清扫集成测试
// ==========================================
// 覆盖: 清扫口径、边界、幂等性、状态过滤、通知扇出、配置 cutoff
// ==========================================

mod helpers;
mod test_helpers;

use equip_reservation::config::PolicyConfigManager;
use equip_reservation::engine::collaborators::CountingNotificationSender;
use equip_reservation::repository::reservation_repo::ReservationRepository;
use equip_reservation::{MissedSweeper, ReservationStatus};
use helpers::test_data_builder::ReservationBuilder;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use test_helpers::{create_test_db, dt, open_shared_connection};

struct SweepRig {
    _tmp: tempfile::NamedTempFile,
    conn: Arc<Mutex<Connection>>,
    repo: Arc<ReservationRepository>,
    config: Arc<PolicyConfigManager>,
    notifier: Arc<CountingNotificationSender>,
    sweeper: MissedSweeper<CountingNotificationSender>,
}

fn rig() -> SweepRig {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared_connection(&db_path).unwrap();
    let repo = Arc::new(ReservationRepository::new(conn.clone()));
    let config = Arc::new(PolicyConfigManager::from_connection(conn.clone()).unwrap());
    let notifier = Arc::new(CountingNotificationSender::new());
    let sweeper = MissedSweeper::new(repo.clone(), config.clone(), notifier.clone());
    SweepRig {
        _tmp,
        conn,
        repo,
        config,
        notifier,
        sweeper,
    }
}

#[tokio::test]
async fn test_sweep_marks_overdue_and_notifies_requester() {
    let rig = rig();
    let now = dt("2026-07-01 12:00");

    // 开始时间 90 分钟前仍 PENDING，cutoff 60 分钟
    let reservation_id;
    {
        let guard = rig.conn.lock().unwrap();
        reservation_id = ReservationBuilder::new(dt("2026-07-01 10:30"), dt("2026-07-01 13:00"))
            .requester("Alice", "alice@example.com")
            .insert(&guard)
            .unwrap();
    }

    let outcome = rig.sweeper.run(60, now).await.unwrap();
    assert_eq!(outcome.marked_count, 1);
    assert_eq!(outcome.notified_count, 1);
    assert_eq!(outcome.failed_count, 0);

    let reservation = rig.repo.find_by_id(reservation_id).unwrap().unwrap();
    assert_eq!(reservation.status, ReservationStatus::Missed);

    let messages = rig.notifier.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "alice@example.com");
    assert_eq!(
        messages[0].1,
        format!("Reservation #{} marked as missed", reservation_id)
    );
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let rig = rig();
    let now = dt("2026-07-01 12:00");

    {
        let guard = rig.conn.lock().unwrap();
        ReservationBuilder::new(dt("2026-07-01 10:00"), dt("2026-07-01 13:00"))
            .insert(&guard)
            .unwrap();
    }

    let first = rig.sweeper.run(60, now).await.unwrap();
    assert_eq!(first.marked_count, 1);

    // 谓词不再命中已 MISSED 的行 → 第二轮零标记零通知
    let second = rig.sweeper.run(60, now).await.unwrap();
    assert_eq!(second.marked_count, 0);
    assert_eq!(second.notified_count, 0);
    assert_eq!(rig.notifier.sent_count(), 1);
    assert_ne!(first.sweep_id, second.sweep_id);
}

#[tokio::test]
async fn test_sweep_cutoff_boundary_is_strict() {
    let rig = rig();
    let now = dt("2026-07-01 12:00");

    let at_cutoff;
    let past_cutoff;
    {
        let guard = rig.conn.lock().unwrap();
        // start == cutoff 不清扫（严格小于）
        at_cutoff = ReservationBuilder::new(dt("2026-07-01 11:00"), dt("2026-07-01 14:00"))
            .insert(&guard)
            .unwrap();
        past_cutoff = ReservationBuilder::new(dt("2026-07-01 10:59"), dt("2026-07-01 14:00"))
            .insert(&guard)
            .unwrap();
    }

    let outcome = rig.sweeper.run(60, now).await.unwrap();
    assert_eq!(outcome.marked_count, 1);

    let kept = rig.repo.find_by_id(at_cutoff).unwrap().unwrap();
    assert_eq!(kept.status, ReservationStatus::Pending);
    let swept = rig.repo.find_by_id(past_cutoff).unwrap().unwrap();
    assert_eq!(swept.status, ReservationStatus::Missed);
}

#[tokio::test]
async fn test_sweep_status_scope() {
    let rig = rig();
    let now = dt("2026-07-01 12:00");

    let confirmed;
    let completed;
    let cancelled;
    {
        let guard = rig.conn.lock().unwrap();
        confirmed = ReservationBuilder::new(dt("2026-07-01 09:00"), dt("2026-07-01 10:00"))
            .status(ReservationStatus::Confirmed)
            .insert(&guard)
            .unwrap();
        completed = ReservationBuilder::new(dt("2026-07-01 09:00"), dt("2026-07-01 10:00"))
            .status(ReservationStatus::Completed)
            .insert(&guard)
            .unwrap();
        cancelled = ReservationBuilder::new(dt("2026-07-01 09:00"), dt("2026-07-01 10:00"))
            .status(ReservationStatus::Cancelled)
            .insert(&guard)
            .unwrap();
    }

    let outcome = rig.sweeper.run(60, now).await.unwrap();
    assert_eq!(outcome.marked_count, 1);

    // CONFIRMED 逾期同样清扫，终态不动
    assert_eq!(
        rig.repo.find_by_id(confirmed).unwrap().unwrap().status,
        ReservationStatus::Missed
    );
    assert_eq!(
        rig.repo.find_by_id(completed).unwrap().unwrap().status,
        ReservationStatus::Completed
    );
    assert_eq!(
        rig.repo.find_by_id(cancelled).unwrap().unwrap().status,
        ReservationStatus::Cancelled
    );
}

#[tokio::test]
async fn test_sweep_uses_configured_cutoff() {
    let rig = rig();
    let now = dt("2026-07-01 12:00");
    rig.config
        .set_global_config_value("sweep/cutoff_minutes", "30")
        .unwrap();

    {
        let guard = rig.conn.lock().unwrap();
        // 45 分钟前开始：在配置的 30 分钟 cutoff 下视为逾期
        ReservationBuilder::new(dt("2026-07-01 11:15"), dt("2026-07-01 14:00"))
            .insert(&guard)
            .unwrap();
    }

    let outcome = rig.sweeper.run_with_configured_cutoff(now).await.unwrap();
    assert_eq!(outcome.marked_count, 1);
}

#[tokio::test]
async fn test_sweep_cutoff_clamped_to_one_minute() {
    let rig = rig();
    let now = dt("2026-07-01 12:00");

    let recent;
    let overdue;
    {
        let guard = rig.conn.lock().unwrap();
        // cutoff 0 按 1 分钟处理：恰好 1 分钟前开始的不清扫
        recent = ReservationBuilder::new(dt("2026-07-01 11:59"), dt("2026-07-01 14:00"))
            .insert(&guard)
            .unwrap();
        overdue = ReservationBuilder::new(dt("2026-07-01 11:57"), dt("2026-07-01 14:00"))
            .insert(&guard)
            .unwrap();
    }

    let outcome = rig.sweeper.run(0, now).await.unwrap();
    assert_eq!(outcome.marked_count, 1);
    assert_eq!(
        rig.repo.find_by_id(recent).unwrap().unwrap().status,
        ReservationStatus::Pending
    );
    assert_eq!(
        rig.repo.find_by_id(overdue).unwrap().unwrap().status,
        ReservationStatus::Missed
    );
}

#[tokio::test]
async fn test_sweep_notification_fan_out_includes_staff() {
    let rig = rig();
    let now = dt("2026-07-01 12:00");
    rig.config
        .set_global_config_value("notify/staff_emails", "desk@example.com, lab@example.com")
        .unwrap();

    {
        let guard = rig.conn.lock().unwrap();
        ReservationBuilder::new(dt("2026-07-01 10:00"), dt("2026-07-01 13:00"))
            .requester("Alice", "alice@example.com")
            .insert(&guard)
            .unwrap();
    }

    let outcome = rig.sweeper.run(60, now).await.unwrap();
    assert_eq!(outcome.marked_count, 1);
    // 请求人 + 两个出借台收件人
    assert_eq!(outcome.notified_count, 3);

    let messages = rig.notifier.messages.lock().unwrap();
    let recipients: Vec<&str> = messages.iter().map(|(to, _)| to.as_str()).collect();
    assert_eq!(
        recipients,
        vec!["alice@example.com", "desk@example.com", "lab@example.com"]
    );
}
