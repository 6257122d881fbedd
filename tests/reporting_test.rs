// ==========================================
// 利用率与需求报表集成测试
// ==========================================
// 覆盖: unit-hours 口径、类目归集守恒、时段桶、旧数据回退、趋势、失败隔离
// ==========================================

mod helpers;
mod test_helpers;

use chrono::NaiveDate;
use equip_reservation::engine::collaborators::InMemoryModelDirectory;
use equip_reservation::{ReportApi, ReservationStatus};
use helpers::test_data_builder::ReservationBuilder;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use test_helpers::{create_test_db, dt, open_shared_connection};

struct ReportRig {
    _tmp: tempfile::NamedTempFile,
    conn: Arc<Mutex<Connection>>,
    api: ReportApi<InMemoryModelDirectory>,
}

fn rig(models: InMemoryModelDirectory) -> ReportRig {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared_connection(&db_path).unwrap();
    let api = ReportApi::new(conn.clone(), Arc::new(models));
    ReportRig { _tmp, conn, api }
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn test_category_rollup_and_shares() {
    let rig = rig(
        InMemoryModelDirectory::new()
            .with_model(1, "Scope A", "Oscilloscopes")
            .with_model(2, "Scope B", "Oscilloscopes"),
    );

    {
        let guard = rig.conn.lock().unwrap();
        ReservationBuilder::new(dt("2026-04-10 10:00"), dt("2026-04-10 12:00"))
            .item(1, "Scope A", 1)
            .insert(&guard)
            .unwrap();
        ReservationBuilder::new(dt("2026-04-10 14:00"), dt("2026-04-10 16:00"))
            .status(ReservationStatus::Confirmed)
            .item(2, "Scope B", 1)
            .insert(&guard)
            .unwrap();
    }

    let report = rig
        .api
        .get_utilization_report(day("2026-04-10"), day("2026-04-10"))
        .await;

    // 两个型号各 2 unit-hours，各占 50%
    assert_eq!(report.model_rows.len(), 2);
    for row in &report.model_rows {
        assert!((row.unit_hours - 2.0).abs() < 1e-9);
        assert!((row.share_pct - 50.0).abs() < 1e-9);
    }

    // 同类目归集为一行 4 unit-hours，占比 100%
    assert_eq!(report.category_rows.len(), 1);
    assert_eq!(report.category_rows[0].category, "Oscilloscopes");
    assert!((report.category_rows[0].unit_hours - 4.0).abs() < 1e-9);
    assert!((report.category_rows[0].share_pct - 100.0).abs() < 1e-9);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_unit_hours_conservation_across_rollup() {
    let rig = rig(
        InMemoryModelDirectory::new()
            .with_model(1, "Scope A", "Oscilloscopes")
            .with_model(2, "Gen X", "Generators")
            .with_model(3, "Gen Y", "Generators"),
    );

    {
        let guard = rig.conn.lock().unwrap();
        ReservationBuilder::new(dt("2026-04-10 09:00"), dt("2026-04-10 12:30"))
            .item(1, "Scope A", 2)
            .item(2, "Gen X", 1)
            .insert(&guard)
            .unwrap();
        ReservationBuilder::new(dt("2026-04-11 08:15"), dt("2026-04-11 10:45"))
            .status(ReservationStatus::Completed)
            .item(3, "Gen Y", 3)
            .insert(&guard)
            .unwrap();
    }

    let report = rig
        .api
        .get_utilization_report(day("2026-04-10"), day("2026-04-11"))
        .await;

    // 类目与型号两个维度派生自同一份分钟数
    let model_total: f64 = report.model_rows.iter().map(|r| r.unit_hours).sum();
    let category_total: f64 = report.category_rows.iter().map(|r| r.unit_hours).sum();
    assert!((model_total - category_total).abs() < 1e-9);

    let model_share: f64 = report.model_rows.iter().map(|r| r.share_pct).sum();
    assert!((model_share - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_utilization_clips_to_range() {
    let rig = rig(InMemoryModelDirectory::new().with_model(1, "Scope A", "Oscilloscopes"));

    {
        let guard = rig.conn.lock().unwrap();
        // 跨进报表范围的预约只计范围内的 2 小时
        ReservationBuilder::new(dt("2026-04-09 22:00"), dt("2026-04-10 02:00"))
            .item(1, "Scope A", 1)
            .insert(&guard)
            .unwrap();
        // 已取消的不计入利用率
        ReservationBuilder::new(dt("2026-04-10 10:00"), dt("2026-04-10 12:00"))
            .status(ReservationStatus::Cancelled)
            .item(1, "Scope A", 5)
            .insert(&guard)
            .unwrap();
    }

    let report = rig
        .api
        .get_utilization_report(day("2026-04-10"), day("2026-04-10"))
        .await;

    assert_eq!(report.model_rows.len(), 1);
    assert!((report.model_rows[0].unit_hours - 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_hourly_buckets_and_peak() {
    let rig = rig(InMemoryModelDirectory::new().with_model(1, "Scope A", "Oscilloscopes"));

    {
        let guard = rig.conn.lock().unwrap();
        ReservationBuilder::new(dt("2026-04-10 09:30"), dt("2026-04-10 11:30"))
            .item(1, "Scope A", 2)
            .insert(&guard)
            .unwrap();
    }

    let report = rig
        .api
        .get_utilization_report(day("2026-04-10"), day("2026-04-10"))
        .await;

    assert_eq!(report.hourly_rows.len(), 24);
    assert_eq!(report.hourly_rows[9].unit_minutes, 60);
    assert_eq!(report.hourly_rows[10].unit_minutes, 120);
    assert_eq!(report.hourly_rows[11].unit_minutes, 60);
    assert_eq!(report.hourly_rows[8].unit_minutes, 0);

    // 单日范围: avg = unit_minutes / 60
    assert!((report.hourly_rows[10].avg_concurrent_units - 2.0).abs() < 1e-9);
    assert_eq!(report.peak_hour, Some(10));
}

#[tokio::test]
async fn test_peak_hour_tie_prefers_earlier() {
    let rig = rig(InMemoryModelDirectory::new().with_model(1, "Scope A", "Oscilloscopes"));

    {
        let guard = rig.conn.lock().unwrap();
        ReservationBuilder::new(dt("2026-04-10 09:00"), dt("2026-04-10 10:00"))
            .item(1, "Scope A", 1)
            .insert(&guard)
            .unwrap();
        ReservationBuilder::new(dt("2026-04-10 14:00"), dt("2026-04-10 15:00"))
            .item(1, "Scope A", 1)
            .insert(&guard)
            .unwrap();
    }

    let report = rig
        .api
        .get_utilization_report(day("2026-04-10"), day("2026-04-10"))
        .await;
    assert_eq!(report.peak_hour, Some(9));
}

#[tokio::test]
async fn test_overnight_reservation_spans_hour_buckets() {
    let rig = rig(InMemoryModelDirectory::new().with_model(1, "Scope A", "Oscilloscopes"));

    {
        let guard = rig.conn.lock().unwrap();
        // 跨午夜: 23 时与 0 时各计 60 分钟
        ReservationBuilder::new(dt("2026-04-10 23:00"), dt("2026-04-11 01:00"))
            .item(1, "Scope A", 1)
            .insert(&guard)
            .unwrap();
    }

    let report = rig
        .api
        .get_utilization_report(day("2026-04-10"), day("2026-04-11"))
        .await;

    assert_eq!(report.hourly_rows[23].unit_minutes, 60);
    assert_eq!(report.hourly_rows[0].unit_minutes, 60);
}

#[tokio::test]
async fn test_legacy_reservation_falls_back_to_qty_one() {
    let rig = rig(InMemoryModelDirectory::new());

    {
        let guard = rig.conn.lock().unwrap();
        // 旧数据：无明细、直连资产 → 按 1 台计入时段需求
        ReservationBuilder::new(dt("2026-04-10 09:00"), dt("2026-04-10 10:00"))
            .legacy_asset(7)
            .insert(&guard)
            .unwrap();
        // 无明细也无资产的预约直接跳过
        ReservationBuilder::new(dt("2026-04-10 11:00"), dt("2026-04-10 12:00"))
            .insert(&guard)
            .unwrap();
    }

    let report = rig
        .api
        .get_utilization_report(day("2026-04-10"), day("2026-04-10"))
        .await;

    assert_eq!(report.hourly_rows[9].unit_minutes, 60);
    assert_eq!(report.hourly_rows[11].unit_minutes, 0);
    assert_eq!(report.legacy_fallback_count, 1);
}

#[tokio::test]
async fn test_unknown_category_bucket() {
    // 型号 99 不在目录里 → 归入 Unknown category 并计数
    let rig = rig(InMemoryModelDirectory::new().with_model(1, "Scope A", "Oscilloscopes"));

    {
        let guard = rig.conn.lock().unwrap();
        ReservationBuilder::new(dt("2026-04-10 09:00"), dt("2026-04-10 10:00"))
            .item(1, "Scope A", 1)
            .item(99, "Orphan", 1)
            .insert(&guard)
            .unwrap();
    }

    let report = rig
        .api
        .get_utilization_report(day("2026-04-10"), day("2026-04-10"))
        .await;

    assert_eq!(report.category_lookup_failures, 1);
    let categories: Vec<&str> = report
        .category_rows
        .iter()
        .map(|r| r.category.as_str())
        .collect();
    assert!(categories.contains(&"Oscilloscopes"));
    assert!(categories.contains(&"Unknown category"));
}

#[tokio::test]
async fn test_daily_trend_counts_cancelled_and_missed() {
    let rig = rig(InMemoryModelDirectory::new());

    {
        let guard = rig.conn.lock().unwrap();
        ReservationBuilder::new(dt("2026-04-10 09:00"), dt("2026-04-10 10:00"))
            .status(ReservationStatus::Cancelled)
            .insert(&guard)
            .unwrap();
        ReservationBuilder::new(dt("2026-04-10 14:00"), dt("2026-04-10 15:00"))
            .status(ReservationStatus::Missed)
            .insert(&guard)
            .unwrap();
        ReservationBuilder::new(dt("2026-04-11 09:00"), dt("2026-04-11 10:00"))
            .status(ReservationStatus::Missed)
            .insert(&guard)
            .unwrap();
    }

    let report = rig
        .api
        .get_utilization_report(day("2026-04-10"), day("2026-04-11"))
        .await;

    assert_eq!(report.daily_rows.len(), 2);
    assert_eq!(report.daily_rows[0].day, day("2026-04-10"));
    assert_eq!(report.daily_rows[0].cancelled, 1);
    assert_eq!(report.daily_rows[0].missed, 1);
    assert_eq!(report.daily_rows[1].cancelled, 0);
    assert_eq!(report.daily_rows[1].missed, 1);
}

#[tokio::test]
async fn test_invalid_range_yields_warning_not_panic() {
    let rig = rig(InMemoryModelDirectory::new());

    let report = rig
        .api
        .get_utilization_report(day("2026-04-11"), day("2026-04-10"))
        .await;

    assert!(!report.warnings.is_empty());
    assert!(report.model_rows.is_empty());
    assert!(report.hourly_rows.is_empty());
}

#[tokio::test]
async fn test_empty_range_is_empty_not_error() {
    let rig = rig(InMemoryModelDirectory::new());

    let report = rig
        .api
        .get_utilization_report(day("2026-04-10"), day("2026-04-10"))
        .await;

    assert!(report.warnings.is_empty());
    assert!(report.model_rows.is_empty());
    assert!(report.category_rows.is_empty());
    assert_eq!(report.peak_hour, None);
    assert_eq!(report.hourly_rows.len(), 24);
}
