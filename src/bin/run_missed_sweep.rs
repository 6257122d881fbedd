// Small ops utility: run a single missed-reservation sweep against a database.
//
// Usage:
//   cargo run --bin run_missed_sweep -- [db_path] [cutoff_minutes]
//
// Cutoff falls back to the configured sweep/cutoff_minutes (default 60).

use equip_reservation::config::PolicyConfigManager;
use equip_reservation::db::{init_schema, open_sqlite_connection};
use equip_reservation::engine::collaborators::NoOpNotificationSender;
use equip_reservation::engine::sweeper::MissedSweeper;
use equip_reservation::repository::reservation_repo::ReservationRepository;
use std::sync::{Arc, Mutex};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let db_path = args
        .next()
        .unwrap_or_else(|| "equip_reservation.db".to_string());
    let cutoff_override = args.next().and_then(|s| s.trim().parse::<i64>().ok());

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let reservation_repo = Arc::new(ReservationRepository::new(conn.clone()));
    let config = Arc::new(PolicyConfigManager::from_connection(conn)?);
    let sweeper = MissedSweeper::new(
        reservation_repo,
        config.clone(),
        Arc::new(NoOpNotificationSender),
    );

    let now = chrono::Local::now().naive_local();
    let outcome = match cutoff_override {
        Some(cutoff) => sweeper.run(cutoff, now).await?,
        None => sweeper.run_with_configured_cutoff(now).await?,
    };

    println!(
        "sweep_id={} marked={} notified={} failed={}",
        outcome.sweep_id, outcome.marked_count, outcome.notified_count, outcome.failed_count
    );
    Ok(())
}
