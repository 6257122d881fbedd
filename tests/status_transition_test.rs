// ==========================================
// 预约状态迁移集成测试
// ==========================================
// 覆盖: 人工迁移路径、迁移表之外的拒绝、终态不可变
// ==========================================

mod helpers;
mod test_helpers;

use equip_reservation::repository::reservation_repo::ReservationRepository;
use equip_reservation::repository::RepositoryError;
use equip_reservation::ReservationStatus;
use helpers::test_data_builder::ReservationBuilder;
use std::sync::Arc;
use test_helpers::{create_test_db, dt, open_shared_connection};

fn repo_with_pending() -> (tempfile::NamedTempFile, Arc<ReservationRepository>, i64) {
    let (tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared_connection(&db_path).unwrap();
    let id;
    {
        let guard = conn.lock().unwrap();
        id = ReservationBuilder::new(dt("2026-06-02 09:00"), dt("2026-06-02 11:00"))
            .insert(&guard)
            .unwrap();
    }
    (tmp, Arc::new(ReservationRepository::new(conn)), id)
}

#[test]
fn test_manual_lifecycle_pending_to_completed() {
    let (_tmp, repo, id) = repo_with_pending();

    repo.update_status(id, ReservationStatus::Confirmed).unwrap();
    repo.update_status(id, ReservationStatus::Completed).unwrap();

    let reservation = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(reservation.status, ReservationStatus::Completed);
}

#[test]
fn test_cancel_from_pending_and_confirmed() {
    let (_tmp, repo, id) = repo_with_pending();
    repo.update_status(id, ReservationStatus::Cancelled).unwrap();
    assert_eq!(
        repo.find_by_id(id).unwrap().unwrap().status,
        ReservationStatus::Cancelled
    );
}

#[test]
fn test_illegal_transition_is_rejected_without_write() {
    let (_tmp, repo, id) = repo_with_pending();

    // PENDING → COMPLETED 不在迁移表内
    let err = repo
        .update_status(id, ReservationStatus::Completed)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidStateTransition { .. }));
    assert_eq!(
        repo.find_by_id(id).unwrap().unwrap().status,
        ReservationStatus::Pending
    );
}

#[test]
fn test_terminal_states_are_immutable() {
    let (_tmp, repo, id) = repo_with_pending();
    repo.update_status(id, ReservationStatus::Cancelled).unwrap();

    for target in [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Completed,
        ReservationStatus::Missed,
    ] {
        let err = repo.update_status(id, target).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidStateTransition { .. }));
    }
}

#[test]
fn test_update_status_unknown_id() {
    let (_tmp, repo, _id) = repo_with_pending();
    let err = repo
        .update_status(9999, ReservationStatus::Confirmed)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}
