// ==========================================
// 共享设备预约系统 - 可用性计算引擎
// ==========================================
// 红线: 纯读计算，不写库
// 口径:
// - already_booked = 窗口内 PENDING/CONFIRMED 明细数量之和（严格半开重叠）
// - available_now = max(0, total_requestable - actively_issued)
// - total_requestable == 0 时跳过容量检查（保留原系统行为，warn 记录）
// ==========================================

use crate::domain::policy::AvailabilitySnapshot;
use crate::repository::reservation_repo::ReservationRepository;
use crate::repository::RepositoryResult;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{instrument, warn};

// ==========================================
// AvailabilityCalculator - 可用性计算器
// ==========================================
pub struct AvailabilityCalculator {
    reservation_repo: Arc<ReservationRepository>,
}

impl AvailabilityCalculator {
    /// 创建新的 AvailabilityCalculator 实例
    pub fn new(reservation_repo: Arc<ReservationRepository>) -> Self {
        Self { reservation_repo }
    }

    /// 计算某型号在窗口内的容量快照
    ///
    /// # 参数
    /// - model_id: 设备型号ID
    /// - window_start / window_end: 查询窗口，半开区间
    /// - total_requestable / actively_issued: 外部库存台账计数
    /// - requested_qty: 本次请求数量
    ///
    /// # 返回
    /// - AvailabilitySnapshot: 调用方用 snapshot.accepts() 做容量判定
    #[instrument(skip(self), fields(model_id = model_id))]
    pub fn compute_headroom(
        &self,
        model_id: i64,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        total_requestable: i64,
        actively_issued: i64,
        requested_qty: i64,
    ) -> RepositoryResult<AvailabilitySnapshot> {
        let already_booked_qty =
            self.reservation_repo
                .overlapping_booked_qty(model_id, window_start, window_end)?;

        if total_requestable == 0 {
            // 无受管实物台账的型号不做容量检查，记录以便观察该路径的实际使用
            warn!(
                model_id,
                requested_qty, "total_requestable == 0，跳过该型号的容量检查"
            );
        }

        Ok(AvailabilitySnapshot {
            model_id,
            requested_qty,
            already_booked_qty,
            total_requestable,
            actively_issued,
            available_now: (total_requestable - actively_issued).max(0),
        })
    }
}
