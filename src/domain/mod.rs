// ==========================================
// 共享设备预约系统 - 领域层
// ==========================================
// 职责: 实体与值对象定义，不含持久化与业务流程
// ==========================================

pub mod policy;
pub mod reservation;
pub mod types;

// 重导出核心类型
pub use policy::{
    AvailabilitySnapshot, BlackoutSlot, BookingCandidate, BypassTable, Policy, RoleBypass,
};
pub use reservation::{NewReservation, NewReservationItem, Reservation, ReservationItem};
pub use types::{PolicyRule, ReservationStatus};
