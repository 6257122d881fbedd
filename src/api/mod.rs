// ==========================================
// 共享设备预约系统 - API 层
// ==========================================
// 职责: 对外业务接口（提交/校验/清扫/报表），输入守卫与错误转换
// ==========================================

pub mod booking_api;
pub mod error;
pub mod report_api;

pub use booking_api::BookingApi;
pub use error::{ApiError, ApiResult};
pub use report_api::{
    natural_compare, sort_and_page, ReportApi, SortDirection, SortValue, SortableRow,
};
