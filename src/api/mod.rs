// ==========================================
// 课程排班系统 - API 层
// ==========================================
// 职责: 面向展示层的业务接口，统一错误类型
// ==========================================

pub mod error;
pub mod roster_api;

pub use error::{ApiError, ApiResult};
pub use roster_api::RosterApi;
