// ==========================================
// 课程排班系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod offering;
pub mod staff;
pub mod types;
pub mod workload;

// 重导出核心类型
pub use action_log::RosterActionLog;
pub use offering::{Assignment, NewOffering, Offering, StaffExpertise, Subject};
pub use staff::{NewStaffMember, StaffMember};
pub use types::{LoadKey, RosterActionType, YearMonth};
pub use workload::MonthlyLoad;
