// ==========================================
// 课程排班系统 - 引擎层
// ==========================================
// 职责: 工作量公式、负载聚合、分配协调、报表
// 红线: Engine 不拼 SQL，数据访问全部经由 Repository
// ==========================================

pub mod aggregation;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod load_lock;
pub mod report;
pub mod repositories;
pub mod workload;

// 重导出核心引擎
pub use aggregation::AggregationEngine;
pub use coordinator::{AssignmentCoordinator, MutationOutcome};
pub use error::{RosterError, RosterResult};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, RosterEvent, RosterEventPublisher, RosterEventType,
};
pub use load_lock::{LoadLockGuard, LoadLockRegistry};
pub use report::{CandidateRanking, OverloadedMonth, OverloadedStaffReport, WorkloadReporter};
pub use repositories::RosterRepositories;
pub use workload::{WorkloadFormula, WorkloadParams};
