// ==========================================
// 课程排班系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 教职工工作量计算与分配一致性引擎
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 工作量公式、聚合、分配协调
pub mod engine;

// 派生视图层 - TTL 缓存
pub mod view;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    Assignment, LoadKey, MonthlyLoad, NewOffering, NewStaffMember, Offering, RosterActionLog,
    RosterActionType, StaffExpertise, StaffMember, Subject, YearMonth,
};

// 引擎
pub use engine::{
    AggregationEngine, AssignmentCoordinator, MutationOutcome, RosterError, WorkloadFormula,
    WorkloadParams, WorkloadReporter,
};

// API
pub use api::{ApiError, ApiResult, RosterApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "课程排班系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
