// ==========================================
// 课程排班系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供按键 CRUD 与沿外键路径的过滤查询,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: *_tx 关联函数不自行加锁,由调用方提供连接/事务
// ==========================================

pub mod action_log_repo;
pub mod assignment_repo;
pub mod error;
pub mod expertise_repo;
pub mod monthly_load_repo;
pub mod offering_repo;
pub mod staff_repo;

// 重导出核心仓储
pub use action_log_repo::RosterActionLogRepository;
pub use assignment_repo::AssignmentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use expertise_repo::ExpertiseRepository;
pub use monthly_load_repo::MonthlyLoadRepository;
pub use offering_repo::OfferingRepository;
pub use staff_repo::StaffRepository;
