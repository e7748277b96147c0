// ==========================================
// 课程排班系统 - 仓储聚合
// ==========================================
// 职责: 聚合视图与 API 层所需的只读仓储，共享同一连接
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    AssignmentRepository, ExpertiseRepository, MonthlyLoadRepository, OfferingRepository,
    RosterActionLogRepository, StaffRepository,
};

/// 排班仓储集合
///
/// # 包含的仓储
/// - `staff_repo`: 教职工
/// - `offering_repo`: 课程与开课实例
/// - `assignment_repo`: 分配关系
/// - `load_repo`: 月度负载
/// - `expertise_repo`: 专长
/// - `action_log_repo`: 操作日志
#[derive(Clone)]
pub struct RosterRepositories {
    pub staff_repo: Arc<StaffRepository>,
    pub offering_repo: Arc<OfferingRepository>,
    pub assignment_repo: Arc<AssignmentRepository>,
    pub load_repo: Arc<MonthlyLoadRepository>,
    pub expertise_repo: Arc<ExpertiseRepository>,
    pub action_log_repo: Arc<RosterActionLogRepository>,
}

impl RosterRepositories {
    /// 在共享连接上创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            staff_repo: Arc::new(StaffRepository::new(conn.clone())),
            offering_repo: Arc::new(OfferingRepository::new(conn.clone())),
            assignment_repo: Arc::new(AssignmentRepository::new(conn.clone())),
            load_repo: Arc::new(MonthlyLoadRepository::new(conn.clone())),
            expertise_repo: Arc::new(ExpertiseRepository::new(conn.clone())),
            action_log_repo: Arc::new(RosterActionLogRepository::new(conn)),
        }
    }
}
