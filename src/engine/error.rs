// ==========================================
// 课程排班系统 - 引擎层错误类型
// ==========================================
// 职责: 分配协调器与聚合引擎的错误分类
// 约束: 校验类错误在任何写入之前返回（零变更）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    // ===== 校验错误（零变更） =====
    #[error("教职工已分配到该开课实例: offering_id={offering_id}, staff_id={staff_id}")]
    DuplicateAssignment { offering_id: i64, staff_id: i64 },

    #[error("教职工未分配到该开课实例: offering_id={offering_id}, staff_id={staff_id}")]
    NotAssigned { offering_id: i64, staff_id: i64 },

    #[error("选课人数无效: {0}（必须 >= 0）")]
    InvalidEnrollment(i64),

    #[error("容量比例无效: {0}（必须在 (0, 1] 区间）")]
    InvalidCapacityFraction(f64),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("{entity} 不存在: id={id}")]
    NotFound { entity: String, id: String },

    // ===== 存储错误（整体回滚） =====
    #[error("持久化失败: {0}")]
    PersistenceFailure(String),
}

impl RosterError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        RosterError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 是否为校验类错误（调用未产生任何变更）
    pub fn is_validation(&self) -> bool {
        !matches!(self, RosterError::PersistenceFailure(_))
    }
}

impl From<RepositoryError> for RosterError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => RosterError::NotFound { entity, id },
            RepositoryError::ValidationError(msg) => RosterError::InvalidInput(msg),
            other => RosterError::PersistenceFailure(other.to_string()),
        }
    }
}

pub type RosterResult<T> = Result<T, RosterError>;
