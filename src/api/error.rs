// ==========================================
// 课程排班系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换引擎/仓储错误为用户友好的错误消息
// ==========================================

use crate::engine::error::RosterError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误（调用未产生变更）
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误（已整体回滚）
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),
}

impl ApiError {
    /// 是否为调用方可修正的错误
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidInput(_) | ApiError::NotFound(_) | ApiError::BusinessRuleViolation(_)
        )
    }
}

// ==========================================
// 从 RosterError 转换
// ==========================================
impl From<RosterError> for ApiError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::DuplicateAssignment { .. } | RosterError::NotAssigned { .. } => {
                ApiError::BusinessRuleViolation(err.to_string())
            }
            RosterError::InvalidEnrollment(_)
            | RosterError::InvalidCapacityFraction(_)
            | RosterError::InvalidInput(_) => ApiError::InvalidInput(err.to_string()),
            RosterError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RosterError::PersistenceFailure(msg) => ApiError::DatabaseTransactionError(msg),
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_error_mapping() {
        let err: ApiError = RosterError::DuplicateAssignment { offering_id: 1, staff_id: 2 }.into();
        assert!(matches!(err, ApiError::BusinessRuleViolation(_)));
        assert!(err.is_client_error());

        let err: ApiError = RosterError::InvalidEnrollment(-3).into();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m.contains("-3")));

        let err: ApiError = RosterError::PersistenceFailure("disk I/O".to_string()).into();
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_repository_error_mapping() {
        let err: ApiError = RepositoryError::not_found("StaffMember", 9).into();
        assert!(matches!(err, ApiError::NotFound(ref m) if m.contains("StaffMember")));

        let err: ApiError = RepositoryError::LockError("poisoned".to_string()).into();
        assert!(matches!(err, ApiError::DatabaseConnectionError(_)));
        assert!(!err.is_client_error());
    }
}
