use crate::domain::action_log::RosterActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// RosterActionLogRepository - 排班操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct RosterActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RosterActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 在调用方事务内插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入,返回action_id
    /// - `Err(...)`: 数据库错误
    pub fn insert_tx(tx: &Connection, log: &RosterActionLog) -> RepositoryResult<String> {
        tx.execute(
            r#"
            INSERT INTO roster_action_log (
                action_id, action_type, action_ts, offering_id, staff_id,
                payload_json, any_overloaded
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                log.action_id,
                log.action_type.as_str(),
                log.action_ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                log.offering_id,
                log.staff_id,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.any_overloaded,
            ],
        )?;

        Ok(log.action_id.clone())
    }
}
