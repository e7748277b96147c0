// ==========================================
// 课程排班系统 - 教师专长数据仓储
// ==========================================

use crate::domain::offering::StaffExpertise;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct ExpertiseRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExpertiseRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登记专长（已存在时忽略）
    pub fn insert_tx(tx: &Connection, expertise: &StaffExpertise) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "INSERT OR IGNORE INTO staff_expertise (subject_code, staff_id) VALUES (?1, ?2)",
            params![expertise.subject_code, expertise.staff_id],
        )?;
        Ok(affected)
    }

    pub fn delete_tx(tx: &Connection, expertise: &StaffExpertise) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM staff_expertise WHERE subject_code = ?1 AND staff_id = ?2",
            params![expertise.subject_code, expertise.staff_id],
        )?;
        Ok(affected)
    }

    /// 教职工专长课程数
    pub fn count_by_staff_tx(tx: &Connection, staff_id: i64) -> RepositoryResult<u32> {
        let count: u32 = tx.query_row(
            "SELECT COUNT(*) FROM staff_expertise WHERE staff_id = ?1",
            params![staff_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_by_staff(&self, staff_id: i64) -> RepositoryResult<u32> {
        let conn = self.get_conn()?;
        Self::count_by_staff_tx(&conn, staff_id)
    }
}
