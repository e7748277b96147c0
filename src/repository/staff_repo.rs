// ==========================================
// 课程排班系统 - 教职工数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: *_tx 方法接收外部连接/事务，供协调器在同一事务内组合调用
// ==========================================

use crate::domain::staff::{NewStaffMember, StaffMember};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const STAFF_COLUMNS: &str =
    "staff_id, email, honorific, first_name, last_name, capacity_fraction";

fn map_staff(row: &Row<'_>) -> SqliteResult<StaffMember> {
    Ok(StaffMember {
        staff_id: row.get(0)?,
        email: row.get(1)?,
        honorific: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        capacity_fraction: row.get(5)?,
    })
}

// ==========================================
// StaffRepository - 教职工仓储
// ==========================================

/// 教职工仓储
/// 职责: 管理 staff_member 表的CRUD操作
pub struct StaffRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StaffRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    /// 插入教职工，返回自增主键
    pub fn insert_tx(tx: &Connection, staff: &NewStaffMember) -> RepositoryResult<i64> {
        tx.execute(
            r#"
            INSERT INTO staff_member (email, honorific, first_name, last_name, capacity_fraction)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                staff.email,
                staff.honorific,
                staff.first_name,
                staff.last_name,
                staff.capacity_fraction,
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 按主键查询
    pub fn find_by_id_tx(tx: &Connection, staff_id: i64) -> RepositoryResult<Option<StaffMember>> {
        let sql = format!("SELECT {} FROM staff_member WHERE staff_id = ?1", STAFF_COLUMNS);
        let staff = tx
            .query_row(&sql, params![staff_id], map_staff)
            .optional()?;
        Ok(staff)
    }

    /// 按主键查询，不存在时返回 NotFound
    pub fn get_tx(tx: &Connection, staff_id: i64) -> RepositoryResult<StaffMember> {
        Self::find_by_id_tx(tx, staff_id)?
            .ok_or_else(|| RepositoryError::not_found("StaffMember", staff_id))
    }

    /// 更新合同比例
    ///
    /// # 返回
    /// - Ok(usize): 受影响行数（0 表示不存在）
    pub fn update_capacity_fraction_tx(
        tx: &Connection,
        staff_id: i64,
        capacity_fraction: f64,
    ) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "UPDATE staff_member SET capacity_fraction = ?2 WHERE staff_id = ?1",
            params![staff_id, capacity_fraction],
        )?;
        Ok(affected)
    }

    /// 删除教职工（外键级联删除分配、专长、月度负载）
    pub fn delete_tx(tx: &Connection, staff_id: i64) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM staff_member WHERE staff_id = ?1",
            params![staff_id],
        )?;
        Ok(affected)
    }

    /// 全部教职工
    pub fn list_all_tx(tx: &Connection) -> RepositoryResult<Vec<StaffMember>> {
        let sql = format!("SELECT {} FROM staff_member ORDER BY staff_id", STAFF_COLUMNS);
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_staff)?
            .collect::<SqliteResult<Vec<StaffMember>>>()?;
        Ok(rows)
    }

    /// 具备指定课程专长的教职工
    pub fn find_by_expertise_tx(
        tx: &Connection,
        subject_code: &str,
    ) -> RepositoryResult<Vec<StaffMember>> {
        let mut stmt = tx.prepare(
            r#"
            SELECT s.staff_id, s.email, s.honorific, s.first_name, s.last_name, s.capacity_fraction
            FROM staff_member s
            JOIN staff_expertise e ON e.staff_id = s.staff_id
            WHERE e.subject_code = ?1
            ORDER BY s.staff_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![subject_code], map_staff)?
            .collect::<SqliteResult<Vec<StaffMember>>>()?;
        Ok(rows)
    }

    // ==========================================
    // 独立连接操作（只读查询）
    // ==========================================

    pub fn find_by_id(&self, staff_id: i64) -> RepositoryResult<Option<StaffMember>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, staff_id)
    }

    pub fn find_by_email(&self, email: &str) -> RepositoryResult<Option<StaffMember>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM staff_member WHERE email = ?1", STAFF_COLUMNS);
        let staff = conn
            .query_row(&sql, params![email], map_staff)
            .optional()?;
        Ok(staff)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<StaffMember>> {
        let conn = self.get_conn()?;
        Self::list_all_tx(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn setup() -> (Arc<Mutex<Connection>>, StaffRepository) {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        let repo = StaffRepository::new(conn.clone());
        (conn, repo)
    }

    #[test]
    fn test_insert_and_find() {
        let (conn, repo) = setup();
        let id = {
            let c = conn.lock().unwrap();
            StaffRepository::insert_tx(&c, &NewStaffMember::new("a@uni.edu", 0.5).with_name("Ann", "Ho"))
                .unwrap()
        };

        let staff = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(staff.email, "a@uni.edu");
        assert_eq!(staff.capacity_fraction, 0.5);
        assert_eq!(repo.find_by_email("a@uni.edu").unwrap().unwrap().staff_id, id);
        assert!(repo.find_by_id(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (conn, _repo) = setup();
        let c = conn.lock().unwrap();
        StaffRepository::insert_tx(&c, &NewStaffMember::new("a@uni.edu", 1.0)).unwrap();
        let err = StaffRepository::insert_tx(&c, &NewStaffMember::new("a@uni.edu", 1.0)).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_update_and_delete() {
        let (conn, repo) = setup();
        let c = conn.lock().unwrap();
        let id = StaffRepository::insert_tx(&c, &NewStaffMember::new("b@uni.edu", 1.0)).unwrap();

        assert_eq!(StaffRepository::update_capacity_fraction_tx(&c, id, 0.25).unwrap(), 1);
        assert_eq!(StaffRepository::get_tx(&c, id).unwrap().capacity_fraction, 0.25);
        assert_eq!(StaffRepository::delete_tx(&c, id).unwrap(), 1);
        assert!(matches!(
            StaffRepository::get_tx(&c, id),
            Err(RepositoryError::NotFound { .. })
        ));
        drop(c);
        assert!(repo.list_all().unwrap().is_empty());
    }
}
