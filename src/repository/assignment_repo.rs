// ==========================================
// 课程排班系统 - 教师分配数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: offering_assignment 为显式连接实体，按两侧外键分别建索引
//       (staff→offerings) (offering→staff) 两条查询路径都在这里
// ==========================================

use crate::domain::offering::{Assignment, Offering};
use crate::domain::types::{LoadKey, YearMonth};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::offering_repo::map_offering;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// AssignmentRepository - 分配仓储
// ==========================================
pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    /// 插入分配（重复对将触发 UniqueConstraintViolation）
    pub fn insert_tx(tx: &Connection, assignment: Assignment) -> RepositoryResult<()> {
        tx.execute(
            "INSERT INTO offering_assignment (offering_id, staff_id) VALUES (?1, ?2)",
            params![assignment.offering_id, assignment.staff_id],
        )?;
        Ok(())
    }

    pub fn exists_tx(tx: &Connection, assignment: Assignment) -> RepositoryResult<bool> {
        let found = tx
            .query_row(
                "SELECT 1 FROM offering_assignment WHERE offering_id = ?1 AND staff_id = ?2",
                params![assignment.offering_id, assignment.staff_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    pub fn delete_tx(tx: &Connection, assignment: Assignment) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM offering_assignment WHERE offering_id = ?1 AND staff_id = ?2",
            params![assignment.offering_id, assignment.staff_id],
        )?;
        Ok(affected)
    }

    /// 删除开课实例的全部分配
    pub fn delete_by_offering_tx(tx: &Connection, offering_id: i64) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM offering_assignment WHERE offering_id = ?1",
            params![offering_id],
        )?;
        Ok(affected)
    }

    /// (offering → staff) 当前分配的教职工ID
    pub fn find_staff_ids_by_offering_tx(tx: &Connection, offering_id: i64) -> RepositoryResult<Vec<i64>> {
        let mut stmt = tx.prepare(
            "SELECT staff_id FROM offering_assignment WHERE offering_id = ?1 ORDER BY staff_id",
        )?;
        let ids = stmt
            .query_map(params![offering_id], |row| row.get::<_, i64>(0))?
            .collect::<SqliteResult<Vec<i64>>>()?;
        Ok(ids)
    }

    /// 开课实例当前分配人数（实时计数）
    pub fn count_by_offering_tx(tx: &Connection, offering_id: i64) -> RepositoryResult<u32> {
        let count: u32 = tx.query_row(
            "SELECT COUNT(*) FROM offering_assignment WHERE offering_id = ?1",
            params![offering_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// (staff → offerings) 教职工所教开课实例，可按年月过滤
    pub fn find_offerings_by_staff_tx(
        tx: &Connection,
        staff_id: i64,
        period: Option<YearMonth>,
    ) -> RepositoryResult<Vec<Offering>> {
        let rows = match period {
            Some(p) => {
                let mut stmt = tx.prepare(
                    r#"
                    SELECT o.offering_id, o.subject_code, o.start_date, o.enrollment_count
                    FROM offering o
                    JOIN offering_assignment a ON a.offering_id = o.offering_id
                    WHERE a.staff_id = ?1 AND o.start_date >= ?2 AND o.start_date < ?3
                    ORDER BY o.start_date, o.offering_id
                    "#,
                )?;
                let rows = stmt
                    .query_map(params![staff_id, p.first_day(), p.next_first_day()], map_offering)?
                    .collect::<SqliteResult<Vec<Offering>>>()?;
                rows
            }
            None => {
                let mut stmt = tx.prepare(
                    r#"
                    SELECT o.offering_id, o.subject_code, o.start_date, o.enrollment_count
                    FROM offering o
                    JOIN offering_assignment a ON a.offering_id = o.offering_id
                    WHERE a.staff_id = ?1
                    ORDER BY o.start_date, o.offering_id
                    "#,
                )?;
                let rows = stmt
                    .query_map(params![staff_id], map_offering)?
                    .collect::<SqliteResult<Vec<Offering>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    /// 所有存在分配关系的 (staff, 年, 月) 组合
    pub fn find_all_load_keys_tx(tx: &Connection) -> RepositoryResult<Vec<LoadKey>> {
        let mut stmt = tx.prepare(
            r#"
            SELECT DISTINCT a.staff_id,
                   CAST(strftime('%Y', o.start_date) AS INTEGER) AS y,
                   CAST(strftime('%m', o.start_date) AS INTEGER) AS m
            FROM offering_assignment a
            JOIN offering o ON o.offering_id = a.offering_id
            ORDER BY a.staff_id, y, m
            "#,
        )?;
        let keys = stmt
            .query_map([], |row| {
                Ok(LoadKey::new(
                    row.get(0)?,
                    YearMonth {
                        year: row.get(1)?,
                        month: row.get(2)?,
                    },
                ))
            })?
            .collect::<SqliteResult<Vec<LoadKey>>>()?;
        Ok(keys)
    }

    // ==========================================
    // 独立连接操作（只读查询）
    // ==========================================

    pub fn find_staff_ids_by_offering(&self, offering_id: i64) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        Self::find_staff_ids_by_offering_tx(&conn, offering_id)
    }

    pub fn find_offerings_by_staff(
        &self,
        staff_id: i64,
        period: Option<YearMonth>,
    ) -> RepositoryResult<Vec<Offering>> {
        let conn = self.get_conn()?;
        Self::find_offerings_by_staff_tx(&conn, staff_id, period)
    }

    pub fn exists(&self, assignment: Assignment) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        Self::exists_tx(&conn, assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::domain::offering::Subject;
    use crate::domain::staff::NewStaffMember;
    use crate::repository::{OfferingRepository, StaffRepository};
    use chrono::NaiveDate;

    fn setup() -> (Connection, i64, i64, i64, i64) {
        let conn = open_in_memory().unwrap();
        OfferingRepository::upsert_subject_tx(
            &conn,
            &Subject {
                subject_code: "CSE2002".to_string(),
                subject_name: "Data Structures".to_string(),
            },
        )
        .unwrap();
        let s1 = StaffRepository::insert_tx(&conn, &NewStaffMember::new("s1@uni.edu", 1.0)).unwrap();
        let s2 = StaffRepository::insert_tx(&conn, &NewStaffMember::new("s2@uni.edu", 1.0)).unwrap();
        let o1 = OfferingRepository::insert_tx(&conn, "CSE2002", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), 0)
            .unwrap();
        let o2 = OfferingRepository::insert_tx(&conn, "CSE2002", NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(), 0)
            .unwrap();
        (conn, s1, s2, o1, o2)
    }

    #[test]
    fn test_pair_is_unique() {
        let (conn, s1, _s2, o1, _o2) = setup();
        let a = Assignment { offering_id: o1, staff_id: s1 };
        AssignmentRepository::insert_tx(&conn, a).unwrap();
        assert!(AssignmentRepository::exists_tx(&conn, a).unwrap());

        let err = AssignmentRepository::insert_tx(&conn, a).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_lookup_paths() {
        let (conn, s1, s2, o1, o2) = setup();
        for (o, s) in [(o1, s1), (o1, s2), (o2, s1)] {
            AssignmentRepository::insert_tx(&conn, Assignment { offering_id: o, staff_id: s }).unwrap();
        }

        assert_eq!(AssignmentRepository::find_staff_ids_by_offering_tx(&conn, o1).unwrap(), vec![s1, s2]);
        assert_eq!(AssignmentRepository::count_by_offering_tx(&conn, o1).unwrap(), 2);

        let all = AssignmentRepository::find_offerings_by_staff_tx(&conn, s1, None).unwrap();
        assert_eq!(all.len(), 2);
        let march =
            AssignmentRepository::find_offerings_by_staff_tx(&conn, s1, YearMonth::new(2026, 3)).unwrap();
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].offering_id, o1);

        let keys = AssignmentRepository::find_all_load_keys_tx(&conn).unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&LoadKey::new(s1, YearMonth::new(2026, 5).unwrap())));
    }

    #[test]
    fn test_cascade_on_offering_and_staff_delete() {
        let (conn, s1, s2, o1, o2) = setup();
        AssignmentRepository::insert_tx(&conn, Assignment { offering_id: o1, staff_id: s1 }).unwrap();
        AssignmentRepository::insert_tx(&conn, Assignment { offering_id: o2, staff_id: s2 }).unwrap();

        OfferingRepository::delete_tx(&conn, o1).unwrap();
        assert_eq!(AssignmentRepository::count_by_offering_tx(&conn, o1).unwrap(), 0);

        StaffRepository::delete_tx(&conn, s2).unwrap();
        assert_eq!(AssignmentRepository::count_by_offering_tx(&conn, o2).unwrap(), 0);
    }
}
