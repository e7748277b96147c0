// ==========================================
// 课程排班系统 - 课程/开课实例数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 月度查询使用半开区间 [月初, 下月初)，依赖 ISO 日期字符串可比较
// ==========================================

use crate::domain::offering::{Offering, Subject};
use crate::domain::types::YearMonth;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const OFFERING_COLUMNS: &str = "offering_id, subject_code, start_date, enrollment_count";

pub(crate) fn map_offering(row: &Row<'_>) -> SqliteResult<Offering> {
    Ok(Offering {
        offering_id: row.get(0)?,
        subject_code: row.get(1)?,
        start_date: row.get(2)?,
        enrollment_count: row.get(3)?,
    })
}

// ==========================================
// OfferingRepository - 开课实例仓储
// ==========================================

/// 开课实例仓储
/// 职责: 管理 subject / offering 表的CRUD操作
pub struct OfferingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OfferingRepository {
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
    // 课程 (subject)
    // ==========================================

    /// 插入或更新课程
    pub fn upsert_subject_tx(tx: &Connection, subject: &Subject) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO subject (subject_code, subject_name) VALUES (?1, ?2)
            ON CONFLICT(subject_code) DO UPDATE SET subject_name = excluded.subject_name
            "#,
            params![subject.subject_code, subject.subject_name],
        )?;
        Ok(())
    }

    pub fn find_subject_tx(tx: &Connection, subject_code: &str) -> RepositoryResult<Option<Subject>> {
        let subject = tx
            .query_row(
                "SELECT subject_code, subject_name FROM subject WHERE subject_code = ?1",
                params![subject_code],
                |row| {
                    Ok(Subject {
                        subject_code: row.get(0)?,
                        subject_name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(subject)
    }

    // ==========================================
    // 开课实例 (offering) - 事务内操作
    // ==========================================

    /// 插入开课实例，返回自增主键
    pub fn insert_tx(
        tx: &Connection,
        subject_code: &str,
        start_date: NaiveDate,
        enrollment_count: u32,
    ) -> RepositoryResult<i64> {
        tx.execute(
            "INSERT INTO offering (subject_code, start_date, enrollment_count) VALUES (?1, ?2, ?3)",
            params![subject_code, start_date, enrollment_count],
        )?;
        Ok(tx.last_insert_rowid())
    }

    pub fn find_by_id_tx(tx: &Connection, offering_id: i64) -> RepositoryResult<Option<Offering>> {
        let sql = format!("SELECT {} FROM offering WHERE offering_id = ?1", OFFERING_COLUMNS);
        let offering = tx
            .query_row(&sql, params![offering_id], map_offering)
            .optional()?;
        Ok(offering)
    }

    /// 按主键查询，不存在时返回 NotFound
    pub fn get_tx(tx: &Connection, offering_id: i64) -> RepositoryResult<Offering> {
        Self::find_by_id_tx(tx, offering_id)?
            .ok_or_else(|| RepositoryError::not_found("Offering", offering_id))
    }

    pub fn update_enrollment_tx(
        tx: &Connection,
        offering_id: i64,
        enrollment_count: u32,
    ) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "UPDATE offering SET enrollment_count = ?2 WHERE offering_id = ?1",
            params![offering_id, enrollment_count],
        )?;
        Ok(affected)
    }

    /// 删除开课实例（外键级联删除其分配关系）
    pub fn delete_tx(tx: &Connection, offering_id: i64) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM offering WHERE offering_id = ?1",
            params![offering_id],
        )?;
        Ok(affected)
    }

    /// 指定年月开课的全部实例
    pub fn find_by_period_tx(tx: &Connection, period: YearMonth) -> RepositoryResult<Vec<Offering>> {
        let sql = format!(
            "SELECT {} FROM offering WHERE start_date >= ?1 AND start_date < ?2 ORDER BY start_date, offering_id",
            OFFERING_COLUMNS
        );
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt
            .query_map(params![period.first_day(), period.next_first_day()], map_offering)?
            .collect::<SqliteResult<Vec<Offering>>>()?;
        Ok(rows)
    }

    /// 全部开课实例（附课程名称）
    pub fn list_with_subject_tx(tx: &Connection) -> RepositoryResult<Vec<(Offering, String)>> {
        let mut stmt = tx.prepare(
            r#"
            SELECT o.offering_id, o.subject_code, o.start_date, o.enrollment_count, s.subject_name
            FROM offering o
            JOIN subject s ON s.subject_code = o.subject_code
            ORDER BY o.start_date, o.offering_id
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| Ok((map_offering(row)?, row.get::<_, String>(4)?)))?
            .collect::<SqliteResult<Vec<(Offering, String)>>>()?;
        Ok(rows)
    }

    // ==========================================
    // 独立连接操作（只读查询）
    // ==========================================

    pub fn find_by_id(&self, offering_id: i64) -> RepositoryResult<Option<Offering>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, offering_id)
    }

    pub fn find_subject(&self, subject_code: &str) -> RepositoryResult<Option<Subject>> {
        let conn = self.get_conn()?;
        Self::find_subject_tx(&conn, subject_code)
    }

    pub fn find_by_period(&self, period: YearMonth) -> RepositoryResult<Vec<Offering>> {
        let conn = self.get_conn()?;
        Self::find_by_period_tx(&conn, period)
    }

    pub fn list_with_subject(&self) -> RepositoryResult<Vec<(Offering, String)>> {
        let conn = self.get_conn()?;
        Self::list_with_subject_tx(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn setup() -> (Arc<Mutex<Connection>>, OfferingRepository) {
        let conn = open_in_memory().unwrap();
        OfferingRepository::upsert_subject_tx(
            &conn,
            &Subject {
                subject_code: "CSE1001".to_string(),
                subject_name: "Programming".to_string(),
            },
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (conn.clone(), OfferingRepository::new(conn))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_find_by_period_uses_month_bucket() {
        let (conn, repo) = setup();
        {
            let c = conn.lock().unwrap();
            OfferingRepository::insert_tx(&c, "CSE1001", date(2026, 3, 1), 0).unwrap();
            OfferingRepository::insert_tx(&c, "CSE1001", date(2026, 3, 31), 12).unwrap();
            OfferingRepository::insert_tx(&c, "CSE1001", date(2026, 4, 1), 0).unwrap();
            OfferingRepository::insert_tx(&c, "CSE1001", date(2025, 3, 15), 0).unwrap();
        }

        let march = repo.find_by_period(YearMonth::new(2026, 3).unwrap()).unwrap();
        assert_eq!(march.len(), 2);
        assert!(march.iter().all(|o| o.period() == YearMonth::new(2026, 3).unwrap()));
    }

    #[test]
    fn test_unknown_subject_rejected() {
        let (conn, _repo) = setup();
        let c = conn.lock().unwrap();
        let err = OfferingRepository::insert_tx(&c, "NOPE", date(2026, 3, 1), 0).unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
    }

    #[test]
    fn test_update_enrollment_and_delete() {
        let (conn, repo) = setup();
        let id = {
            let c = conn.lock().unwrap();
            OfferingRepository::insert_tx(&c, "CSE1001", date(2026, 7, 6), 5).unwrap()
        };
        {
            let c = conn.lock().unwrap();
            assert_eq!(OfferingRepository::update_enrollment_tx(&c, id, 40).unwrap(), 1);
        }
        assert_eq!(repo.find_by_id(id).unwrap().unwrap().enrollment_count, 40);

        let listed = repo.list_with_subject().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].1, "Programming");

        {
            let c = conn.lock().unwrap();
            assert_eq!(OfferingRepository::delete_tx(&c, id).unwrap(), 1);
        }
        assert!(repo.find_by_id(id).unwrap().is_none());
    }
}
