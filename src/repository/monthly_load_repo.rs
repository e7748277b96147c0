// ==========================================
// 课程排班系统 - 月度负载数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑（超负荷判定由聚合引擎完成后整体写入）
// ==========================================

use crate::domain::types::LoadKey;
use crate::domain::workload::MonthlyLoad;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const LOAD_COLUMNS: &str = "staff_id, month, year, load_value, is_overloaded, updated_at";

fn map_load(row: &Row<'_>) -> SqliteResult<MonthlyLoad> {
    Ok(MonthlyLoad {
        staff_id: row.get(0)?,
        month: row.get(1)?,
        year: row.get(2)?,
        load_value: row.get(3)?,
        is_overloaded: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

// ==========================================
// MonthlyLoadRepository - 月度负载仓储
// ==========================================
pub struct MonthlyLoadRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MonthlyLoadRepository {
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

    /// 插入或整体覆盖 (staff, year, month) 记录
    pub fn upsert_tx(tx: &Connection, load: &MonthlyLoad) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO monthly_load (staff_id, year, month, load_value, is_overloaded, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(staff_id, year, month) DO UPDATE SET
                load_value = excluded.load_value,
                is_overloaded = excluded.is_overloaded,
                updated_at = excluded.updated_at
            "#,
            params![
                load.staff_id,
                load.year,
                load.month,
                load.load_value,
                load.is_overloaded,
                load.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_tx(tx: &Connection, key: LoadKey) -> RepositoryResult<Option<MonthlyLoad>> {
        let sql = format!(
            "SELECT {} FROM monthly_load WHERE staff_id = ?1 AND year = ?2 AND month = ?3",
            LOAD_COLUMNS
        );
        let load = tx
            .query_row(
                &sql,
                params![key.staff_id, key.period.year, key.period.month],
                map_load,
            )
            .optional()?;
        Ok(load)
    }

    /// 教职工全部月度负载（按时间排序）
    pub fn find_by_staff_tx(tx: &Connection, staff_id: i64) -> RepositoryResult<Vec<MonthlyLoad>> {
        let sql = format!(
            "SELECT {} FROM monthly_load WHERE staff_id = ?1 ORDER BY year, month",
            LOAD_COLUMNS
        );
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt
            .query_map(params![staff_id], map_load)?
            .collect::<SqliteResult<Vec<MonthlyLoad>>>()?;
        Ok(rows)
    }

    /// 全部已存在记录的键
    pub fn find_all_keys_tx(tx: &Connection) -> RepositoryResult<Vec<LoadKey>> {
        let sql = format!("SELECT {} FROM monthly_load ORDER BY staff_id, year, month", LOAD_COLUMNS);
        let mut stmt = tx.prepare(&sql)?;
        let keys = stmt
            .query_map([], map_load)?
            .map(|r| r.map(|load| load.key()))
            .collect::<SqliteResult<Vec<LoadKey>>>()?;
        Ok(keys)
    }

    /// 全部超负荷记录
    pub fn find_overloaded_tx(tx: &Connection) -> RepositoryResult<Vec<MonthlyLoad>> {
        let sql = format!(
            "SELECT {} FROM monthly_load WHERE is_overloaded = 1 ORDER BY staff_id, year, month",
            LOAD_COLUMNS
        );
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_load)?
            .collect::<SqliteResult<Vec<MonthlyLoad>>>()?;
        Ok(rows)
    }

    // ==========================================
    // 独立连接操作（只读查询）
    // ==========================================

    pub fn find(&self, key: LoadKey) -> RepositoryResult<Option<MonthlyLoad>> {
        let conn = self.get_conn()?;
        Self::find_tx(&conn, key)
    }

    pub fn find_by_staff(&self, staff_id: i64) -> RepositoryResult<Vec<MonthlyLoad>> {
        let conn = self.get_conn()?;
        Self::find_by_staff_tx(&conn, staff_id)
    }

    pub fn find_overloaded(&self) -> RepositoryResult<Vec<MonthlyLoad>> {
        let conn = self.get_conn()?;
        Self::find_overloaded_tx(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::domain::staff::NewStaffMember;
    use crate::domain::types::YearMonth;
    use crate::repository::StaffRepository;
    use chrono::Utc;

    fn load(staff_id: i64, month: u32, value: f64, overloaded: bool) -> MonthlyLoad {
        MonthlyLoad {
            staff_id,
            month,
            year: 2026,
            load_value: value,
            is_overloaded: overloaded,
            updated_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_upsert_overwrites_same_key() {
        let conn = open_in_memory().unwrap();
        let staff = StaffRepository::insert_tx(&conn, &NewStaffMember::new("x@uni.edu", 1.0)).unwrap();

        MonthlyLoadRepository::upsert_tx(&conn, &load(staff, 3, 130.0, false)).unwrap();
        MonthlyLoadRepository::upsert_tx(&conn, &load(staff, 3, 700.0, true)).unwrap();

        let key = LoadKey::new(staff, YearMonth::new(2026, 3).unwrap());
        let stored = MonthlyLoadRepository::find_tx(&conn, key).unwrap().unwrap();
        assert_eq!(stored.load_value, 700.0);
        assert!(stored.is_overloaded);
        assert_eq!(MonthlyLoadRepository::find_by_staff_tx(&conn, staff).unwrap().len(), 1);
    }

    #[test]
    fn test_find_overloaded_and_keys() {
        let conn = open_in_memory().unwrap();
        let staff = StaffRepository::insert_tx(&conn, &NewStaffMember::new("y@uni.edu", 0.2)).unwrap();
        MonthlyLoadRepository::upsert_tx(&conn, &load(staff, 3, 500.0, true)).unwrap();
        MonthlyLoadRepository::upsert_tx(&conn, &load(staff, 4, 100.0, false)).unwrap();

        let overloaded = MonthlyLoadRepository::find_overloaded_tx(&conn).unwrap();
        assert_eq!(overloaded.len(), 1);
        assert_eq!(overloaded[0].month, 3);
        assert_eq!(MonthlyLoadRepository::find_all_keys_tx(&conn).unwrap().len(), 2);
    }
}
