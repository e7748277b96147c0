use super::core::RosterActionLogRepository;
use crate::domain::action_log::RosterActionLog;
use crate::domain::types::RosterActionType;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Result as SqliteResult, Row};

const LOG_COLUMNS: &str =
    "action_id, action_type, action_ts, offering_id, staff_id, payload_json, any_overloaded";

impl RosterActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 最近 N 条日志（时间倒序）
    pub fn find_recent(&self, limit: usize) -> RepositoryResult<Vec<RosterActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM roster_action_log ORDER BY action_ts DESC, rowid DESC LIMIT ?1",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit as i64], Self::map_row)?
            .collect::<SqliteResult<Vec<RosterActionLog>>>()?;
        Ok(logs)
    }

    /// 某开课实例相关的全部日志（时间正序）
    pub fn find_by_offering(&self, offering_id: i64) -> RepositoryResult<Vec<RosterActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM roster_action_log WHERE offering_id = ?1 ORDER BY action_ts, rowid",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![offering_id], Self::map_row)?
            .collect::<SqliteResult<Vec<RosterActionLog>>>()?;
        Ok(logs)
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<RosterActionLog> {
        let action_type_raw: String = row.get(1)?;
        let action_type = RosterActionType::from_str(&action_type_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("未知操作类型: {}", action_type_raw).into(),
            )
        })?;

        let ts_raw: String = row.get(2)?;
        let action_ts = NaiveDateTime::parse_from_str(&ts_raw, "%Y-%m-%d %H:%M:%S%.f").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        // payload 解析失败时按缺失处理（审计展示不因旧数据格式中断）
        let payload_json = row
            .get::<_, Option<String>>(5)?
            .and_then(|s| serde_json::from_str(&s).ok());

        Ok(RosterActionLog {
            action_id: row.get(0)?,
            action_type,
            action_ts,
            offering_id: row.get(3)?,
            staff_id: row.get(4)?,
            payload_json,
            any_overloaded: row.get(6)?,
        })
    }
}
