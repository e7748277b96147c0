// ==========================================
// 课程排班系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，外键级联依赖 foreign_keys=ON
// - 统一 busy_timeout，存储调用超时即视为持久化失败
// - 统一建表（幂等）与事务执行入口
// ==========================================

use crate::repository::error::RepositoryError;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 显式指定数据库路径的环境变量
pub const DB_PATH_ENV: &str = "ROSTER_ENGINE_DB_PATH";

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS staff_member (
    staff_id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    honorific TEXT,
    first_name TEXT,
    last_name TEXT,
    capacity_fraction REAL NOT NULL
        CHECK (capacity_fraction > 0 AND capacity_fraction <= 1)
);

CREATE TABLE IF NOT EXISTS subject (
    subject_code TEXT PRIMARY KEY,
    subject_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS offering (
    offering_id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_code TEXT NOT NULL REFERENCES subject(subject_code),
    start_date TEXT NOT NULL,
    enrollment_count INTEGER NOT NULL DEFAULT 0 CHECK (enrollment_count >= 0)
);
CREATE INDEX IF NOT EXISTS idx_offering_start_date ON offering(start_date);

CREATE TABLE IF NOT EXISTS offering_assignment (
    offering_id INTEGER NOT NULL REFERENCES offering(offering_id) ON DELETE CASCADE,
    staff_id INTEGER NOT NULL REFERENCES staff_member(staff_id) ON DELETE CASCADE,
    PRIMARY KEY (offering_id, staff_id)
);
CREATE INDEX IF NOT EXISTS idx_offering_assignment_staff ON offering_assignment(staff_id);

CREATE TABLE IF NOT EXISTS monthly_load (
    staff_id INTEGER NOT NULL REFERENCES staff_member(staff_id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
    load_value REAL NOT NULL DEFAULT 0,
    is_overloaded INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (staff_id, year, month)
);
CREATE INDEX IF NOT EXISTS idx_monthly_load_overloaded ON monthly_load(is_overloaded);

CREATE TABLE IF NOT EXISTS staff_expertise (
    subject_code TEXT NOT NULL REFERENCES subject(subject_code) ON DELETE CASCADE,
    staff_id INTEGER NOT NULL REFERENCES staff_member(staff_id) ON DELETE CASCADE,
    PRIMARY KEY (subject_code, staff_id)
);

-- 审计日志不设外键：被删除实体的记录仍需保留
CREATE TABLE IF NOT EXISTS roster_action_log (
    action_id TEXT PRIMARY KEY,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    offering_id INTEGER,
    staff_id INTEGER,
    payload_json TEXT,
    any_overloaded INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_roster_action_log_ts ON roster_action_log(action_ts);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库（测试/演示），已建表
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 幂等建表并登记 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 解析数据库路径
///
/// 优先级: 显式参数 > 环境变量 ROSTER_ENGINE_DB_PATH > 用户数据目录 > 当前目录
pub fn resolve_db_path(explicit: Option<String>) -> PathBuf {
    let explicit = explicit
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .or_else(|| {
            std::env::var(DB_PATH_ENV)
                .ok()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
        });
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    match dirs::data_dir() {
        Some(data_dir) => {
            let dir = data_dir.join("course-roster-engine");
            // 目录创建失败时交由 Connection::open 报告
            std::fs::create_dir_all(&dir).ok();
            dir.join("roster.db")
        }
        None => PathBuf::from("./roster.db"),
    }
}

/// 在共享连接上执行一个事务
///
/// - 闭包返回 Ok 时提交，返回 Err 或 panic 时回滚（Transaction drop 即回滚）
/// - 持有连接锁直到事务结束，同一连接上的语句不会交错
pub fn run_in_transaction<T, E, F>(conn: &Mutex<Connection>, f: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<RepositoryError>,
{
    let mut guard = conn
        .lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))?;
    let tx = guard.transaction().map_err(RepositoryError::from)?;
    let value = f(&tx)?;
    tx.commit().map_err(RepositoryError::from)?;
    Ok(value)
}
