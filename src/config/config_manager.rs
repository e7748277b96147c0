// ==========================================
// 课程排班系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 约束: 非法配置值回退默认值并告警，不中断启动
// ==========================================

use crate::config::workload_config_trait::{ConfigResult, WorkloadConfigReader};
use crate::db::open_sqlite_connection;
use crate::engine::workload::{
    CO_STAFF_RELIEF, FULL_TIME_UNITS, STUDENT_THRESHOLD, SUBJECTS_FOR_FULL_TIME, UNITS_PER_EXTRA_STUDENT,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 全局配置作用域
pub const GLOBAL_SCOPE: &str = "global";

/// 视图缓存默认有效期（秒）
pub const DEFAULT_VIEW_CACHE_TTL_SECS: u64 = 600;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        tracing::info!(key, value, "配置已更新");
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取并解析配置，缺失或不满足校验时返回默认值
    ///
    /// # 参数
    /// - key: 配置键
    /// - default: 默认值
    /// - valid: 取值校验
    fn get_parsed_or_default<T, V>(&self, key: &str, default: T, valid: V) -> ConfigResult<T>
    where
        T: FromStr + Copy + std::fmt::Display,
        V: Fn(T) -> bool,
    {
        let raw = match self.get_config_value(key)? {
            Some(raw) => raw,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(value) if valid(value) => Ok(value),
            _ => {
                tracing::warn!(key, raw = %raw, default = %default, "配置值非法，使用默认值");
                Ok(default)
            }
        }
    }
}

#[async_trait]
impl WorkloadConfigReader for ConfigManager {
    async fn get_full_time_units(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(config_keys::WORKLOAD_FULL_TIME_UNITS, FULL_TIME_UNITS, |v: f64| {
            v.is_finite() && v > 0.0
        })
    }

    async fn get_subjects_for_full_time(&self) -> ConfigResult<u32> {
        self.get_parsed_or_default(
            config_keys::WORKLOAD_SUBJECTS_FOR_FULL_TIME,
            SUBJECTS_FOR_FULL_TIME,
            |v: u32| v >= 1,
        )
    }

    async fn get_student_threshold(&self) -> ConfigResult<u32> {
        self.get_parsed_or_default(config_keys::WORKLOAD_STUDENT_THRESHOLD, STUDENT_THRESHOLD, |_: u32| true)
    }

    async fn get_units_per_extra_student(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(
            config_keys::WORKLOAD_UNITS_PER_EXTRA_STUDENT,
            UNITS_PER_EXTRA_STUDENT,
            |v: f64| v.is_finite() && v >= 0.0,
        )
    }

    async fn get_co_staff_relief(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(config_keys::WORKLOAD_CO_STAFF_RELIEF, CO_STAFF_RELIEF, |v: f64| {
            v.is_finite() && v >= 0.0
        })
    }

    async fn get_view_cache_ttl_secs(&self) -> ConfigResult<u64> {
        self.get_parsed_or_default(
            config_keys::VIEW_CACHE_TTL_SECS,
            DEFAULT_VIEW_CACHE_TTL_SECS,
            |v: u64| v > 0,
        )
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 工作量公式
    pub const WORKLOAD_FULL_TIME_UNITS: &str = "workload_full_time_units";
    pub const WORKLOAD_SUBJECTS_FOR_FULL_TIME: &str = "workload_subjects_for_full_time";
    pub const WORKLOAD_STUDENT_THRESHOLD: &str = "workload_student_threshold";
    pub const WORKLOAD_UNITS_PER_EXTRA_STUDENT: &str = "workload_units_per_extra_student";
    pub const WORKLOAD_CO_STAFF_RELIEF: &str = "workload_co_staff_relief";

    // 派生视图
    pub const VIEW_CACHE_TTL_SECS: &str = "view_cache_ttl_secs";
}
