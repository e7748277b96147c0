// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use course_roster_engine::config::EngineSettings;
use course_roster_engine::db::{ensure_schema, open_sqlite_connection};
use course_roster_engine::{NewOffering, NewStaffMember, Offering, RosterApi, StaffMember};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接（统一 PRAGMA）
pub fn open_test_connection(db_path: &str) -> Result<Arc<Mutex<Connection>>, Box<dyn Error>> {
    let conn = open_sqlite_connection(db_path)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 创建使用默认参数的 RosterApi
pub fn create_test_api() -> (NamedTempFile, Arc<Mutex<Connection>>, RosterApi) {
    create_test_api_with(&EngineSettings::default())
}

pub fn create_test_api_with(settings: &EngineSettings) -> (NamedTempFile, Arc<Mutex<Connection>>, RosterApi) {
    let (temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).expect("Failed to open db");
    let api = RosterApi::new(conn.clone(), settings);
    (temp_file, conn, api)
}

// ==========================================
// 测试数据
// ==========================================

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("invalid test date")
}

pub fn seed_subject(api: &RosterApi, code: &str) {
    api.create_subject(code, &format!("Subject {}", code))
        .expect("Failed to create subject");
}

pub fn seed_staff(api: &RosterApi, email: &str, capacity_fraction: f64) -> StaffMember {
    api.create_staff_member(&NewStaffMember::new(email, capacity_fraction))
        .expect("Failed to create staff")
}

pub fn seed_named_staff(api: &RosterApi, email: &str, first: &str, last: &str) -> StaffMember {
    api.create_staff_member(&NewStaffMember::new(email, 1.0).with_name(first, last))
        .expect("Failed to create staff")
}

pub fn seed_offering(api: &RosterApi, code: &str, start: NaiveDate, enrollment: i64) -> Offering {
    api.create_offering(&NewOffering::new(code, start).with_enrollment(enrollment))
        .expect("Failed to create offering")
}

/// 当月负载值（无记录时为 0）
pub fn load_value(api: &RosterApi, staff_id: i64, year: i32, month: u32) -> f64 {
    api.monthly_load(staff_id, year, month)
        .expect("Failed to read load")
        .map(|l| l.load_value)
        .unwrap_or(0.0)
}

pub fn is_overloaded(api: &RosterApi, staff_id: i64, year: i32, month: u32) -> bool {
    api.monthly_load(staff_id, year, month)
        .expect("Failed to read load")
        .map(|l| l.is_overloaded)
        .unwrap_or(false)
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}
