// ==========================================
// 课程排班系统 - 命令行入口
// ==========================================
// 用途: 打开数据库、加载配置、全量重建月度负载并输出超负荷汇总
// 用法: roster-engine [数据库路径]
// ==========================================

use std::sync::{Arc, Mutex};

use anyhow::Context;
use course_roster_engine::config::{load_engine_settings, ConfigManager};
use course_roster_engine::{db, logging, RosterApi, APP_NAME, VERSION};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    info!("==================================================");
    info!("{}", APP_NAME);
    info!("系统版本: {}", VERSION);
    info!("==================================================");

    // 获取数据库路径
    let db_path = db::resolve_db_path(std::env::args().nth(1));
    info!("使用数据库: {}", db_path.display());

    let conn = db::open_sqlite_connection(&db_path.to_string_lossy())
        .with_context(|| format!("无法打开数据库: {}", db_path.display()))?;
    db::ensure_schema(&conn).context("数据库建表失败")?;
    let conn = Arc::new(Mutex::new(conn));

    // 加载配置
    let config = ConfigManager::from_connection(conn.clone())
        .map_err(|e| anyhow::anyhow!("配置管理器初始化失败: {}", e))?;
    let settings = load_engine_settings(&config)
        .await
        .map_err(|e| anyhow::anyhow!("加载配置失败: {}", e))?;
    info!(
        full_time_units = settings.workload.full_time_units,
        student_threshold = settings.workload.student_threshold,
        view_cache_ttl_secs = settings.view_cache_ttl_secs,
        "配置已加载"
    );

    let api = RosterApi::new(conn, &settings);

    let loads = api.rebuild_all().context("月度负载重建失败")?;
    info!(loads = loads.len(), "月度负载重建完成");

    let report = api.overloaded_report().context("超负荷报表生成失败")?;
    if report.is_empty() {
        println!("无超负荷教职工");
        return Ok(());
    }

    println!("超负荷教职工: {}", report.len());
    for entry in &report {
        println!("{} <{}>", entry.staff.display_name(), entry.staff.email);
        for month in &entry.months {
            let codes: Vec<&str> = month.offerings.iter().map(|o| o.subject_code.as_str()).collect();
            println!(
                "  {}  负载 {:.2}  占比 {:.2}%  课程 [{}]",
                month.period,
                month.load_value,
                month.percentage,
                codes.join(", ")
            );
        }
    }

    Ok(())
}
