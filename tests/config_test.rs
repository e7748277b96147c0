// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: 验证工作量参数读取、覆盖与非法值回退
// ==========================================

mod test_helpers;

use course_roster_engine::config::{config_keys, load_engine_settings, ConfigManager, EngineSettings, WorkloadConfigReader};
use course_roster_engine::engine::WorkloadParams;
use test_helpers::{approx_eq, create_test_api_with, create_test_db, date, load_value, seed_offering, seed_staff, seed_subject};

#[tokio::test]
async fn test_config_manager_creation() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let config_manager = ConfigManager::new(&db_path);
    assert!(
        config_manager.is_ok(),
        "ConfigManager should be created successfully"
    );
}

#[tokio::test]
async fn test_defaults_when_table_empty() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let settings = load_engine_settings(&config_manager).await.unwrap();

    assert_eq!(settings, EngineSettings::default());
    assert_eq!(settings.workload.base_units_per_offering(), 100.0);
    assert_eq!(settings.view_cache_ttl_secs, 600);
}

#[tokio::test]
async fn test_overrides_are_applied() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    config_manager
        .set_global_config_value(config_keys::WORKLOAD_FULL_TIME_UNITS, "800")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::WORKLOAD_STUDENT_THRESHOLD, "20")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::VIEW_CACHE_TTL_SECS, " 30 ")
        .unwrap();

    let settings = load_engine_settings(&config_manager).await.unwrap();

    assert_eq!(settings.workload.full_time_units, 800.0);
    assert_eq!(settings.workload.student_threshold, 20);
    assert_eq!(settings.view_cache_ttl_secs, 30);
    assert_eq!(settings.workload.co_staff_relief, 0.4);
}

#[tokio::test]
async fn test_invalid_values_fall_back_to_defaults() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    config_manager
        .set_global_config_value(config_keys::WORKLOAD_SUBJECTS_FOR_FULL_TIME, "0")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::WORKLOAD_CO_STAFF_RELIEF, "-0.2")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::VIEW_CACHE_TTL_SECS, "0")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::WORKLOAD_FULL_TIME_UNITS, "lots")
        .unwrap();

    assert_eq!(config_manager.get_subjects_for_full_time().await.unwrap(), 6);
    assert_eq!(config_manager.get_co_staff_relief().await.unwrap(), 0.4);
    assert_eq!(config_manager.get_view_cache_ttl_secs().await.unwrap(), 600);
    assert_eq!(config_manager.get_full_time_units().await.unwrap(), 600.0);
}

#[test]
fn test_custom_params_flow_into_engine() {
    let settings = EngineSettings {
        workload: WorkloadParams {
            student_threshold: 20,
            ..WorkloadParams::default()
        },
        ..EngineSettings::default()
    };
    let (_temp_file, _conn, api) = create_test_api_with(&settings);
    seed_subject(&api, "CSE1001");
    let staff = seed_staff(&api, "a@uni.edu", 1.0);
    let offering = seed_offering(&api, "CSE1001", date(2026, 3, 2), 25);

    api.assign_staff(offering.offering_id, staff.staff_id).unwrap();

    assert!(approx_eq(load_value(&api, staff.staff_id, 2026, 3), 110.0));
}
