// ==========================================
// RosterApi 集成测试
// ==========================================
// 测试目标: 报表、候选教师排序、全量重建
// ==========================================

mod test_helpers;

use course_roster_engine::ApiError;
use rusqlite::params;
use test_helpers::{
    approx_eq, create_test_api, date, load_value, seed_named_staff, seed_offering, seed_staff, seed_subject,
};

#[test]
fn test_overloaded_report_groups_by_staff() {
    let (_temp_file, _conn, api) = create_test_api();
    seed_subject(&api, "CSE1001");
    let busy = seed_staff(&api, "busy@uni.edu", 0.1);
    let calm = seed_staff(&api, "calm@uni.edu", 1.0);
    let march = seed_offering(&api, "CSE1001", date(2026, 3, 2), 0);
    let may = seed_offering(&api, "CSE1001", date(2026, 5, 4), 0);

    api.assign_staff(march.offering_id, busy.staff_id).unwrap();
    api.assign_staff(may.offering_id, busy.staff_id).unwrap();
    api.assign_staff(may.offering_id, calm.staff_id).unwrap();

    let report = api.overloaded_report().unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(report[0].staff.staff_id, busy.staff_id);
    assert_eq!(report[0].months.len(), 2);

    let march_entry = &report[0].months[0];
    assert_eq!(march_entry.period.month, 3);
    assert!(approx_eq(march_entry.percentage, 166.67));
    assert_eq!(march_entry.offerings.len(), 1);
    assert_eq!(march_entry.offerings[0].offering_id, march.offering_id);
}

#[test]
fn test_workload_percentage_without_load_is_zero() {
    let (_temp_file, _conn, api) = create_test_api();
    let staff = seed_staff(&api, "a@uni.edu", 1.0);

    assert_eq!(api.workload_percentage(staff.staff_id, 2026, 1).unwrap(), 0.0);
    assert!(matches!(api.workload_percentage(404, 2026, 1).unwrap_err(), ApiError::NotFound(_)));
    assert!(matches!(
        api.workload_percentage(staff.staff_id, 2026, 13).unwrap_err(),
        ApiError::InvalidInput(_)
    ));
}

#[test]
fn test_rank_candidates_ordering() {
    let (_temp_file, _conn, api) = create_test_api();
    seed_subject(&api, "CSE1001");
    seed_subject(&api, "MTH2002");

    let assigned = seed_named_staff(&api, "ann@uni.edu", "Ann", "Adams");
    let loaded = seed_named_staff(&api, "bob@uni.edu", "Bob", "Brown");
    let versatile = seed_named_staff(&api, "cat@uni.edu", "Cat", "Clark");
    let outsider = seed_named_staff(&api, "dan@uni.edu", "Dan", "Adams");

    for staff in [&assigned, &loaded, &versatile] {
        api.add_expertise("CSE1001", staff.staff_id).unwrap();
    }
    api.add_expertise("MTH2002", versatile.staff_id).unwrap();
    api.add_expertise("MTH2002", outsider.staff_id).unwrap();

    // 候选窗口跨年: 2026-11 .. 2027-01
    let target = seed_offering(&api, "CSE1001", date(2026, 11, 2), 12);
    let january = seed_offering(&api, "MTH2002", date(2027, 1, 11), 0);
    api.assign_staff(target.offering_id, assigned.staff_id).unwrap();
    api.assign_staff(january.offering_id, loaded.staff_id).unwrap();

    let ranking = api.rank_candidates(target.offering_id, None).unwrap();
    let order: Vec<i64> = ranking.iter().map(|c| c.staff.staff_id).collect();
    assert_eq!(order, vec![assigned.staff_id, loaded.staff_id, versatile.staff_id]);

    assert!(ranking[0].already_assigned);
    assert!(approx_eq(ranking[1].max_percentage, 16.67));
    assert_eq!(ranking[2].expertise_count, 2);
    assert!(approx_eq(ranking[2].max_percentage, 0.0));

    // 按姓名过滤（大小写不敏感）
    let filtered = api.rank_candidates(target.offering_id, Some("  brown ")).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].staff.staff_id, loaded.staff_id);
}

#[test]
fn test_rebuild_all_repairs_drifted_loads() {
    let (_temp_file, conn, api) = create_test_api();
    seed_subject(&api, "CSE1001");
    let staff = seed_staff(&api, "a@uni.edu", 1.0);
    let tracked = seed_offering(&api, "CSE1001", date(2026, 3, 2), 25);
    let untracked = seed_offering(&api, "CSE1001", date(2026, 3, 9), 0);
    api.assign_staff(tracked.offering_id, staff.staff_id).unwrap();

    // 绕过协调器直接写入分配，使负载偏离
    {
        let guard = conn.lock().unwrap();
        guard
            .execute(
                "INSERT INTO offering_assignment (offering_id, staff_id) VALUES (?1, ?2)",
                params![untracked.offering_id, staff.staff_id],
            )
            .unwrap();
    }
    assert!(approx_eq(load_value(&api, staff.staff_id, 2026, 3), 130.0));

    let loads = api.rebuild_all().unwrap();

    assert_eq!(loads.len(), 1);
    assert!(approx_eq(load_value(&api, staff.staff_id, 2026, 3), 230.0));
}

#[test]
fn test_staff_lookup() {
    let (_temp_file, _conn, api) = create_test_api();
    let staff = seed_named_staff(&api, "ann@uni.edu", "Ann", "Adams");

    assert_eq!(api.get_staff(staff.staff_id).unwrap().display_name(), "Ann Adams");
    assert_eq!(
        api.find_staff_by_email(" ann@uni.edu ").unwrap().map(|s| s.staff_id),
        Some(staff.staff_id)
    );
    assert_eq!(api.list_staff().unwrap().len(), 1);
}

#[test]
fn test_offerings_in_month() {
    let (_temp_file, _conn, api) = create_test_api();
    seed_subject(&api, "CSE1001");
    seed_offering(&api, "CSE1001", date(2026, 2, 28), 0);
    seed_offering(&api, "CSE1001", date(2026, 3, 1), 0);
    seed_offering(&api, "CSE1001", date(2026, 3, 31), 0);

    assert_eq!(api.offerings_in_month(2026, 3).unwrap().len(), 2);
    assert_eq!(api.offerings_in_month(2026, 2).unwrap().len(), 1);
}
