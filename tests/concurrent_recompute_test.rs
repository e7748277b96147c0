// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证并发分配/移除后月度负载与最终分配集合一致
// ==========================================

mod test_helpers;

use std::sync::Arc;
use std::thread;

use test_helpers::{approx_eq, create_test_api, date, load_value, seed_offering, seed_staff, seed_subject};

const TOGGLES_PER_THREAD: usize = 20;

#[test]
fn test_concurrent_assign_unassign_same_offering() {
    let (_temp_file, _conn, api) = create_test_api();
    seed_subject(&api, "CSE1001");
    let offering = seed_offering(&api, "CSE1001", date(2026, 3, 2), 25);
    let staff: Vec<i64> = (0..4)
        .map(|i| seed_staff(&api, &format!("s{}@uni.edu", i), 1.0).staff_id)
        .collect();

    let api = Arc::new(api);
    let mut handles = Vec::new();
    for (i, staff_id) in staff.iter().copied().enumerate() {
        let api = Arc::clone(&api);
        let offering_id = offering.offering_id;
        handles.push(thread::spawn(move || {
            // 偶数线程最终保持分配，奇数线程最终移除
            let toggles = TOGGLES_PER_THREAD + (i % 2 == 0) as usize;
            for n in 0..toggles {
                if n % 2 == 0 {
                    api.assign_staff(offering_id, staff_id).unwrap();
                } else {
                    api.unassign_staff(offering_id, staff_id).unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let mut assigned = api.assigned_staff(offering.offering_id).unwrap();
    assigned.sort_unstable();
    assert_eq!(assigned, vec![staff[0], staff[2]]);

    let expected = 130.0 / 1.4;
    for (i, staff_id) in staff.iter().copied().enumerate() {
        let persisted = load_value(&api, staff_id, 2026, 3);
        let want = if i % 2 == 0 { expected } else { 0.0 };
        assert!(
            approx_eq(persisted, want),
            "staff {} load {} != {}",
            staff_id,
            persisted,
            want
        );

        // 持久化值与全量重算一致
        let fresh = api.recompute(staff_id, 2026, 3).unwrap();
        assert!(approx_eq(fresh.load_value, persisted));
    }
}

#[test]
fn test_concurrent_mutations_across_months() {
    let (_temp_file, _conn, api) = create_test_api();
    seed_subject(&api, "MTH2002");
    let staff_id = seed_staff(&api, "shared@uni.edu", 1.0).staff_id;
    let offerings: Vec<i64> = (1..=6)
        .map(|m| seed_offering(&api, "MTH2002", date(2026, m, 10), 12).offering_id)
        .collect();

    let api = Arc::new(api);
    let handles: Vec<_> = offerings
        .iter()
        .copied()
        .map(|offering_id| {
            let api = Arc::clone(&api);
            thread::spawn(move || {
                api.assign_staff(offering_id, staff_id).unwrap();
                api.set_enrollment(offering_id, 30).unwrap();
                api.set_enrollment(offering_id, 15).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for month in 1..=6 {
        assert!(approx_eq(load_value(&api, staff_id, 2026, month), 110.0));
    }
    assert_eq!(api.monthly_loads(staff_id).unwrap().len(), 6);
}
