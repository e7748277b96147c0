use super::RosterActionLogRepository;
use crate::db::open_in_memory;
use crate::domain::action_log::RosterActionLog;
use crate::domain::types::RosterActionType;
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_in_memory().unwrap()))
}

#[test]
fn test_insert_and_find_by_offering() {
    let conn = setup_test_db();
    let repo = RosterActionLogRepository::new(conn.clone());

    let log = RosterActionLog::new(RosterActionType::AssignStaff)
        .offering(7)
        .staff(3)
        .payload(json!({ "offering_id": 7, "staff_id": 3 }))
        .overloaded(true);
    {
        let c = conn.lock().unwrap();
        let id = RosterActionLogRepository::insert_tx(&c, &log).unwrap();
        assert_eq!(id, log.action_id);
    }

    let logs = repo.find_by_offering(7).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action_type, RosterActionType::AssignStaff);
    assert_eq!(logs[0].staff_id, Some(3));
    assert!(logs[0].any_overloaded);
    assert_eq!(logs[0].payload_json.as_ref().unwrap()["staff_id"], 3);
}

#[test]
fn test_find_recent_respects_limit() {
    let conn = setup_test_db();
    let repo = RosterActionLogRepository::new(conn.clone());
    {
        let c = conn.lock().unwrap();
        for _ in 0..5 {
            RosterActionLogRepository::insert_tx(&c, &RosterActionLog::new(RosterActionType::SetEnrollment))
                .unwrap();
        }
    }

    assert_eq!(repo.find_recent(3).unwrap().len(), 3);
    assert!(repo.find_by_offering(1).unwrap().is_empty());
}
