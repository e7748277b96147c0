// ==========================================
// 课程排班系统 - 排班操作日志领域模型
// ==========================================
// 红线: 协调器的每次写入都必须记录,且与写入同事务
// 用途: 审计追踪,超负荷告警回溯
// ==========================================

use crate::domain::types::RosterActionType;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ==========================================
// RosterActionLog - 排班操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterActionLog {
    pub action_id: String,               // UUID v4
    pub action_type: RosterActionType,
    pub action_ts: NaiveDateTime,
    pub offering_id: Option<i64>,
    pub staff_id: Option<i64>,
    pub payload_json: Option<JsonValue>, // 操作参数
    pub any_overloaded: bool,            // 本次操作后受影响者中是否出现超负荷
}

impl RosterActionLog {
    /// 以当前时间创建一条日志
    pub fn new(action_type: RosterActionType) -> Self {
        Self {
            action_id: Uuid::new_v4().to_string(),
            action_type,
            action_ts: Utc::now().naive_utc(),
            offering_id: None,
            staff_id: None,
            payload_json: None,
            any_overloaded: false,
        }
    }

    pub fn offering(mut self, offering_id: i64) -> Self {
        self.offering_id = Some(offering_id);
        self
    }

    pub fn staff(mut self, staff_id: i64) -> Self {
        self.staff_id = Some(staff_id);
        self
    }

    pub fn payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn overloaded(mut self, any_overloaded: bool) -> Self {
        self.any_overloaded = any_overloaded;
        self
    }
}
