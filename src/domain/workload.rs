// ==========================================
// 课程排班系统 - 月度负载领域模型
// ==========================================
// 职责: 教职工月度工作量聚合记录
// 红线: load_value 与 is_overloaded 必须一起重算,不可单独过期
// ==========================================

use crate::domain::types::{LoadKey, YearMonth};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// MonthlyLoad - 月度负载
// ==========================================
// 唯一: (staff_id, month, year)
// 生命周期: 首次重算时惰性创建,此后每次触发均全量重算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyLoad {
    pub staff_id: i64,
    pub month: u32,
    pub year: i32,
    pub load_value: f64,       // 工作量单位合计
    pub is_overloaded: bool,   // load_value > capacity_fraction × FULL_TIME_UNITS
    pub updated_at: NaiveDateTime,
}

impl MonthlyLoad {
    pub fn period(&self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }

    pub fn key(&self) -> LoadKey {
        LoadKey::new(self.staff_id, self.period())
    }
}
