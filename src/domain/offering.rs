// ==========================================
// 课程排班系统 - 课程与开课实例领域模型
// ==========================================
// 职责: 课程 (Subject)、开课实例 (Offering)、分配关系 (Assignment)、
//       教师专长 (StaffExpertise)
// 红线: Assignment 从属于 Offering,不可独立存在
// ==========================================

use crate::domain::types::YearMonth;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// 一个开课周期: 12 周减 2 天
pub const TEACHING_WINDOW_DAYS: i64 = 12 * 7 - 2;

/// 课程代码最大长度
pub const SUBJECT_CODE_MAX_LEN: usize = 7;

// ==========================================
// Subject - 课程
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub subject_code: String,  // 课程代码 (主键, 如 CSE1001)
    pub subject_name: String,
}

// ==========================================
// Offering - 开课实例
// ==========================================
// 用途: 一次排定的课程开设,按 start_date 年月归入月度负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub offering_id: i64,
    pub subject_code: String,
    pub start_date: NaiveDate,
    pub enrollment_count: u32,
}

impl Offering {
    /// 月度桶
    pub fn period(&self) -> YearMonth {
        YearMonth::of(self.start_date)
    }

    /// 开课结束日期
    pub fn end_date(&self) -> NaiveDate {
        self.start_date + Duration::days(TEACHING_WINDOW_DAYS)
    }
}

// ==========================================
// NewOffering - 新建开课实例参数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOffering {
    pub subject_code: String,
    pub start_date: NaiveDate,
    /// 允许调用方传入负数,由协调器统一校验
    pub enrollment_count: i64,
}

impl NewOffering {
    pub fn new(subject_code: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            subject_code: subject_code.into(),
            start_date,
            enrollment_count: 0,
        }
    }

    pub fn with_enrollment(mut self, enrollment_count: i64) -> Self {
        self.enrollment_count = enrollment_count;
        self
    }
}

// ==========================================
// Assignment - 教师分配 (连接实体)
// ==========================================
// 唯一: (offering_id, staff_id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub offering_id: i64,
    pub staff_id: i64,
}

// ==========================================
// StaffExpertise - 教师专长
// ==========================================
// 唯一: (subject_code, staff_id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffExpertise {
    pub subject_code: String,
    pub staff_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offering_period_and_window() {
        let offering = Offering {
            offering_id: 1,
            subject_code: "CSE1001".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 11, 16).unwrap(),
            enrollment_count: 0,
        };

        assert_eq!(offering.period(), YearMonth::new(2026, 11).unwrap());
        // 2026-11-16 + 82 天 = 2027-02-06
        assert_eq!(offering.end_date(), NaiveDate::from_ymd_opt(2027, 2, 6).unwrap());
    }
}
