// ==========================================
// 课程排班系统 - 领域类型定义
// ==========================================
// 职责: 月度桶、负载键、操作类型等值对象
// ==========================================

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// YearMonth - 月度桶
// ==========================================
// 红线: 开课实例按 start_date 所在的年月归桶
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32, // 1-12
}

impl YearMonth {
    /// 创建月度桶，月份越界返回 None
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// 取日期所在月度桶
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// 向后平移 n 个月（跨年进位）
    pub fn plus_months(self, n: u32) -> Self {
        let zero_based = self.month - 1 + n;
        Self {
            year: self.year + (zero_based / 12) as i32,
            month: zero_based % 12 + 1,
        }
    }

    /// 该月第一天
    pub fn first_day(self) -> NaiveDate {
        // month 已在构造时校验，这里不会失败
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// 下月第一天（用于半开区间查询）
    pub fn next_first_day(self) -> NaiveDate {
        self.plus_months(1).first_day()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.month, self.year)
    }
}

// ==========================================
// LoadKey - 月度负载主键
// ==========================================
// 唯一: (staff_id, year, month)
// 用途: 月度负载记录定位 + 重算互斥锁粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoadKey {
    pub staff_id: i64,
    pub period: YearMonth,
}

impl LoadKey {
    pub fn new(staff_id: i64, period: YearMonth) -> Self {
        Self { staff_id, period }
    }
}

impl fmt::Display for LoadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "staff={}@{}", self.staff_id, self.period)
    }
}

// ==========================================
// RosterActionType - 排班操作类型
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RosterActionType {
    AssignStaff,         // 分配教师
    UnassignStaff,       // 移除教师
    SetEnrollment,       // 修改选课人数
    CreateOffering,      // 新建开课实例
    DeleteOffering,      // 删除开课实例
    CreateStaff,         // 新建教职工
    DeleteStaff,         // 删除教职工
    SetCapacityFraction, // 修改合同工作量比例
    CreateSubject,       // 新建课程
    AddExpertise,        // 登记专长
    RemoveExpertise,     // 移除专长
}

impl RosterActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RosterActionType::AssignStaff => "ASSIGN_STAFF",
            RosterActionType::UnassignStaff => "UNASSIGN_STAFF",
            RosterActionType::SetEnrollment => "SET_ENROLLMENT",
            RosterActionType::CreateOffering => "CREATE_OFFERING",
            RosterActionType::DeleteOffering => "DELETE_OFFERING",
            RosterActionType::CreateStaff => "CREATE_STAFF",
            RosterActionType::DeleteStaff => "DELETE_STAFF",
            RosterActionType::SetCapacityFraction => "SET_CAPACITY_FRACTION",
            RosterActionType::CreateSubject => "CREATE_SUBJECT",
            RosterActionType::AddExpertise => "ADD_EXPERTISE",
            RosterActionType::RemoveExpertise => "REMOVE_EXPERTISE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ASSIGN_STAFF" => Some(RosterActionType::AssignStaff),
            "UNASSIGN_STAFF" => Some(RosterActionType::UnassignStaff),
            "SET_ENROLLMENT" => Some(RosterActionType::SetEnrollment),
            "CREATE_OFFERING" => Some(RosterActionType::CreateOffering),
            "DELETE_OFFERING" => Some(RosterActionType::DeleteOffering),
            "CREATE_STAFF" => Some(RosterActionType::CreateStaff),
            "DELETE_STAFF" => Some(RosterActionType::DeleteStaff),
            "SET_CAPACITY_FRACTION" => Some(RosterActionType::SetCapacityFraction),
            "CREATE_SUBJECT" => Some(RosterActionType::CreateSubject),
            "ADD_EXPERTISE" => Some(RosterActionType::AddExpertise),
            "REMOVE_EXPERTISE" => Some(RosterActionType::RemoveExpertise),
            _ => None,
        }
    }
}

impl fmt::Display for RosterActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
