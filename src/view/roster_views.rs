// ==========================================
// 课程排班系统 - 派生视图缓存
// ==========================================
// 职责: 教职工课表与全局开课日历的按需计算 + TTL 缓存
// 失效: 成员关系变更事件同步失效相关教职工键与全局键
//       选课人数/合同比例变更不失效（超负荷显示允许在 TTL 内滞后）
// ==========================================

use crate::domain::offering::Offering;
use crate::domain::types::LoadKey;
use crate::engine::error::{RosterError, RosterResult};
use crate::engine::events::{RosterEvent, RosterEventPublisher};
use crate::engine::repositories::RosterRepositories;
use crate::view::ttl_cache::TtlCache;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

// ==========================================
// 视图结构
// ==========================================

/// 课表/日历中的一个开课实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub offering_id: i64,
    pub subject_code: String,
    pub subject_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub enrollment_count: u32,
}

impl ScheduleEntry {
    fn from_offering(offering: &Offering, subject_name: String) -> Self {
        Self {
            offering_id: offering.offering_id,
            subject_code: offering.subject_code.clone(),
            subject_name,
            start_date: offering.start_date,
            end_date: offering.end_date(),
            enrollment_count: offering.enrollment_count,
        }
    }
}

/// 教职工课表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffSchedule {
    pub staff_id: i64,
    pub entries: Vec<ScheduleEntry>,
    /// 课表覆盖的年份（升序）
    pub years: Vec<i32>,
}

/// 日历条目: 开课实例 + 分配者 + 超负荷标记
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub entry: ScheduleEntry,
    pub assigned_staff: Vec<i64>,
    /// 是否有分配者在开课月超负荷
    pub any_assigned_overloaded: bool,
}

/// 全局开课日历
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferingCalendar {
    pub entries: Vec<CalendarEntry>,
    pub years: Vec<i32>,
}

fn years_covered<'a>(entries: impl Iterator<Item = &'a ScheduleEntry>) -> Vec<i32> {
    let years: BTreeSet<i32> = entries
        .flat_map(|e| [e.start_date.year(), e.end_date.year()])
        .collect();
    years.into_iter().collect()
}

// ==========================================
// RosterViewCache - 派生视图缓存
// ==========================================
pub struct RosterViewCache {
    repos: RosterRepositories,
    schedules: TtlCache<i64, StaffSchedule>,
    calendar: TtlCache<(), OfferingCalendar>,
}

impl RosterViewCache {
    pub fn new(repos: RosterRepositories, ttl: Duration) -> Self {
        Self {
            repos,
            schedules: TtlCache::new(ttl),
            calendar: TtlCache::new(ttl),
        }
    }

    /// 教职工课表（缓存）
    pub fn staff_schedule(&self, staff_id: i64) -> RosterResult<Arc<StaffSchedule>> {
        self.schedules
            .get_or_try_insert_with(staff_id, || self.compute_staff_schedule(staff_id))
    }

    /// 全局开课日历（缓存）
    pub fn offering_calendar(&self) -> RosterResult<Arc<OfferingCalendar>> {
        self.calendar
            .get_or_try_insert_with((), || self.compute_offering_calendar())
    }

    /// 失效全部缓存
    pub fn invalidate_all(&self) {
        self.schedules.clear();
        self.calendar.clear();
    }

    fn compute_staff_schedule(&self, staff_id: i64) -> RosterResult<StaffSchedule> {
        if self.repos.staff_repo.find_by_id(staff_id)?.is_none() {
            return Err(RosterError::not_found("StaffMember", staff_id));
        }

        let offerings = self.repos.assignment_repo.find_offerings_by_staff(staff_id, None)?;
        let mut names: HashMap<String, String> = HashMap::new();
        let mut entries = Vec::with_capacity(offerings.len());
        for offering in &offerings {
            let name = match names.get(&offering.subject_code) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .repos
                        .offering_repo
                        .find_subject(&offering.subject_code)?
                        .map(|s| s.subject_name)
                        .unwrap_or_default();
                    names.insert(offering.subject_code.clone(), name.clone());
                    name
                }
            };
            entries.push(ScheduleEntry::from_offering(offering, name));
        }

        let years = years_covered(entries.iter());
        tracing::debug!(staff_id, entries = entries.len(), "教职工课表已计算");
        Ok(StaffSchedule {
            staff_id,
            entries,
            years,
        })
    }

    fn compute_offering_calendar(&self) -> RosterResult<OfferingCalendar> {
        let offerings = self.repos.offering_repo.list_with_subject()?;
        let mut entries = Vec::with_capacity(offerings.len());

        for (offering, subject_name) in offerings {
            let assigned_staff = self
                .repos
                .assignment_repo
                .find_staff_ids_by_offering(offering.offering_id)?;

            let mut any_assigned_overloaded = false;
            for staff_id in &assigned_staff {
                let load = self
                    .repos
                    .load_repo
                    .find(LoadKey::new(*staff_id, offering.period()))?;
                if load.map(|l| l.is_overloaded).unwrap_or(false) {
                    any_assigned_overloaded = true;
                    break;
                }
            }

            entries.push(CalendarEntry {
                entry: ScheduleEntry::from_offering(&offering, subject_name),
                assigned_staff,
                any_assigned_overloaded,
            });
        }

        let years = years_covered(entries.iter().map(|e| &e.entry));
        tracing::debug!(entries = entries.len(), "开课日历已计算");
        Ok(OfferingCalendar { entries, years })
    }
}

impl RosterEventPublisher for RosterViewCache {
    fn publish(&self, event: &RosterEvent) -> Result<usize, Box<dyn Error + Send + Sync>> {
        if !event.changes_membership() {
            tracing::debug!(event_type = event.event_type.as_str(), "非成员关系变更，缓存保持");
            return Ok(0);
        }

        let mut invalidated = 0;
        for staff_id in &event.affected_staff {
            if self.schedules.invalidate(staff_id) {
                invalidated += 1;
            }
        }
        if self.calendar.invalidate(&()) {
            invalidated += 1;
        }

        tracing::debug!(
            event_type = event.event_type.as_str(),
            staff = ?event.affected_staff,
            invalidated,
            "派生视图缓存已失效"
        );
        Ok(invalidated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start: NaiveDate) -> ScheduleEntry {
        let offering = Offering {
            offering_id: 1,
            subject_code: "CSE1001".to_string(),
            start_date: start,
            enrollment_count: 0,
        };
        ScheduleEntry::from_offering(&offering, "Intro".to_string())
    }

    #[test]
    fn test_entry_end_date() {
        let e = entry(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(e.end_date, NaiveDate::from_ymd_opt(2026, 5, 23).unwrap());
    }

    #[test]
    fn test_years_cover_window_into_next_year() {
        let entries = [
            entry(NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()),
            entry(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()),
        ];
        assert_eq!(years_covered(entries.iter()), vec![2025, 2026]);
    }
}
