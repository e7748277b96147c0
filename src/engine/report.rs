// ==========================================
// 课程排班系统 - 工作量报表
// ==========================================
// 职责: 工作量百分比、超负荷汇总、候选教师排序
// 红线: 只读，不触发重算（读取已持久化的月度负载）
// ==========================================

use crate::domain::offering::Offering;
use crate::domain::staff::StaffMember;
use crate::domain::types::{LoadKey, YearMonth};
use crate::domain::workload::MonthlyLoad;
use crate::engine::error::{RosterError, RosterResult};
use crate::engine::workload::WorkloadFormula;
use crate::repository::error::RepositoryError;
use crate::repository::{AssignmentRepository, ExpertiseRepository, MonthlyLoadRepository, OfferingRepository, StaffRepository};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 候选排序时考察的月份数（开课月及其后两个月）
pub const CANDIDATE_WINDOW_MONTHS: u32 = 3;

// ==========================================
// 报表结构
// ==========================================

/// 超负荷月份明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverloadedMonth {
    pub period: YearMonth,
    pub load_value: f64,
    pub percentage: f64,
    /// 该教职工当月所教开课实例
    pub offerings: Vec<Offering>,
}

/// 单个超负荷教职工汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverloadedStaffReport {
    pub staff: StaffMember,
    pub months: Vec<OverloadedMonth>,
}

/// 候选教师
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRanking {
    pub staff: StaffMember,
    pub already_assigned: bool,
    pub max_percentage: f64,
    pub expertise_count: u32,
}

// ==========================================
// WorkloadReporter - 报表引擎
// ==========================================
pub struct WorkloadReporter {
    conn: Arc<Mutex<Connection>>,
    formula: WorkloadFormula,
}

impl WorkloadReporter {
    pub fn new(conn: Arc<Mutex<Connection>>, formula: WorkloadFormula) -> Self {
        Self { conn, formula }
    }

    fn get_conn(&self) -> RosterResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()).into())
    }

    /// 工作量百分比 = load / (capacity_fraction × FULL_TIME_UNITS) × 100，保留两位小数
    ///
    /// 无月度负载记录时返回 0
    pub fn workload_percentage(&self, staff_id: i64, period: YearMonth) -> RosterResult<f64> {
        let conn = self.get_conn()?;
        let staff = StaffRepository::get_tx(&conn, staff_id)?;
        self.percentage_tx(&conn, &staff, period)
    }

    /// 全部超负荷记录，按教职工分组
    pub fn overloaded_report(&self) -> RosterResult<Vec<OverloadedStaffReport>> {
        let conn = self.get_conn()?;
        let overloaded = MonthlyLoadRepository::find_overloaded_tx(&conn)?;

        let mut grouped: BTreeMap<i64, Vec<MonthlyLoad>> = BTreeMap::new();
        for load in overloaded {
            grouped.entry(load.staff_id).or_default().push(load);
        }

        let mut report = Vec::with_capacity(grouped.len());
        for (staff_id, loads) in grouped {
            let staff = StaffRepository::get_tx(&conn, staff_id)?;
            let mut months = Vec::with_capacity(loads.len());
            for load in loads {
                let period = load.period();
                months.push(OverloadedMonth {
                    period,
                    load_value: load.load_value,
                    percentage: self.to_percentage(load.load_value, staff.capacity_fraction),
                    offerings: AssignmentRepository::find_offerings_by_staff_tx(&conn, staff_id, Some(period))?,
                });
            }
            report.push(OverloadedStaffReport { staff, months });
        }

        tracing::debug!(staff = report.len(), "超负荷报表已生成");
        Ok(report)
    }

    /// 开课实例的候选教师排序
    ///
    /// - 候选范围: 具备该课程专长的教职工（可按姓名模糊过滤）
    /// - 排序: 已分配优先，其次三个月内最高负载百分比降序，再次专长数降序
    pub fn rank_candidates(&self, offering_id: i64, search: Option<&str>) -> RosterResult<Vec<CandidateRanking>> {
        let conn = self.get_conn()?;
        let offering = OfferingRepository::find_by_id_tx(&conn, offering_id)?
            .ok_or_else(|| RosterError::not_found("Offering", offering_id))?;
        let assigned = AssignmentRepository::find_staff_ids_by_offering_tx(&conn, offering_id)?;
        let start = offering.period();

        let mut ranking = Vec::new();
        for staff in StaffRepository::find_by_expertise_tx(&conn, &offering.subject_code)? {
            if let Some(query) = search {
                if !staff.name_matches(query) {
                    continue;
                }
            }

            let mut max_percentage = 0.0_f64;
            for offset in 0..CANDIDATE_WINDOW_MONTHS {
                let pct = self.percentage_tx(&conn, &staff, start.plus_months(offset))?;
                max_percentage = max_percentage.max(pct);
            }

            ranking.push(CandidateRanking {
                already_assigned: assigned.contains(&staff.staff_id),
                expertise_count: ExpertiseRepository::count_by_staff_tx(&conn, staff.staff_id)?,
                max_percentage,
                staff,
            });
        }

        ranking.sort_by(compare_candidates);
        Ok(ranking)
    }

    fn percentage_tx(&self, conn: &Connection, staff: &StaffMember, period: YearMonth) -> RosterResult<f64> {
        let load = MonthlyLoadRepository::find_tx(conn, LoadKey::new(staff.staff_id, period))?;
        Ok(match load {
            Some(load) => self.to_percentage(load.load_value, staff.capacity_fraction),
            None => 0.0,
        })
    }

    fn to_percentage(&self, load_value: f64, capacity_fraction: f64) -> f64 {
        let capacity = self.formula.capacity_units(capacity_fraction);
        if capacity <= 0.0 {
            return 0.0;
        }
        round2(load_value / capacity * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn compare_candidates(a: &CandidateRanking, b: &CandidateRanking) -> Ordering {
    b.already_assigned
        .cmp(&a.already_assigned)
        .then_with(|| b.max_percentage.total_cmp(&a.max_percentage))
        .then_with(|| b.expertise_count.cmp(&a.expertise_count))
}
