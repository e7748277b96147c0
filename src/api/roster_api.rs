// ==========================================
// 课程排班系统 - 排班 API
// ==========================================
// 职责: 展示层调用的统一入口，装配仓储、引擎、缓存与协调器
// 前置: 访问控制由展示层在调用前完成
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::config::EngineSettings;
use crate::domain::action_log::RosterActionLog;
use crate::domain::offering::{NewOffering, Offering, Subject};
use crate::domain::staff::{NewStaffMember, StaffMember};
use crate::domain::types::{LoadKey, YearMonth};
use crate::domain::workload::MonthlyLoad;
use crate::engine::{
    AggregationEngine, AssignmentCoordinator, CandidateRanking, LoadLockRegistry, MutationOutcome,
    OptionalEventPublisher, OverloadedStaffReport, RosterRepositories, WorkloadFormula, WorkloadReporter,
};
use crate::view::{OfferingCalendar, RosterViewCache, StaffSchedule};

// ==========================================
// RosterApi - 排班 API
// ==========================================

/// 排班API
///
/// 职责：
/// 1. 分配/移除/选课人数/删除 等变更（返回超负荷标记）
/// 2. 工作量报表与候选教师排序
/// 3. 缓存的课表与开课日历
pub struct RosterApi {
    repos: RosterRepositories,
    aggregation: Arc<AggregationEngine>,
    coordinator: AssignmentCoordinator,
    reporter: WorkloadReporter,
    views: Arc<RosterViewCache>,
}

impl RosterApi {
    /// 在共享连接上装配全部组件
    ///
    /// # 参数
    /// - conn: 已建表的共享连接
    /// - settings: 工作量公式参数与缓存有效期
    pub fn new(conn: Arc<Mutex<Connection>>, settings: &EngineSettings) -> Self {
        let formula = WorkloadFormula::new(settings.workload);
        let repos = RosterRepositories::from_connection(conn.clone());
        let aggregation = Arc::new(AggregationEngine::new(conn.clone(), LoadLockRegistry::new(), formula));
        let views = Arc::new(RosterViewCache::new(repos.clone(), settings.view_cache_ttl()));
        let coordinator = AssignmentCoordinator::new(
            conn.clone(),
            aggregation.clone(),
            OptionalEventPublisher::with_publisher(views.clone()),
        );
        let reporter = WorkloadReporter::new(conn, formula);

        Self {
            repos,
            aggregation,
            coordinator,
            reporter,
            views,
        }
    }

    // ==========================================
    // 分配变更
    // ==========================================

    pub fn assign_staff(&self, offering_id: i64, staff_id: i64) -> ApiResult<MutationOutcome> {
        Ok(self.coordinator.assign_staff(offering_id, staff_id)?)
    }

    pub fn unassign_staff(&self, offering_id: i64, staff_id: i64) -> ApiResult<MutationOutcome> {
        Ok(self.coordinator.unassign_staff(offering_id, staff_id)?)
    }

    pub fn set_enrollment(&self, offering_id: i64, new_count: i64) -> ApiResult<MutationOutcome> {
        Ok(self.coordinator.set_enrollment(offering_id, new_count)?)
    }

    // ==========================================
    // 开课实例与课程
    // ==========================================

    pub fn create_subject(&self, subject_code: &str, subject_name: &str) -> ApiResult<Subject> {
        let subject = Subject {
            subject_code: subject_code.trim().to_string(),
            subject_name: subject_name.trim().to_string(),
        };
        self.coordinator.create_subject(&subject)?;
        Ok(subject)
    }

    pub fn create_offering(&self, new_offering: &NewOffering) -> ApiResult<Offering> {
        Ok(self.coordinator.create_offering(new_offering)?)
    }

    pub fn delete_offering(&self, offering_id: i64) -> ApiResult<MutationOutcome> {
        Ok(self.coordinator.delete_offering(offering_id)?)
    }

    pub fn get_offering(&self, offering_id: i64) -> ApiResult<Offering> {
        self.repos
            .offering_repo
            .find_by_id(offering_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Offering(id={})不存在", offering_id)))
    }

    /// 开课实例当前分配的教职工
    pub fn assigned_staff(&self, offering_id: i64) -> ApiResult<Vec<i64>> {
        self.get_offering(offering_id)?;
        Ok(self.repos.assignment_repo.find_staff_ids_by_offering(offering_id)?)
    }

    /// 指定年月开课的实例
    pub fn offerings_in_month(&self, year: i32, month: u32) -> ApiResult<Vec<Offering>> {
        let period = parse_period(year, month)?;
        Ok(self.repos.offering_repo.find_by_period(period)?)
    }

    // ==========================================
    // 教职工
    // ==========================================

    pub fn create_staff_member(&self, new_staff: &NewStaffMember) -> ApiResult<StaffMember> {
        Ok(self.coordinator.create_staff_member(new_staff)?)
    }

    pub fn set_capacity_fraction(&self, staff_id: i64, capacity_fraction: f64) -> ApiResult<MutationOutcome> {
        Ok(self.coordinator.set_capacity_fraction(staff_id, capacity_fraction)?)
    }

    pub fn delete_staff_member(&self, staff_id: i64) -> ApiResult<MutationOutcome> {
        Ok(self.coordinator.delete_staff_member(staff_id)?)
    }

    pub fn get_staff(&self, staff_id: i64) -> ApiResult<StaffMember> {
        self.repos
            .staff_repo
            .find_by_id(staff_id)?
            .ok_or_else(|| ApiError::NotFound(format!("StaffMember(id={})不存在", staff_id)))
    }

    pub fn find_staff_by_email(&self, email: &str) -> ApiResult<Option<StaffMember>> {
        Ok(self.repos.staff_repo.find_by_email(email.trim())?)
    }

    pub fn list_staff(&self) -> ApiResult<Vec<StaffMember>> {
        Ok(self.repos.staff_repo.list_all()?)
    }

    pub fn add_expertise(&self, subject_code: &str, staff_id: i64) -> ApiResult<bool> {
        Ok(self.coordinator.add_expertise(subject_code, staff_id)?)
    }

    pub fn remove_expertise(&self, subject_code: &str, staff_id: i64) -> ApiResult<()> {
        Ok(self.coordinator.remove_expertise(subject_code, staff_id)?)
    }

    // ==========================================
    // 负载与报表
    // ==========================================

    /// 教职工某月负载（无记录时为 None）
    pub fn monthly_load(&self, staff_id: i64, year: i32, month: u32) -> ApiResult<Option<MonthlyLoad>> {
        let period = parse_period(year, month)?;
        Ok(self.repos.load_repo.find(LoadKey::new(staff_id, period))?)
    }

    pub fn monthly_loads(&self, staff_id: i64) -> ApiResult<Vec<MonthlyLoad>> {
        Ok(self.repos.load_repo.find_by_staff(staff_id)?)
    }

    /// 手动重算（运维用途）
    pub fn recompute(&self, staff_id: i64, year: i32, month: u32) -> ApiResult<MonthlyLoad> {
        let period = parse_period(year, month)?;
        Ok(self.aggregation.recompute(staff_id, period)?)
    }

    /// 全量重建全部月度负载，并失效视图缓存
    pub fn rebuild_all(&self) -> ApiResult<Vec<MonthlyLoad>> {
        let loads = self.aggregation.rebuild_all()?;
        self.views.invalidate_all();
        Ok(loads)
    }

    pub fn workload_percentage(&self, staff_id: i64, year: i32, month: u32) -> ApiResult<f64> {
        let period = parse_period(year, month)?;
        Ok(self.reporter.workload_percentage(staff_id, period)?)
    }

    pub fn overloaded_report(&self) -> ApiResult<Vec<OverloadedStaffReport>> {
        Ok(self.reporter.overloaded_report()?)
    }

    pub fn rank_candidates(&self, offering_id: i64, search: Option<&str>) -> ApiResult<Vec<CandidateRanking>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        Ok(self.reporter.rank_candidates(offering_id, search)?)
    }

    pub fn recent_actions(&self, limit: usize) -> ApiResult<Vec<RosterActionLog>> {
        Ok(self.repos.action_log_repo.find_recent(limit)?)
    }

    pub fn offering_actions(&self, offering_id: i64) -> ApiResult<Vec<RosterActionLog>> {
        Ok(self.repos.action_log_repo.find_by_offering(offering_id)?)
    }

    // ==========================================
    // 派生视图（缓存）
    // ==========================================

    pub fn staff_schedule(&self, staff_id: i64) -> ApiResult<Arc<StaffSchedule>> {
        Ok(self.views.staff_schedule(staff_id)?)
    }

    pub fn offering_calendar(&self) -> ApiResult<Arc<OfferingCalendar>> {
        let calendar = self.views.offering_calendar()?;
        debug!(entries = calendar.entries.len(), "开课日历");
        Ok(calendar)
    }
}

fn parse_period(year: i32, month: u32) -> ApiResult<YearMonth> {
    YearMonth::new(year, month).ok_or_else(|| ApiError::InvalidInput(format!("月份无效: {}", month)))
}
