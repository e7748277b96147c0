// ==========================================
// 课程排班系统 - 分配协调器
// ==========================================
// 职责: 排班变更的唯一入口，保证容量模型与月度负载一致
// 红线: 变更与其引发的重算在同一事务内提交，绝不单独提交变更
// 红线: 校验失败零变更
// 红线: 移除分配必须先删除再重算（被移除者重算时不再计入）
// ==========================================
// 输入: 分配/移除/改人数/删除 等操作
// 输出: MutationOutcome（受影响者中是否有人超负荷）
// ==========================================

use crate::db::run_in_transaction;
use crate::domain::action_log::RosterActionLog;
use crate::domain::offering::{Assignment, NewOffering, Offering, StaffExpertise, Subject, SUBJECT_CODE_MAX_LEN};
use crate::domain::staff::{is_valid_capacity_fraction, NewStaffMember, StaffMember};
use crate::domain::types::{LoadKey, RosterActionType, YearMonth};
use crate::domain::workload::MonthlyLoad;
use crate::engine::aggregation::{staff_load_keys_tx, AggregationEngine};
use crate::engine::error::{RosterError, RosterResult};
use crate::engine::events::{OptionalEventPublisher, RosterEvent, RosterEventType};
use crate::repository::error::RepositoryError;
use crate::repository::{
    AssignmentRepository, ExpertiseRepository, MonthlyLoadRepository, OfferingRepository,
    RosterActionLogRepository, StaffRepository,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::instrument;

// ==========================================
// MutationOutcome - 变更结果
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationOutcome {
    /// 受影响的教职工中是否有人超负荷（调用方依据此值提示）
    pub any_overloaded: bool,
    /// 本次重算（或读取）的月度负载
    pub loads: Vec<MonthlyLoad>,
}

impl MutationOutcome {
    fn from_loads(loads: Vec<MonthlyLoad>) -> Self {
        Self {
            any_overloaded: loads.iter().any(|l| l.is_overloaded),
            loads,
        }
    }

    pub fn overloaded_staff(&self) -> Vec<i64> {
        self.loads
            .iter()
            .filter(|l| l.is_overloaded)
            .map(|l| l.staff_id)
            .collect()
    }
}

// ==========================================
// AssignmentCoordinator - 分配协调器
// ==========================================
pub struct AssignmentCoordinator {
    conn: Arc<Mutex<Connection>>,
    aggregation: Arc<AggregationEngine>,
    publisher: OptionalEventPublisher,
}

impl AssignmentCoordinator {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        aggregation: Arc<AggregationEngine>,
        publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            conn,
            aggregation,
            publisher,
        }
    }

    // ==========================================
    // 分配关系
    // ==========================================

    /// 分配教职工到开课实例
    ///
    /// # 返回
    /// - `Err(NotFound)`: 开课实例或教职工不存在
    /// - `Err(DuplicateAssignment)`: 已分配
    /// - `Ok`: 该实例所有分配者（含新分配者）的当月负载
    #[instrument(skip(self), fields(offering_id = %offering_id, staff_id = %staff_id))]
    pub fn assign_staff(&self, offering_id: i64, staff_id: i64) -> RosterResult<MutationOutcome> {
        let (outcome, period, staff_ids) = self.aggregation.with_locked_keys(
            |conn| {
                StaffRepository::get_tx(conn, staff_id)?;
                let mut keys = offering_keys_tx(conn, offering_id)?;
                let offering = OfferingRepository::get_tx(conn, offering_id)?;
                keys.insert(LoadKey::new(staff_id, offering.period()));
                Ok(keys)
            },
            |conn, _keys| {
                let offering = OfferingRepository::get_tx(conn, offering_id)?;
                let assignment = Assignment { offering_id, staff_id };
                if AssignmentRepository::exists_tx(conn, assignment)? {
                    return Err(RosterError::DuplicateAssignment { offering_id, staff_id });
                }
                AssignmentRepository::insert_tx(conn, assignment)?;

                let staff_ids = AssignmentRepository::find_staff_ids_by_offering_tx(conn, offering_id)?;
                let outcome = self.recompute_all(conn, &staff_ids, offering.period())?;

                write_log(
                    conn,
                    RosterActionLog::new(RosterActionType::AssignStaff)
                        .offering(offering_id)
                        .staff(staff_id)
                        .payload(json!({ "assigned_staff": staff_ids }))
                        .overloaded(outcome.any_overloaded),
                )?;
                Ok((outcome, offering.period(), staff_ids))
            },
        )?;

        tracing::info!(
            offering_id,
            staff_id,
            assigned = staff_ids.len(),
            any_overloaded = outcome.any_overloaded,
            "教职工已分配"
        );
        self.publisher.publish(
            &RosterEvent::new(RosterEventType::AssignmentAdded, staff_ids).for_offering(offering_id, period),
        );
        Ok(outcome)
    }

    /// 从开课实例移除教职工
    ///
    /// 先删除分配，再重算被移除者与剩余分配者
    ///
    /// # 返回
    /// - `Err(NotFound)`: 开课实例或教职工不存在
    /// - `Err(NotAssigned)`: 两者均存在但未分配
    #[instrument(skip(self), fields(offering_id = %offering_id, staff_id = %staff_id))]
    pub fn unassign_staff(&self, offering_id: i64, staff_id: i64) -> RosterResult<MutationOutcome> {
        let (outcome, period, mut affected) = self.aggregation.with_locked_keys(
            |conn| {
                StaffRepository::get_tx(conn, staff_id)?;
                let mut keys = offering_keys_tx(conn, offering_id)?;
                let offering = OfferingRepository::get_tx(conn, offering_id)?;
                keys.insert(LoadKey::new(staff_id, offering.period()));
                Ok(keys)
            },
            |conn, _keys| {
                let offering = OfferingRepository::get_tx(conn, offering_id)?;
                let assignment = Assignment { offering_id, staff_id };
                if !AssignmentRepository::exists_tx(conn, assignment)? {
                    return Err(RosterError::NotAssigned { offering_id, staff_id });
                }
                AssignmentRepository::delete_tx(conn, assignment)?;

                let remaining = AssignmentRepository::find_staff_ids_by_offering_tx(conn, offering_id)?;
                let mut affected = vec![staff_id];
                affected.extend(remaining.iter().copied());
                let outcome = self.recompute_all(conn, &affected, offering.period())?;

                write_log(
                    conn,
                    RosterActionLog::new(RosterActionType::UnassignStaff)
                        .offering(offering_id)
                        .staff(staff_id)
                        .payload(json!({ "remaining_staff": remaining }))
                        .overloaded(outcome.any_overloaded),
                )?;
                Ok((outcome, offering.period(), affected))
            },
        )?;

        tracing::info!(
            offering_id,
            staff_id,
            remaining = affected.len() - 1,
            any_overloaded = outcome.any_overloaded,
            "教职工已移除"
        );
        affected.sort_unstable();
        self.publisher.publish(
            &RosterEvent::new(RosterEventType::AssignmentRemoved, affected).for_offering(offering_id, period),
        );
        Ok(outcome)
    }

    // ==========================================
    // 开课实例
    // ==========================================

    /// 修改选课人数
    ///
    /// 新旧人数均不超过阈值时不重算，直接返回分配者已持久化的超负荷状态
    #[instrument(skip(self), fields(offering_id = %offering_id, new_count = %new_count))]
    pub fn set_enrollment(&self, offering_id: i64, new_count: i64) -> RosterResult<MutationOutcome> {
        let new_count = u32::try_from(new_count).map_err(|_| RosterError::InvalidEnrollment(new_count))?;
        let formula = *self.aggregation.formula();

        let (outcome, period, staff_ids, recomputed) = self.aggregation.with_locked_keys(
            |conn| offering_keys_tx(conn, offering_id),
            |conn, _keys| {
                let offering = OfferingRepository::get_tx(conn, offering_id)?;
                let old_count = offering.enrollment_count;
                OfferingRepository::update_enrollment_tx(conn, offering_id, new_count)?;

                let staff_ids = AssignmentRepository::find_staff_ids_by_offering_tx(conn, offering_id)?;
                let recomputed = formula.straddles_threshold(old_count, new_count);
                let outcome = if recomputed {
                    self.recompute_all(conn, &staff_ids, offering.period())?
                } else {
                    self.persisted_outcome(conn, &staff_ids, offering.period())?
                };

                write_log(
                    conn,
                    RosterActionLog::new(RosterActionType::SetEnrollment)
                        .offering(offering_id)
                        .payload(json!({
                            "old_count": old_count,
                            "new_count": new_count,
                            "recomputed": recomputed,
                        }))
                        .overloaded(outcome.any_overloaded),
                )?;
                Ok((outcome, offering.period(), staff_ids, recomputed))
            },
        )?;

        tracing::info!(
            offering_id,
            new_count,
            recomputed,
            any_overloaded = outcome.any_overloaded,
            "选课人数已更新"
        );
        self.publisher.publish(
            &RosterEvent::new(RosterEventType::EnrollmentChanged, staff_ids).for_offering(offering_id, period),
        );
        Ok(outcome)
    }

    /// 新建开课实例（尚无分配，不产生负载）
    #[instrument(skip(self, new_offering), fields(subject_code = %new_offering.subject_code))]
    pub fn create_offering(&self, new_offering: &NewOffering) -> RosterResult<Offering> {
        let enrollment = u32::try_from(new_offering.enrollment_count)
            .map_err(|_| RosterError::InvalidEnrollment(new_offering.enrollment_count))?;

        let offering = run_in_transaction(&self.conn, |tx| -> RosterResult<Offering> {
            if OfferingRepository::find_subject_tx(tx, &new_offering.subject_code)?.is_none() {
                return Err(RosterError::not_found("Subject", &new_offering.subject_code));
            }
            let offering_id =
                OfferingRepository::insert_tx(tx, &new_offering.subject_code, new_offering.start_date, enrollment)?;
            write_log(
                tx,
                RosterActionLog::new(RosterActionType::CreateOffering)
                    .offering(offering_id)
                    .payload(json!({
                        "subject_code": new_offering.subject_code,
                        "start_date": new_offering.start_date,
                        "enrollment_count": enrollment,
                    })),
            )?;
            Ok(OfferingRepository::get_tx(tx, offering_id)?)
        })?;

        tracing::info!(offering_id = offering.offering_id, start_date = %offering.start_date, "开课实例已创建");
        self.publisher.publish(
            &RosterEvent::new(RosterEventType::OfferingCreated, Vec::new())
                .for_offering(offering.offering_id, offering.period()),
        );
        Ok(offering)
    }

    /// 删除开课实例
    ///
    /// 先记录分配者，删除分配与实例后重算这些人
    #[instrument(skip(self), fields(offering_id = %offering_id))]
    pub fn delete_offering(&self, offering_id: i64) -> RosterResult<MutationOutcome> {
        let (outcome, period, staff_ids) = self.aggregation.with_locked_keys(
            |conn| offering_keys_tx(conn, offering_id),
            |conn, _keys| {
                let offering = OfferingRepository::get_tx(conn, offering_id)?;
                let staff_ids = AssignmentRepository::find_staff_ids_by_offering_tx(conn, offering_id)?;

                AssignmentRepository::delete_by_offering_tx(conn, offering_id)?;
                OfferingRepository::delete_tx(conn, offering_id)?;

                let outcome = self.recompute_all(conn, &staff_ids, offering.period())?;
                write_log(
                    conn,
                    RosterActionLog::new(RosterActionType::DeleteOffering)
                        .offering(offering_id)
                        .payload(json!({
                            "subject_code": offering.subject_code,
                            "start_date": offering.start_date,
                            "released_staff": staff_ids,
                        }))
                        .overloaded(outcome.any_overloaded),
                )?;
                Ok((outcome, offering.period(), staff_ids))
            },
        )?;

        tracing::info!(
            offering_id,
            released = staff_ids.len(),
            any_overloaded = outcome.any_overloaded,
            "开课实例已删除"
        );
        self.publisher.publish(
            &RosterEvent::new(RosterEventType::OfferingDeleted, staff_ids).for_offering(offering_id, period),
        );
        Ok(outcome)
    }

    // ==========================================
    // 教职工
    // ==========================================

    /// 新建教职工
    #[instrument(skip(self, new_staff), fields(email = %new_staff.email))]
    pub fn create_staff_member(&self, new_staff: &NewStaffMember) -> RosterResult<StaffMember> {
        if !is_valid_capacity_fraction(new_staff.capacity_fraction) {
            return Err(RosterError::InvalidCapacityFraction(new_staff.capacity_fraction));
        }
        if new_staff.email.trim().is_empty() {
            return Err(RosterError::InvalidInput("email 不能为空".to_string()));
        }

        let staff = run_in_transaction(&self.conn, |tx| -> RosterResult<StaffMember> {
            let staff_id = StaffRepository::insert_tx(tx, new_staff).map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(_) => {
                    RosterError::InvalidInput(format!("email 已存在: {}", new_staff.email))
                }
                other => other.into(),
            })?;
            write_log(
                tx,
                RosterActionLog::new(RosterActionType::CreateStaff)
                    .staff(staff_id)
                    .payload(json!({
                        "email": new_staff.email,
                        "capacity_fraction": new_staff.capacity_fraction,
                    })),
            )?;
            Ok(StaffRepository::get_tx(tx, staff_id)?)
        })?;

        tracing::info!(staff_id = staff.staff_id, "教职工已创建");
        Ok(staff)
    }

    /// 修改合同比例，并重新评估该教职工全部月度负载
    #[instrument(skip(self), fields(staff_id = %staff_id, capacity_fraction = %capacity_fraction))]
    pub fn set_capacity_fraction(&self, staff_id: i64, capacity_fraction: f64) -> RosterResult<MutationOutcome> {
        if !is_valid_capacity_fraction(capacity_fraction) {
            return Err(RosterError::InvalidCapacityFraction(capacity_fraction));
        }

        let outcome = self.aggregation.with_locked_keys(
            |conn| {
                StaffRepository::get_tx(conn, staff_id)?;
                staff_load_keys_tx(conn, staff_id)
            },
            |conn, keys| {
                let previous = StaffRepository::get_tx(conn, staff_id)?.capacity_fraction;
                StaffRepository::update_capacity_fraction_tx(conn, staff_id, capacity_fraction)?;

                let loads = keys
                    .iter()
                    .map(|key| self.aggregation.recompute_in_tx(conn, key.staff_id, key.period))
                    .collect::<RosterResult<Vec<MonthlyLoad>>>()?;
                let outcome = MutationOutcome::from_loads(loads);

                write_log(
                    conn,
                    RosterActionLog::new(RosterActionType::SetCapacityFraction)
                        .staff(staff_id)
                        .payload(json!({
                            "previous": previous,
                            "capacity_fraction": capacity_fraction,
                            "periods": outcome.loads.len(),
                        }))
                        .overloaded(outcome.any_overloaded),
                )?;
                Ok(outcome)
            },
        )?;

        tracing::info!(
            staff_id,
            capacity_fraction,
            periods = outcome.loads.len(),
            any_overloaded = outcome.any_overloaded,
            "合同比例已更新"
        );
        self.publisher
            .publish(&RosterEvent::new(RosterEventType::CapacityChanged, vec![staff_id]));
        Ok(outcome)
    }

    /// 删除教职工
    ///
    /// 级联删除其分配、专长与月度负载；其所教实例的其余分配者按新人数重算
    #[instrument(skip(self), fields(staff_id = %staff_id))]
    pub fn delete_staff_member(&self, staff_id: i64) -> RosterResult<MutationOutcome> {
        let (outcome, co_staff) = self.aggregation.with_locked_keys(
            |conn| {
                StaffRepository::get_tx(conn, staff_id)?;
                let mut keys = staff_load_keys_tx(conn, staff_id)?;
                for offering in AssignmentRepository::find_offerings_by_staff_tx(conn, staff_id, None)? {
                    keys.extend(offering_keys_tx(conn, offering.offering_id)?);
                }
                Ok(keys)
            },
            |conn, _keys| {
                let offerings = AssignmentRepository::find_offerings_by_staff_tx(conn, staff_id, None)?;
                StaffRepository::delete_tx(conn, staff_id)?;

                // 级联后剩余的分配者
                let mut co_keys = BTreeSet::new();
                for offering in &offerings {
                    for other in AssignmentRepository::find_staff_ids_by_offering_tx(conn, offering.offering_id)? {
                        co_keys.insert(LoadKey::new(other, offering.period()));
                    }
                }
                let loads = co_keys
                    .iter()
                    .map(|key| self.aggregation.recompute_in_tx(conn, key.staff_id, key.period))
                    .collect::<RosterResult<Vec<MonthlyLoad>>>()?;
                let outcome = MutationOutcome::from_loads(loads);

                let co_staff: BTreeSet<i64> = co_keys.iter().map(|k| k.staff_id).collect();
                write_log(
                    conn,
                    RosterActionLog::new(RosterActionType::DeleteStaff)
                        .staff(staff_id)
                        .payload(json!({
                            "offerings": offerings.iter().map(|o| o.offering_id).collect::<Vec<_>>(),
                            "co_staff": co_staff,
                        }))
                        .overloaded(outcome.any_overloaded),
                )?;
                Ok((outcome, co_staff))
            },
        )?;

        tracing::info!(
            staff_id,
            co_staff = co_staff.len(),
            any_overloaded = outcome.any_overloaded,
            "教职工已删除"
        );
        let mut affected = vec![staff_id];
        affected.extend(co_staff);
        self.publisher
            .publish(&RosterEvent::new(RosterEventType::StaffDeleted, affected));
        Ok(outcome)
    }

    // ==========================================
    // 课程与专长
    // ==========================================

    /// 新建课程
    #[instrument(skip(self, subject), fields(subject_code = %subject.subject_code))]
    pub fn create_subject(&self, subject: &Subject) -> RosterResult<()> {
        let code = subject.subject_code.trim();
        if code.is_empty() || code.chars().count() > SUBJECT_CODE_MAX_LEN {
            return Err(RosterError::InvalidInput(format!(
                "课程代码长度必须在 1..={} 之间: {:?}",
                SUBJECT_CODE_MAX_LEN, subject.subject_code
            )));
        }
        if subject.subject_name.trim().is_empty() {
            return Err(RosterError::InvalidInput("课程名称不能为空".to_string()));
        }

        run_in_transaction(&self.conn, |tx| -> RosterResult<()> {
            if OfferingRepository::find_subject_tx(tx, code)?.is_some() {
                return Err(RosterError::InvalidInput(format!("课程已存在: {}", code)));
            }
            OfferingRepository::upsert_subject_tx(
                tx,
                &Subject {
                    subject_code: code.to_string(),
                    subject_name: subject.subject_name.trim().to_string(),
                },
            )?;
            write_log(
                tx,
                RosterActionLog::new(RosterActionType::CreateSubject).payload(json!({
                    "subject_code": code,
                    "subject_name": subject.subject_name,
                })),
            )
        })?;

        tracing::info!(subject_code = code, "课程已创建");
        Ok(())
    }

    /// 登记教职工专长（已存在时无变化）
    #[instrument(skip(self))]
    pub fn add_expertise(&self, subject_code: &str, staff_id: i64) -> RosterResult<bool> {
        let inserted = run_in_transaction(&self.conn, |tx| -> RosterResult<bool> {
            StaffRepository::get_tx(tx, staff_id)?;
            if OfferingRepository::find_subject_tx(tx, subject_code)?.is_none() {
                return Err(RosterError::not_found("Subject", subject_code));
            }
            let expertise = StaffExpertise {
                subject_code: subject_code.to_string(),
                staff_id,
            };
            let inserted = ExpertiseRepository::insert_tx(tx, &expertise)? > 0;
            if inserted {
                write_log(
                    tx,
                    RosterActionLog::new(RosterActionType::AddExpertise)
                        .staff(staff_id)
                        .payload(json!({ "subject_code": subject_code })),
                )?;
            }
            Ok(inserted)
        })?;

        tracing::debug!(staff_id, subject_code, inserted, "专长登记");
        Ok(inserted)
    }

    /// 移除教职工专长
    #[instrument(skip(self))]
    pub fn remove_expertise(&self, subject_code: &str, staff_id: i64) -> RosterResult<()> {
        run_in_transaction(&self.conn, |tx| -> RosterResult<()> {
            let expertise = StaffExpertise {
                subject_code: subject_code.to_string(),
                staff_id,
            };
            if ExpertiseRepository::delete_tx(tx, &expertise)? == 0 {
                return Err(RosterError::not_found(
                    "StaffExpertise",
                    format!("{}/{}", subject_code, staff_id),
                ));
            }
            write_log(
                tx,
                RosterActionLog::new(RosterActionType::RemoveExpertise)
                    .staff(staff_id)
                    .payload(json!({ "subject_code": subject_code })),
            )
        })?;

        tracing::debug!(staff_id, subject_code, "专长已移除");
        Ok(())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn recompute_all(&self, conn: &Connection, staff_ids: &[i64], period: YearMonth) -> RosterResult<MutationOutcome> {
        let loads = staff_ids
            .iter()
            .map(|staff_id| self.aggregation.recompute_in_tx(conn, *staff_id, period))
            .collect::<RosterResult<Vec<MonthlyLoad>>>()?;
        Ok(MutationOutcome::from_loads(loads))
    }

    /// 读取已持久化的负载；缺失时惰性重算
    fn persisted_outcome(
        &self,
        conn: &Connection,
        staff_ids: &[i64],
        period: YearMonth,
    ) -> RosterResult<MutationOutcome> {
        let mut loads = Vec::with_capacity(staff_ids.len());
        for staff_id in staff_ids {
            let load = match MonthlyLoadRepository::find_tx(conn, LoadKey::new(*staff_id, period))? {
                Some(load) => load,
                None => self.aggregation.recompute_in_tx(conn, *staff_id, period)?,
            };
            loads.push(load);
        }
        Ok(MutationOutcome::from_loads(loads))
    }
}

/// 开课实例当前全部分配者在其月份的键
fn offering_keys_tx(conn: &Connection, offering_id: i64) -> RosterResult<BTreeSet<LoadKey>> {
    let offering = OfferingRepository::get_tx(conn, offering_id)?;
    let period = offering.period();
    Ok(AssignmentRepository::find_staff_ids_by_offering_tx(conn, offering_id)?
        .into_iter()
        .map(|staff_id| LoadKey::new(staff_id, period))
        .collect())
}

fn write_log(conn: &Connection, log: RosterActionLog) -> RosterResult<()> {
    RosterActionLogRepository::insert_tx(conn, &log)?;
    Ok(())
}
