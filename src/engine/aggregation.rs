// ==========================================
// 课程排班系统 - 月度负载聚合引擎
// ==========================================
// 职责: 按 (staff, year, month) 全量重算月度负载并持久化
// 红线: 每次都是全量重算,不做增量累加;重复调用结果一致
// 红线: load_value 与 is_overloaded 同时写入
// ==========================================
// 输入: 教职工 + 年月
// 输出: MonthlyLoad（不存在时惰性创建）
// ==========================================

use crate::db::run_in_transaction;
use crate::domain::types::{LoadKey, YearMonth};
use crate::domain::workload::MonthlyLoad;
use crate::engine::error::{RosterError, RosterResult};
use crate::engine::load_lock::LoadLockRegistry;
use crate::engine::workload::WorkloadFormula;
use crate::repository::error::RepositoryError;
use crate::repository::{AssignmentRepository, MonthlyLoadRepository, StaffRepository};
use chrono::Utc;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::instrument;

/// 键集合在加锁期间持续变化时的最大重试次数
const MAX_LOCK_ATTEMPTS: usize = 5;

enum Attempt<T> {
    Done(T),
    Retry(BTreeSet<LoadKey>),
}

// ==========================================
// AggregationEngine - 聚合引擎
// ==========================================
pub struct AggregationEngine {
    conn: Arc<Mutex<Connection>>,
    locks: LoadLockRegistry,
    formula: WorkloadFormula,
}

impl AggregationEngine {
    pub fn new(conn: Arc<Mutex<Connection>>, locks: LoadLockRegistry, formula: WorkloadFormula) -> Self {
        Self { conn, locks, formula }
    }

    pub fn formula(&self) -> &WorkloadFormula {
        &self.formula
    }

    pub fn locks(&self) -> &LoadLockRegistry {
        &self.locks
    }

    // ==========================================
    // 公开入口（自行加锁 + 独立事务）
    // ==========================================

    /// 重算单个教职工某月负载
    ///
    /// # 返回
    /// - `Ok(MonthlyLoad)`: 已持久化的记录
    /// - `Err(NotFound)`: 教职工不存在
    #[instrument(skip(self), fields(staff_id = %staff_id, period = %period))]
    pub fn recompute(&self, staff_id: i64, period: YearMonth) -> RosterResult<MonthlyLoad> {
        let key = LoadKey::new(staff_id, period);
        let _guard = self.locks.acquire([key])?;
        run_in_transaction(&self.conn, |tx| self.recompute_in_tx(tx, staff_id, period))
    }

    /// 重算教职工所有相关月份（有分配或已有记录的月份）
    #[instrument(skip(self), fields(staff_id = %staff_id))]
    pub fn recompute_staff_all_periods(&self, staff_id: i64) -> RosterResult<Vec<MonthlyLoad>> {
        self.with_locked_keys(
            |conn| {
                StaffRepository::get_tx(conn, staff_id)?;
                staff_load_keys_tx(conn, staff_id)
            },
            |conn, keys| {
                keys.iter()
                    .map(|key| self.recompute_in_tx(conn, key.staff_id, key.period))
                    .collect::<RosterResult<Vec<MonthlyLoad>>>()
            },
        )
    }

    /// 全量重建: 重算每个有分配或已有记录的键
    ///
    /// 已无开课实例的旧记录会被重算为 0
    #[instrument(skip(self))]
    pub fn rebuild_all(&self) -> RosterResult<Vec<MonthlyLoad>> {
        let loads = self.with_locked_keys(all_load_keys_tx, |conn, keys| {
            keys.iter()
                .map(|key| self.recompute_in_tx(conn, key.staff_id, key.period))
                .collect::<RosterResult<Vec<MonthlyLoad>>>()
        })?;

        let overloaded = loads.iter().filter(|l| l.is_overloaded).count();
        tracing::info!(total = loads.len(), overloaded, "月度负载全量重建完成");
        Ok(loads)
    }

    // ==========================================
    // 事务内重算（调用方已持有键锁与事务）
    // ==========================================

    pub(crate) fn recompute_in_tx(
        &self,
        conn: &Connection,
        staff_id: i64,
        period: YearMonth,
    ) -> RosterResult<MonthlyLoad> {
        let staff = StaffRepository::get_tx(conn, staff_id)?;
        let offerings = AssignmentRepository::find_offerings_by_staff_tx(conn, staff_id, Some(period))?;

        let mut load_value = 0.0;
        for offering in &offerings {
            let assigned = AssignmentRepository::count_by_offering_tx(conn, offering.offering_id)?;
            if assigned == 0 {
                continue;
            }
            load_value += self.formula.contribution(offering.enrollment_count, assigned);
        }

        let is_overloaded = self.formula.is_overloaded(load_value, staff.capacity_fraction);
        let record = MonthlyLoad {
            staff_id,
            month: period.month,
            year: period.year,
            load_value,
            is_overloaded,
            updated_at: Utc::now().naive_utc(),
        };
        MonthlyLoadRepository::upsert_tx(conn, &record)?;

        tracing::debug!(
            staff_id,
            period = %period,
            offerings = offerings.len(),
            load_value,
            "月度负载已重算"
        );
        if is_overloaded {
            tracing::warn!(
                staff_id,
                period = %period,
                load_value,
                capacity = self.formula.capacity_units(staff.capacity_fraction),
                "教职工超负荷"
            );
        }

        Ok(record)
    }

    /// 在键锁保护下执行一个事务
    ///
    /// 1. `plan` 在事务外读取当前状态，得出需要的键集合
    /// 2. 获取全部键后开启事务，再次执行 `plan` 校验键集合
    /// 3. 若出现未覆盖的新键，回滚并扩大键集合重试
    /// 4. 否则执行 `body`，提交后释放键锁
    pub(crate) fn with_locked_keys<T, P, F>(&self, plan: P, mut body: F) -> RosterResult<T>
    where
        P: Fn(&Connection) -> RosterResult<BTreeSet<LoadKey>>,
        F: FnMut(&Connection, &BTreeSet<LoadKey>) -> RosterResult<T>,
    {
        let mut keys = {
            let conn = self
                .conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            plan(&conn)?
        };

        for attempt in 1..=MAX_LOCK_ATTEMPTS {
            let guard = self.locks.acquire(keys.iter().copied())?;
            let outcome = run_in_transaction(&self.conn, |tx| -> RosterResult<Attempt<T>> {
                let conn: &Connection = tx;
                let current = plan(conn)?;
                if !current.is_subset(&keys) {
                    return Ok(Attempt::Retry(current));
                }
                body(conn, &current).map(Attempt::Done)
            })?;
            drop(guard);

            match outcome {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry(current) => {
                    tracing::debug!(attempt, "加锁期间负载键集合变化，扩大后重试");
                    keys.extend(current);
                }
            }
        }

        Err(RosterError::PersistenceFailure(format!(
            "负载键集合在 {} 次尝试内持续变化",
            MAX_LOCK_ATTEMPTS
        )))
    }
}

/// 教职工当前相关的全部键: 有分配的月份 ∪ 已有记录的月份
pub(crate) fn staff_load_keys_tx(conn: &Connection, staff_id: i64) -> RosterResult<BTreeSet<LoadKey>> {
    let mut keys: BTreeSet<LoadKey> = AssignmentRepository::find_offerings_by_staff_tx(conn, staff_id, None)?
        .iter()
        .map(|o| LoadKey::new(staff_id, o.period()))
        .collect();
    keys.extend(
        MonthlyLoadRepository::find_by_staff_tx(conn, staff_id)?
            .iter()
            .map(|l| l.key()),
    );
    Ok(keys)
}

/// 全库相关键: 分配关系推导的键 ∪ 已有记录的键
pub(crate) fn all_load_keys_tx(conn: &Connection) -> RosterResult<BTreeSet<LoadKey>> {
    let mut keys: BTreeSet<LoadKey> = AssignmentRepository::find_all_load_keys_tx(conn)?
        .into_iter()
        .collect();
    keys.extend(MonthlyLoadRepository::find_all_keys_tx(conn)?);
    Ok(keys)
}
