// ==========================================
// 课程排班系统 - 工作量公式
// ==========================================
// 职责: 单个开课实例对每位分配教师的月度工作量贡献
// 红线: 纯函数,无状态,不访问存储
// ==========================================
// 输入: 选课人数 + 该实例当前分配人数
// 输出: 每位分配教师承担的工作量单位
// ==========================================

use serde::{Deserialize, Serialize};

/// 全职月度工作量单位
pub const FULL_TIME_UNITS: f64 = 600.0;
/// 全职对应的开课数
pub const SUBJECTS_FOR_FULL_TIME: u32 = 6;
/// 免额外工作量的人数阈值
pub const STUDENT_THRESHOLD: u32 = 10;
/// 超出阈值后每名学生的额外工作量
pub const UNITS_PER_EXTRA_STUDENT: f64 = 2.0;
/// 每增加一名合作教师的减负系数
pub const CO_STAFF_RELIEF: f64 = 0.4;

// ==========================================
// WorkloadParams - 公式参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkloadParams {
    pub full_time_units: f64,
    pub subjects_for_full_time: u32,
    pub student_threshold: u32,
    pub units_per_extra_student: f64,
    pub co_staff_relief: f64,
}

impl Default for WorkloadParams {
    fn default() -> Self {
        Self {
            full_time_units: FULL_TIME_UNITS,
            subjects_for_full_time: SUBJECTS_FOR_FULL_TIME,
            student_threshold: STUDENT_THRESHOLD,
            units_per_extra_student: UNITS_PER_EXTRA_STUDENT,
            co_staff_relief: CO_STAFF_RELIEF,
        }
    }
}

impl WorkloadParams {
    /// 单个开课实例的基础工作量 (FULL_TIME_UNITS / SUBJECTS_FOR_FULL_TIME)
    pub fn base_units_per_offering(&self) -> f64 {
        self.full_time_units / self.subjects_for_full_time.max(1) as f64
    }
}

// ==========================================
// WorkloadFormula - 工作量公式
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkloadFormula {
    params: WorkloadParams,
}

impl WorkloadFormula {
    pub fn new(params: WorkloadParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &WorkloadParams {
        &self.params
    }

    /// 超出阈值的学生数
    pub fn extra_students(&self, enrollment_count: u32) -> u32 {
        enrollment_count.saturating_sub(self.params.student_threshold)
    }

    /// 单人承担时的原始工作量
    pub fn raw_units(&self, enrollment_count: u32) -> f64 {
        self.params.base_units_per_offering()
            + self.extra_students(enrollment_count) as f64 * self.params.units_per_extra_student
    }

    /// 合作教学减负系数
    ///
    /// - 1 人及以下: 1
    /// - n 人: 1 / (1 + CO_STAFF_RELIEF × (n − 1))
    pub fn relief_factor(&self, assigned_staff_count: u32) -> f64 {
        if assigned_staff_count <= 1 {
            return 1.0;
        }
        1.0 / (1.0 + self.params.co_staff_relief * (assigned_staff_count - 1) as f64)
    }

    /// 开课实例对每位分配教师的贡献
    ///
    /// 无人分配的实例不产生负载（调用方应跳过），此处返回 0
    pub fn contribution(&self, enrollment_count: u32, assigned_staff_count: u32) -> f64 {
        if assigned_staff_count == 0 {
            return 0.0;
        }
        (self.raw_units(enrollment_count) * self.relief_factor(assigned_staff_count)).max(0.0)
    }

    /// 教职工月度容量
    pub fn capacity_units(&self, capacity_fraction: f64) -> f64 {
        capacity_fraction * self.params.full_time_units
    }

    /// 超负荷判定: load > capacity_fraction × FULL_TIME_UNITS
    pub fn is_overloaded(&self, load_value: f64, capacity_fraction: f64) -> bool {
        load_value > self.capacity_units(capacity_fraction)
    }

    /// 选课人数变更是否可能改变贡献
    ///
    /// 新旧人数均不超过阈值时贡献不变,无需重算
    pub fn straddles_threshold(&self, old_count: u32, new_count: u32) -> bool {
        old_count > self.params.student_threshold || new_count > self.params.student_threshold
    }
}
