// ==========================================
// 课程排班系统 - 工作量配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// WorkloadConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait WorkloadConfigReader: Send + Sync {
    // ===== 工作量公式 =====

    /// 全职月度工作量单位
    ///
    /// # 默认值
    /// - 600
    async fn get_full_time_units(&self) -> ConfigResult<f64>;

    /// 全职对应的开课数
    ///
    /// # 默认值
    /// - 6
    async fn get_subjects_for_full_time(&self) -> ConfigResult<u32>;

    /// 免额外工作量的选课人数阈值
    ///
    /// # 默认值
    /// - 10
    async fn get_student_threshold(&self) -> ConfigResult<u32>;

    /// 超出阈值后每名学生的额外工作量
    ///
    /// # 默认值
    /// - 2.0
    async fn get_units_per_extra_student(&self) -> ConfigResult<f64>;

    /// 每增加一名合作教师的减负系数
    ///
    /// # 默认值
    /// - 0.4
    async fn get_co_staff_relief(&self) -> ConfigResult<f64>;

    // ===== 派生视图 =====

    /// 视图缓存有效期（秒）
    ///
    /// # 默认值
    /// - 600
    async fn get_view_cache_ttl_secs(&self) -> ConfigResult<u64>;
}
