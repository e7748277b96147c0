// ==========================================
// 课程排班系统 - 引擎运行参数
// ==========================================
// 职责: 从配置读取器组装引擎启动所需的全部参数
// ==========================================

use crate::config::workload_config_trait::{ConfigResult, WorkloadConfigReader};
use crate::config::config_manager::DEFAULT_VIEW_CACHE_TTL_SECS;
use crate::engine::workload::WorkloadParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub workload: WorkloadParams,
    pub view_cache_ttl_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            workload: WorkloadParams::default(),
            view_cache_ttl_secs: DEFAULT_VIEW_CACHE_TTL_SECS,
        }
    }
}

impl EngineSettings {
    pub fn view_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.view_cache_ttl_secs)
    }
}

/// 读取全部引擎参数
pub async fn load_engine_settings(reader: &dyn WorkloadConfigReader) -> ConfigResult<EngineSettings> {
    let workload = WorkloadParams {
        full_time_units: reader.get_full_time_units().await?,
        subjects_for_full_time: reader.get_subjects_for_full_time().await?,
        student_threshold: reader.get_student_threshold().await?,
        units_per_extra_student: reader.get_units_per_extra_student().await?,
        co_staff_relief: reader.get_co_staff_relief().await?,
    };
    let settings = EngineSettings {
        workload,
        view_cache_ttl_secs: reader.get_view_cache_ttl_secs().await?,
    };

    tracing::debug!(?settings, "引擎参数已加载");
    Ok(settings)
}
