// ==========================================
// 课程排班系统 - 引擎层事件发布
// ==========================================
// 职责: 定义排班变更事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，View 层的派生视图缓存实现它
// 时序: 协调器在事务提交后同步发布
// ==========================================

use crate::domain::types::YearMonth;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 排班事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterEventType {
    /// 分配教师
    AssignmentAdded,
    /// 移除教师
    AssignmentRemoved,
    /// 选课人数变更
    EnrollmentChanged,
    /// 新建开课实例
    OfferingCreated,
    /// 删除开课实例
    OfferingDeleted,
    /// 删除教职工
    StaffDeleted,
    /// 合同工作量比例变更
    CapacityChanged,
}

impl RosterEventType {
    pub fn as_str(&self) -> &str {
        match self {
            RosterEventType::AssignmentAdded => "AssignmentAdded",
            RosterEventType::AssignmentRemoved => "AssignmentRemoved",
            RosterEventType::EnrollmentChanged => "EnrollmentChanged",
            RosterEventType::OfferingCreated => "OfferingCreated",
            RosterEventType::OfferingDeleted => "OfferingDeleted",
            RosterEventType::StaffDeleted => "StaffDeleted",
            RosterEventType::CapacityChanged => "CapacityChanged",
        }
    }

    /// 事件是否改变了"谁教哪些开课实例"
    ///
    /// 选课人数与容量比例变更只影响超负荷显示，不改变成员关系
    pub fn changes_membership(&self) -> bool {
        !matches!(
            self,
            RosterEventType::EnrollmentChanged | RosterEventType::CapacityChanged
        )
    }
}

/// 排班变更事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEvent {
    pub event_type: RosterEventType,
    /// 相关开课实例
    pub offering_id: Option<i64>,
    /// 受影响的教职工（含被移除/被删除者）
    pub affected_staff: Vec<i64>,
    /// 相关月度桶
    pub period: Option<YearMonth>,
}

impl RosterEvent {
    pub fn new(event_type: RosterEventType, affected_staff: Vec<i64>) -> Self {
        Self {
            event_type,
            offering_id: None,
            affected_staff,
            period: None,
        }
    }

    pub fn for_offering(mut self, offering_id: i64, period: YearMonth) -> Self {
        self.offering_id = Some(offering_id);
        self.period = Some(period);
        self
    }

    pub fn changes_membership(&self) -> bool {
        self.event_type.changes_membership()
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 排班事件发布者 Trait
///
/// # 实现说明
/// - View 层的 `RosterViewCache` 实现此 trait，按事件失效缓存
/// - 发布失败不回滚已提交的变更，仅记录告警
pub trait RosterEventPublisher: Send + Sync {
    /// 发布排班事件
    ///
    /// # 返回
    /// - `Ok(n)`: 处理条目数（如失效的缓存键数量）
    /// - `Err`: 发布失败
    fn publish(&self, event: &RosterEvent) -> Result<usize, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl RosterEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: &RosterEvent) -> Result<usize, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - event_type={}, staff={:?}",
            event.event_type.as_str(),
            event.affected_staff
        );
        Ok(0)
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn RosterEventPublisher>> 的使用
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn RosterEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn RosterEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者），失败只记录告警
    pub fn publish(&self, event: &RosterEvent) -> usize {
        match &self.inner {
            Some(publisher) => match publisher.publish(event) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(
                        event_type = event.event_type.as_str(),
                        error = %e,
                        "事件发布失败，派生视图将在 TTL 到期后刷新"
                    );
                    0
                }
            },
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - event_type={}",
                    event.event_type.as_str()
                );
                0
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
