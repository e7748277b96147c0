// ==========================================
// 课程排班系统 - 派生视图层
// ==========================================
// 职责: 由容量模型按需派生的只读视图及其 TTL 缓存
// 红线: 视图只读，不写容量模型
// ==========================================

pub mod roster_views;
pub mod ttl_cache;

pub use roster_views::{CalendarEntry, OfferingCalendar, RosterViewCache, ScheduleEntry, StaffSchedule};
pub use ttl_cache::{TtlCache, DEFAULT_TTL};
