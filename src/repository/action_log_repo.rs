// ==========================================
// 课程排班系统 - 排班操作日志数据仓储
// ==========================================
// 红线: 协调器的所有写入必须记录
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::RosterActionLogRepository;
