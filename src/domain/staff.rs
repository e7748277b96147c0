// ==========================================
// 课程排班系统 - 教职工领域模型
// ==========================================
// 职责: 教职工身份与合同工作量比例
// 红线: capacity_fraction 必须在 (0, 1] 区间
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// StaffMember - 教职工
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    // ===== 主键 =====
    pub staff_id: i64,

    // ===== 身份信息 =====
    pub email: String,               // 唯一
    pub honorific: Option<String>,   // 称谓 (Dr / Prof ...)
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    // ===== 合同 =====
    pub capacity_fraction: f64,      // 占全职工作量的比例 (0,1]
}

impl StaffMember {
    /// 展示名称（缺失姓名时退回邮箱）
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }

    /// 姓名模糊匹配（大小写不敏感，名或姓包含即可）
    pub fn name_matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [&self.first_name, &self.last_name]
            .iter()
            .filter_map(|n| n.as_deref())
            .any(|n| n.to_lowercase().contains(&needle))
    }
}

/// 合同比例校验
pub fn is_valid_capacity_fraction(fraction: f64) -> bool {
    fraction.is_finite() && fraction > 0.0 && fraction <= 1.0
}

// ==========================================
// NewStaffMember - 新建教职工参数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStaffMember {
    pub email: String,
    pub honorific: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub capacity_fraction: f64,
}

impl NewStaffMember {
    pub fn new(email: impl Into<String>, capacity_fraction: f64) -> Self {
        Self {
            email: email.into(),
            honorific: None,
            first_name: None,
            last_name: None,
            capacity_fraction,
        }
    }

    pub fn with_name(mut self, first_name: &str, last_name: &str) -> Self {
        self.first_name = Some(first_name.to_string());
        self.last_name = Some(last_name.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(first: Option<&str>, last: Option<&str>) -> StaffMember {
        StaffMember {
            staff_id: 1,
            email: "a.lee@uni.edu".to_string(),
            honorific: None,
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
            capacity_fraction: 1.0,
        }
    }

    #[test]
    fn test_capacity_fraction_bounds() {
        assert!(is_valid_capacity_fraction(1.0));
        assert!(is_valid_capacity_fraction(0.2));
        assert!(!is_valid_capacity_fraction(0.0));
        assert!(!is_valid_capacity_fraction(1.01));
        assert!(!is_valid_capacity_fraction(f64::NAN));
    }

    #[test]
    fn test_name_matches_case_insensitive() {
        let s = staff(Some("Alice"), Some("Lee"));
        assert!(s.name_matches("ali"));
        assert!(s.name_matches("LEE"));
        assert!(s.name_matches("  "));
        assert!(!s.name_matches("bob"));
        assert!(!staff(None, None).name_matches("a"));
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(staff(Some("Alice"), Some("Lee")).display_name(), "Alice Lee");
        assert_eq!(staff(None, None).display_name(), "a.lee@uni.edu");
    }
}
