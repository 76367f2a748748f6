use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CachedEntry;

/// 短链接领域模型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortLink {
    pub code: String,
    pub target: String,
    pub owner_id: i64,
    pub is_custom_alias: bool,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub click_count: u64,
}

impl ShortLink {
    /// 链接当前是否可重定向（active 且未过期）
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }

    /// 提取重定向缓存条目
    pub fn to_cache_entry(&self) -> CachedEntry {
        CachedEntry {
            target: self.target.clone(),
            is_active: self.is_active,
            expires_at: self.expires_at,
        }
    }
}

/// 部分更新：创建之后唯一的常规变更路径
/// （click_count 的批量递增走独立的轻量计数操作）
#[derive(Debug, Clone, Default)]
pub struct LinkUpdate {
    pub target: Option<String>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl LinkUpdate {
    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.is_active.is_none() && self.expires_at.is_none()
    }
}

/// 待持久化的点击事件
///
/// 管线消费端在落盘前由 IP 推导出 country/city，原始 IP 不入库。
#[derive(Debug, Clone)]
pub struct StoredClickEvent {
    pub code: String,
    pub clicked_at: DateTime<Utc>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// 账户模型，仅覆盖所有权归属所需的最小字段
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link(is_active: bool, expires_at: Option<DateTime<Utc>>) -> ShortLink {
        let now = Utc::now();
        ShortLink {
            code: "abc1234".to_string(),
            target: "https://example.com".to_string(),
            owner_id: 1,
            is_custom_alias: false,
            is_active,
            expires_at,
            created_at: now,
            updated_at: now,
            click_count: 0,
        }
    }

    #[test]
    fn test_is_live() {
        let now = Utc::now();
        assert!(link(true, None).is_live(now));
        assert!(!link(false, None).is_live(now));
        assert!(!link(true, Some(now - Duration::minutes(1))).is_live(now));
        assert!(link(true, Some(now + Duration::minutes(1))).is_live(now));
    }

    #[test]
    fn test_to_cache_entry_carries_liveness_fields() {
        let l = link(false, None);
        let entry = l.to_cache_entry();
        assert_eq!(entry.target, l.target);
        assert!(!entry.is_active);
        assert!(entry.expires_at.is_none());
    }

    #[test]
    fn test_link_update_is_empty() {
        assert!(LinkUpdate::default().is_empty());
        let update = LinkUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
