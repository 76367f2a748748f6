use crate::storage::models::{ShortLink, StoredClickEvent};
use migration::entities::{click_event, short_link};

/// 将 Sea-ORM Model 转换为 ShortLink
pub fn model_to_shortlink(model: short_link::Model) -> ShortLink {
    ShortLink {
        code: model.short_code,
        target: model.target_url,
        owner_id: model.owner_id,
        is_custom_alias: model.is_custom_alias,
        is_active: model.is_active,
        expires_at: model.expires_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
        click_count: model.click_count.max(0) as u64,
    }
}

/// 将 ShortLink 转换为 ActiveModel（用于插入）
pub fn shortlink_to_active_model(link: &ShortLink) -> short_link::ActiveModel {
    use sea_orm::ActiveValue::Set;

    short_link::ActiveModel {
        short_code: Set(link.code.clone()),
        target_url: Set(link.target.clone()),
        owner_id: Set(link.owner_id),
        is_custom_alias: Set(link.is_custom_alias),
        is_active: Set(link.is_active),
        expires_at: Set(link.expires_at),
        created_at: Set(link.created_at),
        updated_at: Set(link.updated_at),
        click_count: Set(link.click_count as i64),
    }
}

/// 将待持久化点击事件转换为 ActiveModel（用于批量插入）
pub fn event_to_active_model(event: &StoredClickEvent) -> click_event::ActiveModel {
    use sea_orm::ActiveValue::Set;

    click_event::ActiveModel {
        short_code: Set(event.code.clone()),
        clicked_at: Set(event.clicked_at),
        referrer: Set(event.referrer.clone()),
        user_agent: Set(event.user_agent.clone()),
        country: Set(event.country.clone()),
        city: Set(event.city.clone()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sea_orm::ActiveValue;

    fn test_model() -> short_link::Model {
        let now = Utc::now();
        short_link::Model {
            short_code: "abc1234".to_string(),
            target_url: "https://example.com".to_string(),
            owner_id: 7,
            is_custom_alias: false,
            is_active: true,
            expires_at: Some(now + Duration::days(7)),
            created_at: now,
            updated_at: now,
            click_count: 42,
        }
    }

    #[test]
    fn test_model_to_shortlink_basic() {
        let model = test_model();
        let link = model_to_shortlink(model.clone());

        assert_eq!(link.code, model.short_code);
        assert_eq!(link.target, model.target_url);
        assert_eq!(link.owner_id, 7);
        assert_eq!(link.click_count, 42);
        assert!(link.is_active);
    }

    #[test]
    fn test_negative_click_count_clamped() {
        let mut model = test_model();
        model.click_count = -10;

        let link = model_to_shortlink(model);
        assert_eq!(link.click_count, 0);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let model = test_model();
        let link = model_to_shortlink(model.clone());
        let active = shortlink_to_active_model(&link);

        if let ActiveValue::Set(code) = active.short_code {
            assert_eq!(code, model.short_code);
        } else {
            panic!("short_code not set");
        }
        if let ActiveValue::Set(owner) = active.owner_id {
            assert_eq!(owner, model.owner_id);
        } else {
            panic!("owner_id not set");
        }
    }

    #[test]
    fn test_event_to_active_model() {
        let event = StoredClickEvent {
            code: "abc1234".to_string(),
            clicked_at: Utc::now(),
            referrer: Some("https://google.com/search".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            country: Some("Germany".to_string()),
            city: None,
        };

        let active = event_to_active_model(&event);
        assert!(matches!(active.short_code, ActiveValue::Set(_)));
        assert!(matches!(active.id, ActiveValue::NotSet));
    }
}
