pub mod click_event;
pub mod short_link;
pub mod user;

pub use click_event::Entity as ClickEventEntity;
pub use short_link::Entity as ShortLinkEntity;
pub use user::Entity as UserEntity;
