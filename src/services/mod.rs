pub mod auth;
pub mod geoip;
pub mod link_service;
pub mod redirect;

pub use auth::AuthService;
pub use geoip::GeoIpProvider;
pub use link_service::{CreateLinkRequest, LinkService};
pub use redirect::{ClickContext, RedirectResolver};
