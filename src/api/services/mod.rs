pub mod analytics;
pub mod auth;
pub mod redirect;
pub mod system;
pub mod urls;

use std::sync::Arc;

use actix_governor::{Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor};
use actix_web::web;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;

use crate::api::jwt::JwtService;
use crate::api::middleware::RequireAuth;

pub type AuthGovernorConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware<QuantaInstant>>;

/// 认证端点限流：按来源 IP，防撞库
///
/// 在 main 里构造一次并在 App 工厂间共享，限流状态才是全局的。
pub fn default_auth_governor() -> AuthGovernorConfig {
    GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(10)
        .finish()
        .expect("governor config must be valid")
}

/// 挂载全部路由
///
/// 注册顺序即匹配顺序：QR 端点必须先于带认证的 /urls scope，
/// 兜底的 /{code} 重定向必须在最后。
pub fn mount(cfg: &mut web::ServiceConfig, jwt: Arc<JwtService>, auth_governor: &AuthGovernorConfig) {
    cfg.service(
        web::scope("/auth")
            .wrap(Governor::new(auth_governor))
            .route("/register", web::post().to(auth::register))
            .route("/login", web::post().to(auth::login))
            .route("/logout", web::post().to(auth::logout)),
    )
    // QR 匿名可达，注册在 /urls scope 之前以绕过认证
    .route("/urls/{code}/qr", web::get().to(urls::qr))
    .service(
        web::scope("/urls")
            .wrap(RequireAuth::new(Arc::clone(&jwt)))
            .route("", web::get().to(urls::list))
            .route("", web::post().to(urls::create))
            .route("/{code}", web::get().to(urls::get_one))
            .route("/{code}", web::patch().to(urls::update))
            .route("/{code}", web::delete().to(urls::delete)),
    )
    .service(
        web::scope("/analytics")
            .wrap(RequireAuth::new(jwt))
            .route("/{code}/summary", web::get().to(analytics::summary))
            .route("/{code}/timeseries", web::get().to(analytics::timeseries))
            .route("/{code}/referrers", web::get().to(analytics::referrers))
            .route("/{code}/devices", web::get().to(analytics::devices))
            .route("/{code}/geo", web::get().to(analytics::geo)),
    )
    .service(
        web::scope("/system")
            .route("/analytics-lag", web::get().to(system::analytics_lag))
            .route("/health", web::get().to(system::health)),
    )
    .route("/", web::get().to(redirect::handle_root))
    .route("/{code}", web::get().to(redirect::handle_redirect))
    .route("/{code}", web::head().to(redirect::handle_redirect));
}
