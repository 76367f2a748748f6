use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use tracing::info;

use linkhub::analytics::{Aggregator, ClickPipeline, ClickSink};
use linkhub::api::jwt::JwtService;
use linkhub::api::services::{default_auth_governor, mount};
use linkhub::cache::create_cache;
use linkhub::config::{get_config, init_config};
use linkhub::services::{AuthService, GeoIpProvider, LinkService, RedirectResolver};
use linkhub::storage::StorageFactory;
use linkhub::system::logging::init_logging;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    init_config();
    let config = get_config();

    // guard 必须活到进程结束，否则缓冲日志丢失
    let _log_guard = init_logging(&config);

    let storage = StorageFactory::create()
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let cache = create_cache(&config.cache)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let geoip = GeoIpProvider::from_config(&config.geoip).map(Arc::new);

    // 点击管线：唯一的进程级队列，显式构造后注入
    let (pipeline, _pipeline_handle) = ClickPipeline::start(
        Arc::clone(&storage) as Arc<dyn ClickSink>,
        geoip,
        &config.pipeline,
    );

    let resolver = Arc::new(RedirectResolver::new(
        Arc::clone(&cache),
        Arc::clone(&storage),
        pipeline,
        config.cache.default_ttl,
    ));

    let links = Arc::new(LinkService::new(
        Arc::clone(&storage),
        Arc::clone(&cache),
        config.cache.default_ttl,
    ));

    let jwt = Arc::new(JwtService::from_config(&config.auth));
    let auth = Arc::new(AuthService::new(Arc::clone(&storage), Arc::clone(&jwt)));

    let aggregator = Arc::new(Aggregator::new(Arc::clone(&storage), &config.aggregator));
    tokio::spawn(Arc::clone(&aggregator).start_background_task());

    let auth_governor = default_auth_governor();

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting server at http://{}", bind_address);

    let workers = config.server.cpu_count.max(1);

    HttpServer::new(move || {
        let jwt = Arc::clone(&jwt);
        let auth_governor = auth_governor.clone();
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(Arc::clone(&storage)))
            .app_data(web::Data::new(Arc::clone(&resolver)))
            .app_data(web::Data::new(Arc::clone(&links)))
            .app_data(web::Data::new(Arc::clone(&auth)))
            .app_data(web::Data::new(Arc::clone(&aggregator)))
            .configure(|cfg| mount(cfg, jwt, &auth_governor))
    })
    .workers(workers)
    .bind(bind_address)?
    .run()
    .await
}
