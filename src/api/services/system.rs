//! 系统状态端点

use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::analytics::{Aggregator, PipelineSnapshot};
use crate::services::RedirectResolver;

/// GET /system/analytics-lag
///
/// 消费方（dashboard）用它提示"数据可能滞后"。
pub async fn analytics_lag(aggregator: web::Data<Arc<Aggregator>>) -> impl Responder {
    HttpResponse::Ok().json(aggregator.lag_info())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub pipeline: PipelineSnapshot,
}

/// GET /system/health
pub async fn health(resolver: web::Data<Arc<RedirectResolver>>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        pipeline: resolver.pipeline_snapshot(),
    })
}
