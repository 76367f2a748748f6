//! 分析查询端点（认证后可用）
//!
//! 所有端点先做所有权校验（他人链接渲染 404），再委托聚合器。
//! 读路径失败照常上浮为 HTTP 错误；聚合后台任务的失败只体现在
//! /system/analytics-lag 上，不会出现在这里。

use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::analytics::{Aggregator, Granularity};
use crate::api::error_to_response;
use crate::api::middleware::OwnerId;
use crate::errors::Result;
use crate::services::LinkService;

const DEFAULT_RANGE_DAYS: i64 = 30;
const MAX_RANGE_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// 时间范围：最近 N 天（默认 30，上限 365）
    #[serde(default)]
    pub days: Option<i64>,
    /// timeseries 粒度："day"（默认）或 "hour"
    #[serde(default)]
    pub granularity: Option<String>,
}

impl RangeQuery {
    fn resolve(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let days = self
            .days
            .unwrap_or(DEFAULT_RANGE_DAYS)
            .clamp(1, MAX_RANGE_DAYS);
        let to = Utc::now();
        (to - Duration::days(days), to)
    }
}

async fn check_ownership(links: &LinkService, owner: OwnerId, code: &str) -> Result<()> {
    links.get_owned(owner.0, code).await.map(|_| ())
}

/// GET /analytics/{code}/summary
pub async fn summary(
    owner: OwnerId,
    path: web::Path<String>,
    query: web::Query<RangeQuery>,
    links: web::Data<Arc<LinkService>>,
    aggregator: web::Data<Arc<Aggregator>>,
) -> impl Responder {
    if let Err(e) = check_ownership(&links, owner, &path).await {
        return error_to_response(&e);
    }

    let (from, to) = query.resolve();
    match aggregator.aggregate(&path, from, to).await {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => error_to_response(&e),
    }
}

/// GET /analytics/{code}/timeseries
pub async fn timeseries(
    owner: OwnerId,
    path: web::Path<String>,
    query: web::Query<RangeQuery>,
    links: web::Data<Arc<LinkService>>,
    aggregator: web::Data<Arc<Aggregator>>,
) -> impl Responder {
    if let Err(e) = check_ownership(&links, owner, &path).await {
        return error_to_response(&e);
    }

    let (from, to) = query.resolve();
    let granularity = Granularity::parse(query.granularity.as_deref().unwrap_or("day"));

    match aggregator.timeseries(&path, from, to, granularity).await {
        Ok(points) => HttpResponse::Ok().json(points),
        Err(e) => error_to_response(&e),
    }
}

/// GET /analytics/{code}/referrers
pub async fn referrers(
    owner: OwnerId,
    path: web::Path<String>,
    query: web::Query<RangeQuery>,
    links: web::Data<Arc<LinkService>>,
    aggregator: web::Data<Arc<Aggregator>>,
) -> impl Responder {
    if let Err(e) = check_ownership(&links, owner, &path).await {
        return error_to_response(&e);
    }

    let (from, to) = query.resolve();
    match aggregator.referrers(&path, from, to).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => error_to_response(&e),
    }
}

/// GET /analytics/{code}/devices
pub async fn devices(
    owner: OwnerId,
    path: web::Path<String>,
    query: web::Query<RangeQuery>,
    links: web::Data<Arc<LinkService>>,
    aggregator: web::Data<Arc<Aggregator>>,
) -> impl Responder {
    if let Err(e) = check_ownership(&links, owner, &path).await {
        return error_to_response(&e);
    }

    let (from, to) = query.resolve();
    match aggregator.devices(&path, from, to).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => error_to_response(&e),
    }
}

/// GET /analytics/{code}/geo
pub async fn geo(
    owner: OwnerId,
    path: web::Path<String>,
    query: web::Query<RangeQuery>,
    links: web::Data<Arc<LinkService>>,
    aggregator: web::Data<Arc<Aggregator>>,
) -> impl Responder {
    if let Err(e) = check_ownership(&links, owner, &path).await {
        return error_to_response(&e);
    }

    let (from, to) = query.resolve();
    match aggregator.geo(&path, from, to).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => error_to_response(&e),
    }
}
