//! 短链接管理端点（认证后可用）+ 匿名 QR 端点

use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error_to_response;
use crate::api::middleware::OwnerId;
use crate::errors::LinkHubError;
use crate::services::{CreateLinkRequest, LinkService};
use crate::storage::models::{LinkUpdate, ShortLink};
use crate::storage::SeaOrmStorage;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlRequest {
    pub long_url: String,
    #[serde(default)]
    pub custom_alias: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUrlRequest {
    #[serde(default)]
    pub long_url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_size")]
    pub size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_size() -> u64 {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlResponse {
    pub short_code: String,
    pub short_url: String,
    pub long_url: String,
    pub is_custom_alias: bool,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub click_count: u64,
    pub qr_url: String,
}

impl UrlResponse {
    fn from_link(link: ShortLink, base_url: &str) -> Self {
        Self {
            short_url: format!("{}/{}", base_url, link.code),
            qr_url: format!("/urls/{}/qr", link.code),
            short_code: link.code,
            long_url: link.target,
            is_custom_alias: link.is_custom_alias,
            is_active: link.is_active,
            expires_at: link.expires_at,
            created_at: link.created_at,
            updated_at: link.updated_at,
            click_count: link.click_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedUrls {
    pub items: Vec<UrlResponse>,
    pub page: u64,
    pub size: u64,
    pub total: u64,
}

/// POST /urls
pub async fn create(
    owner: OwnerId,
    body: web::Json<CreateUrlRequest>,
    links: web::Data<Arc<LinkService>>,
) -> impl Responder {
    let request = CreateLinkRequest {
        long_url: body.long_url.clone(),
        custom_alias: body.custom_alias.clone(),
        expires_at: body.expires_at,
    };

    match links.create(owner.0, request).await {
        Ok(link) => {
            let base_url = crate::config::get_config().server.base_url.clone();
            HttpResponse::Created().json(UrlResponse::from_link(link, &base_url))
        }
        Err(e) => error_to_response(&e),
    }
}

/// GET /urls
pub async fn list(
    owner: OwnerId,
    query: web::Query<PageQuery>,
    links: web::Data<Arc<LinkService>>,
) -> impl Responder {
    let page = query.page.max(1);
    let size = query.size.clamp(1, 200);

    match links.list(owner.0, page, size).await {
        Ok((items, total)) => {
            let base_url = crate::config::get_config().server.base_url.clone();
            HttpResponse::Ok().json(PagedUrls {
                items: items
                    .into_iter()
                    .map(|l| UrlResponse::from_link(l, &base_url))
                    .collect(),
                page,
                size,
                total,
            })
        }
        Err(e) => error_to_response(&e),
    }
}

/// GET /urls/{code}
pub async fn get_one(
    owner: OwnerId,
    path: web::Path<String>,
    links: web::Data<Arc<LinkService>>,
) -> impl Responder {
    match links.get_owned(owner.0, &path).await {
        Ok(link) => {
            let base_url = crate::config::get_config().server.base_url.clone();
            HttpResponse::Ok().json(UrlResponse::from_link(link, &base_url))
        }
        Err(e) => error_to_response(&e),
    }
}

/// PATCH /urls/{code}
pub async fn update(
    owner: OwnerId,
    path: web::Path<String>,
    body: web::Json<UpdateUrlRequest>,
    links: web::Data<Arc<LinkService>>,
) -> impl Responder {
    let changes = LinkUpdate {
        target: body.long_url.clone(),
        is_active: body.is_active,
        expires_at: body.expires_at,
    };

    match links.update(owner.0, &path, changes).await {
        Ok(link) => {
            let base_url = crate::config::get_config().server.base_url.clone();
            HttpResponse::Ok().json(UrlResponse::from_link(link, &base_url))
        }
        Err(e) => error_to_response(&e),
    }
}

/// DELETE /urls/{code}
pub async fn delete(
    owner: OwnerId,
    path: web::Path<String>,
    links: web::Data<Arc<LinkService>>,
) -> impl Responder {
    match links.delete(owner.0, &path).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_to_response(&e),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub short_code: String,
    /// 二维码应编码的内容（短链接本身，不是目标地址）
    pub content: String,
}

/// GET /urls/{code}/qr（匿名；内容是短链接，渲染格式不在范围内）
pub async fn qr(
    path: web::Path<String>,
    storage: web::Data<Arc<SeaOrmStorage>>,
) -> impl Responder {
    let code = path.into_inner();

    match storage.get(&code).await {
        Ok(Some(link)) => {
            let base_url = crate::config::get_config().server.base_url.clone();
            HttpResponse::Ok().json(QrPayload {
                content: format!("{}/{}", base_url, link.code),
                short_code: link.code,
            })
        }
        Ok(None) => error_to_response(&LinkHubError::not_found("not found")),
        Err(e) => error_to_response(&e),
    }
}
