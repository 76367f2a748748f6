//! 重定向端点
//!
//! 负载测试瞄准的就是这条路径：p95 < 50ms。handler 只做参数
//! 校验、解析调用和状态码映射，点击采集在 resolver 内部 fire-and-forget。

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::{error, trace};

use crate::errors::LinkHubError;
use crate::services::{ClickContext, RedirectResolver};
use crate::utils::ip::extract_client_ip;
use crate::utils::is_valid_short_code;

/// 空路径：跳到配置的默认地址
pub async fn handle_root() -> impl Responder {
    let config = crate::config::get_config();
    HttpResponse::Found()
        .insert_header(("Location", config.server.default_url.clone()))
        .finish()
}

/// GET /{code}
pub async fn handle_redirect(
    req: HttpRequest,
    path: web::Path<String>,
    resolver: web::Data<Arc<RedirectResolver>>,
) -> impl Responder {
    let code = path.into_inner();

    // 非法短码直接 404，不触达缓存和存储
    if !is_valid_short_code(&code) {
        trace!("Invalid short code rejected: {}", &code);
        return not_found_response();
    }

    let ctx = ClickContext {
        referrer: header_string(&req, "referer"),
        user_agent: header_string(&req, "user-agent"),
        ip_address: extract_client_ip(&req),
    };

    match resolver.resolve(&code, ctx).await {
        Ok(target) => HttpResponse::Found()
            .insert_header(("Location", target))
            .finish(),
        // 不存在与停用/过期渲染同一个 404，不泄露目标与存在性
        Err(LinkHubError::NotFound(_)) | Err(LinkHubError::Inactive(_)) => not_found_response(),
        Err(e) if e.is_retryable() => {
            error!("Transient store error during redirect lookup: {}", e);
            HttpResponse::build(StatusCode::SERVICE_UNAVAILABLE)
                .insert_header(("Content-Type", "text/html; charset=utf-8"))
                .body("Service Unavailable")
        }
        Err(e) => {
            error!("Unexpected error during redirect lookup: {}", e);
            HttpResponse::build(StatusCode::INTERNAL_SERVER_ERROR)
                .insert_header(("Content-Type", "text/html; charset=utf-8"))
                .body("Internal Server Error")
        }
    }
}

#[inline]
fn not_found_response() -> HttpResponse {
    HttpResponse::build(StatusCode::NOT_FOUND)
        .insert_header(("Content-Type", "text/html; charset=utf-8"))
        .insert_header(("Cache-Control", "public, max-age=60"))
        .body("Not Found")
}

#[inline]
fn header_string(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}
