pub mod jwt;
pub mod middleware;
pub mod services;

use actix_web::HttpResponse;
use serde::Serialize;

use crate::errors::LinkHubError;

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub error: String,
}

/// 领域错误到 HTTP 状态的映射
///
/// NotFound 与 Inactive 对外是同一个 404 —— 停用链接绝不泄露目标，
/// 甚至不泄露"曾经存在"。TransientStore 映射为 503，邀请重试而不是
/// 伪装成数据丢失。
pub fn error_to_response(err: &LinkHubError) -> HttpResponse {
    let body = ErrorBody {
        code: err.code(),
        error: err.message().to_string(),
    };

    match err {
        LinkHubError::NotFound(_) | LinkHubError::Inactive(_) => {
            // 统一措辞，避免两类 404 可区分
            HttpResponse::NotFound().json(ErrorBody {
                code: "E001",
                error: "not found".to_string(),
            })
        }
        LinkHubError::DuplicateCode(_) => HttpResponse::Conflict().json(body),
        LinkHubError::Validation(_) => HttpResponse::BadRequest().json(body),
        LinkHubError::Unauthorized(_) => HttpResponse::Unauthorized().json(body),
        LinkHubError::TransientStore(_) | LinkHubError::DatabaseConnection(_) => {
            HttpResponse::ServiceUnavailable().json(body)
        }
        _ => HttpResponse::InternalServerError().json(ErrorBody {
            code: err.code(),
            error: "internal server error".to_string(),
        }),
    }
}
