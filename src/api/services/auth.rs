//! 认证端点

use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error_to_response;
use crate::services::AuthService;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub user: UserResponse,
}

/// POST /auth/register
pub async fn register(
    body: web::Json<Credentials>,
    auth: web::Data<Arc<AuthService>>,
) -> impl Responder {
    match auth.register(&body.email, &body.password).await {
        Ok(user) => HttpResponse::Created().json(UserResponse {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }),
        Err(e) => error_to_response(&e),
    }
}

/// POST /auth/login
pub async fn login(
    body: web::Json<Credentials>,
    auth: web::Data<Arc<AuthService>>,
) -> impl Responder {
    match auth.login(&body.email, &body.password).await {
        Ok((user, token)) => HttpResponse::Ok().json(LoginResponse {
            token,
            token_type: "Bearer",
            user: UserResponse {
                id: user.id,
                email: user.email,
                created_at: user.created_at,
            },
        }),
        Err(e) => error_to_response(&e),
    }
}

/// POST /auth/logout
///
/// access token 无状态，登出在客户端完成（丢弃 token）；
/// 端点保留给前端作为统一出口。
pub async fn logout() -> impl Responder {
    HttpResponse::NoContent().finish()
}
