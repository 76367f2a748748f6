//! Bearer token 认证中间件
//!
//! 验证通过后把 OwnerId 写入 request extensions，handler 用
//! extractor 取出。写接口全部挂在这个中间件之后；重定向和 QR
//! 端点保持匿名。

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_service::{Service, Transform};
use actix_web::{
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use tracing::{info, trace};

use crate::api::jwt::JwtService;
use crate::api::ErrorBody;

/// 认证后的账户 id，由中间件写入 extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerId(pub i64);

impl FromRequest for OwnerId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let owner = req.extensions().get::<OwnerId>().copied();
        ready(owner.ok_or_else(|| actix_web::error::ErrorUnauthorized("missing owner context")))
    }
}

/// 认证中间件工厂
#[derive(Clone)]
pub struct RequireAuth {
    jwt: Arc<JwtService>,
}

impl RequireAuth {
    pub fn new(jwt: Arc<JwtService>) -> Self {
        Self { jwt }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAuthMiddleware {
            service: Rc::new(service),
            jwt: Arc::clone(&self.jwt),
        }))
    }
}

pub struct RequireAuthMiddleware<S> {
    service: Rc<S>,
    jwt: Arc<JwtService>,
}

impl<S> RequireAuthMiddleware<S> {
    fn extract_bearer_token(req: &ServiceRequest) -> Option<String> {
        req.headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    }
}

impl<S, B> Service<ServiceRequest> for RequireAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Rc::clone(&self.service);
        let jwt = Arc::clone(&self.jwt);

        Box::pin(async move {
            let Some(token) = Self::extract_bearer_token(&req) else {
                info!("Authentication failed - missing bearer token");
                return Ok(unauthorized(req, "missing bearer token"));
            };

            match jwt.validate_access_token(&token) {
                Ok(claims) => match claims.user_id() {
                    Some(user_id) => {
                        trace!("Authentication successful for account {}", user_id);
                        req.extensions_mut().insert(OwnerId(user_id));
                        let response = srv.call(req).await?.map_into_left_body();
                        Ok(response)
                    }
                    None => {
                        info!("Authentication failed - malformed subject claim");
                        Ok(unauthorized(req, "invalid token"))
                    }
                },
                Err(e) => {
                    info!("Authentication failed - token validation error: {}", e);
                    Ok(unauthorized(req, "invalid or expired token"))
                }
            }
        })
    }
}

fn unauthorized<B>(req: ServiceRequest, message: &str) -> ServiceResponse<EitherBody<B>> {
    req.into_response(
        HttpResponse::Unauthorized()
            .json(ErrorBody {
                code: "E007",
                error: message.to_string(),
            })
            .map_into_right_body(),
    )
}
