//! 账户服务
//!
//! 覆盖所有权归属所需的最小面：注册、登录。密码 Argon2id 哈希，
//! 登录成功签发 JWT access token。

use std::sync::Arc;

use tracing::info;

use crate::api::jwt::JwtService;
use crate::errors::{LinkHubError, Result};
use crate::storage::models::User;
use crate::storage::SeaOrmStorage;
use crate::utils::password::{hash_password, verify_password};

const MIN_PASSWORD_LEN: usize = 8;

pub struct AuthService {
    storage: Arc<SeaOrmStorage>,
    jwt: Arc<JwtService>,
}

impl AuthService {
    pub fn new(storage: Arc<SeaOrmStorage>, jwt: Arc<JwtService>) -> Self {
        Self { storage, jwt }
    }

    /// 注册账户
    pub async fn register(&self, email: &str, password: &str) -> Result<User> {
        let email = email.trim().to_lowercase();

        if !email.contains('@') || email.len() < 3 || email.len() > 255 {
            return Err(LinkHubError::validation("invalid email address"));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(LinkHubError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let password_hash = hash_password(password)?;
        let user = self.storage.create_user(&email, &password_hash).await?;

        info!("Account registered: id={}", user.id);
        Ok(user)
    }

    /// 登录，成功返回 (账户, access token)
    ///
    /// 邮箱不存在与密码错误返回同一个错误，不泄露账户存在性。
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let email = email.trim().to_lowercase();

        let user = self
            .storage
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| LinkHubError::unauthorized("invalid email or password"))?;

        if !verify_password(password, &user.password_hash) {
            return Err(LinkHubError::unauthorized("invalid email or password"));
        }

        let token = self
            .jwt
            .generate_access_token(user.id)
            .map_err(|e| LinkHubError::unauthorized(format!("token generation failed: {}", e)))?;

        info!("Login successful: id={}", user.id);
        Ok((user, token))
    }
}
