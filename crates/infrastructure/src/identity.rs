//! JWT 凭证校验
//!
//! 实现握手时的凭证校验：解码并验证 JWT，再通过账户目录确认
//! 主体仍对应有效账户且角色在允许的集合内。本服务只校验不签发，
//! 签发由平台的认证服务负责。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use domain::entities::{AccountRecord, AuthenticatedUser, UserRole};
use domain::errors::AuthError;
use domain::services::{AccountDirectory, TokenVerifier};
use domain::StorageResult;

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// JWT 凭证校验器
pub struct JwtTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    directory: Arc<dyn AccountDirectory>,
    allowed_roles: Vec<UserRole>,
}

impl JwtTokenVerifier {
    pub fn new(
        secret: &str,
        directory: Arc<dyn AccountDirectory>,
        allowed_roles: Vec<UserRole>,
    ) -> Self {
        let mut validation = Validation::default();
        // 过期即拒绝，不留默认的时钟偏移余量
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
            directory,
            allowed_roles,
        }
    }

    /// 从配置的角色名列表解析允许的角色，未识别的名字跳过并告警
    pub fn parse_allowed_roles(names: &[String]) -> Vec<UserRole> {
        names
            .iter()
            .filter_map(|name| {
                let role = UserRole::parse(name);
                if role.is_none() {
                    warn!("Ignoring unknown role in allowed_roles: {}", name);
                }
                role
            })
            .collect()
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(err.to_string()),
            },
        )?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AuthError::InvalidToken("malformed subject".to_string()))?;

        let record = self
            .directory
            .find_account(user_id)
            .await
            .map_err(|err| {
                warn!("Account directory lookup failed for {}: {}", user_id, err);
                AuthError::UnknownAccount
            })?
            .ok_or(AuthError::UnknownAccount)?;

        if !record.active {
            return Err(AuthError::UnknownAccount);
        }

        if !self.allowed_roles.contains(&record.role) {
            return Err(AuthError::RoleNotAllowed(record.role.to_string()));
        }

        Ok(AuthenticatedUser {
            user_id,
            role: record.role,
            email: record.email,
        })
    }
}

/// 签发测试/联调用的 JWT
///
/// 生产环境的token由平台认证服务签发，这里只用于集成测试与本地联调。
pub fn issue_token(secret: &str, user_id: Uuid, expires_in_hours: i64) -> String {
    let exp = chrono::Utc::now() + chrono::Duration::hours(expires_in_hours);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .expect("JWT encoding cannot fail with HS256")
}

/// 内存账户目录
///
/// 平台用户系统的替身，测试与本地联调时预置账户。
#[derive(Default)]
pub struct InMemoryAccountDirectory {
    accounts: RwLock<HashMap<Uuid, AccountRecord>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置账户
    pub async fn insert(&self, record: AccountRecord) {
        let mut accounts = self.accounts.write().await;
        accounts.insert(record.user_id, record);
    }

    /// 预置一个有效账户并返回其ID
    pub async fn seed(&self, role: UserRole, email: impl Into<String>) -> Uuid {
        let user_id = Uuid::new_v4();
        self.insert(AccountRecord {
            user_id,
            email: email.into(),
            role,
            active: true,
        })
        .await;
        user_id
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn find_account(&self, user_id: Uuid) -> StorageResult<Option<AccountRecord>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&user_id).cloned())
    }
}
