//! Access gate: classifies each request as anonymous, user or admin from
//! its bearer credential and guards admin-only handlers.

use std::sync::Arc;

use actix_web::{dev::Payload, http::header, web::Data, FromRequest, HttpRequest};
use async_trait::async_trait;
use futures_util::future::LocalBoxFuture;
use log::debug;
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

use crate::{
    database::UserStore,
    error::{ApiError, StoreError},
    models::{AppState, User},
};

const TOKEN_LEN: usize = 40;

/// Issues, verifies and revokes opaque bearer credentials.
#[async_trait]
pub trait Credentials: Send + Sync {
    /// Resolves a presented credential to its owner, if any.
    async fn verify(&self, token: &str) -> Result<Option<User>, StoreError>;

    async fn issue(&self, user: &User) -> Result<String, StoreError>;

    async fn revoke(&self, token: &str) -> Result<(), StoreError>;
}

/// Random tokens whose SHA-256 digests are kept in the user store.
pub struct TokenCredentials {
    users: Arc<dyn UserStore>,
}

impl TokenCredentials {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[async_trait]
impl Credentials for TokenCredentials {
    async fn verify(&self, token: &str) -> Result<Option<User>, StoreError> {
        self.users.find_by_token(&hash_token(token)).await
    }

    async fn issue(&self, user: &User) -> Result<String, StoreError> {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        self.users.store_token(user.id, &hash_token(&token)).await?;
        Ok(token)
    }

    async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        self.users.revoke_token(&hash_token(token)).await
    }
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone)]
pub enum Caller {
    Anonymous,
    User(Identity),
    Admin(Identity),
}

impl Caller {
    pub fn classify(user: Option<User>, token: String) -> Self {
        match user {
            None => Caller::Anonymous,
            Some(user) if user.is_admin() => Caller::Admin(Identity { user, token }),
            Some(user) => Caller::User(Identity { user, token }),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Caller::Anonymous => None,
            Caller::User(identity) | Caller::Admin(identity) => Some(identity.user.id),
        }
    }

    pub fn require_user(self) -> Result<Identity, ApiError> {
        match self {
            Caller::Anonymous => Err(ApiError::Unauthenticated),
            Caller::User(identity) | Caller::Admin(identity) => Ok(identity),
        }
    }

    pub fn require_admin(self) -> Result<Identity, ApiError> {
        match self {
            Caller::Anonymous => Err(ApiError::Unauthenticated),
            Caller::User(identity) => {
                debug!("User {} denied admin access", identity.user.id);
                Err(ApiError::Forbidden)
            }
            Caller::Admin(identity) => Ok(identity),
        }
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_owned())
}

impl FromRequest for Caller {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let state = req.app_data::<Data<AppState>>().cloned();

        Box::pin(async move {
            let Some(token) = token else {
                return Ok(Caller::Anonymous);
            };
            let state = state
                .ok_or_else(|| ApiError::Internal("application state is not configured".to_owned()))?;

            let user = state.credentials.verify(&token).await?;
            Ok(Caller::classify(user, token))
        })
    }
}

/// Any signed-in caller; anonymous requests are rejected with 401.
pub struct Authenticated(pub Identity);

impl FromRequest for Authenticated {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let caller = Caller::from_request(req, payload);
        Box::pin(async move { caller.await?.require_user().map(Authenticated) })
    }
}

/// Admin callers only: 401 when anonymous, 403 for regular users.
pub struct Admin(pub Identity);

impl FromRequest for Admin {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let caller = Caller::from_request(req, payload);
        Box::pin(async move { caller.await?.require_admin().map(Admin) })
    }
}
