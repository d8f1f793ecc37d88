pub mod jwt;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::models::UserId;

pub use jwt::JwtAuthenticator;

/// Identity resolved from a connection's credential token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub username: String,
}

/// Verifies the token a client presents when opening a gateway connection.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve `token` to a user, or fail with
    /// [`GatewayError::Authentication`].
    async fn authenticate(&self, token: &str) -> Result<AuthUser, GatewayError>;
}
