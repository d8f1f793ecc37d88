use thiserror::Error;

/// Errors raised while serving a gateway connection.
///
/// Only [`GatewayError::Authentication`] ends a connection. Every other
/// variant is reported to the sending session as an `error` event and the
/// connection stays open.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Authentication(String),

    /// Malformed frame or a payload that fails validation.
    #[error("{0}")]
    Protocol(String),

    #[error("Unknown message type: {0}")]
    UnknownEvent(String),

    /// Storage was unreachable or rejected a write.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl GatewayError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Text placed in the `error` event sent back to the client.
    ///
    /// Storage details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::Persistence(_) => "Failed to process message".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<diesel::result::Error> for GatewayError {
    fn from(err: diesel::result::Error) -> Self {
        tracing::error!(?err, "database error");
        Self::persistence(err.to_string())
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for GatewayError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        tracing::error!(?err, "pool error");
        Self::persistence(err.to_string())
    }
}
