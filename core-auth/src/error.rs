use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error("Token lifetime of {0} seconds is out of range")]
    InvalidExpiry(i64),

    #[error("Malformed {kind}: {reason}")]
    MalformedToken { kind: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, AuthError>;
