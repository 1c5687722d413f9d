/// Errors from password and sealing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("failed to hash password: {0}")]
    HashFailed(String),

    #[error("failed to verify password: {0}")]
    VerifyFailed(String),

    #[error("invalid password hash format")]
    InvalidHash,

    #[error("sealing secret is empty")]
    EmptySecret,

    #[error("sealed payload is malformed: {0}")]
    MalformedPayload(String),

    #[error("sealed payload failed authentication")]
    Unauthenticated,
}
