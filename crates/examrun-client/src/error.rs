//! Login error types.

use thiserror::Error;

/// Errors from the backend login endpoint.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The backend refused the credentials.
    #[error("login rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request timed out.
    #[error("login timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The response did not carry a user and a token.
    #[error("invalid login response: {0}")]
    Decode(String),
}
