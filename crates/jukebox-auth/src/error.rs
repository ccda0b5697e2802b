use reqwest::StatusCode;
use jukebox_types::models::TokenKind;

/// Why a credential exchange did not produce an identity.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Nothing to exchange; no request was sent.
    #[error("no {0} token stored")]
    MissingCredential(TokenKind),

    /// The request never produced an HTTP response.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("credential rejected: {0}")]
    Rejected(StatusCode),

    /// The server said yes but the body is not what we expected.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("local storage: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    /// True when the server actively refused the credential, as opposed to
    /// the exchange failing for some other reason.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(status) if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN)
    }
}
