/// Errors surfaced by the OIDC client.
///
/// Each variant corresponds to one failure kind of the handshake so callers
/// can decide whether to restart the login flow, surface the problem, or
/// give up. Nothing is retried internally except the single
/// refresh-and-retry inside [`OidcClient::user_info`](crate::OidcClient::user_info).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Discovery document unreachable or malformed. Fatal to any further
    /// operation until a retry succeeds.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// The identity provider rejected the authorization request, or the
    /// user declined. Recoverable by restarting the flow.
    #[error("authorization rejected by provider: {code}")]
    Authorization {
        code: String,
        description: Option<String>,
    },

    /// Callback `state` did not match the stored value. Treated as a
    /// security event; no retry without a full restart.
    #[error("state mismatch: possible CSRF attack")]
    Csrf,

    /// Malformed callback (missing authorization code, unparseable URL).
    #[error("malformed callback: {0}")]
    Protocol(String),

    /// No PKCE code verifier in the store — the callback was processed in
    /// a context that never initiated an authorization.
    #[error("no PKCE code verifier for this authorization attempt")]
    PkceState,

    /// The token endpoint rejected the authorization-code exchange.
    #[error("token exchange failed with status {status}: {body}")]
    TokenExchange { status: u16, body: String },

    /// The token endpoint rejected the refresh grant. The session has
    /// already been cleared by the time this propagates.
    #[error("token refresh failed with status {status}: {body}")]
    Refresh { status: u16, body: String },

    /// A refresh was requested but the session holds no refresh token.
    #[error("no refresh token in session")]
    NoRefreshToken,

    /// An authenticated request was attempted with no access token.
    #[error("no access token in session")]
    NoAccessToken,

    /// The userinfo endpoint returned a non-success response.
    #[error("userinfo request failed with status {status}: {body}")]
    UserInfo { status: u16, body: String },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
