use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use url::Url;

use crate::config::OidcConfig;
use crate::discovery::DiscoveryDocument;
use crate::error::Error;
use crate::pkce;
use crate::session::{now_millis, Credentials, PkceContext};
use crate::store::{CredentialStore, MemoryCredentialStore};

/// Token response from the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Claims from the provider's userinfo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    /// Any further claims the provider returned.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of the best-effort revocation attempt during [`OidcClient::logout`].
///
/// Local sign-out always succeeds; this only reports whether the provider
/// was told about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
    /// The provider accepted the revocation request.
    Revoked,
    /// No token to revoke, or the provider advertises no revocation
    /// endpoint (or could not be discovered).
    Skipped,
    /// The revocation request failed; the session was cleared anyway.
    Failed(String),
}

struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// OIDC Authorization Code + PKCE client.
///
/// Drives one authentication attempt at a time:
/// [`authorization_url`](Self::authorization_url) writes a fresh PKCE
/// context (overwriting any previous attempt), the redirect comes back
/// through [`handle_callback`](Self::handle_callback), and the resulting
/// credential set lives in the injected [`CredentialStore`] until
/// [`logout`](Self::logout) or a fatal refresh failure clears it.
pub struct OidcClient<S: CredentialStore = MemoryCredentialStore> {
    config: OidcConfig,
    http: reqwest::Client,
    store: S,
    discovery: OnceCell<DiscoveryDocument>,
}

impl OidcClient<MemoryCredentialStore> {
    /// Create a client with an in-memory credential store.
    #[must_use]
    pub fn new(config: OidcConfig) -> Self {
        Self::with_store(config, MemoryCredentialStore::new())
    }
}

impl<S: CredentialStore> OidcClient<S> {
    /// Create a client with a consumer-provided credential store.
    #[must_use]
    pub fn with_store(config: OidcConfig, store: S) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            store,
            discovery: OnceCell::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// The injected credential store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The current credential set, if signed in.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.store.credentials()
    }

    /// Fetch the provider's discovery document, caching the first success
    /// for the lifetime of the client. Failed fetches are not cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the document is unreachable or
    /// malformed.
    pub async fn discover(&self) -> Result<&DiscoveryDocument, Error> {
        self.discovery
            .get_or_try_init(|| self.fetch_discovery())
            .await
    }

    async fn fetch_discovery(&self) -> Result<DiscoveryDocument, Error> {
        let url = self.config.discovery_url()?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Discovery(format!(
                "discovery endpoint returned {}",
                response.status()
            )));
        }
        response
            .json::<DiscoveryDocument>()
            .await
            .map_err(|e| Error::Discovery(format!("malformed discovery document: {e}")))
    }

    /// Build the authorization URL the user agent should be sent to.
    ///
    /// Generates a fresh `state` and PKCE verifier and stores them as the
    /// transient context. Overwrites any previous context: a second call
    /// before the first callback completes invalidates the first attempt,
    /// so authorization attempts must be serialized by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the provider has not been and
    /// cannot be discovered.
    pub async fn authorization_url(&self) -> Result<Url, Error> {
        let document = self.discover().await?;

        let state = pkce::generate_state();
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::generate_code_challenge(&code_verifier);
        self.store.store_pkce_context(&PkceContext {
            state: state.clone(),
            code_verifier,
        });

        let mut url = document.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scope)
            .append_pair("state", &state)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(url)
    }

    /// Process the provider's redirect back to the application.
    ///
    /// The state check runs before anything else is done with the
    /// callback. The transient PKCE context is cleared once a token
    /// exchange has been attempted, whether or not it succeeded; earlier
    /// failures leave it in place (restarting the flow overwrites it).
    ///
    /// # Errors
    ///
    /// - [`Error::Authorization`] if the provider reported an error.
    /// - [`Error::Csrf`] if `state` does not match the stored value.
    /// - [`Error::Protocol`] if the URL is unparseable or `code` is missing.
    /// - [`Error::PkceState`] / [`Error::TokenExchange`] from the exchange.
    pub async fn handle_callback(&self, callback_url: &str) -> Result<TokenResponse, Error> {
        let url: Url = callback_url
            .parse()
            .map_err(|e| Error::Protocol(format!("callback URL: {e}")))?;
        let params = parse_callback_params(&url);

        if let Some(code) = params.error {
            tracing::warn!(error = %code, "authorization rejected by provider");
            return Err(Error::Authorization {
                code,
                description: params.error_description,
            });
        }

        let stored_state = self.store.pkce_context().map(|c| c.state);
        if params.state.is_none() || params.state != stored_state {
            tracing::warn!("callback state mismatch");
            return Err(Error::Csrf);
        }

        let code = params
            .code
            .ok_or_else(|| Error::Protocol("missing authorization code".into()))?;

        let result = self.exchange_code(&code).await;
        self.store.clear_pkce_context();
        let tokens = result?;
        tracing::info!("authorization code exchange complete");
        Ok(tokens)
    }

    /// Exchange an authorization code for tokens using the stored PKCE
    /// verifier, writing the whole credential set on success.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, Error> {
        let code_verifier = self
            .store
            .pkce_context()
            .map(|c| c.code_verifier)
            .ok_or(Error::PkceState)?;
        let document = self.discover().await?;

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", code_verifier.as_str()),
        ];
        let response = self
            .http
            .post(document.token_endpoint.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenExchange { status, body });
        }

        let tokens = response.json::<TokenResponse>().await?;
        self.store.store_credentials(&credentials_from(&tokens, None));
        Ok(tokens)
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// The access token and expiry always update; the refresh token only
    /// updates if the provider reissued one; the ID token is kept. An
    /// error response from the provider is fatal to the session: the
    /// client logs out before propagating [`Error::Refresh`].
    ///
    /// # Errors
    ///
    /// [`Error::NoRefreshToken`] if signed out or the session has no
    /// refresh token; [`Error::Refresh`] on provider rejection.
    pub async fn refresh_token(&self) -> Result<(), Error> {
        let current = self.store.credentials().ok_or(Error::NoRefreshToken)?;
        let refresh_token = current
            .refresh_token
            .clone()
            .ok_or(Error::NoRefreshToken)?;
        let document = self.discover().await?;

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ];
        let response = self
            .http
            .post(document.token_endpoint.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, "token refresh rejected, clearing session");
            self.logout().await;
            return Err(Error::Refresh { status, body });
        }

        let tokens = response.json::<TokenResponse>().await?;
        self.store
            .store_credentials(&credentials_from(&tokens, Some(&current)));
        tracing::debug!("access token refreshed");
        Ok(())
    }

    /// Fetch the authenticated user's claims.
    ///
    /// A 401 triggers exactly one refresh and one retried request; a
    /// second 401 propagates as [`Error::UserInfo`] without a third
    /// attempt.
    ///
    /// # Errors
    ///
    /// [`Error::NoAccessToken`] if signed out; [`Error::Refresh`] if the
    /// interposed refresh fails (the session is cleared);
    /// [`Error::UserInfo`] on any other non-success response.
    pub async fn user_info(&self) -> Result<UserInfo, Error> {
        let document = self.discover().await?;
        let userinfo_endpoint = document.userinfo_endpoint.clone();

        let mut response = self.get_userinfo(&userinfo_endpoint).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            // One refresh, one retry. A second 401 falls through below.
            self.refresh_token().await?;
            response = self.get_userinfo(&userinfo_endpoint).await?;
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UserInfo { status, body });
        }
        response.json::<UserInfo>().await.map_err(Into::into)
    }

    async fn get_userinfo(&self, endpoint: &Url) -> Result<reqwest::Response, Error> {
        let access_token = self
            .store
            .credentials()
            .map(|c| c.access_token)
            .ok_or(Error::NoAccessToken)?;
        self.http
            .get(endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(Into::into)
    }

    /// True iff a credential set is present and its access token is not
    /// within 5 minutes of expiry. Pure predicate, no I/O.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store
            .credentials()
            .is_some_and(|c| c.is_authenticated_at(now_millis()))
    }

    /// True iff a credential set is present and within 10 minutes of
    /// expiry — poll this periodically and call
    /// [`refresh_token`](Self::refresh_token) when it fires.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.store
            .credentials()
            .is_some_and(|c| c.needs_refresh_at(now_millis()))
    }

    /// Sign out.
    ///
    /// Best-effort: revokes the current access token if the provider
    /// advertises a revocation endpoint, swallowing (but reporting) any
    /// failure, then unconditionally clears the credential set and any
    /// transient PKCE context.
    pub async fn logout(&self) -> RevocationStatus {
        let status = match self.store.credentials() {
            Some(credentials) => self.try_revoke(&credentials.access_token).await,
            None => RevocationStatus::Skipped,
        };
        if let RevocationStatus::Failed(ref reason) = status {
            tracing::warn!(%reason, "token revocation failed during logout");
        }

        self.store.clear_credentials();
        self.store.clear_pkce_context();
        tracing::info!("session cleared");
        status
    }

    async fn try_revoke(&self, access_token: &str) -> RevocationStatus {
        // Discovery is itself best-effort here; logout must not fail.
        let endpoint = match self.discover().await {
            Ok(document) => match &document.revocation_endpoint {
                Some(endpoint) => endpoint.clone(),
                None => return RevocationStatus::Skipped,
            },
            Err(e) => return RevocationStatus::Failed(e.to_string()),
        };

        let params = [
            ("token", access_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        match self.http.post(endpoint).form(&params).send().await {
            Ok(response) if response.status().is_success() => RevocationStatus::Revoked,
            Ok(response) => {
                RevocationStatus::Failed(format!("revocation returned {}", response.status()))
            }
            Err(e) => RevocationStatus::Failed(e.to_string()),
        }
    }
}

fn parse_callback_params(url: &Url) -> CallbackParams {
    let mut params = CallbackParams {
        code: None,
        state: None,
        error: None,
        error_description: None,
    };
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "error_description" => params.error_description = Some(value.into_owned()),
            _ => {}
        }
    }
    params
}

/// Build the credential set for a token response. `previous` carries the
/// fields a refresh response may omit: the refresh token is kept unless
/// reissued and the ID token is kept as-is.
fn credentials_from(tokens: &TokenResponse, previous: Option<&Credentials>) -> Credentials {
    let expires_at = now_millis() + (tokens.expires_in as i64) * 1000;
    Credentials {
        access_token: tokens.access_token.clone(),
        refresh_token: tokens
            .refresh_token
            .clone()
            .or_else(|| previous.and_then(|c| c.refresh_token.clone())),
        id_token: tokens
            .id_token
            .clone()
            .or_else(|| previous.and_then(|c| c.id_token.clone())),
        expires_at,
    }
}
