use url::Url;

use crate::error::Error;

/// Sonara identity provider configuration.
///
/// Required fields are constructor parameters — no runtime "missing field"
/// errors.
///
/// ```rust,ignore
/// use sonara_identity::OidcConfig;
///
/// let config = OidcConfig::new(
///     "my-client-id",
///     "https://id.sonara.app".parse()?,
///     "https://my-app.example/callback".parse()?,
/// );
/// // Optional overrides via chaining:
/// let config = config.with_scope("openid profile");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OidcConfig {
    pub(crate) base_url: Url,
    pub(crate) client_id: String,
    pub(crate) redirect_uri: Url,
    pub(crate) scope: String,
}

impl OidcConfig {
    /// Create a new configuration.
    ///
    /// `base_url` is the identity-provider origin; endpoint URLs are taken
    /// from its discovery document, never guessed.
    #[must_use]
    pub fn new(client_id: impl Into<String>, base_url: Url, redirect_uri: Url) -> Self {
        Self {
            base_url,
            client_id: client_id.into(),
            redirect_uri,
            scope: "openid profile email".into(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Required env vars
    /// - `SONARA_IDP_URL`: identity-provider origin (must be a valid URL)
    /// - `SONARA_CLIENT_ID`: public OAuth2 client identifier
    /// - `SONARA_REDIRECT_URI`: callback URL registered with the provider
    ///
    /// # Optional env vars
    /// - `SONARA_SCOPE`: space-separated OIDC scopes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or URLs
    /// are invalid.
    pub fn from_env() -> Result<Self, Error> {
        let base_url = required_url_var("SONARA_IDP_URL")?;
        let client_id = std::env::var("SONARA_CLIENT_ID")
            .map_err(|_| Error::Config("SONARA_CLIENT_ID is required".into()))?;
        let redirect_uri = required_url_var("SONARA_REDIRECT_URI")?;

        let mut config = Self::new(client_id, base_url, redirect_uri);
        if let Ok(scope) = std::env::var("SONARA_SCOPE") {
            config = config.with_scope(scope);
        }
        Ok(config)
    }

    /// Override the requested scopes (default: `"openid profile email"`).
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Identity-provider origin.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `OAuth2` client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// `OAuth2` redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Space-separated requested scopes.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Well-known discovery document URL for this provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL cannot serve as a base
    /// (e.g. a `mailto:` URL).
    pub fn discovery_url(&self) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/.well-known/openid_configuration")
            .parse()
            .map_err(|e| Error::Config(format!("SONARA_IDP_URL cannot be a base: {e}")))
    }
}

fn required_url_var(name: &'static str) -> Result<Url, Error> {
    let raw = std::env::var(name).map_err(|_| Error::Config(format!("{name} is required")))?;
    raw.parse()
        .map_err(|e| Error::Config(format!("{name}: {e}")))
}
