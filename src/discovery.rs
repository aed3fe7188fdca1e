use serde::Deserialize;
use url::Url;

/// Provider metadata from the `.well-known/openid_configuration` document.
///
/// Endpoint URLs always come from here; the client never derives them from
/// the provider origin.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct DiscoveryDocument {
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Url,
    #[serde(default)]
    pub revocation_endpoint: Option<Url>,
    #[serde(default)]
    pub issuer: Option<String>,
}
