use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::session::{Credentials, PkceContext};

/// Storage key names used by [`KeyValueCredentialStore`].
///
/// Consumers sharing a key-value store with other code should treat these
/// six keys as owned by this crate.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const ID_TOKEN: &str = "id_token";
    /// Stringified epoch milliseconds.
    pub const TOKEN_EXPIRES_AT: &str = "token_expires_at";
    pub const OIDC_STATE: &str = "oidc_state";
    pub const OIDC_CODE_VERIFIER: &str = "oidc_code_verifier";
}

/// Consumer-provided credential persistence.
///
/// The OIDC client owns the session lifecycle through this trait; no other
/// component should write the credential slots directly. Implementations
/// must serialize each operation internally (the in-memory store uses a
/// mutex) — concurrent operations are last-write-wins across calls.
///
/// # Example
///
/// ```rust,ignore
/// impl CredentialStore for KeychainStore {
///     fn credentials(&self) -> Option<Credentials> {
///         self.read_entry("sonara-session")
///     }
///     fn store_credentials(&self, credentials: &Credentials) {
///         self.write_entry("sonara-session", credentials);
///     }
///     // ...
/// }
/// ```
pub trait CredentialStore: Send + Sync {
    /// The current credential set, or `None` if signed out.
    ///
    /// Must return `None` for partially persisted state: a set missing its
    /// access token or expiry is not a session.
    fn credentials(&self) -> Option<Credentials>;

    /// Replace the whole credential set in one operation.
    fn store_credentials(&self, credentials: &Credentials);

    /// Remove the whole credential set.
    fn clear_credentials(&self);

    /// The transient PKCE context for the in-flight authorization, if any.
    fn pkce_context(&self) -> Option<PkceContext>;

    /// Replace the transient PKCE context (single slot — overwrites any
    /// previous authorization attempt).
    fn store_pkce_context(&self, context: &PkceContext);

    /// Remove the transient PKCE context.
    fn clear_pkce_context(&self);
}

// Shared stores are common in tests and long-lived apps.
impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn credentials(&self) -> Option<Credentials> {
        (**self).credentials()
    }
    fn store_credentials(&self, credentials: &Credentials) {
        (**self).store_credentials(credentials);
    }
    fn clear_credentials(&self) {
        (**self).clear_credentials();
    }
    fn pkce_context(&self) -> Option<PkceContext> {
        (**self).pkce_context()
    }
    fn store_pkce_context(&self, context: &PkceContext) {
        (**self).store_pkce_context(context);
    }
    fn clear_pkce_context(&self) {
        (**self).clear_pkce_context();
    }
}

#[derive(Debug, Default)]
struct MemorySlots {
    credentials: Option<Credentials>,
    pkce: Option<PkceContext>,
}

/// In-memory [`CredentialStore`].
///
/// The default store for a fresh [`OidcClient`](crate::OidcClient); the
/// session lives as long as the client. A mutex serializes all access.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<MemorySlots>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credentials(&self) -> Option<Credentials> {
        self.inner.lock().expect("store mutex poisoned").credentials.clone()
    }

    fn store_credentials(&self, credentials: &Credentials) {
        self.inner.lock().expect("store mutex poisoned").credentials = Some(credentials.clone());
    }

    fn clear_credentials(&self) {
        self.inner.lock().expect("store mutex poisoned").credentials = None;
    }

    fn pkce_context(&self) -> Option<PkceContext> {
        self.inner.lock().expect("store mutex poisoned").pkce.clone()
    }

    fn store_pkce_context(&self, context: &PkceContext) {
        self.inner.lock().expect("store mutex poisoned").pkce = Some(context.clone());
    }

    fn clear_pkce_context(&self) {
        self.inner.lock().expect("store mutex poisoned").pkce = None;
    }
}

/// Consumer-provided string key-value backend for
/// [`KeyValueCredentialStore`] — the shape of a browser `localStorage`, an
/// OS keychain, or a settings file.
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Arc<B> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value);
    }
    fn remove(&self, key: &str) {
        (**self).remove(key);
    }
}

/// [`CredentialStore`] over a string key-value backend, using the
/// [`keys`] layout.
///
/// Key writes are not atomic as a group; a reader that finds the access
/// token or expiry missing (or the expiry unparseable) sees the session as
/// absent rather than half-present.
pub struct KeyValueCredentialStore<B: KeyValueBackend> {
    backend: B,
}

impl<B: KeyValueBackend> KeyValueCredentialStore<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: KeyValueBackend> CredentialStore for KeyValueCredentialStore<B> {
    fn credentials(&self) -> Option<Credentials> {
        let access_token = self.backend.get(keys::ACCESS_TOKEN)?;
        let expires_at = self.backend.get(keys::TOKEN_EXPIRES_AT)?.parse().ok()?;
        Some(Credentials {
            access_token,
            refresh_token: self.backend.get(keys::REFRESH_TOKEN),
            id_token: self.backend.get(keys::ID_TOKEN),
            expires_at,
        })
    }

    fn store_credentials(&self, credentials: &Credentials) {
        self.backend
            .set(keys::ACCESS_TOKEN, &credentials.access_token);
        self.backend
            .set(keys::TOKEN_EXPIRES_AT, &credentials.expires_at.to_string());
        match &credentials.refresh_token {
            Some(token) => self.backend.set(keys::REFRESH_TOKEN, token),
            None => self.backend.remove(keys::REFRESH_TOKEN),
        }
        match &credentials.id_token {
            Some(token) => self.backend.set(keys::ID_TOKEN, token),
            None => self.backend.remove(keys::ID_TOKEN),
        }
    }

    fn clear_credentials(&self) {
        self.backend.remove(keys::ACCESS_TOKEN);
        self.backend.remove(keys::REFRESH_TOKEN);
        self.backend.remove(keys::ID_TOKEN);
        self.backend.remove(keys::TOKEN_EXPIRES_AT);
    }

    fn pkce_context(&self) -> Option<PkceContext> {
        let state = self.backend.get(keys::OIDC_STATE)?;
        let code_verifier = self.backend.get(keys::OIDC_CODE_VERIFIER)?;
        Some(PkceContext {
            state,
            code_verifier,
        })
    }

    fn store_pkce_context(&self, context: &PkceContext) {
        self.backend.set(keys::OIDC_STATE, &context.state);
        self.backend
            .set(keys::OIDC_CODE_VERIFIER, &context.code_verifier);
    }

    fn clear_pkce_context(&self) {
        self.backend.remove(keys::OIDC_STATE);
        self.backend.remove(keys::OIDC_CODE_VERIFIER);
    }
}

/// [`KeyValueBackend`] over a mutex-guarded map, for tests and ephemeral
/// sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyValueBackend {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently present, sorted.
    #[must_use]
    pub fn key_names(&self) -> Vec<String> {
        let map = self.map.lock().expect("backend mutex poisoned");
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }
}

impl KeyValueBackend for MemoryKeyValueBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.map.lock().expect("backend mutex poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.map
            .lock()
            .expect("backend mutex poisoned")
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.map.lock().expect("backend mutex poisoned").remove(key);
    }
}
