pub mod firebase;
pub mod keyring;

use async_trait::async_trait;

/// Shown when the account has no display name of its own.
pub const DEFAULT_DISPLAY_NAME: &str = "User";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The auth service refused the request; carries its reason.
    #[error("{0}")]
    Rejected(String),
    #[error("auth request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid auth payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("keyring: {0}")]
    Keyring(String),
}

/// Tokens and identity returned by the auth service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub id_token: String,
    pub refresh_token: String,
}

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credentials: Credentials,
    pub display_name: String,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.credentials.user_id
    }
}

/// Supplies the current user's identity. An empty user id means nobody is
/// signed in and the front-end should send the user to authentication.
pub trait SessionProvider {
    fn user_id(&self) -> String;
    fn display_name(&self) -> String;

    fn is_signed_in(&self) -> bool {
        !self.user_id().is_empty()
    }
}

/// Account operations of the managed auth service.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Credentials, SessionError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, SessionError>;
    /// Exchange a refresh token for fresh credentials.
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials, SessionError>;
    async fn set_display_name(
        &self,
        credentials: &Credentials,
        display_name: &str,
    ) -> Result<(), SessionError>;
    async fn display_name(&self, credentials: &Credentials)
    -> Result<Option<String>, SessionError>;
}
