use std::sync::Arc;

use tokio::sync::watch;

use crate::session::{
    AuthBackend, Credentials, DEFAULT_DISPLAY_NAME, Session, SessionError, SessionProvider,
};

/// Progress of the last sign-up or sign-in attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Idle,
    Loading,
    Success,
    Error(String),
}

pub struct AuthController {
    backend: Arc<dyn AuthBackend>,
    state: watch::Sender<AuthState>,
    session: Option<Session>,
}

fn failure_message(e: &SessionError, fallback: &str) -> String {
    match e {
        SessionError::Rejected(message) if !message.is_empty() => message.clone(),
        SessionError::Rejected(_) => fallback.to_string(),
        other => other.to_string(),
    }
}

impl AuthController {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        let (state, _) = watch::channel(AuthState::Idle);
        Self {
            backend,
            state,
            session: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Create an account and sign it in under `username`.
    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Session, SessionError> {
        self.state.send_replace(AuthState::Loading);

        let credentials = match self.backend.sign_up(email, password).await {
            Ok(c) => c,
            Err(e) => return Err(self.fail(e, "Sign-up failed")),
        };

        let display_name = if username.is_empty() {
            DEFAULT_DISPLAY_NAME.to_string()
        } else {
            if let Err(e) = self.backend.set_display_name(&credentials, username).await {
                log::warn!("Could not store display name for {}: {}", credentials.user_id, e);
            }
            username.to_string()
        };

        log::info!("Signed up user {}", credentials.user_id);
        Ok(self.establish(credentials, display_name))
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<Session, SessionError> {
        self.state.send_replace(AuthState::Loading);

        let credentials = match self.backend.sign_in(email, password).await {
            Ok(c) => c,
            Err(e) => return Err(self.fail(e, "Login failed")),
        };
        let display_name = self.lookup_display_name(&credentials).await;

        log::info!("Signed in user {}", credentials.user_id);
        Ok(self.establish(credentials, display_name))
    }

    /// Resume a session persisted from an earlier run.
    ///
    /// `display_name` is what was known last time; it is kept if the
    /// service has none.
    pub async fn restore(
        &mut self,
        refresh_token: &str,
        display_name: &str,
    ) -> Result<Session, SessionError> {
        let credentials = match self.backend.refresh(refresh_token).await {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Could not restore session: {}", e);
                return Err(e);
            }
        };

        let display_name = match self.backend.display_name(&credentials).await {
            Ok(Some(name)) => name,
            Ok(None) | Err(_) if !display_name.is_empty() => display_name.to_string(),
            _ => DEFAULT_DISPLAY_NAME.to_string(),
        };

        log::debug!("Restored session for {}", credentials.user_id);
        Ok(self.establish(credentials, display_name))
    }

    pub fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("Signed out user {}", session.user_id());
        }
        self.state.send_replace(AuthState::Idle);
    }

    async fn lookup_display_name(&self, credentials: &Credentials) -> String {
        match self.backend.display_name(credentials).await {
            Ok(Some(name)) => name,
            Ok(None) => DEFAULT_DISPLAY_NAME.to_string(),
            Err(e) => {
                log::warn!("Could not look up display name for {}: {}", credentials.user_id, e);
                DEFAULT_DISPLAY_NAME.to_string()
            }
        }
    }

    fn establish(&mut self, credentials: Credentials, display_name: String) -> Session {
        let session = Session {
            credentials,
            display_name,
        };
        self.session = Some(session.clone());
        self.state.send_replace(AuthState::Success);
        session
    }

    fn fail(&mut self, e: SessionError, fallback: &str) -> SessionError {
        let message = failure_message(&e, fallback);
        log::error!("Authentication failed: {}", message);
        self.state.send_replace(AuthState::Error(message));
        e
    }
}

impl SessionProvider for AuthController {
    fn user_id(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.user_id().to_string())
            .unwrap_or_default()
    }

    fn display_name(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.display_name.clone())
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Accounts keyed by email; the user id is derived from the email.
    #[derive(Default)]
    struct FakeAuth {
        accounts: Mutex<HashMap<String, String>>,
        names: Mutex<HashMap<String, String>>,
    }

    fn credentials_for(email: &str) -> Credentials {
        Credentials {
            user_id: format!("uid-{}", email),
            id_token: format!("id-{}", email),
            refresh_token: format!("refresh-{}", email),
        }
    }

    #[async_trait]
    impl AuthBackend for FakeAuth {
        async fn sign_up(&self, email: &str, password: &str) -> Result<Credentials, SessionError> {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(email) {
                return Err(SessionError::Rejected("EMAIL_EXISTS".to_string()));
            }
            accounts.insert(email.to_string(), password.to_string());
            Ok(credentials_for(email))
        }

        async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, SessionError> {
            match self.accounts.lock().unwrap().get(email) {
                Some(p) if p == password => Ok(credentials_for(email)),
                _ => Err(SessionError::Rejected(String::new())),
            }
        }

        async fn refresh(&self, refresh_token: &str) -> Result<Credentials, SessionError> {
            match refresh_token.strip_prefix("refresh-") {
                Some(email) => Ok(credentials_for(email)),
                None => Err(SessionError::Rejected("INVALID_REFRESH_TOKEN".to_string())),
            }
        }

        async fn set_display_name(
            &self,
            credentials: &Credentials,
            display_name: &str,
        ) -> Result<(), SessionError> {
            self.names
                .lock()
                .unwrap()
                .insert(credentials.user_id.clone(), display_name.to_string());
            Ok(())
        }

        async fn display_name(
            &self,
            credentials: &Credentials,
        ) -> Result<Option<String>, SessionError> {
            Ok(self.names.lock().unwrap().get(&credentials.user_id).cloned())
        }
    }

    fn controller() -> AuthController {
        AuthController::new(Arc::new(FakeAuth::default()))
    }

    #[tokio::test]
    async fn no_session_means_empty_user_id() {
        let auth = controller();
        assert_eq!(auth.user_id(), "");
        assert!(!auth.is_signed_in());
        assert_eq!(auth.display_name(), DEFAULT_DISPLAY_NAME);
        assert_eq!(auth.state(), AuthState::Idle);
    }

    #[tokio::test]
    async fn sign_up_then_sign_in_keeps_username() {
        let mut auth = controller();
        let session = auth.sign_up("ada@example.com", "pw", "Ada").await.unwrap();
        assert_eq!(auth.state(), AuthState::Success);
        assert_eq!(auth.user_id(), session.user_id());
        assert_eq!(auth.display_name(), "Ada");

        auth.sign_out();
        assert!(!auth.is_signed_in());
        assert_eq!(auth.state(), AuthState::Idle);

        auth.sign_in("ada@example.com", "pw").await.unwrap();
        assert_eq!(auth.display_name(), "Ada");
    }

    #[tokio::test]
    async fn rejected_sign_up_reports_service_message() {
        let mut auth = controller();
        auth.sign_up("ada@example.com", "pw", "Ada").await.unwrap();
        auth.sign_out();

        assert!(auth.sign_up("ada@example.com", "pw", "Ada").await.is_err());
        assert_eq!(auth.state(), AuthState::Error("EMAIL_EXISTS".to_string()));
        assert!(!auth.is_signed_in());
    }

    #[tokio::test]
    async fn bad_password_falls_back_to_generic_message() {
        let mut auth = controller();
        assert!(auth.sign_in("nobody@example.com", "pw").await.is_err());
        assert_eq!(auth.state(), AuthState::Error("Login failed".to_string()));
    }

    #[tokio::test]
    async fn sign_in_without_name_uses_default() {
        let mut auth = controller();
        auth.sign_up("bo@example.com", "pw", "").await.unwrap();
        auth.sign_out();
        auth.sign_in("bo@example.com", "pw").await.unwrap();
        assert_eq!(auth.display_name(), DEFAULT_DISPLAY_NAME);
    }

    #[tokio::test]
    async fn restore_from_refresh_token() {
        let mut auth = controller();
        let session = auth.restore("refresh-ada@example.com", "Ada").await.unwrap();
        assert_eq!(session.user_id(), "uid-ada@example.com");
        assert_eq!(auth.display_name(), "Ada");

        let mut other = controller();
        assert!(other.restore("garbage", "Ada").await.is_err());
        assert!(!other.is_signed_in());
    }

    #[tokio::test]
    async fn state_changes_are_published() {
        let mut auth = controller();
        let mut rx = auth.subscribe();
        auth.sign_up("ada@example.com", "pw", "Ada").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), AuthState::Success);
    }
}
