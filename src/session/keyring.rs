use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Session, SessionError};

pub(crate) const SERVICE_NAME: &str = "todolist-session";

/// What survives between runs. The id token is short-lived and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user_id: String,
    pub display_name: String,
    pub refresh_token: String,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.credentials.user_id.clone(),
            display_name: session.display_name.clone(),
            refresh_token: session.credentials.refresh_token.clone(),
        }
    }
}

fn attributes(project: &str) -> HashMap<&str, &str> {
    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("project", project);
    attrs
}

async fn open() -> Result<oo7::Keyring, SessionError> {
    oo7::Keyring::new()
        .await
        .map_err(|e| SessionError::Keyring(format!("failed to connect: {}", e)))
}

/// Store the session in the system keyring via Secret Service, replacing any previous one.
pub async fn store_session(project: &str, session: &StoredSession) -> Result<(), SessionError> {
    let keyring = open().await?;
    let secret = serde_json::to_vec(session)?;

    keyring
        .create_item(
            &format!("To-do list session ({})", project),
            &attributes(project),
            secret.as_slice(),
            true, // replace existing
        )
        .await
        .map_err(|e| SessionError::Keyring(format!("failed to store session: {}", e)))?;

    Ok(())
}

/// Load the stored session for `project`, if any.
pub async fn load_session(project: &str) -> Result<Option<StoredSession>, SessionError> {
    let keyring = open().await?;

    let items = keyring
        .search_items(&attributes(project))
        .await
        .map_err(|e| SessionError::Keyring(format!("failed to search: {}", e)))?;

    let Some(item) = items.first() else {
        return Ok(None);
    };
    let secret = item
        .secret()
        .await
        .map_err(|e| SessionError::Keyring(format!("failed to read secret: {}", e)))?;

    match serde_json::from_slice::<StoredSession>(&secret.to_vec()) {
        Ok(session) => Ok(Some(session)),
        Err(e) => {
            log::warn!("Ignoring unreadable stored session: {}", e);
            Ok(None)
        }
    }
}

/// Remove every stored session for `project`.
pub async fn delete_session(project: &str) -> Result<(), SessionError> {
    let keyring = open().await?;

    let items = keyring
        .search_items(&attributes(project))
        .await
        .map_err(|e| SessionError::Keyring(format!("failed to search: {}", e)))?;

    for item in items {
        item.delete()
            .await
            .map_err(|e| SessionError::Keyring(format!("failed to delete session: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Credentials;

    #[test]
    fn stored_session_never_holds_id_token() {
        let session = Session {
            credentials: Credentials {
                user_id: "u1".to_string(),
                id_token: "secret-id-token".to_string(),
                refresh_token: "r1".to_string(),
            },
            display_name: "Ada".to_string(),
        };
        let stored = StoredSession::from(&session);
        assert_eq!(stored.user_id, "u1");
        assert_eq!(stored.display_name, "Ada");

        let json = serde_json::to_string(&stored).unwrap();
        assert!(!json.contains("secret-id-token"));
        assert!(json.contains("r1"));
    }
}
