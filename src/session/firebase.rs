use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{AuthBackend, Credentials, SessionError};

pub const IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
pub const TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordAuthResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
}

/// The token endpoint answers in snake_case, unlike the identity endpoints.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    user_id: String,
    id_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Email/password accounts over the identity-toolkit REST API.
pub struct FirebaseAuthClient {
    api_key: String,
    identity_url: String,
    token_url: String,
    http: Client,
}

impl FirebaseAuthClient {
    pub fn new(api_key: &str) -> Result<Self, SessionError> {
        Self::with_endpoints(api_key, IDENTITY_ENDPOINT, TOKEN_ENDPOINT)
    }

    pub fn with_endpoints(
        api_key: &str,
        identity_url: &str,
        token_url: &str,
    ) -> Result<Self, SessionError> {
        let http = Client::builder().build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            identity_url: identity_url.trim_end_matches('/').to_string(),
            token_url: token_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn accounts_url(&self, action: &str) -> String {
        format!("{}/accounts:{}", self.identity_url, action)
    }

    async fn password_auth(
        &self,
        action: &str,
        email: &str,
        password: &str,
    ) -> Result<Credentials, SessionError> {
        let resp = self
            .http
            .post(self.accounts_url(action))
            .query(&[("key", &self.api_key)])
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await?;
        let body: PasswordAuthResponse = parse_response(resp).await?;
        Ok(Credentials {
            user_id: body.local_id,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
        })
    }
}

/// Decode a success body, or turn the service's error envelope into `Rejected`.
async fn parse_response<T: DeserializeOwned>(resp: Response) -> Result<T, SessionError> {
    let status = resp.status();
    let text = resp.text().await?;
    if status.is_success() {
        return Ok(serde_json::from_str(&text)?);
    }
    Err(SessionError::Rejected(rejection_message(&text, status)))
}

fn rejection_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("auth service returned {}", status))
}

#[async_trait]
impl AuthBackend for FirebaseAuthClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Credentials, SessionError> {
        self.password_auth("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, SessionError> {
        self.password_auth("signInWithPassword", email, password).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Credentials, SessionError> {
        let resp = self
            .http
            .post(format!("{}/token", self.token_url))
            .query(&[("key", &self.api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;
        let body: RefreshResponse = parse_response(resp).await?;
        Ok(Credentials {
            user_id: body.user_id,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
        })
    }

    async fn set_display_name(
        &self,
        credentials: &Credentials,
        display_name: &str,
    ) -> Result<(), SessionError> {
        let resp = self
            .http
            .post(self.accounts_url("update"))
            .query(&[("key", &self.api_key)])
            .json(&json!({
                "idToken": credentials.id_token,
                "displayName": display_name,
                "returnSecureToken": false,
            }))
            .send()
            .await?;
        let _: serde_json::Value = parse_response(resp).await?;
        Ok(())
    }

    async fn display_name(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<String>, SessionError> {
        let resp = self
            .http
            .post(self.accounts_url("lookup"))
            .query(&[("key", &self.api_key)])
            .json(&json!({ "idToken": credentials.id_token }))
            .send()
            .await?;
        let body: LookupResponse = parse_response(resp).await?;
        Ok(body
            .users
            .into_iter()
            .next()
            .and_then(|u| u.display_name)
            .filter(|name| !name.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn rejection_uses_service_message() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
        assert_eq!(rejection_message(body, StatusCode::BAD_REQUEST), "EMAIL_EXISTS");
    }

    #[test]
    fn rejection_falls_back_to_status() {
        let message = rejection_message("<html>bad gateway</html>", StatusCode::BAD_GATEWAY);
        assert!(message.contains("502"));
    }

    #[test]
    fn parses_password_auth_body() {
        let body = r#"{
            "kind": "identitytoolkit#VerifyPasswordResponse",
            "localId": "u1",
            "email": "a@example.com",
            "idToken": "id-token",
            "refreshToken": "refresh-token",
            "expiresIn": "3600"
        }"#;
        let parsed: PasswordAuthResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.local_id, "u1");
        assert_eq!(parsed.refresh_token, "refresh-token");
    }

    #[test]
    fn parses_refresh_body() {
        let body = r#"{"expires_in":"3600","token_type":"Bearer","refresh_token":"r2","id_token":"i2","user_id":"u1","project_id":"123"}"#;
        let parsed: RefreshResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.user_id, "u1");
        assert_eq!(parsed.id_token, "i2");
    }

    #[test]
    fn lookup_without_display_name() {
        let parsed: LookupResponse =
            serde_json::from_str(r#"{"users":[{"localId":"u1"}]}"#).unwrap();
        assert!(parsed.users[0].display_name.is_none());
    }

    #[test]
    fn accounts_urls() {
        let client =
            FirebaseAuthClient::with_endpoints("k", "http://localhost:9099/v1/", "http://t").unwrap();
        assert_eq!(
            client.accounts_url("signUp"),
            "http://localhost:9099/v1/accounts:signUp"
        );
    }
}
