//! Authentication and profile endpoints.

use serde_json::{json, Value};

use missive_shared::{MissiveError, Result, User};

use crate::ApiClient;

/// Credential + user record returned by a successful authentication.
#[derive(Debug, Clone)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

/// Result of a login or registration attempt.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authenticated(AuthPayload),
    /// The account exists but the email address still needs a code.
    NeedsVerification,
}

/// Lookup key for [`ApiClient::find_user`].
#[derive(Debug, Clone, Copy)]
pub enum FindQuery<'a> {
    Email(&'a str),
    Username(&'a str),
}

impl ApiClient {
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome> {
        let body = self
            .send(
                self.post(self.url("api/auth/login")?, None)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        auth_outcome(body)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        username: &str,
    ) -> Result<AuthOutcome> {
        let body = self
            .send(self.post(self.url("api/auth/register")?, None).json(&json!({
                "email": email,
                "password": password,
                "displayName": display_name,
                "username": username,
            })))
            .await?;
        auth_outcome(body)
    }

    /// Complete registration with the emailed code. The backend answers
    /// with a full session payload.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<AuthPayload> {
        let body = self
            .send(
                self.post(self.url("api/auth/verify-email")?, None)
                    .json(&json!({ "email": email, "code": code })),
            )
            .await?;
        auth_payload(&body).ok_or_else(|| MissiveError::Api {
            status: 200,
            message: "Verification did not return a session".to_string(),
        })
    }

    pub async fn resend_code(&self, email: &str) -> Result<()> {
        self.send(
            self.post(self.url("api/auth/resend-code")?, None)
                .json(&json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    /// Check whether a persisted credential is still accepted.
    ///
    /// Only an explicit boolean `true` counts as valid; anything else
    /// (missing field, truthy string, wrapped object) is treated as
    /// invalid.
    pub async fn verify_token(&self, token: &str) -> Result<bool> {
        let body = self
            .send(self.get(self.url("api/auth/verify-token")?, Some(token)))
            .await?;
        Ok(body.get("valid") == Some(&Value::Bool(true)))
    }

    /// Fetch the authenticated user's own profile.
    pub async fn me(&self, token: &str) -> Result<User> {
        let body = self
            .send(self.get(self.url("api/auth/me")?, Some(token)))
            .await?;
        User::from_value(&body).ok_or_else(|| malformed("user"))
    }

    pub async fn update_me(
        &self,
        token: &str,
        display_name: &str,
        avatar_url: &str,
    ) -> Result<User> {
        let body = self
            .send(
                self.put(self.url("api/auth/me")?, Some(token))
                    .json(&json!({ "displayName": display_name, "avatarUrl": avatar_url })),
            )
            .await?;
        User::from_value(&body).ok_or_else(|| malformed("user"))
    }

    /// Look up another user by email or username.
    pub async fn find_user(&self, token: &str, query: FindQuery<'_>) -> Result<User> {
        let mut url = self.url("api/auth/find")?;
        match query {
            FindQuery::Email(email) => url.query_pairs_mut().append_pair("email", email),
            FindQuery::Username(name) => url.query_pairs_mut().append_pair("username", name),
        };
        let body = self.send(self.get(url, Some(token))).await?;
        User::from_value(&body).ok_or_else(|| malformed("user"))
    }
}

fn auth_outcome(body: Value) -> Result<AuthOutcome> {
    if body.get("needsVerification") == Some(&Value::Bool(true)) {
        return Ok(AuthOutcome::NeedsVerification);
    }
    auth_payload(&body)
        .map(AuthOutcome::Authenticated)
        .ok_or_else(|| malformed("session"))
}

pub(crate) fn auth_payload(body: &Value) -> Option<AuthPayload> {
    let token = body.get("token")?.as_str()?.to_string();
    let user = User::from_value(body.get("user")?)?;
    Some(AuthPayload { token, user })
}

pub(crate) fn malformed(what: &str) -> MissiveError {
    MissiveError::Api {
        status: 200,
        message: format!("Malformed {what} in server response"),
    }
}
