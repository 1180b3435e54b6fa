//! Friend request endpoints.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use missive_shared::{Result, User};

use crate::ApiClient;

/// A pending friend request, incoming or outgoing.
#[derive(Debug, Clone)]
pub struct FriendRequest {
    pub id: String,
    pub sender: Option<User>,
    pub receiver: Option<User>,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl FriendRequest {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = obj
            .get("id")
            .or_else(|| obj.get("_id"))
            .and_then(Value::as_str)?
            .to_string();
        Some(Self {
            id,
            sender: obj.get("sender").and_then(User::from_value),
            receiver: obj.get("receiver").and_then(User::from_value),
            message: obj
                .get("message")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            created_at: obj
                .get("createdAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }
}

impl ApiClient {
    pub async fn send_friend_request(
        &self,
        token: &str,
        receiver_email: &str,
        message: Option<&str>,
    ) -> Result<()> {
        self.send(
            self.post(self.url("api/friend-requests/send")?, Some(token))
                .json(&json!({
                    "receiverEmail": receiver_email,
                    "message": message.unwrap_or(""),
                })),
        )
        .await?;
        Ok(())
    }

    pub async fn received_requests(&self, token: &str) -> Result<Vec<FriendRequest>> {
        self.request_list(token, "api/friend-requests/received")
            .await
    }

    pub async fn sent_requests(&self, token: &str) -> Result<Vec<FriendRequest>> {
        self.request_list(token, "api/friend-requests/sent").await
    }

    pub async fn accept_request(&self, token: &str, request_id: &str) -> Result<()> {
        self.request_action(token, request_id, "accept").await
    }

    pub async fn reject_request(&self, token: &str, request_id: &str) -> Result<()> {
        self.request_action(token, request_id, "reject").await
    }

    pub async fn cancel_request(&self, token: &str, request_id: &str) -> Result<()> {
        self.request_action(token, request_id, "cancel").await
    }

    async fn request_list(&self, token: &str, path: &str) -> Result<Vec<FriendRequest>> {
        let body = self.send(self.get(self.url(path)?, Some(token))).await?;
        Ok(body
            .as_array()
            .map(|items| items.iter().filter_map(FriendRequest::from_value).collect())
            .unwrap_or_default())
    }

    async fn request_action(&self, token: &str, request_id: &str, action: &str) -> Result<()> {
        let path = format!("api/friend-requests/{request_id}/{action}");
        self.send(self.post(self.url(&path)?, Some(token)).json(&json!({})))
            .await?;
        Ok(())
    }
}
