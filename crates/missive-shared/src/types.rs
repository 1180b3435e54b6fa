//! Core domain types.
//!
//! The backend is mid-migration and emits the same logical identifier under
//! two field names (`id` and `_id`), sometimes as a bare string or number
//! and sometimes nested inside a user object. Everything that crosses the
//! API or socket boundary is normalized into these types immediately after
//! decode; no downstream code ever re-derives an identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Canonical user identifier (opaque string form).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint an identifier for a locally-only placeholder entity.
    pub fn local() -> Self {
        Self(format!("local-{}", Uuid::new_v4()))
    }

    /// Extract a canonical identifier from a JSON value.
    ///
    /// Accepts a bare string or number, or an object carrying `id` or
    /// `_id` (the canonical field wins over the legacy one).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Object(map) => map
                .get("id")
                .or_else(|| map.get("_id"))
                .and_then(Self::from_value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The authenticated user's own record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl User {
    /// Normalize a backend user object. Requires an identifier and an
    /// email; everything else is optional.
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = UserId::from_value(value)?;
        let obj = value.as_object()?;
        Some(Self {
            id,
            display_name: string_field(obj, "displayName"),
            username: string_field(obj, "username"),
            email: string_field(obj, "email")?,
            avatar_url: string_field(obj, "avatarUrl"),
        })
    }

    /// Name shown in the UI: display name, falling back to username,
    /// falling back to email.
    pub fn display_label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.email)
    }
}

/// One entry in the user's contact directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub id: UserId,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl Contact {
    /// Normalize a directory entry. Entries missing an identifier or an
    /// email are discarded (returns `None`).
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = UserId::from_value(value)?;
        let obj = value.as_object()?;
        Some(Self {
            id,
            display_name: string_field(obj, "displayName"),
            username: string_field(obj, "username"),
            email: string_field(obj, "email")?,
            avatar_url: string_field(obj, "avatarUrl"),
        })
    }

    /// Locally-only placeholder for composing to an address that is not
    /// (yet) in the directory. Never persisted.
    pub fn placeholder(email: &str) -> Self {
        let local_part = email.split('@').next().unwrap_or(email);
        Self {
            id: UserId::local(),
            display_name: Some(local_part.to_string()),
            username: None,
            email: email.to_string(),
            avatar_url: None,
        }
    }

    /// Whether this contact exists only locally (see [`Contact::placeholder`]).
    pub fn is_placeholder(&self) -> bool {
        self.id.as_str().starts_with("local-")
    }

    pub fn display_label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.email)
    }
}

impl From<User> for Contact {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            display_name: u.display_name,
            username: u.username,
            email: u.email,
            avatar_url: u.avatar_url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
}

/// A chat message, normalized from either the history endpoint or a
/// realtime event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Client-temporary UUID until the server-confirmed copy arrives.
    pub id: String,
    pub from: UserId,
    pub to: UserId,
    pub content: Option<String>,
    /// Inline-encoded image payload (data URL).
    pub image: Option<String>,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Normalize a backend message object.
    ///
    /// Sender and recipient may arrive under flat fields (`fromId`/`toId`)
    /// or nested objects / bare strings (`from`/`to`); both sides resolve
    /// to canonical [`UserId`]s here.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let from = obj
            .get("fromId")
            .and_then(UserId::from_value)
            .or_else(|| obj.get("from").and_then(UserId::from_value))?;
        let to = obj
            .get("toId")
            .and_then(UserId::from_value)
            .or_else(|| obj.get("to").and_then(UserId::from_value))?;

        let content = string_field(obj, "content");
        let image = string_field(obj, "image");

        let kind = match obj.get("type").and_then(Value::as_str) {
            Some("image") => MessageKind::Image,
            Some(_) => MessageKind::Text,
            None if image.is_some() => MessageKind::Image,
            None => MessageKind::Text,
        };

        let id = obj
            .get("id")
            .or_else(|| obj.get("_id"))
            .and_then(UserId::from_value)
            .map(|v| v.as_str().to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let timestamp = obj
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Some(Self {
            id,
            from,
            to,
            content,
            image,
            kind,
            timestamp,
        })
    }

    /// Display name of the sender if the backend nested a user object
    /// under `from` (used for notifications).
    pub fn sender_label(value: &Value) -> Option<String> {
        let from = value.get("from")?.as_object()?;
        string_field(from, "displayName")
            .or_else(|| string_field(from, "username"))
            .or_else(|| string_field(from, "email"))
    }
}

/// Unordered pair of participants identifying one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(UserId, UserId);

impl ConversationKey {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a.as_str() <= b.as_str() {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    /// Order-independent match against a message's sender/recipient pair.
    pub fn matches(&self, from: &UserId, to: &UserId) -> bool {
        (&self.0 == from && &self.1 == to) || (&self.0 == to && &self.1 == from)
    }
}

/// Realtime connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_id_from_either_field_variant() {
        let legacy = UserId::from_value(&json!({ "_id": "5" })).unwrap();
        let canonical = UserId::from_value(&json!({ "id": "5" })).unwrap();
        assert_eq!(legacy, canonical);
        assert_eq!(legacy, UserId::new("5"));
    }

    #[test]
    fn user_id_canonical_field_wins() {
        let id = UserId::from_value(&json!({ "id": "new", "_id": "old" })).unwrap();
        assert_eq!(id.as_str(), "new");
    }

    #[test]
    fn user_id_from_bare_and_numeric_values() {
        assert_eq!(UserId::from_value(&json!("abc")).unwrap().as_str(), "abc");
        assert_eq!(UserId::from_value(&json!(42)).unwrap().as_str(), "42");
        assert!(UserId::from_value(&json!("")).is_none());
        assert!(UserId::from_value(&json!(null)).is_none());
    }

    #[test]
    fn user_id_from_nested_object() {
        let id = UserId::from_value(&json!({ "_id": { "id": "x" } }));
        assert_eq!(id.unwrap().as_str(), "x");
    }

    #[test]
    fn contact_requires_id_and_email() {
        assert!(Contact::from_value(&json!({ "email": "a@b.c" })).is_none());
        assert!(Contact::from_value(&json!({ "_id": "1" })).is_none());
        let c = Contact::from_value(&json!({ "_id": "1", "email": "a@b.c" })).unwrap();
        assert_eq!(c.id, UserId::new("1"));
    }

    #[test]
    fn contact_display_label_fallback_chain() {
        let full = Contact::from_value(&json!({
            "id": "1", "email": "a@b.c", "username": "ab", "displayName": "Alice"
        }))
        .unwrap();
        assert_eq!(full.display_label(), "Alice");

        let no_display = Contact::from_value(&json!({
            "id": "1", "email": "a@b.c", "username": "ab"
        }))
        .unwrap();
        assert_eq!(no_display.display_label(), "ab");

        let bare = Contact::from_value(&json!({ "id": "1", "email": "a@b.c" })).unwrap();
        assert_eq!(bare.display_label(), "a@b.c");
    }

    #[test]
    fn placeholder_uses_email_local_part() {
        let c = Contact::placeholder("alice@example.com");
        assert!(c.is_placeholder());
        assert_eq!(c.display_label(), "alice");
        assert_eq!(c.email, "alice@example.com");
    }

    #[test]
    fn message_from_flat_fields() {
        let m = Message::from_value(&json!({
            "id": "m1",
            "fromId": "1",
            "toId": "2",
            "content": "hi",
            "type": "text",
            "timestamp": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(m.from, UserId::new("1"));
        assert_eq!(m.to, UserId::new("2"));
        assert_eq!(m.content.as_deref(), Some("hi"));
        assert_eq!(m.kind, MessageKind::Text);
    }

    #[test]
    fn message_from_nested_sender() {
        let m = Message::from_value(&json!({
            "from": { "_id": "1", "displayName": "Alice" },
            "to": "2",
            "content": "hi"
        }))
        .unwrap();
        assert_eq!(m.from, UserId::new("1"));
        assert_eq!(m.to, UserId::new("2"));
    }

    #[test]
    fn message_kind_inferred_from_image_payload() {
        let m = Message::from_value(&json!({
            "fromId": "1",
            "toId": "2",
            "image": "data:image/png;base64,AAAA"
        }))
        .unwrap();
        assert_eq!(m.kind, MessageKind::Image);
        assert!(m.content.is_none());
    }

    #[test]
    fn message_without_participants_is_rejected() {
        assert!(Message::from_value(&json!({ "content": "hi" })).is_none());
        assert!(Message::from_value(&json!({ "fromId": "1", "content": "hi" })).is_none());
    }

    #[test]
    fn conversation_key_is_order_independent() {
        let key = ConversationKey::new(UserId::new("u"), UserId::new("c"));
        assert!(key.matches(&UserId::new("u"), &UserId::new("c")));
        assert!(key.matches(&UserId::new("c"), &UserId::new("u")));
        assert!(!key.matches(&UserId::new("u"), &UserId::new("x")));
        assert_eq!(
            key,
            ConversationKey::new(UserId::new("c"), UserId::new("u"))
        );
    }

    #[test]
    fn sender_label_from_nested_object() {
        let v = json!({ "from": { "id": "1", "displayName": "Alice" }, "to": "2" });
        assert_eq!(Message::sender_label(&v).as_deref(), Some("Alice"));
        let flat = json!({ "fromId": "1", "toId": "2" });
        assert_eq!(Message::sender_label(&flat), None);
    }
}
