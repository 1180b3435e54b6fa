//! Conversation view-model: one ordered, deduplicated message history for
//! the active contact.
//!
//! Sends are optimistic: the message is emitted on the realtime channel
//! and immediately appended as a `pending` entry with a client-temporary
//! id. When the server echo arrives, the pending entry is replaced in
//! place rather than appended again, so exactly one visible entry remains
//! per message. History fetches carry the same stale-sequence guard as the
//! directory cache.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use missive_shared::constants::{MAX_IMAGE_BYTES, RECONCILE_WINDOW_SECS};
use missive_shared::protocol::OutgoingMessage;
use missive_shared::{
    Contact, ConversationKey, Message, MessageKind, MissiveError, Result, UserId,
};

/// One visible row in the conversation.
#[derive(Debug, Clone)]
pub struct Entry {
    pub message: Message,
    /// True while the entry awaits its server echo.
    pub pending: bool,
    sent_at: DateTime<Utc>,
}

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Not addressed to this conversation.
    Ignored,
    /// Appended as a new confirmed entry.
    Appended,
    /// Replaced a pending entry in place.
    Reconciled,
}

pub struct Conversation {
    me: UserId,
    peer: Contact,
    key: ConversationKey,
    entries: Vec<Entry>,
    issued_seq: u64,
    applied_seq: u64,
}

impl Conversation {
    pub fn new(me: UserId, peer: Contact) -> Self {
        let key = ConversationKey::new(me.clone(), peer.id.clone());
        Self {
            me,
            peer,
            key,
            entries: Vec::new(),
            issued_seq: 0,
            applied_seq: 0,
        }
    }

    pub fn peer(&self) -> &Contact {
        &self.peer
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Reserve a sequence number for a history fetch about to be issued.
    pub fn begin_history(&mut self) -> u64 {
        self.issued_seq += 1;
        self.issued_seq
    }

    /// Replace the confirmed history. Pending entries are kept at the
    /// tail. Returns false for a stale response.
    pub fn apply_history(&mut self, seq: u64, history: Vec<Message>) -> bool {
        if seq <= self.applied_seq {
            tracing::debug!(seq, applied = self.applied_seq, "Discarding stale history response");
            return false;
        }
        self.applied_seq = seq;

        let now = Utc::now();
        let pending: Vec<Entry> = self.entries.drain(..).filter(|e| e.pending).collect();
        self.entries = history
            .into_iter()
            .map(|message| Entry {
                message,
                pending: false,
                sent_at: now,
            })
            .chain(pending)
            .collect();
        true
    }

    /// Validate a send and build the outbound + optimistic local pair.
    ///
    /// Requires a non-empty text body or an image payload; the caller
    /// commits the local copy with [`Conversation::push_pending`] only
    /// after the channel accepted the outbound message.
    pub fn build_outgoing(
        &self,
        content: Option<String>,
        image: Option<String>,
    ) -> Result<(OutgoingMessage, Message)> {
        let content = content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if content.is_none() && image.is_none() {
            return Err(MissiveError::Validation("Message is empty".to_string()));
        }
        if let Some(image) = &image {
            validate_image(image)?;
        }

        let kind = if image.is_some() {
            MessageKind::Image
        } else {
            MessageKind::Text
        };

        let local = Message {
            id: Uuid::new_v4().to_string(),
            from: self.me.clone(),
            to: self.peer.id.clone(),
            content: content.clone(),
            image: image.clone(),
            kind,
            timestamp: Utc::now(),
        };
        let outgoing = OutgoingMessage {
            content,
            to: self.peer.id.clone(),
            from: self.me.clone(),
            image,
            kind,
        };
        Ok((outgoing, local))
    }

    /// Record the optimistic copy of a message the channel just accepted.
    pub fn push_pending(&mut self, message: Message, now: DateTime<Utc>) {
        self.entries.push(Entry {
            message,
            pending: true,
            sent_at: now,
        });
    }

    /// Merge an inbound confirmed message.
    ///
    /// A message addressed to another pair is ignored. Otherwise it
    /// first tries to reconcile: the OLDEST pending entry with the same
    /// sender, recipient, content, kind and image, recorded within the
    /// reconcile window, is replaced in place. Failing that the message
    /// is appended as a confirmed entry, before the pending tail.
    pub fn apply_inbound(&mut self, message: Message, now: DateTime<Utc>) -> InboundOutcome {
        if !self.key.matches(&message.from, &message.to) {
            return InboundOutcome::Ignored;
        }

        let window = Duration::seconds(RECONCILE_WINDOW_SECS);
        let matching_pending = self.entries.iter().position(|e| {
            e.pending
                && now.signed_duration_since(e.sent_at) <= window
                && e.message.from == message.from
                && e.message.to == message.to
                && e.message.content == message.content
                && e.message.kind == message.kind
                && e.message.image == message.image
        });

        if let Some(idx) = matching_pending {
            self.entries[idx].message = message;
            self.entries[idx].pending = false;
            return InboundOutcome::Reconciled;
        }

        let insert_at = self
            .entries
            .iter()
            .position(|e| e.pending)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            insert_at,
            Entry {
                message,
                pending: false,
                sent_at: now,
            },
        );
        InboundOutcome::Appended
    }

    /// Drop pending entries that outlived the reconcile window, returning
    /// the abandoned messages so the UI can mark them unconfirmed.
    pub fn expire_pending(&mut self, now: DateTime<Utc>) -> Vec<Message> {
        let window = Duration::seconds(RECONCILE_WINDOW_SECS);
        let mut expired = Vec::new();
        self.entries.retain(|e| {
            if e.pending && now.signed_duration_since(e.sent_at) > window {
                expired.push(e.message.clone());
                false
            } else {
                true
            }
        });
        expired
    }
}

/// Validate an inline image attachment (data URL).
///
/// Non-image payloads and anything larger than [`MAX_IMAGE_BYTES`] after
/// base64 decoding are rejected; an oversized image never reaches the
/// send path.
pub fn validate_image(data_url: &str) -> Result<()> {
    let rest = data_url
        .strip_prefix("data:image/")
        .ok_or_else(|| MissiveError::Validation("Only image attachments are supported".to_string()))?;
    let payload = rest
        .split_once(";base64,")
        .map(|(_, payload)| payload)
        .ok_or_else(|| {
            MissiveError::Validation("Image attachment must be base64-encoded".to_string())
        })?;

    let bytes = BASE64
        .decode(payload)
        .map_err(|_| MissiveError::Validation("Image attachment is not valid base64".to_string()))?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(MissiveError::Validation(format!(
            "Image exceeds the {} MiB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}
