//! Session store: the single source of truth for "am I logged in, and as
//! whom".
//!
//! Every credential read or write in the workspace goes through this
//! store; no other component touches the persisted session file. The
//! store is either fully authenticated (credential + user, in memory and
//! on disk) or fully empty — no partial state is ever observable.
//!
//! The store itself is synchronous; the async flows that feed it (token
//! verification, login calls) live in [`crate::client::Client`], which
//! applies their results here under its state lock.

use missive_api::AuthPayload;
use missive_shared::{MissiveError, Result, User, UserId};

use crate::storage::{PersistedSession, SessionStorage};

/// The in-memory authenticated identity.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

pub struct SessionStore {
    storage: SessionStorage,
    session: Option<Session>,
}

impl SessionStore {
    pub fn new(storage: SessionStorage) -> Self {
        Self {
            storage,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.session.as_ref().map(|s| s.user.id.clone())
    }

    pub fn token(&self) -> Result<String> {
        self.session
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(MissiveError::NoSession)
    }

    /// Read the persisted session without activating it. The caller must
    /// verify the credential before calling [`SessionStore::activate`].
    pub fn load_persisted(&self) -> Result<Option<PersistedSession>> {
        self.storage.load()
    }

    /// Adopt an already-persisted session whose credential was just
    /// confirmed valid by the backend.
    pub fn activate(&mut self, persisted: PersistedSession) {
        tracing::info!(user = %persisted.user.id, "Session restored");
        self.session = Some(Session {
            user: persisted.user,
            token: persisted.token,
        });
    }

    /// Persist and adopt a fresh authentication result.
    ///
    /// The write happens before the in-memory state flips so a failed
    /// write never leaves an unpersisted live session.
    pub fn install(&mut self, payload: AuthPayload) -> Result<User> {
        self.storage.save(&PersistedSession {
            token: payload.token.clone(),
            user: payload.user.clone(),
        })?;
        tracing::info!(user = %payload.user.id, "Session established");
        self.session = Some(Session {
            user: payload.user.clone(),
            token: payload.token,
        });
        Ok(payload.user)
    }

    /// Replace the stored user record (profile update), re-persisting the
    /// credential + user pair together.
    pub fn update_user(&mut self, user: User) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(MissiveError::NoSession);
        };
        let token = session.token.clone();
        self.storage.save(&PersistedSession {
            token,
            user: user.clone(),
        })?;
        session.user = user;
        Ok(())
    }

    /// Clear in-memory and persisted state unconditionally.
    ///
    /// This is the logout path and the 401-cascade path; it has no
    /// failure mode (a storage error is logged, never surfaced).
    pub fn clear(&mut self) {
        self.session = None;
        if let Err(e) = self.storage.clear() {
            tracing::warn!(error = %e, "Failed to remove persisted session");
        }
    }
}
