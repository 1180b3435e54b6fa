//! Client facade: every state transition in the workspace goes through
//! the operations on [`Client`].
//!
//! State lives behind one `Arc<Mutex<..>>`; the lock is never held across
//! an await. Async operations follow the same shape throughout: read what
//! they need (plus a sequence number for anything refresh-like) under the
//! lock, perform the network call, then re-lock and apply the result if
//! it is still current.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use missive_api::{ApiClient, AuthOutcome, AuthPayload, FindQuery, FriendRequest, QrLoginStatus};
use missive_net::{spawn_channel, ChannelConfig, ChannelHandle, ChannelNotification};
use missive_shared::protocol::MessageEvent;
use missive_shared::{ConnectionState, Contact, MissiveError, Result, User, UserId};

use crate::config::ClientConfig;
use crate::conversation::{Conversation, Entry, InboundOutcome};
use crate::directory::DirectoryCache;
use crate::events::ClientEvent;
use crate::session::SessionStore;
use crate::storage::SessionStorage;

struct ClientState {
    session: SessionStore,
    directory: DirectoryCache,
    conversation: Option<Conversation>,
    channel: Option<ChannelHandle>,
}

impl ClientState {
    fn token(&self) -> Result<String> {
        self.session.token()
    }

    /// Drop every piece of session-scoped state in one step: credential,
    /// directory (invalidating in-flight refreshes), conversation and the
    /// realtime channel.
    fn teardown_session(&mut self) {
        self.session.clear();
        self.directory.reset();
        self.conversation = None;
        if let Some(channel) = self.channel.take() {
            channel.shutdown();
        }
    }
}

pub struct Client {
    api: ApiClient,
    config: ClientConfig,
    state: Arc<Mutex<ClientState>>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl Client {
    /// Create a client plus the event stream the embedding UI consumes.
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let storage = SessionStorage::at_dir(&config.data_dir);
        let state = Arc::new(Mutex::new(ClientState {
            session: SessionStore::new(storage),
            directory: DirectoryCache::new(),
            conversation: None,
            channel: None,
        }));
        let client = Self {
            api: ApiClient::new(config.api_url.clone()),
            config,
            state,
            events,
        };
        (client, event_rx)
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        // A poisoned lock means a panicked test thread; the state itself
        // is still coherent because every mutation is applied atomically.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    /// Apply the shared rejected-credential rule to any API result: a 401
    /// from ANY endpoint ends the session entirely and notifies the UI.
    fn guard<T>(&self, result: Result<T>) -> Result<T> {
        if matches!(result, Err(MissiveError::Unauthorized)) {
            warn!("Credential rejected by the backend, ending session");
            self.lock().teardown_session();
            self.emit(ClientEvent::SessionExpired);
        }
        result
    }

    // ---- session lifecycle ----

    /// Try to resume the persisted session.
    ///
    /// The credential is re-verified with the backend before anything is
    /// activated; a stale, corrupt or rejected session is cleared from
    /// disk and reported as "not signed in" rather than as an error.
    pub async fn restore(&self) -> Result<Option<User>> {
        // Bind the load result before matching so the lock guard is dropped
        // here; the match arms re-lock and would otherwise deadlock.
        let loaded = self.lock().session.load_persisted();
        let persisted = match loaded {
            Ok(Some(persisted)) => persisted,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                self.lock().session.clear();
                return Ok(None);
            }
        };

        match self.api.verify_token(&persisted.token).await {
            Ok(true) => {
                let token = persisted.token.clone();
                let user = persisted.user.clone();
                self.lock().session.activate(persisted);
                self.start_realtime(token);
                if let Err(e) = self.refresh_directory().await {
                    warn!(error = %e, "Initial directory refresh failed");
                }
                Ok(Some(user))
            }
            Ok(false) => {
                debug!("Persisted credential no longer valid");
                self.lock().session.clear();
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Persisted session could not be verified");
                self.lock().session.clear();
                Ok(None)
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome> {
        let outcome = self.api.login(email, password).await?;
        if let AuthOutcome::Authenticated(payload) = &outcome {
            self.establish(payload.clone()).await?;
        }
        Ok(outcome)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        username: &str,
    ) -> Result<AuthOutcome> {
        let outcome = self
            .api
            .register(email, password, display_name, username)
            .await?;
        if let AuthOutcome::Authenticated(payload) = &outcome {
            self.establish(payload.clone()).await?;
        }
        Ok(outcome)
    }

    /// Complete email verification; the backend answers with a full
    /// session, so this signs the user in directly.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<User> {
        let payload = self.api.verify_email(email, code).await?;
        self.establish(payload).await
    }

    pub async fn resend_code(&self, email: &str) -> Result<()> {
        self.api.resend_code(email).await
    }

    /// Request a QR sign-in code for the embedder to render. The caller
    /// polls with [`Client::poll_qr_login`] (see
    /// `constants::QR_POLL_INTERVAL_MS` for the pacing the backend
    /// expects) until a terminal status comes back.
    pub async fn generate_qr(&self) -> Result<String> {
        self.api.generate_qr().await
    }

    /// Poll a pending QR sign-in once. A confirmed code carries a full
    /// session, which is installed exactly like a password login.
    pub async fn poll_qr_login(&self, code: &str) -> Result<QrLoginStatus> {
        let status = self.api.check_qr_login(code).await?;
        if let QrLoginStatus::Confirmed(payload) = &status {
            self.establish(payload.clone()).await?;
        }
        Ok(status)
    }

    pub fn logout(&self) {
        self.lock().teardown_session();
        self.emit(ClientEvent::DirectoryChanged);
        self.emit(ClientEvent::ConversationChanged);
    }

    async fn establish(&self, payload: AuthPayload) -> Result<User> {
        let token = payload.token.clone();
        let user = self.lock().session.install(payload)?;
        self.start_realtime(token);
        if let Err(e) = self.refresh_directory().await {
            warn!(error = %e, "Initial directory refresh failed");
        }
        Ok(user)
    }

    fn start_realtime(&self, token: String) {
        let mut handle = spawn_channel(ChannelConfig::new(self.config.socket_url.clone()), token);
        let notifications = handle.take_notifications();
        self.lock().channel = Some(handle);

        if let Some(notifications) = notifications {
            tokio::spawn(pump_notifications(
                self.state.clone(),
                self.events.clone(),
                notifications,
            ));
        }
    }

    // ---- directory ----

    pub async fn refresh_directory(&self) -> Result<()> {
        let (token, seq) = {
            let mut state = self.lock();
            (state.token()?, state.directory.begin_refresh())
        };

        let contacts = self.guard(self.api.contacts(&token).await)?;

        if self.lock().directory.apply_refresh(seq, contacts) {
            self.emit(ClientEvent::DirectoryChanged);
        }
        Ok(())
    }

    /// Look a user up and add them to the directory. Adding someone who is
    /// already a contact is treated as success; either way the list is
    /// refreshed and the entry becomes the selection.
    pub async fn add_contact(&self, query: FindQuery<'_>) -> Result<UserId> {
        let token = self.lock().token()?;

        let found = self.guard(self.api.find_user(&token, query).await)?;
        let added = self.api.add_contact(&token, &found.id).await;
        self.guard(already_contact_is_ok(added))?;

        self.refresh_directory().await?;
        if self.lock().directory.select(&found.id).is_some() {
            self.emit(ClientEvent::DirectoryChanged);
        }
        Ok(found.id)
    }

    pub async fn remove_contact(&self, id: &UserId) -> Result<()> {
        let token = self.lock().token()?;
        self.guard(self.api.delete_contact(&token, id).await)?;

        let closed = {
            let mut state = self.lock();
            state.directory.apply_remove(id);
            let closed = state
                .conversation
                .as_ref()
                .is_some_and(|c| &c.peer().id == id);
            if closed {
                state.conversation = None;
            }
            closed
        };
        self.emit(ClientEvent::DirectoryChanged);
        if closed {
            self.emit(ClientEvent::ConversationChanged);
        }
        Ok(())
    }

    /// Start a conversation with an address not yet in the directory.
    ///
    /// Adding the contact is attempted first; when the lookup fails (the
    /// address has no account yet, say) a local placeholder is selected
    /// instead so the conversation can open immediately. The placeholder
    /// lives only in the selection slot and is replaced by the real entry
    /// on the next refresh.
    pub async fn start_chat_with(&self, email: &str) -> Result<()> {
        let me = self
            .lock()
            .session
            .user_id()
            .ok_or(MissiveError::NoSession)?;

        match self.add_contact(FindQuery::Email(email)).await {
            Ok(id) => self.open_conversation(&id).await,
            Err(MissiveError::Unauthorized) => Err(MissiveError::Unauthorized),
            Err(e) => {
                debug!(error = %e, "Contact lookup failed, opening placeholder conversation");
                let placeholder = Contact::placeholder(email);
                {
                    let mut state = self.lock();
                    state.directory.select_placeholder(placeholder.clone());
                    state.conversation = Some(Conversation::new(me, placeholder));
                }
                self.emit(ClientEvent::DirectoryChanged);
                self.emit(ClientEvent::ConversationChanged);
                Ok(())
            }
        }
    }

    // ---- conversation ----

    /// Select a contact and load the conversation history.
    ///
    /// Reopening the already-active conversation keeps its pending
    /// entries; the history fetch carries a sequence number so a slow
    /// response for a previous peer can never land in the wrong view.
    pub async fn open_conversation(&self, contact_id: &UserId) -> Result<()> {
        let (token, me, peer, seq) = {
            let mut state = self.lock();
            let token = state.token()?;
            let me = state
                .session
                .user_id()
                .ok_or(MissiveError::NoSession)?;
            let peer = state
                .directory
                .select(contact_id)
                .ok_or_else(|| MissiveError::Validation("No such contact".to_string()))?;

            let same_peer = state
                .conversation
                .as_ref()
                .is_some_and(|c| c.peer().id == peer.id);
            if !same_peer {
                state.conversation = Some(Conversation::new(me.clone(), peer.clone()));
            }
            let seq = state
                .conversation
                .as_mut()
                .map(Conversation::begin_history)
                .unwrap_or_default();
            (token, me, peer, seq)
        };
        self.emit(ClientEvent::DirectoryChanged);

        let history = self.guard(self.api.history(&token, &me, &peer.id).await)?;

        let applied = {
            let mut state = self.lock();
            match state.conversation.as_mut() {
                Some(conv) if conv.peer().id == peer.id => conv.apply_history(seq, history),
                _ => false,
            }
        };
        if applied {
            self.emit(ClientEvent::ConversationChanged);
        }
        Ok(())
    }

    pub fn close_conversation(&self) {
        self.lock().conversation = None;
        self.emit(ClientEvent::ConversationChanged);
    }

    /// Send a message in the active conversation.
    ///
    /// Fully synchronous: the message is validated, handed to the realtime
    /// channel, and appended as a pending entry only once the channel
    /// accepted it. The entry is confirmed when the server echo arrives.
    pub fn send_message(&self, content: Option<String>, image: Option<String>) -> Result<()> {
        let local = {
            let mut state = self.lock();
            let sender = state
                .channel
                .as_ref()
                .map(ChannelHandle::sender)
                .ok_or(MissiveError::NotConnected)?;
            let conversation = state
                .conversation
                .as_mut()
                .ok_or_else(|| MissiveError::Validation("No conversation is open".to_string()))?;

            let (outgoing, local) = conversation.build_outgoing(content, image)?;
            sender.try_send(outgoing)?;
            conversation.push_pending(local.clone(), Utc::now());
            local
        };
        self.emit(ClientEvent::MessagePending { message: local });
        Ok(())
    }

    // ---- profile and friend requests ----

    /// Re-fetch the authenticated user's own profile.
    pub async fn refresh_profile(&self) -> Result<User> {
        let token = self.lock().token()?;
        let user = self.guard(self.api.me(&token).await)?;
        self.lock().session.update_user(user.clone())?;
        Ok(user)
    }

    pub async fn update_profile(&self, display_name: &str, avatar_url: &str) -> Result<User> {
        let token = self.lock().token()?;
        let user = self
            .guard(self.api.update_me(&token, display_name, avatar_url).await)?;
        self.lock().session.update_user(user.clone())?;
        Ok(user)
    }

    pub async fn send_friend_request(&self, email: &str, message: Option<&str>) -> Result<()> {
        let token = self.lock().token()?;
        self.guard(self.api.send_friend_request(&token, email, message).await)
    }

    pub async fn received_friend_requests(&self) -> Result<Vec<FriendRequest>> {
        let token = self.lock().token()?;
        self.guard(self.api.received_requests(&token).await)
    }

    pub async fn sent_friend_requests(&self) -> Result<Vec<FriendRequest>> {
        let token = self.lock().token()?;
        self.guard(self.api.sent_requests(&token).await)
    }

    /// Accepting adds the sender to the directory, so the list is
    /// refreshed afterwards.
    pub async fn accept_friend_request(&self, request_id: &str) -> Result<()> {
        let token = self.lock().token()?;
        self.guard(self.api.accept_request(&token, request_id).await)?;
        self.refresh_directory().await
    }

    pub async fn reject_friend_request(&self, request_id: &str) -> Result<()> {
        let token = self.lock().token()?;
        self.guard(self.api.reject_request(&token, request_id).await)
    }

    pub async fn cancel_friend_request(&self, request_id: &str) -> Result<()> {
        let token = self.lock().token()?;
        self.guard(self.api.cancel_request(&token, request_id).await)
    }

    // ---- snapshots for the presentation layer ----

    pub fn current_user(&self) -> Option<User> {
        self.lock().session.user().cloned()
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.lock().directory.contacts().to_vec()
    }

    pub fn selected_contact(&self) -> Option<Contact> {
        self.lock().directory.selected().cloned()
    }

    pub fn conversation_entries(&self) -> Vec<Entry> {
        self.lock()
            .conversation
            .as_ref()
            .map(|c| c.entries().to_vec())
            .unwrap_or_default()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lock()
            .channel
            .as_ref()
            .map(ChannelHandle::state)
            .unwrap_or(ConnectionState::Disconnected)
    }
}

fn already_contact_is_ok(result: Result<()>) -> Result<()> {
    match result {
        Err(MissiveError::Api { status, message })
            if status == 409
                || message.to_lowercase().contains("already")
                || message.to_lowercase().contains("exist") =>
        {
            debug!(%message, "Contact already present, treating add as success");
            Ok(())
        }
        other => other,
    }
}

/// Forward channel notifications into client state and UI events. Runs
/// until the channel task drops its notification sender.
async fn pump_notifications(
    state: Arc<Mutex<ClientState>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    mut notifications: mpsc::Receiver<ChannelNotification>,
) {
    while let Some(note) = notifications.recv().await {
        match note {
            ChannelNotification::Connected => {
                let _ = events.send(ClientEvent::ConnectionChanged {
                    state: ConnectionState::Connected,
                });
            }
            ChannelNotification::Disconnected => {
                let _ = events.send(ClientEvent::ConnectionChanged {
                    state: ConnectionState::Disconnected,
                });
            }
            ChannelNotification::ConnectError(message) => {
                let _ = events.send(ClientEvent::ConnectionError { message });
            }
            ChannelNotification::Message(event) => {
                handle_inbound(&state, &events, event);
            }
        }
    }
    debug!("Notification pump finished");
}

fn handle_inbound(
    state: &Arc<Mutex<ClientState>>,
    events: &mpsc::UnboundedSender<ClientEvent>,
    event: MessageEvent,
) {
    let now = Utc::now();
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());

    let from_me = state
        .session
        .user_id()
        .is_some_and(|me| me == event.message.from);

    let mut reconciled = false;
    if let Some(conversation) = state.conversation.as_mut() {
        for expired in conversation.expire_pending(now) {
            let _ = events.send(ClientEvent::SendTimedOut {
                message_id: expired.id,
            });
        }

        match conversation.apply_inbound(event.message.clone(), now) {
            InboundOutcome::Ignored => {}
            InboundOutcome::Appended => {
                let _ = events.send(ClientEvent::MessageReceived {
                    message: event.message.clone(),
                    reconciled: false,
                });
            }
            InboundOutcome::Reconciled => {
                reconciled = true;
                let _ = events.send(ClientEvent::MessageReceived {
                    message: event.message.clone(),
                    reconciled: true,
                });
            }
        }
    }

    // Own echoes and reconciliations are silent; everything else from the
    // remote side asks the UI for a notification.
    if !from_me && !reconciled {
        let title = event
            .sender_label
            .clone()
            .or_else(|| {
                state
                    .directory
                    .contacts()
                    .iter()
                    .find(|c| c.id == event.message.from)
                    .map(|c| c.display_label().to_string())
            })
            .unwrap_or_else(|| "New message".to_string());
        let body = event
            .message
            .content
            .clone()
            .unwrap_or_else(|| "Image received".to_string());
        let _ = events.send(ClientEvent::Notify { title, body });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, data_dir: &std::path::Path) -> ClientConfig {
        ClientConfig {
            api_url: Url::parse(&server.uri()).unwrap(),
            // Nothing listens here; the channel stays in its retry loop.
            socket_url: Url::parse("ws://127.0.0.1:9/ws").unwrap(),
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn session_body() -> serde_json::Value {
        json!({
            "token": "tok-1",
            "user": { "id": "u1", "email": "a@b.c", "displayName": "Alice" },
        })
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
            .mount(server)
            .await;
    }

    async fn mount_contacts(server: &MockServer, contacts: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/auth/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(contacts))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn login_and_logout_keep_memory_and_disk_in_step() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_contacts(&server, json!([])).await;

        let dir = tempfile::tempdir().unwrap();
        let (client, _events) = Client::new(config(&server, dir.path()));

        let outcome = client.login("a@b.c", "pw").await.unwrap();
        assert!(matches!(outcome, AuthOutcome::Authenticated(_)));
        assert_eq!(client.current_user().unwrap().id, UserId::new("u1"));
        let storage = SessionStorage::at_dir(dir.path());
        assert!(storage.exists());

        client.logout();
        assert!(client.current_user().is_none());
        assert!(!storage.exists());
        assert!(client.contacts().is_empty());
    }

    #[tokio::test]
    async fn rejected_credential_ends_the_whole_session() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_contacts(&server, json!([{ "id": "c1", "email": "c@d.e" }])).await;

        let dir = tempfile::tempdir().unwrap();
        let (client, mut events) = Client::new(config(&server, dir.path()));
        client.login("a@b.c", "pw").await.unwrap();
        assert_eq!(client.contacts().len(), 1);

        // The credential is revoked server-side; the next call 401s.
        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/contacts"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(matches!(
            client.refresh_directory().await,
            Err(MissiveError::Unauthorized)
        ));

        assert!(client.current_user().is_none());
        assert!(client.contacts().is_empty());
        assert!(!SessionStorage::at_dir(dir.path()).exists());

        let mut saw_expired = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, ClientEvent::SessionExpired) {
                saw_expired = true;
            }
        }
        assert!(saw_expired);
    }

    #[tokio::test]
    async fn restore_clears_a_session_the_backend_rejects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/verify-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "valid": false })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let storage = SessionStorage::at_dir(dir.path());
        storage
            .save(&crate::storage::PersistedSession {
                token: "stale".to_string(),
                user: User {
                    id: UserId::new("u1"),
                    display_name: None,
                    username: None,
                    email: "a@b.c".to_string(),
                    avatar_url: None,
                },
            })
            .unwrap();

        let (client, _events) = Client::new(config(&server, dir.path()));
        assert_eq!(client.restore().await.unwrap(), None);
        assert!(!storage.exists());
    }

    #[tokio::test]
    async fn restore_activates_a_verified_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/verify-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "valid": true })))
            .mount(&server)
            .await;
        mount_contacts(&server, json!([{ "id": "c1", "email": "c@d.e" }])).await;

        let dir = tempfile::tempdir().unwrap();
        SessionStorage::at_dir(dir.path())
            .save(&crate::storage::PersistedSession {
                token: "tok-1".to_string(),
                user: User {
                    id: UserId::new("u1"),
                    display_name: Some("Alice".to_string()),
                    username: None,
                    email: "a@b.c".to_string(),
                    avatar_url: None,
                },
            })
            .unwrap();

        let (client, _events) = Client::new(config(&server, dir.path()));
        let user = client.restore().await.unwrap().expect("restored user");
        assert_eq!(user.id, UserId::new("u1"));
        assert_eq!(client.contacts().len(), 1);
        assert_eq!(client.selected_contact().unwrap().id, UserId::new("c1"));
    }

    #[tokio::test]
    async fn adding_an_existing_contact_succeeds_and_selects_it() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_contacts(
            &server,
            json!([
                { "id": "c0", "email": "other@d.e" },
                { "id": "c1", "email": "c@d.e" },
            ]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api/auth/find"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "c1", "email": "c@d.e" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/add-contact"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({ "message": "Contact already exists" })),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (client, _events) = Client::new(config(&server, dir.path()));
        client.login("a@b.c", "pw").await.unwrap();
        // The first entry is auto-selected after login.
        assert_eq!(client.selected_contact().unwrap().id, UserId::new("c0"));

        let id = client.add_contact(FindQuery::Email("c@d.e")).await.unwrap();
        assert_eq!(id, UserId::new("c1"));
        assert_eq!(client.contacts().len(), 2);
        // The conflicting entry becomes the selection, not just Ok(()).
        assert_eq!(client.selected_contact().unwrap().id, UserId::new("c1"));
    }

    #[tokio::test]
    async fn unreadable_session_file_is_cleared_not_an_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        // A directory where the session file should be makes the read fail
        // with a real IO error rather than NotFound.
        let storage = SessionStorage::at_dir(dir.path());
        std::fs::create_dir_all(storage.path()).unwrap();

        let (client, _events) = Client::new(config(&server, dir.path()));
        assert_eq!(client.restore().await.unwrap(), None);
        assert!(client.current_user().is_none());
    }

    #[tokio::test]
    async fn confirmed_qr_login_installs_the_session() {
        let server = MockServer::start().await;
        mount_contacts(&server, json!([])).await;
        Mock::given(method("POST"))
            .and(path("/api/qr/generate-qr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "qrCode": "qr-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/qr/qr-login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "status": "confirmed",
                "token": "tok-qr",
                "user": { "id": "u1", "email": "a@b.c", "displayName": "Alice" }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (client, _events) = Client::new(config(&server, dir.path()));

        let code = client.generate_qr().await.unwrap();
        let status = client.poll_qr_login(&code).await.unwrap();
        assert!(matches!(status, QrLoginStatus::Confirmed(_)));

        assert_eq!(client.current_user().unwrap().id, UserId::new("u1"));
        let persisted = SessionStorage::at_dir(dir.path()).load().unwrap().unwrap();
        assert_eq!(persisted.token, "tok-qr");
    }

    #[tokio::test]
    async fn pending_qr_poll_does_not_touch_the_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/qr/qr-login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "status": "pending"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (client, _events) = Client::new(config(&server, dir.path()));

        let status = client.poll_qr_login("qr-1").await.unwrap();
        assert!(matches!(status, QrLoginStatus::Pending));
        assert!(client.current_user().is_none());
        assert!(!SessionStorage::at_dir(dir.path()).exists());
    }

    #[tokio::test]
    async fn unknown_address_opens_a_placeholder_conversation() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_contacts(&server, json!([])).await;
        Mock::given(method("GET"))
            .and(path("/api/auth/find"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({ "message": "User not found" })),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (client, _events) = Client::new(config(&server, dir.path()));
        client.login("a@b.c", "pw").await.unwrap();

        client.start_chat_with("ghost@example.com").await.unwrap();

        let selected = client.selected_contact().unwrap();
        assert!(selected.is_placeholder());
        assert_eq!(selected.email, "ghost@example.com");
        // Placeholder conversations start empty; no history exists yet.
        assert!(client.conversation_entries().is_empty());
    }

    #[tokio::test]
    async fn open_conversation_loads_history_for_the_selected_peer() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_contacts(&server, json!([{ "id": "c1", "email": "c@d.e" }])).await;
        Mock::given(method("GET"))
            .and(path("/api/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "m1", "fromId": "c1", "toId": "u1", "content": "hi" },
                { "id": "m2", "fromId": "u1", "toId": "c1", "content": "hello" },
            ])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (client, _events) = Client::new(config(&server, dir.path()));
        client.login("a@b.c", "pw").await.unwrap();

        client.open_conversation(&UserId::new("c1")).await.unwrap();

        let entries = client.conversation_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message.content.as_deref(), Some("hi"));
        assert!(!entries[0].pending);
    }

    #[tokio::test]
    async fn send_without_connection_is_rejected_cleanly() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_contacts(&server, json!([{ "id": "c1", "email": "c@d.e" }])).await;
        Mock::given(method("GET"))
            .and(path("/api/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (client, _events) = Client::new(config(&server, dir.path()));
        client.login("a@b.c", "pw").await.unwrap();
        client.open_conversation(&UserId::new("c1")).await.unwrap();

        // The socket URL points at a closed port, so the channel exists
        // but never reaches the connected state.
        assert!(matches!(
            client.send_message(Some("hi".to_string()), None),
            Err(MissiveError::NotConnected)
        ));
        assert!(client.conversation_entries().is_empty());
    }

    #[tokio::test]
    async fn removing_the_active_peer_closes_the_conversation() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_contacts(&server, json!([{ "id": "c1", "email": "c@d.e" }])).await;
        Mock::given(method("GET"))
            .and(path("/api/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/delete-contact"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (client, _events) = Client::new(config(&server, dir.path()));
        client.login("a@b.c", "pw").await.unwrap();
        client.open_conversation(&UserId::new("c1")).await.unwrap();

        client.remove_contact(&UserId::new("c1")).await.unwrap();
        assert!(client.selected_contact().is_none());
        assert!(client.conversation_entries().is_empty());
    }
}
