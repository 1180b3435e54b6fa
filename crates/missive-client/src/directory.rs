//! Directory cache: mirror of the remote contact list plus the
//! active-contact selection.
//!
//! Pure state machine. Refreshes carry a monotonically increasing
//! sequence number taken with [`DirectoryCache::begin_refresh`] before the
//! fetch is issued; a response whose sequence is not newer than the last
//! applied one is discarded, so the LAST-settled fetch wins regardless of
//! resolution order.

use missive_shared::{Contact, UserId};

#[derive(Debug, Default)]
pub struct DirectoryCache {
    contacts: Vec<Contact>,
    selected: Option<Contact>,
    issued_seq: u64,
    applied_seq: u64,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contacts in server order.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn selected(&self) -> Option<&Contact> {
        self.selected.as_ref()
    }

    /// Reserve a sequence number for a refresh about to be issued.
    pub fn begin_refresh(&mut self) -> u64 {
        self.issued_seq += 1;
        self.issued_seq
    }

    /// Apply a settled refresh. Returns false (and changes nothing) when
    /// a newer refresh already applied.
    ///
    /// Selection rules: a selection no longer present in the new list is
    /// never left dangling — it falls back to the first entry (or to
    /// nothing when the list is empty), which also covers the initial
    /// auto-selection. A placeholder selection is the one exception: the
    /// user is mid-compose with it, so it survives background refreshes
    /// until they navigate to a real contact.
    pub fn apply_refresh(&mut self, seq: u64, contacts: Vec<Contact>) -> bool {
        if seq <= self.applied_seq {
            tracing::debug!(seq, applied = self.applied_seq, "Discarding stale directory response");
            return false;
        }
        self.applied_seq = seq;
        self.contacts = contacts;

        self.selected = match self.selected.take() {
            Some(previous) if previous.is_placeholder() => Some(previous),
            Some(previous) => self.find(&previous.id).cloned(),
            None => None,
        };
        if self.selected.is_none() {
            self.selected = self.contacts.first().cloned();
        }
        true
    }

    /// Select a contact already present in the list.
    pub fn select(&mut self, id: &UserId) -> Option<Contact> {
        let contact = self.find(id).cloned()?;
        self.selected = Some(contact.clone());
        Some(contact)
    }

    /// Select a locally-only placeholder without inserting it into the
    /// list; it lasts until the user selects a real contact or the
    /// session ends.
    pub fn select_placeholder(&mut self, contact: Contact) {
        self.selected = Some(contact);
    }

    /// Remove an entry locally after a successful delete (no refetch).
    /// If the removed entry was selected, the first remaining entry takes
    /// over, or the selection clears.
    pub fn apply_remove(&mut self, id: &UserId) {
        self.contacts.retain(|c| &c.id != id);
        if self.selected.as_ref().is_some_and(|s| &s.id == id) {
            self.selected = self.contacts.first().cloned();
        }
    }

    /// Drop everything (logout). In-flight refreshes are invalidated so
    /// they cannot repopulate the cache when they settle.
    pub fn reset(&mut self) {
        self.contacts.clear();
        self.selected = None;
        self.applied_seq = self.issued_seq;
    }

    fn find(&self, id: &UserId) -> Option<&Contact> {
        self.contacts.iter().find(|c| &c.id == id)
    }
}
