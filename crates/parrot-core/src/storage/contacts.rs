//! Address book - contacts keyed by identity

use std::path::Path;

use super::FileBacked;
use crate::error::AgentResult;
use crate::types::{Contact, Identity};

/// Local address book
///
/// Shared by the dispatcher and the interactive sender; all access goes
/// through one mutex inside [`FileBacked`].
pub struct ContactStore {
    file: FileBacked<Identity, Contact>,
}

impl ContactStore {
    /// Load the address book at `path` (empty if the file is missing)
    pub fn load(path: impl AsRef<Path>) -> AgentResult<Self> {
        Ok(Self {
            file: FileBacked::load(path, |c: &Contact| c.identity)?,
        })
    }

    /// Look up a contact by identity
    pub fn lookup(&self, identity: &Identity) -> Option<Contact> {
        self.file.get(identity)
    }

    /// Insert or overwrite the contact with the same identity.
    ///
    /// Only marks the store dirty; call [`ContactStore::persist`] to save.
    pub fn upsert(&self, contact: Contact) {
        self.file.update(contact.identity, |_| contact);
    }

    /// Save the address book to disk
    pub fn persist(&self) -> AgentResult<()> {
        self.file.persist()
    }

    /// Save only if there are unsaved changes
    pub fn flush(&self) -> AgentResult<bool> {
        self.file.flush()
    }

    /// Whether a mutation has not reached disk yet
    pub fn is_dirty(&self) -> bool {
        self.file.is_dirty()
    }

    /// Number of successful saves since load
    pub fn save_count(&self) -> u64 {
        self.file.save_count()
    }

    /// Number of contacts
    pub fn len(&self) -> usize {
        self.file.len()
    }

    /// Whether the address book is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every contact, ordered by identity
    pub fn snapshot(&self) -> Vec<Contact> {
        self.file.values()
    }

    /// File backing this store
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PublicKey;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn contact(id: &str, nick: &str) -> Contact {
        Contact::new(Identity::parse(id).unwrap(), PublicKey([1u8; 32])).with_nickname(nick)
    }

    #[test]
    fn test_lookup_miss() {
        let dir = TempDir::new().unwrap();
        let store = ContactStore::load(dir.path().join("address.book")).unwrap();
        assert!(store.lookup(&Identity::parse("ECHOECHO").unwrap()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = ContactStore::load(dir.path().join("address.book")).unwrap();
        store.upsert(contact("ECHOECHO", "echo"));
        store.upsert(contact("ECHOECHO", "echo2"));
        assert_eq!(store.len(), 1);
        let found = store.lookup(&Identity::parse("ECHOECHO").unwrap()).unwrap();
        assert_eq!(found.public_nickname, "echo2");
        assert!(store.is_dirty());
    }

    #[test]
    fn test_persist_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("address.book");
        let store = ContactStore::load(&path).unwrap();
        store.upsert(contact("ECHOECHO", "echo"));
        store.upsert(contact("ABCD1234", "Bob"));
        store.persist().unwrap();

        let reloaded = ContactStore::load(&path).unwrap();
        let ids: Vec<String> = reloaded
            .snapshot()
            .iter()
            .map(|c| c.identity.to_string())
            .collect();
        assert_eq!(ids, vec!["ABCD1234", "ECHOECHO"]);
    }

    #[test]
    fn test_concurrent_upserts() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContactStore::load(dir.path().join("address.book")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let id = format!("T{:03}{:04}", i, j);
                        store.upsert(contact(&id, "t"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 200);
        store.persist().unwrap();
        assert!(!store.is_dirty());
    }
}
