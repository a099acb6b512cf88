//! Contact resolution
//!
//! The one place contacts enter the address book. Outbound sends (test
//! message, interactive input) and inbound nickname tracking all go through
//! [`ContactResolver`], so an identity is fetched from the directory at most
//! once and cached the same way regardless of who asked first.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::directory::DirectoryService;
use crate::error::AgentResult;
use crate::events::{AgentEvent, EventSender};
use crate::storage::ContactStore;
use crate::types::contact::truncate_nickname;
use crate::types::{Contact, Identity};

/// Bounded retry for directory lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retry
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_after(&self, failed_attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1 << failed_attempt.min(16))
    }
}

/// Cache-first contact lookup backed by the directory service
pub struct ContactResolver {
    contacts: Arc<ContactStore>,
    directory: Arc<dyn DirectoryService>,
    events: EventSender,
    retry: RetryPolicy,
    /// Serializes directory fetches so concurrent misses fetch once
    fetch_lock: Mutex<()>,
}

impl ContactResolver {
    pub fn new(
        contacts: Arc<ContactStore>,
        directory: Arc<dyn DirectoryService>,
        events: EventSender,
    ) -> Self {
        Self {
            contacts,
            directory,
            events,
            retry: RetryPolicy::default(),
            fetch_lock: Mutex::new(()),
        }
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The address book this resolver fills
    pub fn contacts(&self) -> &Arc<ContactStore> {
        &self.contacts
    }

    /// Return the known contact for `identity`, fetching and saving it if needed.
    ///
    /// On a miss the directory profile is fetched, `hint_nickname` is
    /// attached, the contact is inserted and the address book is saved
    /// before returning.
    pub async fn resolve(
        &self,
        identity: &Identity,
        hint_nickname: Option<&str>,
    ) -> AgentResult<Contact> {
        if let Some(contact) = self.contacts.lookup(identity) {
            return Ok(contact);
        }

        let _guard = self.fetch_lock.lock().await;
        // Someone else may have fetched it while we waited.
        if let Some(contact) = self.contacts.lookup(identity) {
            return Ok(contact);
        }

        info!(%identity, "Retrieving contact from directory server");
        let mut contact = self.fetch_with_retry(identity).await?;
        if let Some(nickname) = hint_nickname {
            contact.public_nickname = truncate_nickname(nickname);
        }

        self.contacts.upsert(contact.clone());
        let _ = self.events.send(AgentEvent::ContactAdded {
            contact: contact.clone(),
        });
        self.contacts.persist()?;

        Ok(contact)
    }

    /// Track the nickname a peer announced in an inbound message.
    ///
    /// Unknown senders are resolved with the nickname as hint. Known
    /// senders with a different nickname are updated and the address book
    /// is saved. An unchanged nickname touches nothing.
    pub async fn observe_nickname(
        &self,
        identity: &Identity,
        nickname: &str,
    ) -> AgentResult<Contact> {
        let nickname = truncate_nickname(nickname);

        let contact = match self.contacts.lookup(identity) {
            Some(contact) => contact,
            None => self.resolve(identity, Some(&nickname)).await?,
        };
        if contact.public_nickname == nickname {
            return Ok(contact);
        }

        debug!(%identity, old = %contact.public_nickname, new = %nickname, "Nickname changed");
        let _ = self.events.send(AgentEvent::NicknameChanged {
            contact: contact.clone(),
            nickname: nickname.clone(),
        });
        let mut updated = contact;
        updated.public_nickname = nickname;
        self.contacts.upsert(updated.clone());
        self.contacts.persist()?;

        Ok(updated)
    }

    async fn fetch_with_retry(&self, identity: &Identity) -> AgentResult<Contact> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.directory.fetch_contact(identity).await {
                Ok(contact) => return Ok(contact),
                Err(e) if attempt + 1 < attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(%identity, attempt = attempt + 1, error = %e, ?delay, "Directory lookup failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::events::event_channel;
    use crate::types::PublicKey;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Directory that fails `failures` times, then answers
    struct FlakyDirectory {
        calls: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl DirectoryService for FlakyDirectory {
        async fn fetch_contact(&self, identity: &Identity) -> AgentResult<Contact> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(AgentError::Directory {
                    identity: identity.to_string(),
                    reason: "unavailable".into(),
                });
            }
            Ok(Contact::new(*identity, PublicKey([3u8; 32])))
        }
    }

    fn setup(failures: usize, retry: RetryPolicy) -> (ContactResolver, Arc<FlakyDirectory>, TempDir) {
        let dir = TempDir::new().unwrap();
        let contacts = Arc::new(ContactStore::load(dir.path().join("address.book")).unwrap());
        let directory = Arc::new(FlakyDirectory {
            calls: AtomicUsize::new(0),
            failures,
        });
        let (events, _) = event_channel();
        let resolver = ContactResolver::new(contacts, directory.clone(), events).with_retry(retry);
        (resolver, directory, dir)
    }

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        let (resolver, directory, _dir) = setup(2, fast_retry(3));
        let id = Identity::parse("ECHOECHO").unwrap();
        let contact = resolver.resolve(&id, None).await.unwrap();
        assert_eq!(contact.identity, id);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 3);
        assert_eq!(resolver.contacts().save_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let (resolver, directory, _dir) = setup(5, fast_retry(2));
        let id = Identity::parse("ECHOECHO").unwrap();
        let err = resolver.resolve(&id, None).await.unwrap_err();
        assert!(matches!(err, AgentError::Directory { .. }));
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
        assert!(resolver.contacts().lookup(&id).is_none());
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let (resolver, directory, _dir) = setup(1, RetryPolicy::none());
        let id = Identity::parse("ECHOECHO").unwrap();
        assert!(resolver.resolve(&id, None).await.is_err());
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let (resolver, directory, _dir) = setup(0, RetryPolicy::none());
        let resolver = Arc::new(resolver);
        let id = Identity::parse("ABCD1234").unwrap();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve(&id, None).await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.contacts().len(), 1);
    }

    #[tokio::test]
    async fn test_observe_unchanged_nickname_does_not_save() {
        let (resolver, _directory, _dir) = setup(0, RetryPolicy::none());
        let id = Identity::parse("ABCD1234").unwrap();
        resolver.observe_nickname(&id, "Bob").await.unwrap();
        assert_eq!(resolver.contacts().save_count(), 1);

        resolver.observe_nickname(&id, "Bob").await.unwrap();
        assert_eq!(resolver.contacts().save_count(), 1);

        let updated = resolver.observe_nickname(&id, "Bobby").await.unwrap();
        assert_eq!(updated.public_nickname, "Bobby");
        assert_eq!(resolver.contacts().save_count(), 2);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(0), Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(200));
        assert_eq!(policy.delay_after(2), Duration::from_millis(400));
    }
}
