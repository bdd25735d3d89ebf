//! Client registry.
//!
//! Owns every [`ClientRecord`]. Name assignment and insertion happen in one
//! critical section, so concurrent registrations never share a name and
//! never lose an insert. The lock is held only for map operations, never
//! across an await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::record::{ClientRecord, Identity};
use super::sink::PeerSink;

/// Outcome of [`ClientRegistry::register`].
#[derive(Debug)]
pub struct Registration<K> {
    pub record: Arc<ClientRecord<K>>,
    /// `true` if this call inserted the identity.
    pub is_new: bool,
    /// Registry size observed inside the registration critical section.
    pub size: usize,
}

impl<K: Identity> Registration<K> {
    pub fn display_name(&self) -> &str {
        self.record.display_name()
    }
}

struct Members<K> {
    clients: HashMap<K, Arc<ClientRecord<K>>>,
    next_order: u64,
}

/// Concurrent map from identity to client record.
pub struct ClientRegistry<K> {
    members: Mutex<Members<K>>,
}

impl<K: Identity> ClientRegistry<K> {
    pub fn new() -> Self {
        Self {
            members: Mutex::new(Members {
                clients: HashMap::new(),
                next_order: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Members<K>> {
        // Map operations cannot leave the map half-updated, so a poisoned
        // lock still guards consistent data.
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `identity` if unseen, naming it `Client{size + 1}`.
    ///
    /// `make_sink` is only called when a new record is created. A known
    /// identity gets its existing record back and the size is unchanged.
    pub fn register<F>(&self, identity: K, make_sink: F) -> Registration<K>
    where
        F: FnOnce() -> Box<dyn PeerSink>,
    {
        let mut members = self.lock();

        if let Some(record) = members.clients.get(&identity) {
            return Registration {
                record: Arc::clone(record),
                is_new: false,
                size: members.clients.len(),
            };
        }

        let display_name = format!("Client{}", members.clients.len() + 1);
        let order = members.next_order;
        members.next_order += 1;

        let record = Arc::new(ClientRecord::new(identity.clone(), display_name, order, make_sink()));
        members.clients.insert(identity, Arc::clone(&record));

        Registration {
            record,
            is_new: true,
            size: members.clients.len(),
        }
    }

    /// Point-in-time copy of the membership, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<ClientRecord<K>>> {
        let mut records: Vec<_> = self.lock().clients.values().cloned().collect();
        records.sort_by_key(|record| record.order());
        records
    }

    /// Remove `identity`. Unknown identities are ignored.
    ///
    /// Sends already holding the record keep their own reference and may
    /// complete or fail independently.
    pub fn deregister(&self, identity: &K) -> Option<Arc<ClientRecord<K>>> {
        self.lock().clients.remove(identity)
    }

    pub fn get(&self, identity: &K) -> Option<Arc<ClientRecord<K>>> {
        self.lock().clients.get(identity).cloned()
    }

    pub fn size(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl<K: Identity> Default for ClientRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::relay::sink::testing::RecordingSink;

    fn sink() -> Box<dyn PeerSink> {
        Box::new(RecordingSink::new().0)
    }

    #[test]
    fn names_follow_registration_order() {
        let registry = ClientRegistry::new();

        let a = registry.register("a", sink);
        let b = registry.register("b", sink);

        assert!(a.is_new && b.is_new);
        assert_eq!(a.display_name(), "Client1");
        assert_eq!(b.display_name(), "Client2");
        assert_eq!(b.size, 2);
    }

    #[test]
    fn reregistering_returns_existing_record() {
        let registry = ClientRegistry::new();
        registry.register("a", sink);

        let again = registry.register("a", || panic!("sink must not be rebuilt"));

        assert!(!again.is_new);
        assert_eq!(again.display_name(), "Client1");
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn deregister_is_idempotent() {
        let registry = ClientRegistry::new();
        registry.register("a", sink);

        assert!(registry.deregister(&"a").is_some());
        assert!(registry.deregister(&"a").is_none());
        assert!(registry.deregister(&"never-seen").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_is_ordered_and_detached() {
        let registry = ClientRegistry::new();
        for id in ["c", "a", "b"] {
            registry.register(id, sink);
        }

        let snapshot = registry.snapshot();
        registry.deregister(&"a");

        let names: Vec<_> = snapshot.iter().map(|r| r.display_name().to_string()).collect();
        assert_eq!(names, ["Client1", "Client2", "Client3"]);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn name_derives_from_current_size() {
        let registry = ClientRegistry::new();
        registry.register("a", sink);
        registry.register("b", sink);
        registry.deregister(&"a");

        let c = registry.register("c", sink);
        assert_eq!(c.display_name(), "Client2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_get_unique_gapless_names() {
        let registry = Arc::new(ClientRegistry::new());
        let count = 200;

        let tasks: Vec<_> = (0..count)
            .map(|id| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.register(id, sink).display_name().to_string() })
            })
            .collect();

        let mut names = HashSet::new();
        for task in tasks {
            assert!(names.insert(task.await.unwrap()), "duplicate name");
        }

        let expected: HashSet<_> = (1..=count).map(|n| format!("Client{}", n)).collect();
        assert_eq!(names, expected);
        assert_eq!(registry.size(), count);
    }
}
