//! Concurrent front-end over the copy-on-write trie.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use super::trie::Trie;

/// Keeps one value from a [`TrieStore`] snapshot alive and readable.
///
/// The guard owns the snapshot it was read from, so the value stays valid
/// however many new roots writers publish after it was taken.
pub struct ValueGuard<T> {
    _snapshot: Trie,
    value: Arc<T>,
}

impl<T> Deref for ValueGuard<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

/// A trie behind two small locks.
///
/// `root` guards only the snapshot pointer: readers copy it (a reference
/// count bump) and walk their private snapshot with no lock held, so they
/// never wait on a structural operation. `write_lock` serializes the
/// writers' read-compute-publish cycle; without it two concurrent writers
/// would each build on the same snapshot and one would silently drop the
/// other's update.
///
/// # Example
/// ```
/// use latchdb::TrieStore;
///
/// let store = TrieStore::new();
/// store.put("k", 1u32);
///
/// let guard = store.get::<u32>("k").unwrap();
/// store.put("k", 2u32);
/// // The guard still reads the snapshot it was taken from.
/// assert_eq!(*guard, 1);
/// ```
#[derive(Default)]
pub struct TrieStore {
    /// The published snapshot. Held only to copy or swap the pointer.
    root: Mutex<Trie>,

    /// Serializes all mutators.
    write_lock: Mutex<()>,
}

impl TrieStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `key` from the current snapshot.
    ///
    /// Returns `None` for a missing key or a value of a different type.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<ValueGuard<T>> {
        let snapshot = self.root.lock().clone();

        let value = Arc::clone(snapshot.lookup(key)?);
        let value = value.downcast::<T>().ok()?;

        Some(ValueGuard {
            _snapshot: snapshot,
            value,
        })
    }

    /// Map `key` to `value` in a newly published snapshot.
    pub fn put<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        let _writer = self.write_lock.lock();

        let snapshot = self.root.lock().clone();
        let new_root = snapshot.put(key, value);
        *self.root.lock() = new_root;
    }

    /// Publish a snapshot without `key`.
    pub fn remove(&self, key: &str) {
        let _writer = self.write_lock.lock();

        let snapshot = self.root.lock().clone();
        let new_root = snapshot.remove(key);
        *self.root.lock() = new_root;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let store = TrieStore::new();

        assert!(store.get::<u32>("k").is_none());

        store.put("k", 7u32);
        assert_eq!(*store.get::<u32>("k").unwrap(), 7);

        store.remove("k");
        assert!(store.get::<u32>("k").is_none());
    }

    #[test]
    fn test_type_mismatch() {
        let store = TrieStore::new();
        store.put("k", 7u32);
        assert!(store.get::<String>("k").is_none());
    }

    #[test]
    fn test_guard_outlives_publish() {
        let store = TrieStore::new();
        store.put("k", String::from("old"));

        let guard = store.get::<String>("k").unwrap();
        store.put("k", String::from("new"));
        store.remove("k");

        assert_eq!(guard.as_str(), "old");
        assert!(store.get::<String>("k").is_none());
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        use std::thread;

        const WRITES: u32 = 1000;

        let store = Arc::new(TrieStore::new());
        store.put("k", 0u32);

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 1..=WRITES {
                    store.put("k", i);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let mut last = 0u32;
                    for _ in 0..1000 {
                        let v = *store.get::<u32>("k").unwrap();
                        // Published values only ever move forward.
                        assert!(v >= last && v <= WRITES);
                        last = v;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }

        assert_eq!(*store.get::<u32>("k").unwrap(), WRITES);
    }

    #[test]
    fn test_concurrent_writers_lose_no_updates() {
        use std::thread;

        let store = Arc::new(TrieStore::new());

        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100u32 {
                        store.put(&format!("key-{}-{}", t, i), t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for t in 0..4u32 {
            for i in 0..100u32 {
                let v = store.get::<u32>(&format!("key-{}-{}", t, i));
                assert_eq!(*v.unwrap(), t * 1000 + i);
            }
        }
    }
}
