//! Changelog-backed keyed table.
//!
//! Every `put` is appended to the table's changelog and acknowledged before the
//! new value becomes visible through `get`. Replaying the changelog in record
//! order rebuilds exactly the state the table had after its last successful
//! write, which is how the table recovers on start.

use crate::error::TableError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Append-only, ordered log of table writes.
#[async_trait]
pub trait Changelog<K, V>: Send + Sync {
    /// Durably append one write. Returns only after the log acknowledged it.
    async fn append(&self, key: &K, value: &V) -> Result<(), TableError>;

    /// Every write from the earliest retained record to the latest, in order.
    async fn replay(&self) -> Result<Vec<(K, V)>, TableError>;

    /// Name used in log lines.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    Updated,
    /// The stored value already equals the new one; nothing was appended.
    Unchanged,
}

/// Key-value table with a single writer whose mutations go through a changelog.
pub struct KeyedTable<K, V> {
    name: String,
    entries: HashMap<K, V>,
    changelog: Arc<dyn Changelog<K, V>>,
}

impl<K, V> KeyedTable<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
{
    /// Rebuild the table by replaying `changelog` from the beginning.
    pub async fn recover(name: &str, changelog: Arc<dyn Changelog<K, V>>) -> Result<Self, TableError> {
        let mut entries = HashMap::new();
        let mut replayed = 0usize;
        for (key, value) in changelog.replay().await? {
            entries.insert(key, value);
            replayed += 1;
        }
        info!(
            "Table '{name}' recovered {} keys from {replayed} changelog records in '{}'",
            entries.len(),
            changelog.name()
        );

        Ok(Self {
            name: name.to_string(),
            entries,
            changelog,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Append the write to the changelog, then apply it.
    ///
    /// If the append fails the table is left untouched and the error returned.
    pub async fn put(&mut self, key: K, value: V) -> Result<PutOutcome, TableError> {
        let outcome = match self.entries.get(&key) {
            Some(current) if *current == value => return Ok(PutOutcome::Unchanged),
            Some(_) => PutOutcome::Updated,
            None => PutOutcome::Inserted,
        };

        self.changelog.append(&key, &value).await?;
        self.entries.insert(key, value);
        debug!("Table '{}' {:?}", self.name, outcome);
        Ok(outcome)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    /// Owned copy of the current contents.
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.entries.clone()
    }
}

/// Changelog kept in process memory, shared by clones.
pub struct InMemoryChangelog<K, V> {
    name: String,
    records: Mutex<Vec<(K, V)>>,
    fail_appends: AtomicBool,
}

impl<K, V> InMemoryChangelog<K, V> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: Mutex::new(Vec::new()),
            fail_appends: AtomicBool::new(false),
        }
    }

    /// Make subsequent appends fail (or succeed again).
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<K, V> Changelog<K, V> for InMemoryChangelog<K, V>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn append(&self, key: &K, value: &V) -> Result<(), TableError> {
        let write_error = |reason: String| TableError::ChangelogWrite {
            topic: self.name.clone(),
            reason,
        };
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(write_error("broker unavailable".to_string()));
        }
        self.records
            .lock()
            .map_err(|e| write_error(e.to_string()))?
            .push((key.clone(), value.clone()));
        Ok(())
    }

    async fn replay(&self) -> Result<Vec<(K, V)>, TableError> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(|e| TableError::Replay {
                topic: self.name.clone(),
                reason: e.to_string(),
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    async fn table(
        changelog: &Arc<InMemoryChangelog<i64, String>>,
    ) -> KeyedTable<i64, String> {
        KeyedTable::recover("t", changelog.clone()).await.unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let changelog = Arc::new(InMemoryChangelog::new("t-changelog"));
        let mut table = table(&changelog).await;
        assert!(table.is_empty());

        assert_eq!(table.put(1, "a".to_string()).await.unwrap(), PutOutcome::Inserted);
        assert_eq!(table.put(1, "b".to_string()).await.unwrap(), PutOutcome::Updated);
        assert_eq!(table.put(2, "c".to_string()).await.unwrap(), PutOutcome::Inserted);

        assert_eq!(table.get(&1).map(String::as_str), Some("b"));
        assert_eq!(table.get(&2).map(String::as_str), Some("c"));
        assert_eq!(table.get(&3), None);
        assert_eq!(table.len(), 2);
        assert_eq!(changelog.len(), 3);
    }

    #[tokio::test]
    async fn test_identical_put_is_not_logged() {
        let changelog = Arc::new(InMemoryChangelog::new("t-changelog"));
        let mut table = table(&changelog).await;

        table.put(1, "a".to_string()).await.unwrap();
        assert_eq!(
            table.put(1, "a".to_string()).await.unwrap(),
            PutOutcome::Unchanged
        );
        assert_eq!(changelog.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_append_does_not_commit() {
        let changelog = Arc::new(InMemoryChangelog::new("t-changelog"));
        let mut table = table(&changelog).await;
        table.put(1, "a".to_string()).await.unwrap();

        changelog.set_fail_appends(true);
        let err = table.put(1, "b".to_string()).await.unwrap_err();
        assert!(matches!(err, TableError::ChangelogWrite { .. }));
        assert_err!(table.put(2, "c".to_string()).await);

        assert_eq!(table.get(&1).map(String::as_str), Some("a"));
        assert_eq!(table.get(&2), None);
        assert_eq!(changelog.len(), 1);
    }

    #[tokio::test]
    async fn test_replay_reproduces_live_state() {
        let changelog = Arc::new(InMemoryChangelog::new("t-changelog"));
        let mut live = table(&changelog).await;

        let writes = [
            (5, "x"),
            (7, "y"),
            (5, "z"),
            (9, "w"),
            (7, "y"),
            (7, "v"),
            (5, "x"),
        ];
        for (key, value) in writes {
            live.put(key, value.to_string()).await.unwrap();
        }

        let recovered = table(&changelog).await;
        assert_eq!(recovered.snapshot(), live.snapshot());
        assert_eq!(recovered.get(&5).map(String::as_str), Some("x"));
        assert_eq!(recovered.get(&7).map(String::as_str), Some("v"));
    }
}
