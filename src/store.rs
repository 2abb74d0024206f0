//! Persistence collaborator contract and an in-memory backend.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::event::{EventRecord, stream_uuid};

/// Durable, ordered storage for aggregate event streams.
///
/// Implementations decide the storage medium and the byte format. They must
/// honor two guarantees:
///
/// - [`load_history`](EventStore::load_history) returns every committed record
///   of the stream, oldest first, together with the stream's current version
///   (the number of committed records). A never-written stream is empty at
///   version 0.
/// - [`append`](EventStore::append) commits all records atomically, and only
///   if the stream is still at `expected_version`. Otherwise it fails with
///   [`StoreError::ConcurrencyConflict`] and commits nothing.
pub trait EventStore: Send + Sync + 'static {
    /// Read the full history of one aggregate instance.
    fn load_history(
        &self,
        aggregate_type: &str,
        instance_id: &str,
    ) -> impl Future<Output = Result<(Vec<EventRecord>, u64), StoreError>> + Send;

    /// Append records if the stream is still at `expected_version`.
    ///
    /// Returns the new stream version.
    fn append(
        &self,
        aggregate_type: &str,
        instance_id: &str,
        expected_version: u64,
        records: Vec<EventRecord>,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// Process-local [`EventStore`] keyed by [`stream_uuid`].
///
/// `Clone` is cheap and clones share the same streams. Intended for tests
/// and single-process embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<Uuid, Vec<EventRecord>>>>,
}

impl InMemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of streams holding at least one record.
    pub async fn stream_count(&self) -> usize {
        self.streams
            .read()
            .await
            .values()
            .filter(|s| !s.is_empty())
            .count()
    }
}

impl EventStore for InMemoryEventStore {
    async fn load_history(
        &self,
        aggregate_type: &str,
        instance_id: &str,
    ) -> Result<(Vec<EventRecord>, u64), StoreError> {
        let streams = self.streams.read().await;
        let history = streams
            .get(&stream_uuid(aggregate_type, instance_id))
            .cloned()
            .unwrap_or_default();
        let version = history.len() as u64;
        Ok((history, version))
    }

    async fn append(
        &self,
        aggregate_type: &str,
        instance_id: &str,
        expected_version: u64,
        records: Vec<EventRecord>,
    ) -> Result<u64, StoreError> {
        let mut streams = self.streams.write().await;
        let stream = streams
            .entry(stream_uuid(aggregate_type, instance_id))
            .or_default();

        let actual = stream.len() as u64;
        if actual != expected_version {
            return Err(StoreError::ConcurrencyConflict {
                expected: expected_version,
                actual,
            });
        }

        stream.extend(records);
        Ok(stream.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::test_fixtures::{Counter, CounterEvent};
    use crate::command::CommandContext;
    use crate::event::encode_domain_event;

    fn record(version: u64) -> EventRecord {
        encode_domain_event::<Counter>(
            &CounterEvent::Incremented,
            &CommandContext::default(),
            "c-1",
            version,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn unknown_stream_is_empty_at_version_zero() {
        let store = InMemoryEventStore::new();
        let (history, version) = store.load_history("counter", "nope").await.unwrap();
        assert!(history.is_empty());
        assert_eq!(version, 0);
    }

    #[tokio::test]
    async fn append_then_load_preserves_order() {
        let store = InMemoryEventStore::new();
        let v = store
            .append("counter", "c-1", 0, vec![record(0), record(1)])
            .await
            .unwrap();
        assert_eq!(v, 2);

        let (history, version) = store.load_history("counter", "c-1").await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(history[0].stream_version, 0);
        assert_eq!(history[1].stream_version, 1);
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts_and_commits_nothing() {
        let store = InMemoryEventStore::new();
        store.append("counter", "c-1", 0, vec![record(0)]).await.unwrap();

        let err = store
            .append("counter", "c-1", 0, vec![record(0)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConcurrencyConflict {
                expected: 0,
                actual: 1
            }
        ));

        let (_, version) = store.load_history("counter", "c-1").await.unwrap();
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn streams_are_isolated_by_type_and_id() {
        let store = InMemoryEventStore::new();
        store.append("counter", "a", 0, vec![record(0)]).await.unwrap();
        store.append("counter", "b", 0, vec![record(0)]).await.unwrap();
        store.append("schema", "a", 0, vec![record(0)]).await.unwrap();

        assert_eq!(store.stream_count().await, 3);
        let (_, version) = store.load_history("counter", "a").await.unwrap();
        assert_eq!(version, 1);
    }
}
