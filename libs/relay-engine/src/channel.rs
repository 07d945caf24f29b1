use std::sync::Arc;

use relay_api::{KvStore, Message};

use crate::{Clock, KeySpace, RelayError};

/// Append-only FIFO of timestamped messages per topic.
/// No size bound is enforced here.
#[derive(Clone)]
pub struct MessageChannel {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    clock: Arc<dyn Clock>,
}

impl MessageChannel {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace, clock: Arc<dyn Clock>) -> Self {
        Self { store, keys, clock }
    }

    /// Stamp with server time and push to the tail.
    pub async fn append(&self, topic: &str, payload: &str) -> Result<Message, RelayError> {
        let message = Message {
            payload: payload.to_string(),
            published_at_ms: self.clock.now_ms(),
        };
        let record = serde_json::to_string(&message)?;
        self.store
            .append_to_list(&self.keys.channel(topic), &record)
            .await?;
        Ok(message)
    }

    /// Head without removal. `None` when the channel is empty or was never created.
    pub async fn peek_head(&self, topic: &str) -> Result<Option<Message>, RelayError> {
        let head = self
            .store
            .range_of_list(&self.keys.channel(topic), 0, 0)
            .await?;
        match head.into_iter().next() {
            Some(record) => Ok(Some(serde_json::from_str(&record)?)),
            None => Ok(None),
        }
    }

    /// Remove and return the head.
    pub async fn pop_head(&self, topic: &str) -> Result<Option<Message>, RelayError> {
        match self.store.pop_front(&self.keys.channel(topic)).await? {
            Some(record) => Ok(Some(serde_json::from_str(&record)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use storage_memory::MemoryStore;

    #[tokio::test]
    async fn test_fifo_with_timestamps() {
        let clock = Arc::new(ManualClock::new(10));
        let channel = MessageChannel::new(
            Arc::new(MemoryStore::new()),
            KeySpace::default(),
            clock.clone(),
        );

        assert_eq!(channel.peek_head("t").await.unwrap(), None);

        channel.append("t", "first").await.unwrap();
        clock.advance(5);
        channel.append("t", "second").await.unwrap();

        let head = channel.peek_head("t").await.unwrap().unwrap();
        assert_eq!(head.payload, "first");
        assert_eq!(head.published_at_ms, 10);
        // peek leaves the head in place
        assert_eq!(channel.peek_head("t").await.unwrap(), Some(head.clone()));

        assert_eq!(channel.pop_head("t").await.unwrap(), Some(head));
        let next = channel.pop_head("t").await.unwrap().unwrap();
        assert_eq!(next.payload, "second");
        assert_eq!(next.published_at_ms, 15);
        assert_eq!(channel.pop_head("t").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_infrastructure_error() {
        let store = Arc::new(MemoryStore::new());
        let keys = KeySpace::default();
        store.append_to_list(&keys.channel("t"), "not json").await.unwrap();

        let channel = MessageChannel::new(store, keys, Arc::new(ManualClock::default()));
        let err = channel.peek_head("t").await.unwrap_err();
        assert!(matches!(err, RelayError::Codec(_)));
        assert!(!err.is_client_error());
    }
}
