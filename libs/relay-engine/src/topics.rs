use std::sync::Arc;

use relay_api::{KvStore, PublisherId};

use crate::{KeySpace, RelayError};

/// Publisher bindings: each topic maps to at most one publisher id,
/// created on first registration and never overwritten afterwards.
#[derive(Clone)]
pub struct TopicRegistry {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
}

impl TopicRegistry {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Bind a freshly generated publisher id to `topic`.
    ///
    /// The read and the write are separate round-trips: two concurrent
    /// registrations for the same unbound topic may both succeed, the later
    /// write winning. An existing binding observed by the read is never
    /// overwritten.
    pub async fn register_publisher(&self, topic: &str) -> Result<PublisherId, RelayError> {
        let key = self.keys.publisher(topic);
        if self.store.get(&key).await?.is_some() {
            return Err(RelayError::TopicAlreadyBound(topic.to_string()));
        }

        let id = PublisherId(uuid::Uuid::new_v4().to_string());
        self.store.set(&key, id.as_str()).await?;
        tracing::debug!(%topic, publisher = %id, "publisher registered");
        Ok(id)
    }

    pub async fn binding(&self, topic: &str) -> Result<Option<PublisherId>, RelayError> {
        let key = self.keys.publisher(topic);
        Ok(self.store.get(&key).await?.map(PublisherId))
    }

    /// A topic exists iff it has a publisher.
    pub async fn is_bound(&self, topic: &str) -> Result<bool, RelayError> {
        Ok(self.binding(topic).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_memory::MemoryStore;

    fn registry() -> TopicRegistry {
        TopicRegistry::new(Arc::new(MemoryStore::new()), KeySpace::default())
    }

    #[tokio::test]
    async fn test_register_once() {
        let topics = registry();
        assert!(!topics.is_bound("orders").await.unwrap());

        let p1 = topics.register_publisher("orders").await.unwrap();
        assert!(topics.is_bound("orders").await.unwrap());

        let err = topics.register_publisher("orders").await.unwrap_err();
        assert!(matches!(err, RelayError::TopicAlreadyBound(ref t) if t == "orders"));
        assert_eq!(topics.binding("orders").await.unwrap(), Some(p1));
    }

    #[tokio::test]
    async fn test_ids_are_unique_per_topic() {
        let topics = registry();
        let a = topics.register_publisher("a").await.unwrap();
        let b = topics.register_publisher("b").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(topics.binding("a").await.unwrap(), Some(a));
        assert_eq!(topics.binding("c").await.unwrap(), None);
    }
}
