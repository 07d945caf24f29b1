use std::sync::Arc;

use relay_api::{KvStore, SubscriberId, Subscription};

use crate::{Clock, KeySpace, RelayError, TopicRegistry};

/// Subscription records: subscriber id → `{topic, subscribed_at}`.
/// Records are immutable once written.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    clock: Arc<dyn Clock>,
    topics: TopicRegistry,
}

impl SubscriptionRegistry {
    pub fn new(
        store: Arc<dyn KvStore>,
        keys: KeySpace,
        clock: Arc<dyn Clock>,
        topics: TopicRegistry,
    ) -> Self {
        Self { store, keys, clock, topics }
    }

    /// Subscribe to a topic that already has a publisher. The current time
    /// becomes the subscription's visibility watermark.
    pub async fn register_subscriber(&self, topic: &str) -> Result<SubscriberId, RelayError> {
        if !self.topics.is_bound(topic).await? {
            return Err(RelayError::TopicNotFound(topic.to_string()));
        }

        let subscription = Subscription {
            subscriber_id: SubscriberId(uuid::Uuid::new_v4().to_string()),
            topic: topic.to_string(),
            subscribed_at_ms: self.clock.now_ms(),
        };
        let record = serde_json::to_string(&subscription)?;
        self.store
            .set(&self.keys.subscription(&subscription.subscriber_id), &record)
            .await?;

        tracing::debug!(
            %topic,
            subscriber = %subscription.subscriber_id,
            ts = subscription.subscribed_at_ms,
            "subscriber registered"
        );
        Ok(subscription.subscriber_id)
    }

    pub async fn lookup(&self, id: &SubscriberId) -> Result<Option<Subscription>, RelayError> {
        match self.store.get(&self.keys.subscription(id)).await? {
            Some(record) => Ok(Some(serde_json::from_str(&record)?)),
            None => Ok(None),
        }
    }

    /// Resolve `id` and check it is bound to `topic`.
    pub async fn authorize(
        &self,
        id: &SubscriberId,
        topic: &str,
    ) -> Result<Subscription, RelayError> {
        let subscription = self
            .lookup(id)
            .await?
            .ok_or_else(|| RelayError::UnknownSubscriber(id.clone()))?;

        if subscription.topic != topic {
            return Err(RelayError::SubscriberNotBoundToTopic {
                subscriber: id.clone(),
                topic: topic.to_string(),
            });
        }
        Ok(subscription)
    }
}
