pub mod channel;
pub mod clock;
pub mod delivery;
pub mod error;
pub mod keys;
pub mod subscriptions;
pub mod topics;

use std::sync::Arc;

use relay_api::{KvStore, PublisherId, SubscriberId};

pub use channel::MessageChannel;
pub use clock::{Clock, ManualClock, SystemClock};
pub use delivery::{DeliveryCoordinator, DeliveryMode};
pub use error::RelayError;
pub use keys::KeySpace;
pub use subscriptions::SubscriptionRegistry;
pub use topics::TopicRegistry;

// ═══════════════════════════════════════════════════════════════
//  Relay
// ═══════════════════════════════════════════════════════════════

/// Pub/sub над примитивами key/value store.
///
/// One operation per use case. No in-process state besides the store
/// handle: every call is a sequence of independent store round-trips,
/// stopping at the first error without compensation.
#[derive(Clone)]
pub struct Relay {
    topics: TopicRegistry,
    subscriptions: SubscriptionRegistry,
    channel: MessageChannel,
    delivery: DeliveryCoordinator,
}

impl Relay {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, keys: KeySpace) -> Self {
        let topics = TopicRegistry::new(store.clone(), keys.clone());
        let subscriptions =
            SubscriptionRegistry::new(store.clone(), keys.clone(), clock.clone(), topics.clone());
        let channel = MessageChannel::new(store, keys, clock);
        let delivery = DeliveryCoordinator::new(subscriptions.clone(), channel.clone());
        Self { topics, subscriptions, channel, delivery }
    }

    pub async fn register_publisher(&self, topic: &str) -> Result<PublisherId, RelayError> {
        self.topics.register_publisher(topic).await
    }

    /// Append `payload` if `publisher` is the id bound to `topic`.
    pub async fn publish(
        &self,
        topic: &str,
        publisher: &PublisherId,
        payload: &str,
    ) -> Result<(), RelayError> {
        let bound = self
            .topics
            .binding(topic)
            .await?
            .ok_or_else(|| RelayError::TopicNotFound(topic.to_string()))?;

        if bound != *publisher {
            return Err(RelayError::UnauthorizedPublisher {
                publisher: publisher.clone(),
                topic: topic.to_string(),
            });
        }

        let message = self.channel.append(topic, payload).await?;
        tracing::debug!(%topic, ts = message.published_at_ms, "message published");
        Ok(())
    }

    pub async fn subscribe(&self, topic: &str) -> Result<SubscriberId, RelayError> {
        self.subscriptions.register_subscriber(topic).await
    }

    /// Peek: the visible head's payload, channel unchanged.
    pub async fn get_message(
        &self,
        subscriber: &SubscriberId,
        topic: &str,
    ) -> Result<Option<String>, RelayError> {
        let message = self.delivery.deliver(subscriber, topic, DeliveryMode::Peek).await?;
        Ok(message.map(|m| m.payload))
    }

    /// Ack: removes the visible head and returns its payload.
    pub async fn ack_message(
        &self,
        subscriber: &SubscriberId,
        topic: &str,
    ) -> Result<Option<String>, RelayError> {
        let message = self.delivery.deliver(subscriber, topic, DeliveryMode::Ack).await?;
        if message.is_some() {
            tracing::debug!(%topic, %subscriber, "message acknowledged");
        }
        Ok(message.map(|m| m.payload))
    }
}
