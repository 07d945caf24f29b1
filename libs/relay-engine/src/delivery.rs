use relay_api::{Message, SubscriberId};

use crate::{MessageChannel, RelayError, SubscriptionRegistry};

/// Read mode of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Non-destructive: the head stays in the channel.
    Peek,
    /// Destructive: the head is removed once it is visible.
    Ack,
}

/// Decides whether the channel head is visible to a subscriber and
/// whether to consume it.
///
/// There is one shared FIFO per topic and no per-subscriber cursor: a head
/// that predates the subscription hides everything behind it from that
/// subscriber until someone else consumes it.
#[derive(Clone)]
pub struct DeliveryCoordinator {
    subscriptions: SubscriptionRegistry,
    channel: MessageChannel,
}

impl DeliveryCoordinator {
    pub fn new(subscriptions: SubscriptionRegistry, channel: MessageChannel) -> Self {
        Self { subscriptions, channel }
    }

    /// `Ok(None)` is the normal "nothing to deliver" outcome.
    pub async fn deliver(
        &self,
        subscriber: &SubscriberId,
        topic: &str,
        mode: DeliveryMode,
    ) -> Result<Option<Message>, RelayError> {
        let subscription = self.subscriptions.authorize(subscriber, topic).await?;

        let Some(head) = self.channel.peek_head(topic).await? else {
            return Ok(None);
        };

        if !subscription.can_see(&head) {
            tracing::debug!(
                %topic,
                %subscriber,
                published_at = head.published_at_ms,
                subscribed_at = subscription.subscribed_at_ms,
                "head predates subscription"
            );
            return Ok(None);
        }

        match mode {
            DeliveryMode::Peek => Ok(Some(head)),
            DeliveryMode::Ack => {
                // The head may have been consumed between the peek and the pop.
                let popped = self.channel.pop_head(topic).await?;
                if popped.is_none() {
                    tracing::debug!(%topic, %subscriber, "head consumed concurrently");
                }
                Ok(popped)
            }
        }
    }
}
