use relay_api::SubscriberId;

const PUBLISHER_SUFFIX: &str = "-publisher";
const SUBSCRIBER_SUFFIX: &str = "-subscriber";
const QUEUE_SUFFIX: &str = "-queue";

/// Store key layout. Three namespaces, one mapping each; the distinct
/// suffixes keep them disjoint for any topic name.
#[derive(Debug, Clone, Default)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Prefix every key, e.g. to share one Redis database between deployments.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Publisher binding of a topic (string key holding the publisher id).
    pub fn publisher(&self, topic: &str) -> String {
        format!("{}{topic}{PUBLISHER_SUFFIX}", self.prefix)
    }

    /// Subscription record (string key holding JSON).
    pub fn subscription(&self, id: &SubscriberId) -> String {
        format!("{}{}{SUBSCRIBER_SUFFIX}", self.prefix, id.as_str())
    }

    /// Message channel of a topic (list key).
    pub fn channel(&self, topic: &str) -> String {
        format!("{}{topic}{QUEUE_SUFFIX}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_are_disjoint() {
        let keys = KeySpace::default();
        assert_eq!(keys.publisher("orders"), "orders-publisher");
        assert_eq!(keys.channel("orders"), "orders-queue");
        assert_eq!(keys.subscription(&SubscriberId::from("abc")), "abc-subscriber");

        // A topic literally named like another namespace's key still maps elsewhere.
        assert_ne!(keys.channel("orders-publisher"), keys.publisher("orders"));
    }

    #[test]
    fn test_prefix_applies_everywhere() {
        let keys = KeySpace::with_prefix("relay:");
        assert_eq!(keys.publisher("t"), "relay:t-publisher");
        assert_eq!(keys.channel("t"), "relay:t-queue");
        assert_eq!(keys.subscription(&SubscriberId::from("s")), "relay:s-subscriber");
    }
}
