pub mod error;
pub mod store;
pub mod util;

use serde::{Deserialize, Serialize};

pub use error::{ErrorKind, StoreError};
pub use store::{resolve_range, KvStore, StoreFuture};
pub use util::now_ms;

// ════════════════════════════════════════════════════════════════
//  Identities
// ════════════════════════════════════════════════════════════════

/// Opaque server-generated identity bound to exactly one topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublisherId(pub String);

/// Opaque server-generated identity of a subscription record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub String);

impl PublisherId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SubscriberId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PublisherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PublisherId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for SubscriberId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ════════════════════════════════════════════════════════════════
//  Stored records
// ════════════════════════════════════════════════════════════════

/// Сообщение в канале topic'а. `ts` — момент публикации (ms, server time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "message")]
    pub payload: String,
    #[serde(rename = "ts")]
    pub published_at_ms: i64,
}

/// Subscription record. `subscribed_at_ms` is the visibility watermark:
/// messages published before it are never surfaced to this subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "subId")]
    pub subscriber_id: SubscriberId,
    pub topic: String,
    #[serde(rename = "ts")]
    pub subscribed_at_ms: i64,
}

impl Subscription {
    /// A message is visible unless it predates the subscription.
    /// Equal timestamps count as visible.
    pub fn can_see(&self, message: &Message) -> bool {
        self.subscribed_at_ms <= message.published_at_ms
    }
}
