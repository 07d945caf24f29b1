use relay_api::{PublisherId, StoreError, SubscriberId};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("topic {0} already has a registered publisher")]
    TopicAlreadyBound(String),

    #[error("topic '{0}' not found")]
    TopicNotFound(String),

    #[error("publisher {publisher} is not registered to topic {topic} and cannot publish messages to it")]
    UnauthorizedPublisher { publisher: PublisherId, topic: String },

    #[error("unknown subscriber id {0}")]
    UnknownSubscriber(SubscriberId),

    #[error("subscriber {subscriber} is not subscribed to topic {topic}")]
    SubscriberNotBoundToTopic { subscriber: SubscriberId, topic: String },

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("stored record: {0}")]
    Codec(#[from] serde_json::Error),
}

impl RelayError {
    /// Expected outcome caused by the caller's input. Everything else is an
    /// infrastructure failure and must not be echoed to clients.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RelayError::Store(_) | RelayError::Codec(_))
    }
}
