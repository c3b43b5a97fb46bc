use thiserror::Error;

/// Boxed error returned by user-supplied message handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by topic handling and broker clients.
#[derive(Debug, Error)]
pub enum Error {
    /// Publish or subscribe was called without a topic.
    #[error("empty topic")]
    EmptyTopic,
    /// Subscribe or unsubscribe was called without a client id.
    #[error("empty id")]
    EmptyId,
    /// A topic was built from an empty channel id.
    #[error("empty channel")]
    EmptyChannel,
    /// The topic or channel contains reserved characters.
    #[error("malformed topic: {0}")]
    MalformedTopic(String),
    /// Unsubscribe on a (client id, topic) pair with no subscription.
    #[error("not subscribed")]
    NotSubscribed,
    /// The transport rejected or failed the call.
    #[error("connection error: {0}")]
    Connection(String),
    /// A handler's `cancel` failed while being replaced or removed.
    #[error("handler cancel failed: {0}")]
    HandlerCancel(#[source] BoxError),
    /// Wire encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),
    /// The client was closed.
    #[error("broker client closed")]
    Closed,
    /// Invalid or unsupported configuration.
    #[error("configuration error: {0}")]
    Config(String),
    #[error("lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl Error {
    /// Whether the error came from the transport rather than from the caller's input.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Closed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
