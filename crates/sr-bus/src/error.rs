/// Fatal bus errors. Transient poll errors never reach this type — they are
/// logged and retried by [`crate::BusCursor::next`].
#[derive(Debug)]
pub enum BusCursorError {
    /// Topic metadata could not be fetched at startup.
    TopicUnavailable { topic: String, source: rdkafka::error::KafkaError },
    /// Any other rdkafka client construction/configuration failure.
    ClientError(rdkafka::error::KafkaError),
}

impl std::fmt::Display for BusCursorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TopicUnavailable { topic, source } => {
                write!(f, "topic '{topic}' unavailable: {source}")
            }
            Self::ClientError(e) => write!(f, "kafka client error: {e}"),
        }
    }
}

impl std::error::Error for BusCursorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TopicUnavailable { source, .. } => Some(source),
            Self::ClientError(e) => Some(e),
        }
    }
}

impl From<rdkafka::error::KafkaError> for BusCursorError {
    fn from(e: rdkafka::error::KafkaError) -> Self {
        Self::ClientError(e)
    }
}
