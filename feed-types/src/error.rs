//! Error types for feed wire data.

use thiserror::Error;

/// Errors that can occur while decoding feed payloads.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// JSON deserialization failed
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload decoded but names a different topic than it arrived on
    #[error("event for discussion {event} arrived on topic {topic}")]
    TopicMismatch {
        /// Discussion named inside the event.
        event: String,
        /// Topic the payload was delivered on.
        topic: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_mismatch_display() {
        let err = DecodeError::TopicMismatch {
            event: "d1".into(),
            topic: "d2".into(),
        };
        assert_eq!(err.to_string(), "event for discussion d1 arrived on topic d2");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DecodeError>();
    }
}
