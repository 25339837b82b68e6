//! Projection error types.

use thiserror::Error;

/// Errors raised while applying events to, or querying, the summary table.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An event arrived for a cart that has no summary row. The upstream log
    /// delivered events out of order or lost a `Started` event.
    #[error("data integrity fault: {event_type} #{sequence_number} for unknown cart {cart_id}")]
    UnknownCart {
        /// The cart the event belongs to.
        cart_id: String,
        /// The event type name.
        event_type: String,
        /// The event's sequence number within the cart stream.
        sequence_number: i64,
    },

    /// An event payload names a different cart than the stream it was
    /// stored in.
    #[error(
        "data integrity fault: {event_type} #{sequence_number} in stream {stream_id} names cart {cart_id}"
    )]
    StreamMismatch {
        /// The stream the event was stored in.
        stream_id: String,
        /// The cart named by the payload.
        cart_id: String,
        /// The event type name.
        event_type: String,
        /// The event's sequence number within the stream.
        sequence_number: i64,
    },

    /// An event payload could not be decoded as a cart event.
    #[error("event decode error: {0}")]
    Decode(String),

    /// The summary store failed.
    #[error("summary storage error: {0}")]
    Storage(String),

    /// The projection runner stopped before reaching the requested event.
    #[error("projection runner stopped")]
    RunnerStopped,
}

impl ProjectionError {
    /// Returns `true` if the error means the event stream itself is corrupt
    /// and the event was quarantined.
    #[must_use]
    pub fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            Self::UnknownCart { .. } | Self::StreamMismatch { .. } | Self::Decode(_)
        )
    }
}
