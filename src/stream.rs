//! Stream events for the ordered answer delivery protocol.
//!
//! One answer stream is a sequence of [`StreamEvent`]s obeying:
//!
//! - `meta` always precedes any `token`;
//! - `done` or `error` is always the final event;
//! - at most one of `done`/`error` occurs.
//!
//! The transport layer serializes each event as one JSON line; the tag field
//! is `type`.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::document::Citation;

/// One discrete unit in the answer delivery protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Retrieval metadata, emitted first — even with zero citations.
    Meta {
        /// Citations for every chunk consulted for the context.
        citations: Vec<Citation>,
        /// Number of chunks consulted.
        used_chunks: usize,
        /// Document scope of the query, if any.
        doc_id: Option<String>,
        /// Name of the collection that was searched.
        collection: String,
    },
    /// One generated text fragment, in arrival order.
    Token {
        /// The fragment text.
        content: String,
    },
    /// Terminal failure; no further events follow.
    Error {
        /// Human-readable cause.
        detail: String,
    },
    /// Terminal success marker.
    Done,
}

impl StreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }
}

/// An ordered stream of answer events. Infallible at the stream level:
/// failures are delivered as terminal [`StreamEvent::Error`] events.
pub type AnswerStream = BoxStream<'static, StreamEvent>;
