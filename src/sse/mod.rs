//! Event-stream handling.
//!
//! # Data Flow
//! ```text
//! Backend response (Content-Type: text/event-stream)
//!     → body.rs (pull frames from upstream, drain carry first)
//!     → rewriter.rs (split lines, rewrite endpoint data lines)
//!     → client
//! ```
//!
//! The introspection client reads whole events with `reqwest-eventsource`;
//! this module only deals with relaying bytes.

pub mod body;
pub mod rewriter;

pub use body::RewriteBody;
pub use rewriter::{EndpointRewrite, GatewayOrigin, SseRewriter, ENDPOINT_EVENT};

/// `text/event-stream`, matched on the media type only.
pub fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case("text/event-stream"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_event_stream_media_type() {
        assert!(is_event_stream("text/event-stream"));
        assert!(is_event_stream("Text/Event-Stream; charset=utf-8"));
        assert!(!is_event_stream("application/json"));
        assert!(!is_event_stream("text/event-streaming"));
    }
}
