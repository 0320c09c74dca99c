//! Endpoint-event rewriting over an event-stream byte stream.
//!
//! # Responsibilities
//! - Split arbitrary chunks into lines, carrying partial lines across chunks
//! - Track the current event name between blank lines
//! - Rewrite `data:` lines of the `endpoint` event so the announced URL
//!   routes back through the gateway
//!
//! # Design Decisions
//! - Sans-IO: bytes in, bytes out, no knowledge of bodies or sockets
//! - Line terminators (`\n`, `\r\n` or a bare `\r`) are preserved exactly
//! - Every line other than an endpoint `data:` line is emitted byte-identical

use bytes::{BufMut, BytesMut};

/// Event whose data payload announces the message endpoint.
pub const ENDPOINT_EVENT: &str = "endpoint";

/// Partial lines longer than this are flushed without interpretation.
pub const MAX_PENDING_LINE: usize = 64 * 1024;

const EVENT_FIELD: &[u8] = b"event:";
const DATA_FIELD: &[u8] = b"data:";

/// The origin clients should use to reach the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrigin {
    /// Scheme to force; `None` keeps the scheme of the rewritten URL.
    scheme: Option<String>,
    /// `host[:port]`.
    authority: String,
}

impl GatewayOrigin {
    /// Accepts either a bare `host[:port]` or an origin URL such as
    /// `https://gw.example.com`.
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.is_empty() {
            return Err("must not be empty".to_string());
        }

        if value.contains("://") {
            let url = url::Url::parse(value).map_err(|e| format!("'{}': {}", value, e))?;
            let host = url
                .host_str()
                .ok_or_else(|| format!("'{}' has no host", value))?;
            let authority = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            return Ok(Self {
                scheme: Some(url.scheme().to_string()),
                authority,
            });
        }

        let authority = value.trim_end_matches('/');
        if authority.contains('/') || authority.contains(char::is_whitespace) {
            return Err(format!("'{}' is not a host", value));
        }
        Ok(Self {
            scheme: None,
            authority: authority.to_string(),
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }
}

/// Rewrites endpoint URLs for one route prefix.
#[derive(Debug, Clone)]
pub struct EndpointRewrite {
    prefix: String,
    origin: GatewayOrigin,
}

impl EndpointRewrite {
    pub fn new(prefix: impl Into<String>, origin: GatewayOrigin) -> Self {
        Self {
            prefix: prefix.into(),
            origin,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Rewrite one announced endpoint.
    ///
    /// Relative paths are placed under the prefix. Absolute URLs get the
    /// gateway origin and the prefix ahead of their own path; query and
    /// fragment are kept.
    pub fn rewrite(&self, original: &str) -> String {
        if !is_absolute(original) {
            return self.prefixed(original);
        }

        let url = match url::Url::parse(original) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %original, error = %e, "Unparsable endpoint URL left unchanged");
                return original.to_string();
            }
        };

        let scheme = self.origin.scheme.as_deref().unwrap_or(url.scheme());
        let mut rewritten = format!(
            "{}://{}{}",
            scheme,
            self.origin.authority,
            self.prefixed(url.path())
        );
        if let Some(query) = url.query() {
            rewritten.push('?');
            rewritten.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            rewritten.push('#');
            rewritten.push_str(fragment);
        }
        rewritten
    }

    fn prefixed(&self, path: &str) -> String {
        if path.is_empty() {
            self.prefix.clone()
        } else if path.starts_with('/') {
            format!("{}{}", self.prefix, path)
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }
}

fn is_absolute(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Incremental rewriter state for a single event stream.
#[derive(Debug)]
pub struct SseRewriter {
    rewrite: EndpointRewrite,
    in_event: bool,
    event: String,
    partial: BytesMut,
    /// Set while the rest of an over-long line is still arriving.
    overflowing: bool,
    rewrites: u64,
}

impl SseRewriter {
    pub fn new(rewrite: EndpointRewrite) -> Self {
        Self {
            rewrite,
            in_event: false,
            event: String::new(),
            partial: BytesMut::new(),
            overflowing: false,
            rewrites: 0,
        }
    }

    pub fn prefix(&self) -> &str {
        self.rewrite.prefix()
    }

    /// Number of endpoint lines rewritten so far.
    pub fn rewrites(&self) -> u64 {
        self.rewrites
    }

    /// Whether an event name is currently in effect.
    pub fn in_event(&self) -> bool {
        self.in_event
    }

    /// Consume a chunk, appending every completed line to `out`.
    /// The undecided tail is kept for the next call.
    pub fn feed(&mut self, chunk: &[u8], out: &mut BytesMut) {
        // A trailing `\r` may be the first half of `\r\n`; look at it again.
        let mut search_from = self.partial.len() - usize::from(self.partial.ends_with(b"\r"));
        self.partial.extend_from_slice(chunk);

        while let Some(end) = line_end(&self.partial, search_from) {
            let line = self.partial.split_to(end);
            self.process_line(&line, out);
            search_from = 0;
        }

        if self.partial.len() > MAX_PENDING_LINE {
            tracing::warn!(
                prefix = %self.rewrite.prefix(),
                bytes = self.partial.len(),
                "Event-stream line exceeds limit, passing through"
            );
            out.extend_from_slice(&self.partial.split());
            self.overflowing = true;
        }
    }

    /// End of stream: process whatever is left as a final, unterminated line.
    pub fn finish(&mut self, out: &mut BytesMut) {
        if !self.partial.is_empty() {
            let line = self.partial.split();
            self.process_line(&line, out);
        }
    }

    fn process_line(&mut self, line: &[u8], out: &mut BytesMut) {
        if self.overflowing {
            self.overflowing = false;
            out.extend_from_slice(line);
            return;
        }

        let content = strip_terminator(line);
        let terminator = &line[content.len()..];

        if content.is_empty() {
            self.in_event = false;
            self.event.clear();
            out.extend_from_slice(line);
            return;
        }

        if let Some(name) = content.strip_prefix(EVENT_FIELD) {
            self.event = String::from_utf8_lossy(name).trim().to_string();
            self.in_event = true;
            out.extend_from_slice(line);
            return;
        }

        if self.event == ENDPOINT_EVENT {
            if let Some(payload) = content.strip_prefix(DATA_FIELD) {
                if let Ok(payload) = std::str::from_utf8(payload) {
                    let original = payload.trim();
                    let rewritten = self.rewrite.rewrite(original);
                    tracing::debug!(
                        prefix = %self.rewrite.prefix(),
                        from = %original,
                        to = %rewritten,
                        "Rewrote endpoint URL"
                    );
                    self.rewrites += 1;
                    out.put_slice(b"data: ");
                    out.put_slice(rewritten.as_bytes());
                    out.put_slice(terminator);
                    return;
                }
            }
        }

        out.extend_from_slice(line);
    }
}

/// End of the first complete line at or after `from`, terminator included.
///
/// A `\r` as the last byte is undecided until the next byte arrives.
fn line_end(buf: &[u8], from: usize) -> Option<usize> {
    let at = from + buf[from..].iter().position(|&b| matches!(b, b'\n' | b'\r'))?;
    if buf[at] == b'\n' {
        return Some(at + 1);
    }
    match buf.get(at + 1) {
        Some(b'\n') => Some(at + 2),
        Some(_) => Some(at + 1),
        None => None,
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
