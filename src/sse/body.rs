//! Response body adapter applying [`SseRewriter`] to an upstream body.
//!
//! Pull-based: each `poll_frame` first drains carried output, and only polls
//! upstream once the carry is empty. Frames never exceed `max_frame`, so a
//! rewrite that grows a chunk is split across polls without loss or
//! duplication.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Bytes, BytesMut};
use hyper::body::{Body, Frame, SizeHint};

use crate::observability::metrics;
use crate::sse::rewriter::SseRewriter;

pub struct RewriteBody<B> {
    inner: B,
    rewriter: SseRewriter,
    carry: BytesMut,
    max_frame: usize,
    /// Non-data frame (trailers) held until the carry drains.
    held: Option<Frame<Bytes>>,
    upstream_done: bool,
    _stream: metrics::StreamGuard,
}

impl<B> RewriteBody<B> {
    pub fn new(inner: B, rewriter: SseRewriter, max_frame: usize) -> Self {
        Self {
            inner,
            _stream: metrics::StreamGuard::new(rewriter.prefix()),
            rewriter,
            carry: BytesMut::new(),
            max_frame: max_frame.max(1),
            held: None,
            upstream_done: false,
        }
    }

    fn take_carried(&mut self) -> Option<Frame<Bytes>> {
        if self.carry.is_empty() {
            return None;
        }
        let n = self.carry.len().min(self.max_frame);
        Some(Frame::data(self.carry.split_to(n).freeze()))
    }

    fn finish_upstream(&mut self) {
        if !self.upstream_done {
            self.upstream_done = true;
            self.rewriter.finish(&mut self.carry);
            metrics::record_endpoint_rewrites(self.rewriter.prefix(), self.rewriter.rewrites());
        }
    }
}

impl<B> Body for RewriteBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        loop {
            if let Some(frame) = this.take_carried() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if this.upstream_done {
                return Poll::Ready(this.held.take().map(Ok));
            }

            match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => this.rewriter.feed(&data, &mut this.carry),
                    Err(frame) => {
                        this.held = Some(frame);
                        this.finish_upstream();
                    }
                },
                Some(Err(e)) => {
                    this.upstream_done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => this.finish_upstream(),
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.upstream_done && self.carry.is_empty() && self.held.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}
