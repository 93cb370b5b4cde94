//! Stream wrapper that keeps a tracing span entered while polling.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;

pin_project_lite::pin_project! {
    /// Keeps `span` alive for the whole life of the stream, not just the
    /// call that created it.
    pub(crate) struct StreamInSpan<S> {
        #[pin]
        inner: S,
        span: tracing::Span,
    }
}

impl<S> StreamInSpan<S> {
    pub(crate) fn new(inner: S, span: tracing::Span) -> Self {
        Self { inner, span }
    }
}

impl<S: Stream> Stream for StreamInSpan<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let _enter = this.span.enter();
        this.inner.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
