//! Stream adapters.

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Holds the hook outside the pinned projection so a plain `Drop` suffices.
struct Hook<F: FnOnce()>(Option<F>);
impl<F: FnOnce()> Hook<F> {
    fn fire(&mut self) {
        if let Some(hook) = self.0.take() {
            hook();
        }
    }
}
impl<F: FnOnce()> Drop for Hook<F> {
    fn drop(&mut self) {
        self.fire();
    }
}

pin_project! {
    /// Stream returned by [`finally()`].
    pub struct Finally<S, F: FnOnce()> {
        #[pin]
        inner: S,
        hook: Hook<F>,
    }
}

/// Wrap `stream` so `hook` runs exactly once: when the stream ends, or when
/// the wrapper is dropped before that (consumer went away, panicked, or
/// stopped polling after an error item).
///
/// ```
/// use futures::StreamExt;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let done = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&done);
/// let stream = pressroom_asyncutils::finally(futures::stream::iter([1, 2]), move || flag.store(true, Ordering::SeqCst));
/// assert_eq!(stream.collect::<Vec<_>>().await, [1, 2]);
/// assert!(done.load(Ordering::SeqCst));
/// # }
/// ```
pub fn finally<S: Stream, F: FnOnce()>(stream: S, hook: F) -> Finally<S, F> {
    Finally {
        inner: stream,
        hook: Hook(Some(hook)),
    }
}

impl<S: Stream, F: FnOnce()> Stream for Finally<S, F> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let poll = this.inner.poll_next(cx);
        if let Poll::Ready(None) = poll {
            this.hook.fire();
        }
        poll
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted(items: Vec<u8>) -> (Arc<AtomicUsize>, impl Stream<Item = u8>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let stream = finally(futures::stream::iter(items), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (calls, stream)
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![1])]
    #[case(vec![1, 2, 3])]
    #[tokio::test]
    async fn test_hook_runs_once_when_exhausted(#[case] items: Vec<u8>) {
        let (calls, stream) = counted(items.clone());
        let mut stream = Box::pin(stream);
        let mut seen = Vec::new();
        while let Some(item) = stream.next().await {
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            seen.push(item);
        }
        assert_eq!(seen, items);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(stream.next().await.is_none());
        drop(stream);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hook_runs_when_dropped_early() {
        let (calls, stream) = counted(vec![1, 2, 3]);
        let mut stream = Box::pin(stream);
        assert_eq!(stream.next().await, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(stream);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_runs_when_never_polled() {
        let (calls, stream) = counted(vec![1]);
        assert_eq!(stream.size_hint(), (1, Some(1)));
        drop(stream);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
