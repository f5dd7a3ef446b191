//! Backpressured child discovery
//!
//! Adapters whose enumeration is itself blocking and unbounded (huge
//! directories, long URL lists, big mail folders) run it on a blocking
//! producer thread that hands descriptors to the engine through a channel of
//! capacity 1. The producer blocks until the engine has taken the previous
//! descriptor, so at most one discovered-but-unprocessed descriptor exists.
//!
//! End of stream is the channel closing. A producer that observes
//! cancellation simply returns, which also closes the channel.

use crate::crawler::CancellationToken;
use crate::state::DataEntity;
use crate::{CrawlError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Lazy, finite, forward-only sequence of child descriptors
pub struct ChildStream {
    inner: Inner,
}

enum Inner {
    Ready(std::vec::IntoIter<DataEntity>),
    Channel {
        source_id: String,
        rx: mpsc::Receiver<Result<DataEntity>>,
        producer: Option<JoinHandle<()>>,
    },
}

impl ChildStream {
    /// A stream with no children (leaf entities)
    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    /// A stream over children that were cheap to enumerate up front
    pub fn from_vec(children: Vec<DataEntity>) -> Self {
        Self {
            inner: Inner::Ready(children.into_iter()),
        }
    }

    /// Returns the next child, or None once the sequence is exhausted
    pub async fn next(&mut self) -> Option<Result<DataEntity>> {
        match &mut self.inner {
            Inner::Ready(children) => children.next().map(Ok),
            Inner::Channel {
                source_id,
                rx,
                producer,
            } => {
                if let Some(item) = rx.recv().await {
                    return Some(item);
                }

                // Channel closed; surface a producer panic once instead of
                // mistaking it for a clean end of stream.
                let handle = producer.take()?;
                match handle.await {
                    Err(e) if e.is_panic() => Some(Err(CrawlError::format(
                        source_id.clone(),
                        "child discovery producer panicked",
                    ))),
                    _ => None,
                }
            }
        }
    }
}

/// Producer side of a [`DiscoveryChannel`]
pub struct DiscoverySender {
    tx: mpsc::Sender<Result<DataEntity>>,
    cancel: CancellationToken,
}

impl DiscoverySender {
    /// Hands one descriptor to the consumer, blocking until it has room
    ///
    /// Returns false when the producer must stop: the crawl was cancelled or
    /// the consumer is gone.
    pub fn offer(&self, entity: DataEntity) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.blocking_send(Ok(entity)).is_ok()
    }

    /// Reports an enumeration failure to the consumer
    pub fn fail(&self, error: CrawlError) {
        let _ = self.tx.blocking_send(Err(error));
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Spawns blocking enumeration behind a capacity-1 channel
pub struct DiscoveryChannel;

impl DiscoveryChannel {
    /// Number of descriptors that can wait ahead of the consumer
    pub const CAPACITY: usize = 1;

    /// Runs `producer` on the blocking pool and returns its child stream
    ///
    /// An `Err` returned by the producer is delivered as the last item.
    pub fn spawn<F>(source_id: impl Into<String>, cancel: CancellationToken, producer: F) -> ChildStream
    where
        F: FnOnce(&DiscoverySender) -> Result<()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(Self::CAPACITY);
        let sender = DiscoverySender { tx, cancel };

        let handle = tokio::task::spawn_blocking(move || {
            if let Err(e) = producer(&sender) {
                sender.fail(e);
            }
        });

        ChildStream {
            inner: Inner::Channel {
                source_id: source_id.into(),
                rx,
                producer: Some(handle),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn entity(i: usize) -> DataEntity {
        DataEntity::root(SourceKind::FlatList, format!("item-{}", i))
    }

    #[tokio::test]
    async fn test_ready_stream_preserves_order() {
        let mut stream = ChildStream::from_vec(vec![entity(1), entity(2)]);
        assert_eq!(stream.next().await.unwrap().unwrap().source_id, "item-1");
        assert_eq!(stream.next().await.unwrap().unwrap().source_id, "item-2");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_delivers_in_order_then_ends() {
        let mut stream = DiscoveryChannel::spawn("list", CancellationToken::new(), |tx| {
            for i in 0..5 {
                tx.offer(entity(i));
            }
            Ok(())
        });

        let mut seen = Vec::new();
        while let Some(item) = stream.next().await {
            seen.push(item.unwrap().source_id);
        }
        assert_eq!(seen, vec!["item-0", "item-1", "item-2", "item-3", "item-4"]);
    }

    #[tokio::test]
    async fn test_producer_never_runs_more_than_one_ahead() {
        let sent = Arc::new(AtomicUsize::new(0));
        let sent_by_producer = sent.clone();

        let mut stream = DiscoveryChannel::spawn("dir", CancellationToken::new(), move |tx| {
            for i in 0..20 {
                if !tx.offer(entity(i)) {
                    break;
                }
                sent_by_producer.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        let mut consumed = 0;
        while let Some(item) = stream.next().await {
            item.unwrap();
            consumed += 1;
            // Slow consumer: give the producer every chance to run ahead.
            tokio::time::sleep(Duration::from_millis(5)).await;
            let produced = sent.load(Ordering::SeqCst);
            assert!(
                produced <= consumed + DiscoveryChannel::CAPACITY,
                "producer ran ahead: produced {} with {} consumed",
                produced,
                consumed
            );
        }
        assert_eq!(consumed, 20);
    }

    #[tokio::test]
    async fn test_cancelled_producer_ends_stream_without_marker() {
        let token = CancellationToken::new();
        let mut stream = DiscoveryChannel::spawn("dir", token.clone(), |tx| {
            let mut i = 0;
            while tx.offer(entity(i)) {
                i += 1;
            }
            Ok(())
        });

        for _ in 0..3 {
            stream.next().await.unwrap().unwrap();
        }
        token.cancel();

        let mut trailing = 0;
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(item) = stream.next().await {
                item.unwrap();
                trailing += 1;
            }
        })
        .await;
        assert!(drained.is_ok(), "stream did not end after cancellation");
        assert!(trailing <= 2, "got {} items after cancel", trailing);
    }

    #[tokio::test]
    async fn test_producer_error_is_delivered() {
        let mut stream = DiscoveryChannel::spawn("dir", CancellationToken::new(), |tx| {
            tx.offer(entity(0));
            Err(CrawlError::format("dir", "listing failed"))
        });

        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, CrawlError::PermanentFormat { .. }));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_producer_panic_is_reported() {
        let mut stream = DiscoveryChannel::spawn("dir", CancellationToken::new(), |_tx| {
            panic!("enumeration bug");
        });

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("panicked"));
        assert!(stream.next().await.is_none());
    }
}
