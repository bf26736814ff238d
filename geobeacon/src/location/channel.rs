//! Provider fed by the host application.
//!
//! The host (a platform location API binding, a replay tool, a test) pushes
//! events into a [`LocationFeed`]; every subscriber sees the events published
//! after it subscribed.

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tracing::trace;

use super::{AcquisitionError, LocationEvent, LocationFix, LocationProvider, ProviderOptions};

/// Buffered events per subscriber before the oldest are dropped.
const FEED_CAPACITY: usize = 64;

/// Sending side of a [`ChannelLocationProvider`].
#[derive(Clone)]
pub struct LocationFeed {
    tx: broadcast::Sender<LocationEvent>,
}

impl LocationFeed {
    /// Publish a new fix. Returns the number of active subscribers.
    pub fn push_fix(&self, fix: LocationFix) -> usize {
        self.tx.send(LocationEvent::Fix(fix)).unwrap_or(0)
    }

    /// Publish an acquisition failure.
    pub fn push_error(&self, error: AcquisitionError) -> usize {
        self.tx.send(LocationEvent::Error(error)).unwrap_or(0)
    }

    /// Number of streams currently listening.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Location provider backed by an in-process broadcast channel.
#[derive(Clone)]
pub struct ChannelLocationProvider {
    tx: broadcast::Sender<LocationEvent>,
}

impl ChannelLocationProvider {
    /// Create a provider and the feed used to drive it.
    pub fn new() -> (Self, LocationFeed) {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        let feed = LocationFeed { tx: tx.clone() };
        (Self { tx }, feed)
    }
}

impl LocationProvider for ChannelLocationProvider {
    fn subscribe(&self, _options: ProviderOptions) -> BoxStream<'static, LocationEvent> {
        let rx = self.tx.subscribe();
        stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        trace!(skipped, "Location subscriber lagged, skipping stale events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_pushed_events() {
        let (provider, feed) = ChannelLocationProvider::new();
        let mut events = provider.subscribe(ProviderOptions::default());

        assert_eq!(feed.push_fix(LocationFix::new(1.0, 2.0)), 1);
        feed.push_error(AcquisitionError::PermissionDenied);

        assert_eq!(
            events.next().await,
            Some(LocationEvent::Fix(LocationFix::new(1.0, 2.0)))
        );
        assert_eq!(
            events.next().await,
            Some(LocationEvent::Error(AcquisitionError::PermissionDenied))
        );
    }

    #[tokio::test]
    async fn test_each_subscribe_is_independent() {
        let (provider, feed) = ChannelLocationProvider::new();
        let first = provider.subscribe(ProviderOptions::default());
        drop(first);
        assert_eq!(feed.subscriber_count(), 0);

        let mut second = provider.subscribe(ProviderOptions::default());
        feed.push_fix(LocationFix::new(5.0, 6.0));
        assert_eq!(
            second.next().await,
            Some(LocationEvent::Fix(LocationFix::new(5.0, 6.0)))
        );
    }

    #[test]
    fn test_push_without_subscribers_is_harmless() {
        let (_provider, feed) = ChannelLocationProvider::new();
        assert_eq!(feed.push_fix(LocationFix::new(0.0, 0.0)), 0);
    }
}
