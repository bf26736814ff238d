//! Simulated stationary device.

use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};

use super::{LocationEvent, LocationFix, LocationProvider, ProviderOptions};

/// Default interval between simulated updates.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Provider that reports the same position on a fixed interval.
///
/// Each fix is stamped with the wall-clock time it was emitted.
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    interval: Duration,
}

impl FixedLocationProvider {
    /// Create a provider at the given coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            interval: DEFAULT_UPDATE_INTERVAL,
        }
    }

    /// Report an altitude with every fix.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Change the update interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl LocationProvider for FixedLocationProvider {
    fn subscribe(&self, _options: ProviderOptions) -> BoxStream<'static, LocationEvent> {
        let template = LocationFix {
            latitude: Some(self.latitude),
            longitude: Some(self.longitude),
            altitude: self.altitude,
            timestamp_ms: None,
        };
        let period = self.interval;

        // The ticker is created on first poll so subscribing needs no runtime.
        stream::unfold(None::<tokio::time::Interval>, move |ticker| async move {
            let mut ticker = ticker.unwrap_or_else(|| tokio::time::interval(period));
            ticker.tick().await;
            let fix = template.with_timestamp_ms(chrono::Utc::now().timestamp_millis());
            Some((LocationEvent::Fix(fix), Some(ticker)))
        })
        .boxed()
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_emits_configured_position() {
        let provider = FixedLocationProvider::new(40.0, -3.0)
            .with_altitude(12.0)
            .with_interval(Duration::from_millis(250));
        let mut events = provider.subscribe(ProviderOptions::default());

        for _ in 0..3 {
            match events.next().await {
                Some(LocationEvent::Fix(fix)) => {
                    assert_eq!(fix.coordinates(), Some((40.0, -3.0)));
                    assert_eq!(fix.altitude, Some(12.0));
                    assert!(fix.timestamp_ms.is_some());
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }
}
