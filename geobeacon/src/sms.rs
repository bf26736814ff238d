//! One-shot SMS fallback.
//!
//! When no network endpoint is reachable the current fix can be handed to a
//! platform messaging facility as a human-readable text. This is a single
//! send to one configured number and is independent of the reporting loop.

use std::future::Future;

use thiserror::Error;
use tracing::info;

use crate::location::LocationFix;
use crate::time::local_time_from_ms;

/// Timestamp layout in the message body.
const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// SMS composition and hand-off failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmsError {
    #[error("Fix has no coordinates to send")]
    MissingCoordinates,

    #[error("No SMS destination configured")]
    NoDestination,

    /// The messaging facility refused or failed the send.
    #[error("Messaging facility error: {0}")]
    Facility(String),
}

/// Platform facility able to send a text message.
pub trait MessagingFacility: Send + Sync {
    fn send_text(
        &self,
        destination: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), SmsError>> + Send;
}

/// Build the SMS body for a fix.
///
/// Coordinates use six decimals, altitude two (0 when unknown). A missing
/// timestamp is shown as `N/A`.
pub fn compose_sms(fix: &LocationFix) -> Result<String, SmsError> {
    let (latitude, longitude) = fix.coordinates().ok_or(SmsError::MissingCoordinates)?;
    let timestamp = fix
        .timestamp_ms
        .and_then(local_time_from_ms)
        .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "N/A".to_string());

    Ok(format!(
        "Latitud: {:.6}\nLongitud: {:.6}\nAltitud: {:.2}\nMarca de tiempo: {}",
        latitude,
        longitude,
        fix.altitude_or_default(),
        timestamp
    ))
}

/// Sends fixes to a single destination number.
pub struct SmsFallback<M> {
    facility: M,
    destination: String,
}

impl<M: MessagingFacility> SmsFallback<M> {
    pub fn new(facility: M, destination: impl Into<String>) -> Self {
        Self {
            facility,
            destination: destination.into(),
        }
    }

    /// Compose and send one message. Returns the body that was sent.
    pub async fn send(&self, fix: &LocationFix) -> Result<String, SmsError> {
        let destination = self.destination.trim();
        if destination.is_empty() {
            return Err(SmsError::NoDestination);
        }

        let body = compose_sms(fix)?;
        self.facility.send_text(destination, &body).await?;
        info!(destination, "Location sent by SMS");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingFacility {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl MessagingFacility for RecordingFacility {
        async fn send_text(&self, destination: &str, body: &str) -> Result<(), SmsError> {
            if self.fail {
                return Err(SmsError::Facility("no signal".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_compose_full_fix() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).single().unwrap();
        let fix = LocationFix::new(40.416775, -3.70379)
            .with_altitude(657.456)
            .with_timestamp_ms(at.timestamp_millis());

        assert_eq!(
            compose_sms(&fix).unwrap(),
            "Latitud: 40.416775\nLongitud: -3.703790\nAltitud: 657.46\nMarca de tiempo: 07/03/2024 14:05:09"
        );
    }

    #[test]
    fn test_compose_defaults() {
        let fix = LocationFix::new(1.0, 2.0);
        assert_eq!(
            compose_sms(&fix).unwrap(),
            "Latitud: 1.000000\nLongitud: 2.000000\nAltitud: 0.00\nMarca de tiempo: N/A"
        );
    }

    #[test]
    fn test_compose_without_coordinates() {
        assert_eq!(
            compose_sms(&LocationFix::empty()),
            Err(SmsError::MissingCoordinates)
        );
    }

    #[tokio::test]
    async fn test_send_hands_body_to_facility() {
        let fallback = SmsFallback::new(RecordingFacility::default(), " +34600000000 ");
        let body = fallback.send(&LocationFix::new(1.0, 2.0)).await.unwrap();

        let sent = fallback.facility.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+34600000000");
        assert_eq!(sent[0].1, body);
    }

    #[tokio::test]
    async fn test_send_requires_destination() {
        let fallback = SmsFallback::new(RecordingFacility::default(), "");
        assert_eq!(
            fallback.send(&LocationFix::new(1.0, 2.0)).await,
            Err(SmsError::NoDestination)
        );
    }

    #[tokio::test]
    async fn test_facility_error_propagates() {
        let fallback = SmsFallback::new(
            RecordingFacility {
                fail: true,
                ..Default::default()
            },
            "+1",
        );
        assert!(matches!(
            fallback.send(&LocationFix::new(1.0, 2.0)).await,
            Err(SmsError::Facility(_))
        ));
    }
}
