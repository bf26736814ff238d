//! Session state shared between the UI collaborator and the reporting loop.
//!
//! [`SessionState`] is owned by the tracking agent task; nothing else holds
//! a mutable reference to it. The UI sees immutable [`SessionSnapshot`]s.

use std::fmt;

use thiserror::Error;

use crate::location::LocationFix;
use crate::reporter::ReporterPhase;
use crate::transport::{Endpoint, TransportMode};

/// Number of endpoint slots a session can hold.
pub const MAX_ENDPOINTS: usize = 3;

/// Opaque tag included in every report so receivers can tell senders apart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientIdentifier(String);

impl ClientIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank identifiers (empty or whitespace only) count as empty.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which screen the UI collaborator should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Home,
    LocationInfo,
}

/// A command was rejected before anything changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No identifier entered")]
    EmptyIdentifier,

    #[error("No endpoint configured")]
    NoEndpoint,

    #[error("Endpoint slot {index} out of range (max {max})")]
    EndpointIndexOutOfRange { index: usize, max: usize },

    #[error("Endpoint host is empty")]
    EmptyHost,

    #[error("Endpoint port must be between 1 and 65535")]
    InvalidPort,

    #[error("Reporting already active ({0})")]
    AlreadyActive(ReporterPhase),
}

/// Mutable session data.
#[derive(Debug, Clone)]
pub struct SessionState {
    identifier: ClientIdentifier,
    endpoints: [Option<Endpoint>; MAX_ENDPOINTS],
    current_fix: LocationFix,
    phase: ReporterPhase,
    screen: Screen,
    tracking: bool,
    messages_sent: u64,
    last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Fresh session: idle, empty fix, nothing configured.
    pub fn new() -> Self {
        Self {
            identifier: ClientIdentifier::default(),
            endpoints: Default::default(),
            current_fix: LocationFix::empty(),
            phase: ReporterPhase::Idle,
            screen: Screen::Home,
            tracking: false,
            messages_sent: 0,
            last_error: None,
        }
    }

    pub fn identifier(&self) -> &ClientIdentifier {
        &self.identifier
    }

    pub fn set_identifier(&mut self, identifier: &str) -> Result<(), ValidationError> {
        let identifier = ClientIdentifier::new(identifier.trim());
        if identifier.is_empty() {
            return Err(ValidationError::EmptyIdentifier);
        }
        self.identifier = identifier;
        Ok(())
    }

    pub fn set_endpoint(
        &mut self,
        index: usize,
        host: &str,
        port: u16,
    ) -> Result<(), ValidationError> {
        let slot = self.slot_mut(index)?;
        let host = host.trim();
        if host.is_empty() {
            return Err(ValidationError::EmptyHost);
        }
        if port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        *slot = Some(Endpoint::new(host, port));
        Ok(())
    }

    pub fn clear_endpoint(&mut self, index: usize) -> Result<(), ValidationError> {
        *self.slot_mut(index)? = None;
        Ok(())
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Option<Endpoint>, ValidationError> {
        self.endpoints
            .get_mut(index)
            .ok_or(ValidationError::EndpointIndexOutOfRange {
                index,
                max: MAX_ENDPOINTS - 1,
            })
    }

    /// Configured endpoints in slot order, skipping empty slots.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints
            .iter()
            .flatten()
            .filter(|ep| ep.is_valid())
            .cloned()
            .collect()
    }

    /// Check that reporting may start and return what the loop needs.
    ///
    /// Stream mode only uses the first configured endpoint.
    pub fn validate_for_start(
        &self,
        mode: TransportMode,
    ) -> Result<(ClientIdentifier, Vec<Endpoint>), ValidationError> {
        if self.phase != ReporterPhase::Idle {
            return Err(ValidationError::AlreadyActive(self.phase));
        }
        if self.identifier.is_empty() {
            return Err(ValidationError::EmptyIdentifier);
        }
        let mut endpoints = self.endpoints();
        if endpoints.is_empty() {
            return Err(ValidationError::NoEndpoint);
        }
        if mode == TransportMode::Stream {
            endpoints.truncate(1);
        }
        Ok((self.identifier.clone(), endpoints))
    }

    pub fn set_current_fix(&mut self, fix: LocationFix) {
        self.current_fix = fix;
    }

    pub fn phase(&self) -> ReporterPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: ReporterPhase) {
        self.phase = phase;
    }

    /// True exactly while the loop is in the `Sending` phase.
    pub fn is_sending(&self) -> bool {
        self.phase == ReporterPhase::Sending
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn set_screen(&mut self, screen: Screen) {
        self.screen = screen;
    }

    pub fn set_tracking(&mut self, tracking: bool) {
        self.tracking = tracking;
    }

    pub fn record_sent(&mut self, count: usize) {
        self.messages_sent += count as u64;
    }

    pub fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    /// Immutable copy for the UI.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            is_sending: self.is_sending(),
            phase: self.phase,
            current_fix: self.current_fix,
            identifier: self.identifier.clone(),
            endpoints: self.endpoints(),
            screen: self.screen,
            tracking: self.tracking,
            messages_sent: self.messages_sent,
            last_error: self.last_error.clone(),
        }
    }
}

/// Point-in-time view of a session, published after every change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub is_sending: bool,
    pub phase: ReporterPhase,
    pub current_fix: LocationFix,
    pub identifier: ClientIdentifier,
    pub endpoints: Vec<Endpoint>,
    pub screen: Screen,
    pub tracking: bool,
    pub messages_sent: u64,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> SessionState {
        let mut state = SessionState::new();
        state.set_identifier("U1").unwrap();
        state.set_endpoint(0, "10.0.0.5", 5000).unwrap();
        state
    }

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let state = SessionState::new();
        let snapshot = state.snapshot();
        assert!(!snapshot.is_sending);
        assert_eq!(snapshot.phase, ReporterPhase::Idle);
        assert_eq!(snapshot.current_fix, LocationFix::empty());
        assert_eq!(snapshot.screen, Screen::Home);
        assert!(snapshot.endpoints.is_empty());
    }

    #[test]
    fn test_identifier_must_not_be_blank() {
        let mut state = SessionState::new();
        assert_eq!(state.set_identifier("   "), Err(ValidationError::EmptyIdentifier));
        state.set_identifier(" U1 ").unwrap();
        assert_eq!(state.identifier().as_str(), "U1");
    }

    #[test]
    fn test_endpoint_validation() {
        let mut state = SessionState::new();
        assert_eq!(
            state.set_endpoint(3, "h", 1),
            Err(ValidationError::EndpointIndexOutOfRange { index: 3, max: 2 })
        );
        assert_eq!(state.set_endpoint(0, "", 1), Err(ValidationError::EmptyHost));
        assert_eq!(state.set_endpoint(0, "h", 0), Err(ValidationError::InvalidPort));
    }

    #[test]
    fn test_endpoints_keep_slot_order() {
        let mut state = SessionState::new();
        state.set_endpoint(2, "c", 3).unwrap();
        state.set_endpoint(0, "a", 1).unwrap();
        state.set_endpoint(1, "b", 2).unwrap();
        state.clear_endpoint(1).unwrap();

        let hosts: Vec<String> = state.endpoints().into_iter().map(|e| e.host).collect();
        assert_eq!(hosts, vec!["a", "c"]);
    }

    #[test]
    fn test_start_requires_identifier() {
        let mut state = SessionState::new();
        state.set_endpoint(0, "h", 1).unwrap();
        assert_eq!(
            state.validate_for_start(TransportMode::Stream),
            Err(ValidationError::EmptyIdentifier)
        );
    }

    #[test]
    fn test_start_requires_endpoint() {
        let mut state = SessionState::new();
        state.set_identifier("U1").unwrap();
        assert_eq!(
            state.validate_for_start(TransportMode::Datagram),
            Err(ValidationError::NoEndpoint)
        );
    }

    #[test]
    fn test_stream_mode_uses_first_endpoint_only() {
        let mut state = configured();
        state.set_endpoint(1, "backup", 6000).unwrap();

        let (_, stream) = state.validate_for_start(TransportMode::Stream).unwrap();
        assert_eq!(stream, vec![Endpoint::new("10.0.0.5", 5000)]);

        let (_, datagram) = state.validate_for_start(TransportMode::Datagram).unwrap();
        assert_eq!(datagram.len(), 2);
    }

    #[test]
    fn test_start_only_from_idle() {
        let mut state = configured();
        state.set_phase(ReporterPhase::Sending);
        assert_eq!(
            state.validate_for_start(TransportMode::Stream),
            Err(ValidationError::AlreadyActive(ReporterPhase::Sending))
        );
    }

    #[test]
    fn test_is_sending_tracks_phase() {
        let mut state = configured();
        for (phase, sending) in [
            (ReporterPhase::Idle, false),
            (ReporterPhase::Starting, false),
            (ReporterPhase::Sending, true),
            (ReporterPhase::Stopping, false),
        ] {
            state.set_phase(phase);
            assert_eq!(state.is_sending(), sending, "{:?}", phase);
            assert_eq!(state.snapshot().is_sending, sending);
        }
    }
}
