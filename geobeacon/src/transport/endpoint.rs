//! Network destinations.

use std::fmt;
use std::str::FromStr;

/// Port used when an endpoint is given without one.
pub const DEFAULT_PORT: u16 = 5000;

/// Outbound telemetry destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint without validation.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Whether the endpoint can be dialled: non-empty host, non-zero port.
    pub fn is_valid(&self) -> bool {
        !self.host.trim().is_empty() && self.port != 0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            // Bare IPv6 literal
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = String;

    /// Parse `host`, `host:port` or `[v6]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("endpoint is empty".to_string());
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| format!("unterminated IPv6 literal in '{}'", s))?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => return Err(format!("unexpected text after ']' in '{}'", s)),
            }
        } else {
            match s.rsplit_once(':') {
                Some((host, port)) if !host.contains(':') => (host, Some(port)),
                Some(_) => (s, None),
                None => (s, None),
            }
        };

        if host.trim().is_empty() {
            return Err(format!("missing host in '{}'", s));
        }

        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| format!("invalid port in '{}' (expected 1-65535)", s))?,
            None => DEFAULT_PORT,
        };

        Ok(Endpoint::new(host.trim(), port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_and_port() {
        let ep: Endpoint = "10.0.0.5:5000".parse().unwrap();
        assert_eq!(ep, Endpoint::new("10.0.0.5", 5000));
        assert_eq!(ep.to_string(), "10.0.0.5:5000");
    }

    #[test]
    fn test_parse_host_only_uses_default_port() {
        let ep: Endpoint = "tracker.example.org".parse().unwrap();
        assert_eq!(ep.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_ipv6() {
        let ep: Endpoint = "[::1]:7000".parse().unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, 7000);
        assert_eq!(ep.to_string(), "[::1]:7000");

        let bare: Endpoint = "::1".parse().unwrap();
        assert_eq!(bare.host, "::1");
        assert_eq!(bare.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("".parse::<Endpoint>().is_err());
        assert!(":5000".parse::<Endpoint>().is_err());
        assert!("host:0".parse::<Endpoint>().is_err());
        assert!("host:70000".parse::<Endpoint>().is_err());
        assert!("host:abc".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_validity() {
        assert!(Endpoint::new("h", 1).is_valid());
        assert!(!Endpoint::new("  ", 1).is_valid());
        assert!(!Endpoint::new("h", 0).is_valid());
    }
}
