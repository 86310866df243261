//! Named error taxonomy (spec §7). Everything else funnels through `anyhow::Error`.

use std::fmt;

/// Control endpoint returned non-200 or the request itself failed.
#[derive(Debug)]
pub struct ReservationError(pub String);

impl fmt::Display for ReservationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reservation failed: {}", self.0)
    }
}
impl std::error::Error for ReservationError {}

/// SSH handshake or authentication failed.
#[derive(Debug)]
pub struct SshDialError(pub String);

impl fmt::Display for SshDialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ssh dial failed: {}", self.0)
    }
}
impl std::error::Error for SshDialError {}

/// Upstream TCP dial failed inside a worker; reported to the client as 502.
#[derive(Debug)]
pub struct ProxyConnectFailed(pub String);

impl fmt::Display for ProxyConnectFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for ProxyConnectFailed {}

/// Malformed HTTP on either side of a ProxyConnection.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub which: &'static str,
    pub reason: String,
}

impl ParseError {
    pub fn new(which: &'static str, reason: impl Into<String>) -> Self {
        Self {
            which,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed {}: {}", self.which, self.reason)
    }
}
impl std::error::Error for ParseError {}

/// Session-level fault in the supervisor's accept loop; triggers a bounded restart.
#[derive(Debug)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.0)
    }
}
impl std::error::Error for TransportError {}
