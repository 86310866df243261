//! The two concrete transports a `ProxyConnection`'s client end can be:
//! a plain TCP socket (used when exercising the proxy directly, without
//! going through the SSH tunnel) or a multiplexed SSH channel accepted
//! off the supervisor's reverse-forwarded session.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Minimal capability a `ProxyConnection` needs from its client-facing
/// socket: blocking read/write plus a way to bound how long a read may
/// block, so the connection's event loop can still notice inactivity
/// and shutdown signals.
pub trait ClientEnd: Read + Write + Send {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
    fn peer_label(&self) -> String;
}

impl ClientEnd for TcpStream {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        TcpStream::set_read_timeout(self, Some(timeout))
    }

    fn peer_label(&self) -> String {
        self.peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// A channel accepted off the SSH session's reverse port forward.
/// libssh2 is not safe for unsynchronized concurrent use across the
/// channels of one session, so every read/write/timeout call here takes
/// the shared session lock for its duration — channel I/O is effectively
/// serialized across connections, trading parallelism for correctness.
pub struct SshClientEnd {
    channel: ssh2::Channel,
    session: Arc<Mutex<ssh2::Session>>,
    label: String,
}

impl SshClientEnd {
    pub fn new(channel: ssh2::Channel, session: Arc<Mutex<ssh2::Session>>, label: String) -> Self {
        Self {
            channel,
            session,
            label,
        }
    }
}

impl Read for SshClientEnd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        self.channel.read(buf)
    }
}

impl Write for SshClientEnd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        self.channel.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let _session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        self.channel.flush()
    }
}

impl ClientEnd for SshClientEnd {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session.set_timeout(timeout.as_millis() as u32);
        Ok(())
    }

    fn peer_label(&self) -> String {
        self.label.clone()
    }
}

unsafe impl Send for SshClientEnd {}
