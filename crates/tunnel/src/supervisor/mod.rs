//! `TunnelSupervisor`: reserve a slot, dial out over SSH, ask the remote
//! end to forward a port back to us, and hand every accepted channel to a
//! `ProxyConnection` worker. Grounded in `Tunnel.start`/`Tunnel.stop` in
//! `appurify/tunnel.py` — the accept loop there is a `transport.accept()`
//! poll wrapped in a `while True`, workers are daemon threads, and a
//! handful of OS-level exceptions flip a `restart` flag bounded by
//! `MAX_RETRIES`.

pub mod daemon;
pub mod rsa_key;

use std::net::TcpStream as StdTcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ssh2::Session;

use crate::control::{ControlClient, ReservationResponse};
use crate::error::{SshDialError, TransportError};
use crate::proxy::{ProxyConnection, SshClientEnd};

/// How long `transport.accept()` blocks per iteration before re-checking
/// the shutdown flag. Mirrors `ACCEPT_TIMEOUT` in the original.
const ACCEPT_TIMEOUT: Duration = Duration::from_millis(1000);
/// Bounds `Tunnel.stop`'s restart loop.
const MAX_RETRIES: u32 = 5;

pub struct TunnelSupervisor {
    control: ControlClient,
    shutdown: Arc<AtomicBool>,
}

impl TunnelSupervisor {
    pub fn new(control: ControlClient, shutdown: Arc<AtomicBool>) -> Self {
        Self { control, shutdown }
    }

    /// Runs until shutdown is requested or retries are exhausted,
    /// unreserving the tunnel resource on the way out either way.
    pub fn run(&self) -> anyhow::Result<()> {
        let mut retry = 0u32;
        let mut reservation: Option<ReservationResponse> = None;

        let result = loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break Ok(());
            }

            retry += 1;
            let r = match &reservation {
                Some(r) => r,
                None => {
                    let r = self.control.reserve()?;
                    log::info!(
                        "reserved tunnel resource #{} on {}",
                        r.proxy_port,
                        r.ssh_host
                    );
                    reservation = Some(r);
                    reservation.as_ref().unwrap()
                }
            };

            match self.run_one_session(r) {
                Ok(()) => break Ok(()),
                Err(e) if retry < MAX_RETRIES && !self.shutdown.load(Ordering::SeqCst) => {
                    log::warn!("session fault, restarting (attempt {retry}/{MAX_RETRIES}): {e}");
                    continue;
                }
                Err(e) => break Err(e),
            }
        };

        if let Some(r) = reservation {
            log::info!("unreserving tunnel resource #{} ...", r.proxy_port);
            if let Err(e) = self.control.unreserve(r.proxy_port) {
                log::warn!("failed to unreserve tunnel resource #{}: {e}", r.proxy_port);
            }
        }

        result
    }

    fn run_one_session(&self, reservation: &ReservationResponse) -> anyhow::Result<()> {
        log::info!("establishing tunnel into remote infrastructure ...");
        let tcp = StdTcpStream::connect((reservation.ssh_host.as_str(), reservation.ssh_port))
            .map_err(|e| SshDialError(format!("tcp dial failed: {e}")))?;
        tcp.set_nodelay(true).ok();

        let mut session = Session::new().map_err(|e| SshDialError(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| SshDialError(format!("handshake failed: {e}")))?;

        let pem = rsa_key::rebuild_private_key_pem(&reservation.key)?;
        session
            .userauth_pubkey_memory(&reservation.ssh_user, None, &pem, None)
            .map_err(|e| SshDialError(format!("authentication failed: {e}")))?;
        if !session.authenticated() {
            return Err(SshDialError("authentication did not succeed".to_string()).into());
        }

        session.set_timeout(ACCEPT_TIMEOUT.as_millis() as u32);
        let (mut listener, bound_port) = session
            .channel_forward_listen(reservation.proxy_port as u32, None, None)
            .map_err(|e| SshDialError(format!("remote port forward failed: {e}")))?;
        log::info!("tunnel established successfully, forwarding remote port {bound_port}");

        let session = Arc::new(Mutex::new(session));

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(());
            }

            match listener.accept() {
                Ok(channel) => {
                    let label = format!("{}:{}", reservation.ssh_host, bound_port);
                    let client = SshClientEnd::new(channel, session.clone(), label);
                    std::thread::spawn(move || {
                        ProxyConnection::new(client).serve_blocking();
                    });
                }
                Err(e) if is_timeout(&e) => continue,
                Err(e) => return Err(TransportError(format!("accept failed: {e}")).into()),
            }
        }
    }
}

/// libssh2 surfaces the session-wide read timeout as a plain `Error`;
/// there is no dedicated error kind, so match on message text the way
/// the handful of ssh2 consumers in the wild do.
fn is_timeout(err: &ssh2::Error) -> bool {
    err.message().to_ascii_lowercase().contains("timeout") || err.message().to_ascii_lowercase().contains("timed out")
}
