//! Graceful shutdown coordination, extended to react to SIGTERM and
//! SIGHUP in addition to Ctrl-C — the original's
//! `Tunnel.setup_signal_handlers` installs all three (skipping SIGHUP only
//! on win32), where the teacher's `ctrlc2` only covers SIGINT. Workers are
//! detached and never joined on shutdown (spec §5), so this tracks only a
//! single shared flag rather than an in-flight count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

mod ctrlc;
mod posix_signals;

pub fn init() -> Result<GracefulShutdown> {
    let shutdown = GracefulShutdown::new();

    let ctrlc_signal = ctrlc::init()?;
    termination_on_ctrlc(ctrlc_signal, shutdown.clone());

    #[cfg(unix)]
    posix_signals::spawn(shutdown.clone())?;

    Ok(shutdown)
}

fn termination_on_ctrlc(ctrlc_signal: ctrlc2::AsyncCtrlC, shutdown: GracefulShutdown) {
    smol::spawn(async move {
        let _ = ctrlc_signal.await;
        log::info!("shutdown requested (Ctrl+C), waiting for in-flight connections ...");
        shutdown.initiate();
    })
    .detach();
}

#[derive(Clone, Debug)]
pub struct GracefulShutdown {
    shutting_down: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self {
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn initiate(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// A plain `Arc<AtomicBool>` mirroring `is_shutting_down`, for
    /// blocking code (the supervisor's accept loop, connection workers)
    /// that has no async executor to poll.
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.shutting_down.clone()
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}
