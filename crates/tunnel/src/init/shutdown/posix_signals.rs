//! SIGTERM/SIGHUP handling, matching `Tunnel.setup_signal_handlers` in
//! `appurify/tunnel.py` (SIGINT is handled separately via `ctrlc2`,
//! matching the teacher's existing wiring). `signal-hook`'s iterator
//! runs on its own OS thread since signal delivery can't be awaited
//! directly; results are bridged onto an `async-channel` so the rest of
//! shutdown stays on the `smol` side, the same way `ctrlc2`'s future is
//! awaited inside a `smol::spawn`.

use std::thread;

use anyhow::Result;
use signal_hook::consts::{SIGHUP, SIGTERM};
use signal_hook::iterator::Signals;

use super::GracefulShutdown;

pub fn spawn(shutdown: GracefulShutdown) -> Result<()> {
    let mut signals = Signals::new([SIGTERM, SIGHUP])?;
    let (tx, rx) = async_channel::bounded::<i32>(4);

    thread::spawn(move || {
        for sig in signals.forever() {
            if tx.send_blocking(sig).is_err() {
                break;
            }
        }
    });

    smol::spawn(async move {
        while let Ok(sig) = rx.recv().await {
            log::info!("received signal {sig}, stopping tunnel ...");
            shutdown.initiate();
        }
    })
    .detach();

    Ok(())
}
