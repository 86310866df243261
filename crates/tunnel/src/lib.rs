use anyhow::Result;

pub mod cmd;
pub mod control;
pub mod error;
pub mod http;
pub mod init;
pub mod proxy;
pub mod supervisor;

use control::ControlClient;
use supervisor::daemon;
use supervisor::TunnelSupervisor;

/// Top-level entry point, mirroring `init()`/`Tunnel.run()` in
/// `appurify/tunnel.py`: parse flags, handle `--terminate` as its own
/// short-circuit path, daemonize if asked, then reserve/dial/serve until
/// shutdown or the retry budget is exhausted.
pub async fn run() -> Result<()> {
    let args = init::cmd::init()?;

    if args.terminate {
        daemon::terminate(args.pid, args.pid_file.as_deref())?;
        return Ok(());
    }

    let credentials = args.credentials().map_err(|e| anyhow::anyhow!(e))?;

    if args.daemon {
        daemon::daemonize()?;
    }

    let pidfile_path = args
        .pid_file
        .clone()
        .unwrap_or_else(daemon::default_pidfile_path);
    let _pidfile_guard = daemon::PidFileGuard::create(pidfile_path)?;

    let shutdown = init::shutdown::init()?;
    let control = ControlClient::new(credentials);
    let supervisor = TunnelSupervisor::new(control, shutdown.flag());

    // `TunnelSupervisor::run` is blocking top to bottom (ssh2 has no
    // async story); hand it to smol's blocking pool so signal handling
    // and the shutdown future keep running on the executor. `_pidfile_guard`
    // deletes the pidfile on drop, including if this panics.
    let result = smol::unblock(move || supervisor.run()).await;

    match &result {
        Ok(()) => log::info!("shutting down tunnel, start again if required ..."),
        Err(e) => log::error!("tunnel exited with error: {e}"),
    }
    result
}
