//! Daemonization, pidfile handling and `--terminate`, mirroring
//! `Tunnel.daemonize`/`write_pid_file`/`delete_pid_file`/`terminate` in
//! `appurify/tunnel.py`. Unix-only, same as the original (`win32` is a
//! no-op there); the fork/setsid/umask/dup2 sequence is the textbook
//! double-fork daemonization the original performs with `os.fork()`.

use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
pub fn daemonize() -> anyhow::Result<()> {
    use std::ffi::CString;

    unsafe {
        let pid = libc::fork();
        if pid < 0 {
            anyhow::bail!("fork#1 failed: {}", std::io::Error::last_os_error());
        }
        if pid > 0 {
            std::process::exit(0);
        }

        if libc::setsid() < 0 {
            anyhow::bail!("setsid failed: {}", std::io::Error::last_os_error());
        }
        libc::umask(0o022);

        let pid = libc::fork();
        if pid < 0 {
            anyhow::bail!("fork#2 failed: {}", std::io::Error::last_os_error());
        }
        if pid > 0 {
            std::process::exit(0);
        }

        // The original skips stdio redirection on darwin; macOS's fork()
        // inside a process that has already touched Foundation/Cocoa
        // state can deadlock on redirecting stdio post-fork.
        if !cfg!(target_os = "macos") {
            let devnull = CString::new("/dev/null").unwrap();
            let fd = libc::open(devnull.as_ptr(), libc::O_RDWR);
            if fd >= 0 {
                libc::dup2(fd, libc::STDIN_FILENO);
                libc::dup2(fd, libc::STDOUT_FILENO);
                libc::dup2(fd, libc::STDERR_FILENO);
                if fd > libc::STDERR_FILENO {
                    libc::close(fd);
                }
            }
        }
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn daemonize() -> anyhow::Result<()> {
    log::warn!("daemon mode is not supported on this platform");
    Ok(())
}

pub fn default_pidfile_path() -> PathBuf {
    std::env::temp_dir().join(format!("devtunnel-{}.pid", std::process::id()))
}

pub fn write_pidfile(path: &Path) -> anyhow::Result<()> {
    let pid = std::process::id();
    log::info!("writing pid {pid} to {}", path.display());
    fs::write(path, pid.to_string())?;
    Ok(())
}

pub fn delete_pidfile(path: &Path) {
    log::info!("deleting pid file {}", path.display());
    if let Err(e) = fs::remove_file(path) {
        log::warn!("failed to remove pid file {}: {e}", path.display());
    }
}

/// On-exit hook for the pidfile (spec §4.4, §5): deletes the file on
/// drop, including on unwind, so a panic inside the supervised run
/// doesn't leave a stale pidfile behind.
pub struct PidFileGuard {
    path: PathBuf,
}

impl PidFileGuard {
    pub fn create(path: PathBuf) -> anyhow::Result<Self> {
        write_pidfile(&path)?;
        Ok(Self { path })
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        delete_pidfile(&self.path);
    }
}

/// `--terminate`: send SIGTERM to the pid named directly or read out of
/// the pidfile, then probe with signal 0 to confirm it died.
pub fn terminate(pid: Option<u32>, pidfile: Option<&Path>) -> anyhow::Result<()> {
    let pid = match pid {
        Some(p) => Some(p),
        None => pidfile.and_then(|p| {
            fs::read_to_string(p)
                .ok()
                .and_then(|s| s.trim().parse().ok())
        }),
    };

    let Some(pid) = pid else {
        log::warn!("neither --pid nor --pid-file point to a pid");
        return Ok(());
    };

    #[cfg(unix)]
    {
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            log::warn!(
                "failed to terminate {pid}: {}",
                std::io::Error::last_os_error()
            );
            return Ok(());
        }

        std::thread::sleep(std::time::Duration::from_secs(1));

        let still_alive = unsafe { libc::kill(pid as libc::pid_t, 0) } == 0;
        if still_alive {
            log::warn!("failed to terminate pid {pid}, try SIGKILL");
        } else {
            log::info!("successfully terminated pid {pid}");
        }
    }

    #[cfg(not(unix))]
    {
        log::warn!("terminate by pid is not supported on this platform");
        let _ = pid;
    }

    Ok(())
}
