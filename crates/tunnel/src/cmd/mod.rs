//! Command-line surface, mirroring `init()`/`argparse` in
//! `appurify/tunnel.py`: either `--api-key`/`--api-secret` or
//! `--username`/`--password` is required unless `--terminate` is given.
//!
//! The teacher's own CLI layer is built on a `sarge!` macro backed by a
//! path dependency (`sarge = { path = "/Users/unic/dev/projs/rs/sarge" }`)
//! that cannot be fetched outside its author's machine. `clap`'s derive
//! API is used here instead — it covers the same ground (flags, help
//! text, custom value parsing) and is the crate the rest of this pack
//! reaches for when a real CLI is involved.

use std::path::PathBuf;

use clap::Parser;

use crate::control::Credentials;

#[derive(Debug, Parser)]
#[command(
    name = "devtunnel",
    version,
    about = "Reverse HTTP/HTTPS tunnel client",
    long_about = None,
)]
pub struct Args {
    /// Developer API key.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Developer API secret.
    #[arg(long)]
    pub api_secret: Option<String>,

    /// Developer account username, used together with --password.
    #[arg(long)]
    pub username: Option<String>,

    /// Developer account password, used together with --username.
    #[arg(long)]
    pub password: Option<String>,

    /// Save the running process's pid to this file.
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// Run in the background (unix only).
    #[arg(long, default_value_t = false)]
    pub daemon: bool,

    /// Pid of a running tunnel session to terminate.
    #[arg(long)]
    pub pid: Option<u32>,

    /// Terminate the process identified by --pid or --pid-file and exit.
    #[arg(long, default_value_t = false)]
    pub terminate: bool,

    /// Verbosity: repeat for more detail (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// `(api-key, api-secret)` or `(username, password)`, validated as a
    /// pair the way the original's `argparse` epilogue does.
    pub fn credentials(&self) -> Result<Credentials, String> {
        if let (Some(key), Some(secret)) = (&self.api_key, &self.api_secret) {
            return Ok(Credentials::ApiKey {
                key: key.clone(),
                secret: secret.clone(),
            });
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            return Ok(Credentials::Password {
                username: username.clone(),
                password: password.clone(),
            });
        }
        Err("--api-key and --api-secret OR --username and --password is required".to_string())
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
