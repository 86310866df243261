use anyhow::Result;
use clap::Parser;

use crate::cmd::Args;
use crate::init::logger;

/// Parses CLI flags and turns on logging before anything else runs,
/// mirroring `init::cmd::init` in `crates/httproxy`.
pub fn init() -> Result<Args> {
    let args = Args::parse();
    logger::init(args.log_level(), false)?;
    log::debug!("{args:?}");
    Ok(args)
}
