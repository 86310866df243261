//! Structured logging: RFC3339 timestamps, colored levels, dual sink
//! (stdout + log file). Same shape as `crates/rproxy/src/init/logger.rs`,
//! generalized to take a `log::LevelFilter` (clap already parses
//! verbosity into one, so there's no string level to re-parse here).

use anyhow::Result;
use fern::colors::{Color, ColoredLevelConfig};

pub fn init(level: log::LevelFilter, colored: bool) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .trace(Color::Magenta)
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Utc::now().to_rfc3339(),
                if colored {
                    colors.color(record.level()).to_string()
                } else {
                    record.level().to_string()
                },
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .chain(fern::log_file("devtunnel.log")?)
        .apply()?;
    Ok(())
}
