//! Logging setup for the fan controller

use fern::Dispatch;
use log::LevelFilter;

/// Setup logging with the specified verbosity level.
///
/// With `journal` set the timestamp is left out; journald stamps each line.
pub fn setup(verbosity: u8, journal: bool) -> Result<(), fern::InitError> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let dispatch = if journal {
        Dispatch::new().format(|out, message, record| {
            out.finish(format_args!("[{}] {}: {}", record.level(), record.target(), message))
        })
    } else {
        Dispatch::new().format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
    };

    dispatch.level(level).chain(std::io::stdout()).apply()?;

    Ok(())
}
