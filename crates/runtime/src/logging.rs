use std::thread;

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::PROGRAM_LOG_LEVEL;

/// Stateless stderr logger. The daemon runs as a handful of named
/// long-lived threads (store-writer, watcher, reconciler, net-rescan,
/// handler-N), so every line carries the thread name as a role tag;
/// that is usually more useful than the module path when reading
/// interleaved output.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        eprintln!(
            "{timestamp} {:<5} [{}] {}: {}",
            record.level(),
            role_tag(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// The current thread's role. Worker threads are all spawned with a
/// name; an anonymous thread shows up as `-`.
fn role_tag() -> String {
    thread::current().name().unwrap_or("-").to_owned()
}

/// Verbosity from `NIXNAV_LOG_LEVEL`. Unset or unrecognised values
/// default to `warn`; `off` silences the daemon entirely.
fn level_from_env() -> LevelFilter {
    let value = std::env::var(PROGRAM_LOG_LEVEL).map(|v| v.to_ascii_lowercase());
    match value.as_deref() {
        Ok("off") => LevelFilter::Off,
        Ok("error") => LevelFilter::Error,
        Ok("warn") => LevelFilter::Warn,
        Ok("info") => LevelFilter::Info,
        Ok("debug") => LevelFilter::Debug,
        Ok("trace") => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    }
}

/// Installs the stderr logger at the environment-selected level.
/// A second call fails (the global logger is set once per process);
/// callers that do not care discard the result.
pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level_from_env());
    Ok(())
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
