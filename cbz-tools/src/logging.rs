use std::{
    io::{self, IsTerminal, Write},
    sync::Mutex,
};

use clap::{ArgAction, Args};
use indicatif::ProgressBar;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// The progress bar currently drawn, log lines are printed above it
static ACTIVE_PROGRESS: Mutex<Option<ProgressBar>> = Mutex::new(None);

#[derive(Debug, Clone, Copy, Default, Args)]
pub struct Verbosity {
    /// More output (-v debug, -vv trace), RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

impl Verbosity {
    #[must_use]
    pub fn new(verbose: u8, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    #[must_use]
    pub fn level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::WARN;
        }

        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

/// Sets up colored logs on stderr
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.level().into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(|| LogWriter)
        .init();
}

pub(crate) fn set_active_progress(progress: Option<ProgressBar>) {
    if let Ok(mut active) = ACTIVE_PROGRESS.lock() {
        *active = progress;
    }
}

/// Writes to stderr, hiding the active progress bar while doing so
struct LogWriter;

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let progress = ACTIVE_PROGRESS
            .lock()
            .ok()
            .and_then(|active| active.clone());

        match progress {
            Some(progress) => progress.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels() {
        assert_eq!(Verbosity::default().level(), LevelFilter::INFO);
        assert_eq!(Verbosity::new(1, false).level(), LevelFilter::DEBUG);
        assert_eq!(Verbosity::new(5, false).level(), LevelFilter::TRACE);
        assert_eq!(Verbosity::new(0, true).level(), LevelFilter::WARN);
    }
}
