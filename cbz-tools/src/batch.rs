use std::fmt::Display;

use camino::{Utf8Path, Utf8PathBuf};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{error, info, warn};

use crate::{logging::set_active_progress, Error, Result};

/// What happened to a single input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done(String),
    Skipped(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub done: usize,
    pub skipped: usize,
    pub failed: Vec<(Utf8PathBuf, String)>,
}

impl BatchReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.done + self.skipped + self.failed.len()
    }

    /// ## Errors
    ///
    /// Fails if at least one input failed
    pub fn into_result(self) -> Result<()> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(Error::BatchFailed {
                failed: self.failed.len(),
                total: self.total(),
            })
        }
    }
}

/// Processes the inputs one after the other, a failing input doesn't stop the batch
#[derive(Debug, Clone, Copy, Default)]
pub struct Batch {
    hide_progress: bool,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn hide_progress(mut self, hide: bool) -> Self {
        self.hide_progress = hide;
        self
    }

    pub fn run<F, E>(&self, inputs: &[Utf8PathBuf], mut process: F) -> BatchReport
    where
        F: FnMut(&Utf8Path) -> Result<Outcome, E>,
        E: Display,
    {
        let progress = self.progress_bar(inputs.len());
        set_active_progress(Some(progress.clone()));

        let mut report = BatchReport::default();
        for input in inputs {
            progress.set_message(input.file_name().unwrap_or(input.as_str()).to_string());

            match process(input) {
                Ok(Outcome::Done(message)) => {
                    info!("{input}: {message}");
                    report.done += 1;
                }
                Ok(Outcome::Skipped(reason)) => {
                    warn!("{input}: skipped, {reason}");
                    report.skipped += 1;
                }
                Err(err) => {
                    let err = format!("{err:#}");
                    error!("{input}: {err}");
                    report.failed.push((input.clone(), err));
                }
            }

            progress.inc(1);
        }

        progress.finish_and_clear();
        set_active_progress(None);

        info!(
            "{} done, {} skipped, {} failed",
            report.done,
            report.skipped,
            report.failed.len()
        );

        report
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        let progress = ProgressBar::new(len as u64);
        if self.hide_progress {
            progress.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) =
            ProgressStyle::with_template("[{elapsed_precise}] [{wide_bar}] {pos}/{len} {msg}")
        {
            progress.set_style(style);
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_do_not_stop_the_batch() {
        let inputs = ["a.cbr", "b.cbr", "c.cbr", "d.cbr"].map(Utf8PathBuf::from);
        let mut seen = Vec::new();

        let report = Batch::new()
            .hide_progress(true)
            .run(&inputs, |input| {
                seen.push(input.to_string());
                match input.as_str() {
                    "a.cbr" | "d.cbr" => Ok(Outcome::Done("converted".into())),
                    "b.cbr" => Ok(Outcome::Skipped("already cbz".into())),
                    _ => Err("unrar failed"),
                }
            });

        assert_eq!(seen, ["a.cbr", "b.cbr", "c.cbr", "d.cbr"]);
        assert_eq!(report.done, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            report.failed,
            [(Utf8PathBuf::from("c.cbr"), "unrar failed".to_string())]
        );
        assert!(matches!(
            report.into_result(),
            Err(Error::BatchFailed {
                failed: 1,
                total: 4
            })
        ));
    }

    #[test]
    fn skipped_inputs_are_not_failures() {
        let inputs = [Utf8PathBuf::from("a.cbz")];
        let report = Batch::new()
            .hide_progress(true)
            .run(&inputs, |_| Ok::<_, String>(Outcome::Skipped("exists".into())));
        assert!(report.into_result().is_ok());
    }
}
