//! Progress bar rendering for transfer runs.

use std::io::Write;
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use nxtransfer_core::errors::TransferError;
use nxtransfer_core::pipeline::ProgressObserver;

use crate::style;

const TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// An `indicatif` bar driven by the pipeline. Failures are written above
/// the bar as they happen, and still reach stderr when the bar is hidden
/// because stderr is not a terminal.
pub struct BarProgress {
    bar: ProgressBar,
    label: &'static str,
    failures: Mutex<Box<dyn Write + Send>>,
}

impl BarProgress {
    /// The bar stays hidden until the pipeline starts, so runs with nothing
    /// to transfer draw nothing.
    pub fn new(label: &'static str) -> Self {
        Self::with_failure_writer(label, Box::new(std::io::stderr()))
    }

    fn with_failure_writer(label: &'static str, failures: Box<dyn Write + Send>) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            label,
            failures: Mutex::new(failures),
        }
    }
}

impl ProgressObserver for BarProgress {
    fn start(&self, total: usize) {
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        self.bar.set_style(style);
        self.bar.set_length(total as u64);
        self.bar.set_message(self.label);
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    fn advance(&self) {
        self.bar.inc(1);
    }

    fn failure(&self, label: &str, error: &TransferError) {
        let line = style::error(&format!("{}: {}", label, error));
        self.bar.suspend(|| {
            if let Ok(mut out) = self.failures.lock() {
                let _ = writeln!(out, "{}", line);
            }
        });
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failure_printed_when_bar_hidden() {
        let buf = SharedBuf::default();
        let progress = BarProgress::with_failure_writer("Importing", Box::new(buf.clone()));
        progress.start(3);
        progress.bar.set_draw_target(ProgressDrawTarget::hidden());
        assert!(progress.bar.is_hidden());

        let error = TransferError::Abandoned("connection reset".into());
        progress.failure("/import/a.jar", &error);
        progress.advance();
        progress.finish();

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.contains("/import/a.jar"));
        assert!(written.contains("connection reset"));
    }
}
