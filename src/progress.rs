//! Progress reporting for long running steps.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_millis(80);

/// Sink for step progress: start, update the message, stop with an outcome.
pub trait Progress: Send + Sync {
    fn start(&self, message: &str);
    fn update(&self, message: &str);
    fn stop(&self, success: bool);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl Progress for SilentProgress {
    fn start(&self, _message: &str) {}
    fn update(&self, _message: &str) {}
    fn stop(&self, _success: bool) {}
}

/// Spinner on stderr. When stderr is not a terminal the bar is hidden and
/// only the final `✓`/`✘` line is printed.
pub struct Spinner {
    bar: Mutex<Option<ProgressBar>>,
    hidden: bool,
}

impl Spinner {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            hidden: false,
        }
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self {
            bar: Mutex::new(None),
            hidden: true,
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        let target = if self.hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        let bar = ProgressBar::with_draw_target(None, target);
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(TICK_INTERVAL);
        bar
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for Spinner {
    fn start(&self, message: &str) {
        let mut current = self.current();
        if let Some(previous) = current.take() {
            previous.abandon();
        }
        *current = Some(self.spinner(message));
    }

    fn update(&self, message: &str) {
        if let Some(bar) = self.current().as_ref() {
            bar.set_message(message.to_string());
        }
    }

    fn stop(&self, success: bool) {
        let Some(bar) = self.current().take() else {
            return;
        };
        let message = bar.message();
        if bar.is_hidden() {
            bar.finish_and_clear();
            if !self.hidden {
                eprintln!("{} {}", if success { "✓" } else { "✘" }, message);
            }
        } else if success {
            bar.finish_with_message(format!("{} {}", "✓".green(), message));
        } else {
            bar.finish_with_message(format!("{} {}", "✘".red(), message));
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(bar) = self.current().take() {
            bar.abandon();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_lifecycle() {
        let spinner = Spinner::hidden();
        spinner.start("Cloning digits...");
        spinner.update("Updating digits...");
        assert_eq!(
            spinner.current().as_ref().map(|bar| bar.message()),
            Some("Updating digits...".to_string())
        );
        spinner.stop(true);
        assert!(spinner.current().is_none());
    }

    #[test]
    fn test_spinner_restart_replaces_bar() {
        let spinner = Spinner::hidden();
        spinner.start("First...");
        spinner.start("Second...");
        assert_eq!(
            spinner.current().as_ref().map(|bar| bar.message()),
            Some("Second...".to_string())
        );
        spinner.stop(false);
        spinner.stop(false);
        assert!(spinner.current().is_none());
    }

    #[test]
    fn test_update_before_start_is_ignored() {
        let spinner = Spinner::hidden();
        spinner.update("nothing running");
        assert!(spinner.current().is_none());
    }

    #[test]
    fn test_silent_progress_is_a_no_op() {
        let progress = SilentProgress;
        progress.start("x");
        progress.update("y");
        progress.stop(false);
    }
}
