//! Terminal progress bars for covariate scans.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tidycov_data::Progress;

/// Renders stage progress as an indicatif bar on stderr.
#[derive(Debug, Clone)]
pub(crate) struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub(crate) fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Progress for BarProgress {
    fn start(&self, stage: &str, total: Option<u64>) {
        let style = match total {
            Some(total) => {
                self.bar.set_length(total);
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░")
            }
            None => ProgressStyle::default_spinner(),
        };
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar.set_style(style);
        self.bar.reset();
        self.bar.enable_steady_tick(Duration::from_millis(100));
        self.bar.set_message(format!("{} covariates", stage));
    }

    fn advance(&self, count: u64) {
        self.bar.inc(count);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
