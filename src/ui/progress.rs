//! Progress indicators and spinner styles

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Blue spinner style for sync passes
pub fn sync_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Create a spinner shown while a queue is being replayed
pub fn create_sync_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(sync_spinner_style());
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
