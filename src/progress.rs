//! Progress reporting using indicatif.
//!
//! The core reports through [`ProgressCallback`]; the CLI plugs in
//! [`Progress`], which draws a spinner while scanning (the total is unknown
//! up front) and a bar while a mutation batch runs.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress updates from long-running operations.
pub trait ProgressCallback: Send + Sync {
    /// A phase (`"scanning"`, `"mutating"`) starts; `total` is 0 when unknown.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// `current` items (1-based) done; `path` is the latest.
    fn on_progress(&self, current: usize, path: &str);

    /// An item of `bytes` bytes finished.
    fn on_item_completed(&self, _bytes: u64) {}

    /// The phase ended.
    fn on_phase_end(&self, phase: &str);

    /// Free-form status text.
    fn on_message(&self, _message: &str) {}
}

#[derive(Default)]
struct State {
    bar: Option<ProgressBar>,
    bytes: u64,
}

/// Terminal progress reporter.
pub struct Progress {
    state: Mutex<State>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter; a quiet one draws nothing.
    ///
    /// ```
    /// use drivetidy::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            state: Mutex::new(State::default()),
            quiet,
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut State)) {
        if self.quiet {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        self.with_state(|state| {
            let bar = if total == 0 {
                let pb = ProgressBar::new_spinner();
                pb.set_style(Self::spinner_style());
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            } else {
                let pb = ProgressBar::new(total as u64);
                pb.set_style(Self::bar_style());
                pb
            };
            bar.set_message(phase.to_string());
            state.bar = Some(bar);
            state.bytes = 0;
        });
    }

    fn on_progress(&self, current: usize, path: &str) {
        self.with_state(|state| {
            if let Some(pb) = &state.bar {
                pb.set_position(current as u64);
                pb.set_message(truncate_path(path, 30));
            }
        });
    }

    fn on_item_completed(&self, bytes: u64) {
        self.with_state(|state| state.bytes += bytes);
    }

    fn on_phase_end(&self, phase: &str) {
        self.with_state(|state| {
            if let Some(pb) = state.bar.take() {
                pb.finish_with_message(format!("{phase} complete ({})", ByteSize::b(state.bytes)));
            }
        });
    }

    fn on_message(&self, message: &str) {
        self.with_state(|state| {
            if let Some(pb) = &state.bar {
                pb.set_message(message.to_string());
            }
        });
    }
}

/// Shorten `path` to its file name when longer than `max_len` bytes.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if file_name.chars().count() + 4 > max_len {
        let tail: String = {
            let chars: Vec<char> = file_name.chars().collect();
            chars[chars.len().saturating_sub(max_len.saturating_sub(3))..].iter().collect()
        };
        return format!("...{tail}");
    }
    format!(".../{file_name}")
}
