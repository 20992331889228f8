//! Progress reporting and cooperative cancellation
//!
//! Long-running work reports a completion ratio in `[0, 1]` and polls
//! [`Feedback::is_canceled`] at its checkpoints. Nothing is ever interrupted
//! from the outside; a canceled run simply stops at its next checkpoint.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Receiver of progress updates and source of cancellation requests
pub trait Feedback {
    /// Report progress as a ratio in `[0, 1]`
    fn set_progress(&self, fraction: f64);

    /// Describe what is currently being done
    fn set_progress_text(&self, _text: &str) {}

    /// Whether the caller asked to stop
    fn is_canceled(&self) -> bool;
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type ProgressCallback = Box<dyn Fn(f64) + Send + Sync>;
type TextCallback = Box<dyn Fn(&str) + Send + Sync>;

/// General purpose feedback: remembers the last progress value and text,
/// forwards updates to optional callbacks and watches a cancellation token.
#[derive(Default)]
pub struct ProgressFeedback {
    token: CancellationToken,
    progress: AtomicU64,
    text: Mutex<String>,
    on_progress: Option<ProgressCallback>,
    on_text: Option<TextCallback>,
}

impl ProgressFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn on_text(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_text = Some(Box::new(callback));
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Last reported progress
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }

    /// Last reported progress text
    pub fn text(&self) -> String {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl Feedback for ProgressFeedback {
    fn set_progress(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.progress.store(fraction.to_bits(), Ordering::Relaxed);
        if let Some(cb) = &self.on_progress {
            cb(fraction);
        }
    }

    fn set_progress_text(&self, text: &str) {
        if let Ok(mut current) = self.text.lock() {
            current.clear();
            current.push_str(text);
        }
        if let Some(cb) = &self.on_text {
            cb(text);
        }
    }

    fn is_canceled(&self) -> bool {
        self.token.is_canceled()
    }
}

/// Feedback that never cancels and discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedback;

impl Feedback for NoFeedback {
    fn set_progress(&self, _fraction: f64) {}

    fn is_canceled(&self) -> bool {
        false
    }
}

/// Splits a parent feedback into equally weighted steps.
///
/// Progress reported while step `k` (zero based) of `n` is current maps to
/// `(k + fraction) / n` on the parent.
pub struct MultiStepFeedback<'a> {
    parent: &'a dyn Feedback,
    steps: usize,
    current: Cell<usize>,
}

impl<'a> MultiStepFeedback<'a> {
    pub fn new(steps: usize, parent: &'a dyn Feedback) -> Self {
        Self {
            parent,
            steps: steps.max(1),
            current: Cell::new(0),
        }
    }

    /// Move to a step; progress restarts at zero within it
    pub fn set_current_step(&self, step: usize) {
        self.current.set(step.min(self.steps));
        self.set_progress(0.0);
    }

    pub fn current_step(&self) -> usize {
        self.current.get()
    }

    pub fn step_count(&self) -> usize {
        self.steps
    }
}

impl Feedback for MultiStepFeedback<'_> {
    fn set_progress(&self, fraction: f64) {
        let overall = (self.current.get() as f64 + fraction.clamp(0.0, 1.0)) / self.steps as f64;
        self.parent.set_progress(overall.min(1.0));
    }

    fn set_progress_text(&self, text: &str) {
        self.parent.set_progress_text(text);
    }

    fn is_canceled(&self) -> bool {
        self.parent.is_canceled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_progress_feedback_records_and_forwards() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fb = ProgressFeedback::new().on_progress(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        fb.set_progress(0.25);
        fb.set_progress(7.0);
        fb.set_progress_text("Collecting errors");

        assert_eq!(fb.progress(), 1.0);
        assert_eq!(fb.text(), "Collecting errors");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let fb = ProgressFeedback::new().with_token(token.clone());
        assert!(!fb.is_canceled());
        token.cancel();
        assert!(fb.is_canceled());
    }

    #[test]
    fn test_multi_step_mapping() {
        let parent = ProgressFeedback::new();
        let steps = MultiStepFeedback::new(4, &parent);
        steps.set_current_step(2);
        steps.set_progress(0.5);
        assert!((parent.progress() - 0.625).abs() < 1e-12);

        steps.set_current_step(4);
        assert_eq!(parent.progress(), 1.0);
    }
}
