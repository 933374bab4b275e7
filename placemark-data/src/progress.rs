//! Optional progress reporting for long-running operations.

/// Receives human-readable progress updates.
///
/// Implementations must not influence the operation they observe.
pub trait ProgressSink {
    /// Report that `title` has reached `message`.
    fn update(&self, title: &str, message: &str);
}

/// Sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _title: &str, _message: &str) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&str, &str),
{
    fn update(&self, title: &str, message: &str) {
        self(title, message);
    }
}
