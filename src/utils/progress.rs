use crossbeam::channel::Sender;

/// Progress notification emitted at iteration boundaries.
///
/// Carries no correctness obligation; receivers may drop or throttle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: &'static str,
    pub done: usize,
    pub total: usize,
}

/// Sends a progress event if a channel is attached, ignoring send failures.
pub fn report(
    progress: Option<&Sender<ProgressEvent>>,
    stage: &'static str,
    done: usize,
    total: usize,
) {
    if let Some(tx) = progress {
        let _ = tx.send(ProgressEvent { stage, done, total });
    }
}
