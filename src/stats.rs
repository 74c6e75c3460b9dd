//! Per-call statistics hook.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

/// Outcome of one logical call, including all of its retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStats {
    /// The action name, e.g. `"send_event"`.
    pub action: String,
    /// Wall-clock time from call start to the terminal outcome.
    pub elapsed: Duration,
    /// `false` iff the call returned an error.
    pub success: bool,
}

/// Receives a [`CallStats`] exactly once per call.
///
/// Sinks run inline on the calling task and should return quickly. A sink that
/// panics is contained; the panic is logged and the call result is unaffected.
///
/// ```
/// use livechat_webapi::stats::{CallStats, StatsSink};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let failures = Arc::new(AtomicUsize::new(0));
/// let counter = failures.clone();
/// let sink = move |stats: &CallStats| {
///     if !stats.success {
///         counter.fetch_add(1, Ordering::Relaxed);
///     }
/// };
/// # let _: &dyn StatsSink = &sink;
/// ```
pub trait StatsSink: Send + Sync {
    /// Records the outcome of a call.
    fn record(&self, stats: &CallStats);
}

impl<F> StatsSink for F
where
    F: Fn(&CallStats) + Send + Sync,
{
    fn record(&self, stats: &CallStats) {
        self(stats)
    }
}

/// Sink that discards everything. Used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl StatsSink for NoopSink {
    fn record(&self, _stats: &CallStats) {}
}

pub(crate) fn report(sink: &dyn StatsSink, action: &str, elapsed: Duration, success: bool) {
    let stats = CallStats {
        action: action.to_string(),
        elapsed,
        success,
    };
    if catch_unwind(AssertUnwindSafe(|| sink.record(&stats))).is_err() {
        tracing::error!(action = %action, "Stats sink panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_report_delivers_stats() {
        let seen = Mutex::new(Vec::new());
        let sink = |stats: &CallStats| seen.lock().unwrap().push(stats.clone());

        report(&sink, "send_event", Duration::from_millis(5), true);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].action, "send_event");
        assert!(seen[0].success);
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let sink = |_: &CallStats| panic!("sink failure");
        report(&sink, "get_chat", Duration::ZERO, false);
    }
}
