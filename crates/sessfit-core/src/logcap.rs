use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{error, info, warn};

/// Per-job log capture.
///
/// Each job run gets its own buffer so that concurrent jobs never interleave
/// inside each other's captured output. Every line is also mirrored to the
/// process-level `tracing` subscriber. The handle is cheap to clone; the
/// scheduler keeps one clone so the buffer stays readable even when the
/// analysis panics mid-run.
#[derive(Debug, Clone, Default)]
pub struct JobLog {
    buf: Arc<Mutex<String>>,
}

impl JobLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        info!("{msg}");
        self.append("INFO", msg);
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        warn!("{msg}");
        self.append("WARNING", msg);
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        error!("{msg}");
        self.append("ERROR", msg);
    }

    fn append(&self, level: &str, msg: &str) {
        let line = format!(
            "{} - {} - {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            level,
            msg
        );
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(&line);
    }

    /// Non-destructive copy of everything captured so far.
    pub fn contents(&self) -> String {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_carry_level_and_message() {
        let log = JobLog::new();
        log.info("starting fit");
        log.warn("few trials");
        log.error("boom");

        let text = log.contents();
        assert!(text.contains("INFO - starting fit"));
        assert!(text.contains("WARNING - few trials"));
        assert!(text.contains("ERROR - boom"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_clones_share_one_buffer() {
        let log = JobLog::new();
        let handle = log.clone();
        handle.info("from the worker side");
        assert!(log.contents().contains("from the worker side"));
    }

    #[test]
    fn test_separate_logs_stay_isolated() {
        let a = JobLog::new();
        let b = JobLog::new();
        a.info("job a only");
        b.info("job b only");
        assert!(!a.contents().contains("job b only"));
        assert!(!b.contents().contains("job a only"));
    }

    #[test]
    fn test_contents_survive_a_panicking_writer() {
        let log = JobLog::new();
        log.info("before the panic");
        let inner = log.clone();
        let result = std::panic::catch_unwind(move || {
            inner.info("inside the worker");
            panic!("analysis blew up");
        });
        assert!(result.is_err());
        let text = log.contents();
        assert!(text.contains("before the panic"));
        assert!(text.contains("inside the worker"));
    }
}
