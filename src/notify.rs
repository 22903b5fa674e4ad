//! Severity-leveled notifications.
//!
//! Everything the engine recovers from (a dropped registration, a skipped
//! image, an unknown widget) and everything it aborts on is reported here,
//! so a host can surface it to the user instead of only to a log file.

use std::fmt;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Forwards notices to the `log` facade under the `sheetfill` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => log::debug!(target: "sheetfill", "{message}"),
            Severity::Info => log::info!(target: "sheetfill", "{message}"),
            Severity::Warn => log::warn!(target: "sheetfill", "{message}"),
            Severity::Error => log::error!(target: "sheetfill", "{message}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

/// Keeps every notice (and still logs it) so a host can show them after a run.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.notices
            .lock()
            .map(|n| n.iter().filter(|notice| notice.severity == severity).count())
            .unwrap_or(0)
    }

    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.notices
            .lock()
            .map(|n| {
                n.iter()
                    .any(|notice| notice.severity == severity && notice.message.contains(needle))
            })
            .unwrap_or(false)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        LogNotifier.notify(severity, message);
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(Notice {
                severity,
                message: message.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_keeps_order_and_severity() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Severity::Warn, "hp has already been defined");
        notifier.notify(Severity::Error, "No page defined for new image");

        let notices = notifier.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].severity, Severity::Warn);
        assert_eq!(notifier.count(Severity::Error), 1);
        assert!(notifier.contains(Severity::Warn, "already been defined"));
        assert!(!notifier.contains(Severity::Error, "already been defined"));
    }
}
