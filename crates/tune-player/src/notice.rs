//! Single-slot transient notice ("popup") state.  A new notice replaces the
//! one on screen.

use std::time::{Duration, Instant};

pub const DEFAULT_NOTICE: Duration = Duration::from_secs(1);
pub const DISCONNECTED_NOTICE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
struct Notice {
    text: String,
    severity: Severity,
    expires: Instant,
}

#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(
        &mut self,
        text: impl Into<String>,
        severity: Severity,
        duration: Duration,
        now: Instant,
    ) {
        self.current = Some(Notice {
            text: text.into(),
            severity,
            expires: now + duration,
        });
    }

    /// Drop the notice once it has expired.
    pub fn tick(&mut self, now: Instant) {
        if self.current.as_ref().is_some_and(|n| n.expires <= now) {
            self.current = None;
        }
    }

    pub fn current(&self) -> Option<(&str, Severity)> {
        self.current.as_ref().map(|n| (n.text.as_str(), n.severity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_notice_replaces_and_expires() {
        let t0 = Instant::now();
        let mut board = NoticeBoard::new();
        board.show("first", Severity::Info, DEFAULT_NOTICE, t0);
        board.show("second", Severity::Error, DEFAULT_NOTICE, t0);
        assert_eq!(board.current(), Some(("second", Severity::Error)));

        board.tick(t0 + Duration::from_millis(999));
        assert!(board.current().is_some());
        board.tick(t0 + DEFAULT_NOTICE);
        assert!(board.current().is_none());
    }
}
