use tracing::{debug, warn};
use x11rb::protocol::xproto::Window;

/// Per-frame error tracking. Nothing here is fatal; failures are logged and counted.
#[derive(Debug, Default)]
pub struct ErrorTracker {
    x11_errors: u64,
    context_errors: u64,
    draw_errors: u64,
    present_errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    X11,
    Context,
    Draw,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub x11_errors: u64,
    pub context_errors: u64,
    pub draw_errors: u64,
    pub present_errors: u64,
    pub is_healthy: bool,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, category: ErrorCategory, operation: &str, window: Option<Window>, error: impl std::fmt::Display) {
        let counter = match category {
            ErrorCategory::X11 => &mut self.x11_errors,
            ErrorCategory::Context => &mut self.context_errors,
            ErrorCategory::Draw => &mut self.draw_errors,
            ErrorCategory::Present => &mut self.present_errors,
        };
        *counter += 1;

        match window {
            Some(window) => warn!("{:?} error in {} for window {:#x}: {}", category, operation, window, error),
            None => warn!("{:?} error in {}: {}", category, operation, error),
        }
    }

    pub fn warn_if_failed<T, E: std::fmt::Display>(
        &mut self,
        result: Result<T, E>,
        operation: &str,
        window: Window,
        category: ErrorCategory,
    ) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.record(category, operation, Some(window), e);
                None
            }
        }
    }

    pub fn health_check(&self) -> HealthStatus {
        HealthStatus {
            x11_errors: self.x11_errors,
            context_errors: self.context_errors,
            draw_errors: self.draw_errors,
            present_errors: self.present_errors,
            is_healthy: self.context_errors == 0 && self.draw_errors == 0 && self.present_errors == 0 && self.x11_errors < 10,
        }
    }
}

/// Log and ignore errors (for teardown)
pub fn log_and_ignore<T, E: std::fmt::Display>(result: Result<T, E>, operation: &str) {
    if let Err(e) = result {
        debug!("Ignoring error in {}: {}", operation, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_category() {
        let mut tracker = ErrorTracker::new();
        assert!(tracker.health_check().is_healthy);

        tracker.record(ErrorCategory::X11, "event", None, "BadWindow");
        assert!(tracker.health_check().is_healthy);

        let out: Option<()> = tracker.warn_if_failed(Err("lost"), "make_current", 7, ErrorCategory::Context);
        assert!(out.is_none());
        assert_eq!(tracker.warn_if_failed::<_, &str>(Ok(3), "swap", 7, ErrorCategory::Present), Some(3));

        let health = tracker.health_check();
        assert_eq!(health.x11_errors, 1);
        assert_eq!(health.context_errors, 1);
        assert_eq!(health.present_errors, 0);
        assert!(!health.is_healthy);
    }
}
