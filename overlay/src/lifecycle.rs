//! Overlay lifecycle: one display, one termination.
use std::time::{Duration, Instant};

use crate::platform::DismissInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Initializing,
    Displayed,
    Terminated,
}

/// Every way the overlay can be dismissed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissSignal {
    PrimaryClick,
    EscapeKey,
    /// Escape seen by the system-wide hook while another app had focus
    GlobalEscape,
    Timeout,
    /// The window was closed or destroyed externally
    WindowClosed,
}

impl From<DismissInput> for DismissSignal {
    fn from(input: DismissInput) -> Self {
        match input {
            DismissInput::PrimaryClick => Self::PrimaryClick,
            DismissInput::EscapeKey => Self::EscapeKey,
        }
    }
}

/// Tracks the overlay state. Termination happens at most once.
#[derive(Debug)]
pub struct Lifecycle {
    state: OverlayState,
    dismissed_by: Option<DismissSignal>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: OverlayState::Initializing,
            dismissed_by: None,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// The signal that terminated the overlay, if it has terminated
    pub fn dismissed_by(&self) -> Option<DismissSignal> {
        self.dismissed_by
    }

    /// Window is up and painted
    pub fn mark_displayed(&mut self) {
        if self.state == OverlayState::Initializing {
            self.state = OverlayState::Displayed;
        }
    }

    /// Returns true only for the call that actually terminates.
    ///
    /// Signals before the window is displayed, and every signal after the
    /// first, are ignored.
    pub fn request_termination(&mut self, signal: DismissSignal) -> bool {
        if self.state != OverlayState::Displayed {
            tracing::trace!(?signal, state = ?self.state, "Ignoring dismiss signal");
            return false;
        }
        self.state = OverlayState::Terminated;
        self.dismissed_by = Some(signal);
        tracing::debug!(?signal, "Overlay dismissed");
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.state == OverlayState::Terminated
    }
}

/// One-shot auto-dismiss timer, armed when the overlay is displayed
#[derive(Debug)]
pub struct HideTimer {
    deadline: Option<Instant>,
}

impl HideTimer {
    /// `None` never fires
    pub fn new(delay: Option<Duration>, started: Instant) -> Self {
        Self {
            deadline: delay.and_then(|d| started.checked_add(d)),
        }
    }

    /// Returns true the first time `now` reaches the deadline, false afterwards
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the deadline, for sleeping
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminates_once() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.mark_displayed();

        assert!(lifecycle.request_termination(DismissSignal::EscapeKey));
        assert!(!lifecycle.request_termination(DismissSignal::Timeout));
        assert!(!lifecycle.request_termination(DismissSignal::PrimaryClick));

        assert_eq!(lifecycle.state(), OverlayState::Terminated);
        assert_eq!(lifecycle.dismissed_by(), Some(DismissSignal::EscapeKey));
    }

    #[test]
    fn ignores_signals_before_display() {
        let mut lifecycle = Lifecycle::new();
        assert!(!lifecycle.request_termination(DismissSignal::GlobalEscape));
        assert_eq!(lifecycle.state(), OverlayState::Initializing);

        lifecycle.mark_displayed();
        assert!(lifecycle.request_termination(DismissSignal::WindowClosed));
    }

    #[test]
    fn display_after_termination_stays_terminated() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.mark_displayed();
        lifecycle.request_termination(DismissSignal::Timeout);
        lifecycle.mark_displayed();
        assert!(lifecycle.is_terminated());
    }

    #[test]
    fn dismiss_input_maps_to_signal() {
        assert_eq!(
            DismissSignal::from(DismissInput::PrimaryClick),
            DismissSignal::PrimaryClick
        );
        assert_eq!(
            DismissSignal::from(DismissInput::EscapeKey),
            DismissSignal::EscapeKey
        );
    }

    #[test]
    fn timer_fires_once_at_deadline() {
        let start = Instant::now();
        let mut timer = HideTimer::new(Some(Duration::from_millis(500)), start);

        assert!(!timer.fire(start));
        assert!(!timer.fire(start + Duration::from_millis(499)));
        assert!(timer.fire(start + Duration::from_millis(500)));
        assert!(!timer.fire(start + Duration::from_secs(10)));
        assert!(!timer.is_armed());
    }

    #[test]
    fn unarmed_timer_never_fires() {
        let start = Instant::now();
        let mut timer = HideTimer::new(None, start);
        assert!(!timer.fire(start + Duration::from_secs(3600)));
        assert_eq!(timer.remaining(start), None);
    }

    #[test]
    fn remaining_counts_down() {
        let start = Instant::now();
        let timer = HideTimer::new(Some(Duration::from_secs(2)), start);
        assert_eq!(
            timer.remaining(start + Duration::from_millis(500)),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            timer.remaining(start + Duration::from_secs(5)),
            Some(Duration::ZERO)
        );
    }
}
