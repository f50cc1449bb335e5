//! In-flight request tracking.
//!
//! Replies carry no request identifier, so they are attributed purely by
//! arrival order: at most one request may be outstanding per connection.

use chardb_protocol::Command;

/// Tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    Idle,
    AwaitingResponse(Command),
}

/// Remembers which command is currently in flight.
#[derive(Debug, Default)]
pub struct RequestTracker {
    state: TrackerState,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TrackerState::Idle
    }

    /// Returns the command awaiting a reply, if any.
    pub fn in_flight(&self) -> Option<Command> {
        match self.state {
            TrackerState::Idle => None,
            TrackerState::AwaitingResponse(command) => Some(command),
        }
    }

    /// Marks `command` as sent.
    ///
    /// Returns the command it replaced if one was still outstanding; the next
    /// reply can then no longer be attributed reliably.
    pub fn begin(&mut self, command: Command) -> Option<Command> {
        let previous = self.in_flight();
        if let Some(previous) = previous {
            tracing::warn!(
                "{} sent while {} still awaits a response; replies may be misattributed",
                command,
                previous
            );
        }
        self.state = TrackerState::AwaitingResponse(command);
        previous
    }

    /// Consumes a reply, returning the command it resolves.
    pub fn complete(&mut self) -> Option<Command> {
        let command = self.in_flight();
        self.state = TrackerState::Idle;
        command
    }

    /// Drops any outstanding request after the connection is lost.
    pub fn reset(&mut self) -> Option<Command> {
        self.complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let tracker = RequestTracker::new();
        assert!(tracker.is_idle());
        assert_eq!(tracker.state(), TrackerState::Idle);
        assert_eq!(tracker.in_flight(), None);
    }

    #[test]
    fn test_send_then_receive() {
        let mut tracker = RequestTracker::new();
        assert_eq!(tracker.begin(Command::GetAll), None);
        assert_eq!(
            tracker.state(),
            TrackerState::AwaitingResponse(Command::GetAll)
        );

        assert_eq!(tracker.complete(), Some(Command::GetAll));
        assert!(tracker.is_idle());
    }

    #[test]
    fn test_receive_while_idle() {
        let mut tracker = RequestTracker::new();
        assert_eq!(tracker.complete(), None);
        assert!(tracker.is_idle());
    }

    #[test]
    fn test_overlapping_send_overwrites() {
        let mut tracker = RequestTracker::new();
        tracker.begin(Command::Add);
        assert_eq!(tracker.begin(Command::Remove), Some(Command::Add));
        assert_eq!(tracker.in_flight(), Some(Command::Remove));
    }

    #[test]
    fn test_reset_on_connection_lost() {
        let mut tracker = RequestTracker::new();
        tracker.begin(Command::Update);
        assert_eq!(tracker.reset(), Some(Command::Update));
        assert!(tracker.is_idle());
        assert_eq!(tracker.reset(), None);
    }
}
