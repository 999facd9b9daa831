//! Location sources and the one-shot session that filters their fixes.

use std::fmt::Debug;
use tracing::debug;

use crate::controller::{Event, EventSender};

/// A single position report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub lat: f64,
    pub lon: f64,
    /// Meters. Zero or negative means the fix is not usable.
    pub horizontal_accuracy: f64,
}

impl LocationFix {
    pub fn is_accurate(&self) -> bool {
        self.horizontal_accuracy > 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    /// A batch of fixes, oldest first.
    Updated(Vec<LocationFix>),
    Failed(String),
}

/// A platform location service.
///
/// Implementations post [`Event::Location`] into the sink they were started
/// with, from any thread, until stopped.
pub trait LocationSource: Send + Debug {
    fn start(&mut self, sink: EventSender);
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Updating,
    Stopped,
}

/// Accepts at most one accurate fix, then stops the source for good.
#[derive(Debug)]
pub struct LocationSession {
    source: Box<dyn LocationSource>,
    state: SessionState,
}

impl LocationSession {
    pub fn new(source: Box<dyn LocationSource>) -> Self {
        Self {
            source,
            state: SessionState::Idle,
        }
    }

    pub fn start(&mut self, sink: EventSender) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Updating;
            self.source.start(sink);
        }
    }

    pub fn is_updating(&self) -> bool {
        self.state == SessionState::Updating
    }

    /// Look at the newest fix of a batch. Returns it if it is the fix the
    /// session was waiting for.
    pub fn accept(&mut self, fixes: &[LocationFix]) -> Option<LocationFix> {
        if !self.is_updating() {
            debug!("location update after session ended, ignoring");
            return None;
        }

        let fix = *fixes.last()?;
        if !fix.is_accurate() {
            debug!(accuracy = fix.horizontal_accuracy, "inaccurate fix, waiting for another");
            return None;
        }

        self.source.stop();
        self.state = SessionState::Stopped;
        Some(fix)
    }
}

/// A source that reports a single preset position, or a failure when none
/// was given.
///
/// It never produces a second fix, so after reporting one that is not
/// accurate it also reports a failure.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    fix: Option<LocationFix>,
}

impl FixedLocation {
    pub fn new(fix: Option<LocationFix>) -> Self {
        Self { fix }
    }
}

impl LocationSource for FixedLocation {
    fn start(&mut self, sink: EventSender) {
        match self.fix {
            Some(fix) => {
                let _ = sink.send(Event::Location(LocationEvent::Updated(vec![fix])));
                if !fix.is_accurate() {
                    let _ = sink.send(Event::Location(LocationEvent::Failed(
                        "no accurate fix available".to_string(),
                    )));
                }
            }
            None => {
                let _ = sink.send(Event::Location(LocationEvent::Failed(
                    "no coordinates available".to_string(),
                )));
            }
        }
    }

    fn stop(&mut self) {}
}
