//! Event logging for simplification and verification.
//!
//! Every transformation made by a pass and every diagnostic raised by the
//! symbolic search or the termination validator is recorded as an [`Event`].
//! Events can be inspected by tools, counted in tests, or ignored.
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Append-only collection with query and summary helpers
//! - [`EventBuilder`] - Fluent API that records on drop
//!
//! # Example
//!
//! ```rust
//! use flowcheck::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::ConstantFolded)
//!     .node("entry")
//!     .message("y = x + 3 -> y = 5");
//! log.warn("use of 'z' before initialization");
//!
//! assert_eq!(log.count_kind(EventKind::ConstantFolded), 1);
//! assert_eq!(log.warnings().count(), 1);
//! ```

use std::{collections::HashMap, fmt};

use strum::{EnumIter, IntoEnumIterator};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum EventKind {
    /// An instruction was folded to a constant.
    ConstantFolded,
    /// A conditional branch was simplified to unconditional.
    BranchSimplified,
    /// An instruction was removed.
    InstructionRemoved,
    /// A block was removed.
    BlockRemoved,
    /// A block was merged into its predecessor.
    BlockMerged,
    /// Edges into an empty block were redirected past it.
    EdgeRedirected,

    /// A loop termination verdict.
    LoopReport,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,

    /// Informational message.
    Info,
    /// Warning (suspicious but the program may still be correct).
    Warning,
    /// Error (the program is wrong on every path through this point).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::ConstantFolded => "constant folded",
            Self::BranchSimplified => "branch simplified",
            Self::InstructionRemoved => "instruction removed",
            Self::BlockRemoved => "block removed",
            Self::BlockMerged => "block merged",
            Self::EdgeRedirected => "edge redirected",
            Self::LoopReport => "loop report",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a graph transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::ConstantFolded
                | Self::BranchSimplified
                | Self::InstructionRemoved
                | Self::BlockRemoved
                | Self::BlockMerged
                | Self::EdgeRedirected
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// Name of the block the event refers to (if applicable).
    pub node: Option<String>,
    /// Source line, when the front end recorded one.
    pub line: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            node: None,
            line: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(line) = self.line {
            write!(f, " line {line}:")?;
        }
        if let Some(node) = &self.node {
            write!(f, " {node}:")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    node: Option<String>,
    line: Option<usize>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            node: None,
            line: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the block the event refers to.
    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Sets the source line.
    pub fn line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            node: self.node.take(),
            line: self.line.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Collection of events.
///
/// Events are appended through shared references (`&self`), so a log can be
/// threaded through passes and the symbolic executor without `&mut`
/// plumbing.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records a diagnostic unless an identical one (same kind, block and
    /// message) is already present. Returns `true` if it was recorded.
    ///
    /// Paths through the same faulty instruction report it once.
    pub fn record_once(
        &self,
        kind: EventKind,
        node: &str,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> bool {
        let message = message.into();
        let seen = self.events.iter().any(|(_, e)| {
            e.kind == kind && e.node.as_deref() == Some(node) && e.message == message
        });
        if !seen {
            self.record(kind).node(node).line(line).message(message);
        }
        !seen
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends copies of all events of `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.events
            .iter()
            .filter_map(move |(_, e)| if e.kind == kind { Some(e) } else { None })
    }

    /// Returns an iterator over events for a specific block.
    pub fn filter_node<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events
            .iter()
            .filter_map(move |(_, e)| (e.node.as_deref() == Some(node)).then_some(e))
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Returns an iterator over error events.
    pub fn errors(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Error)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Generates a human-readable summary of transformations and
    /// diagnostics.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let counts = self.count_by_kind();
        let parts: Vec<String> = EventKind::iter()
            .filter(|k| k.is_transformation() || matches!(k, EventKind::Warning | EventKind::Error))
            .filter_map(|k| counts.get(&k).map(|n| format!("{n} {}", k.description())))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_on_drop() {
        let log = EventLog::new();
        log.record(EventKind::BlockRemoved)
            .node("dead")
            .line(Some(7))
            .pass("dce");

        let event = log.iter().next().cloned();
        assert_eq!(
            event,
            Some(Event {
                kind: EventKind::BlockRemoved,
                node: Some("dead".into()),
                line: Some(7),
                message: "block removed".into(),
                pass: Some("dce".into()),
            })
        );
        assert_eq!(
            event.map(|e| e.to_string()),
            Some("[block removed] line 7: dead: block removed".into())
        );
    }

    #[test]
    fn test_record_once_deduplicates() {
        let log = EventLog::new();
        assert!(log.record_once(EventKind::Error, "n", None, "division by zero"));
        assert!(!log.record_once(EventKind::Error, "n", None, "division by zero"));
        assert!(log.record_once(EventKind::Error, "m", None, "division by zero"));
        assert_eq!(log.errors().count(), 2);
        assert_eq!(log.filter_node("n").count(), 1);
    }

    #[test]
    fn test_summary() {
        let log = EventLog::new();
        assert_eq!(log.summary(), "no events");

        log.info("starting");
        assert_eq!(log.summary(), "1 events");

        log.record(EventKind::ConstantFolded);
        log.record(EventKind::ConstantFolded);
        log.warn("w");
        assert_eq!(log.summary(), "2 constant folded, 1 warning");

        let copy = log.clone();
        assert_eq!(copy.len(), 4);
    }
}
