//! Event logging for the optimization pipeline.
//!
//! Passes record what they changed (a branch folded, a load forwarded) and the
//! scheduler records pass completions and analysis invalidations. Events can be
//! inspected for debugging or ignored; statistics are derived from them rather
//! than tracked separately.
//!
//! # Example
//!
//! ```rust
//! use evmopt::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::BranchFolded)
//!     .at("transfer", "entry")
//!     .message("jnz %c -> jmp @then");
//! log.warn("range analysis widened %i");
//!
//! assert!(log.has_transformations());
//! assert_eq!(log.summary(), "1 branch folded");
//! ```

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A conditional branch with a known condition became a jump.
    BranchFolded,
    /// An `assert` whose condition is never zero was removed.
    AssertRemoved,
    /// A load was replaced by the value of the store it reads.
    LoadForwarded,
    /// A store overwritten before any read was removed.
    StoreRemoved,
    /// A cached analysis was dropped after a change.
    AnalysisInvalidated,
    /// A pass finished running on a function.
    PassCompleted,
    /// Informational message.
    Info,
    /// Something unexpected but recoverable.
    Warning,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::BranchFolded => "branch folded",
            Self::AssertRemoved => "assert removed",
            Self::LoadForwarded => "load forwarded",
            Self::StoreRemoved => "store removed",
            Self::AnalysisInvalidated => "analysis invalidated",
            Self::PassCompleted => "pass completed",
            Self::Info => "info",
            Self::Warning => "warning",
        }
    }

    /// Returns true if this event represents a change to the IR.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::BranchFolded | Self::AssertRemoved | Self::LoadForwarded | Self::StoreRemoved
        )
    }

    /// Returns true for info and warning events.
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The function where the event occurred (if applicable).
    pub function: Option<String>,
    /// Label of the block where the event occurred (if applicable).
    pub block: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            function: None,
            block: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(function) = &self.function {
            write!(f, " {function}")?;
            if let Some(block) = &self.block {
                write!(f, "@{block}")?;
            }
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
    function: Option<String>,
    block: Option<String>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            block: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the function and block where the event occurred.
    pub fn at(mut self, function: impl Into<String>, block: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self.block = Some(block.into());
        self
    }

    /// Sets only the function (for function-level events).
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
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
            function: self.function.take(),
            block: self.block.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Append-only collection of events.
///
/// Events can be appended concurrently through shared references, so one log
/// can collect events from passes running on several functions in parallel.
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
        Self::default()
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
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Appends every event of `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.filter_kind(kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over events of one function.
    pub fn filter_function<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter().filter(move |e| e.function.as_deref() == Some(function))
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Returns true if any pass changed the IR.
    #[must_use]
    pub fn has_transformations(&self) -> bool {
        self.transformations().next().is_some()
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.transformations().count()
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> FxHashMap<EventKind, usize> {
        let mut counts = FxHashMap::default();
        for event in self.iter() {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of distinct functions with transformation events.
    #[must_use]
    pub fn functions_transformed(&self) -> usize {
        self.transformations()
            .filter_map(|e| e.function.as_deref())
            .collect::<FxHashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of the transformations.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(kind, _)| kind.is_transformation())
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect();
        if parts.is_empty() {
            return format!("{} events", self.len());
        }
        parts.sort();
        parts.join(", ")
    }
}

impl Extend<Event> for EventLog {
    fn extend<T: IntoIterator<Item = Event>>(&mut self, iter: T) {
        for event in iter {
            self.events.push(event);
        }
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_on_drop() {
        let log = EventLog::new();
        log.record(EventKind::LoadForwarded)
            .at("f", "entry")
            .pass("redundant-load-elimination")
            .message("%v = mload 0");

        assert_eq!(log.len(), 1);
        let event = log.iter().next().unwrap();
        assert_eq!(event.function.as_deref(), Some("f"));
        assert_eq!(event.block.as_deref(), Some("entry"));
        assert_eq!(event.pass.as_deref(), Some("redundant-load-elimination"));
        assert_eq!(event.to_string(), "[load forwarded] f@entry %v = mload 0");
    }

    #[test]
    fn test_default_message_is_description() {
        let log = EventLog::new();
        log.record(EventKind::StoreRemoved).function("f");
        assert_eq!(log.iter().next().unwrap().message, "store removed");
    }

    #[test]
    fn test_counts_and_summary() {
        let log = EventLog::new();
        assert_eq!(log.summary(), "no events");

        log.record(EventKind::BranchFolded).at("a", "entry");
        log.record(EventKind::BranchFolded).at("b", "entry");
        log.record(EventKind::AssertRemoved).at("a", "body");
        log.record(EventKind::PassCompleted).function("a");
        log.warn("careful");

        assert_eq!(log.count_kind(EventKind::BranchFolded), 2);
        assert_eq!(log.transformation_count(), 3);
        assert_eq!(log.functions_transformed(), 2);
        assert_eq!(log.filter_function("a").count(), 3);
        assert_eq!(log.warnings().count(), 1);
        assert_eq!(log.summary(), "1 assert removed, 2 branch folded");
    }

    #[test]
    fn test_non_transformation_summary() {
        let log = EventLog::new();
        log.info("started");
        log.record(EventKind::AnalysisInvalidated).function("f");
        assert!(!log.has_transformations());
        assert_eq!(log.summary(), "2 events");
    }

    #[test]
    fn test_merge_and_collect() {
        let first = EventLog::new();
        let second = EventLog::new();
        first.record(EventKind::BranchFolded).function("f");
        second.record(EventKind::StoreRemoved).function("g");

        first.merge(&second);
        assert_eq!(first.len(), 2);
        assert!(first.has(EventKind::StoreRemoved));

        let collected: EventLog = first.iter().cloned().collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(first.clone().len(), 2);
    }
}
