//! Task model: identity, schedule fields, and the recurrence descriptor.
//!
//! A task's schedule is a pair of optional (date, time) anchors. The derived
//! classification drives most command validation:
//!
//! - no start fields: *floating*
//! - start only: *deadline*
//! - start and end: *event*
//!
//! Recurring tasks are ordinary tasks carrying a [`Recurrence`]; there is no
//! separate recurring type, so the scheduler and undo paths never downcast.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Prefix character marking an id string (and forbidden as a name prefix).
pub const ID_PREFIX: char = '@';

/// Derived task classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Floating,
    Deadline,
    Event,
}

/// The shape of a recurrence: what "the next occurrence" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily,
    /// Recurs on the given day of the week.
    Weekly(Weekday),
    /// Recurs on the given day of the month, clamped when the month is
    /// shorter (31 -> last valid day).
    Monthly(u32),
    /// Recurs on the given month and day each year, with the same clamp.
    Yearly { month: u32, day: u32 },
}

/// Recurrence descriptor attached to a recurring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    pub cadence: Cadence,
    /// Occurrences left, `None` recurs forever.
    pub remaining: Option<u32>,
}

impl Recurrence {
    pub fn new(cadence: Cadence, remaining: Option<u32>) -> Self {
        Self { cadence, remaining }
    }
}

/// A single task. `id` is assigned by the identity bank on creation and is
/// preserved across edits and recurrence rollover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub comment: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
    pub id: Option<String>,
    pub recurrence: Option<Recurrence>,
}

impl Task {
    /// A floating task with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: None,
            start_date: None,
            start_time: None,
            end_date: None,
            end_time: None,
            id: None,
            recurrence: None,
        }
    }

    pub fn kind(&self) -> TaskKind {
        if self.end_date.is_some() {
            TaskKind::Event
        } else if self.start_date.is_some() {
            TaskKind::Deadline
        } else {
            TaskKind::Floating
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Start instant, present for deadlines and events.
    pub fn start_instant(&self) -> Option<NaiveDateTime> {
        Some(self.start_date?.and_time(self.start_time?))
    }

    /// End instant, present for events only.
    pub fn end_instant(&self) -> Option<NaiveDateTime> {
        Some(self.end_date?.and_time(self.end_time?))
    }

    /// The instant the recurrence sweep compares against "now": the end
    /// instant when present, else the start instant.
    pub fn due_instant(&self) -> Option<NaiveDateTime> {
        self.end_instant().or_else(|| self.start_instant())
    }

    /// Timed interval of an event task.
    pub fn interval(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((self.start_instant()?, self.end_instant()?))
    }

    /// Whole days between start and end date, preserved across rollover.
    pub fn span_days(&self) -> Option<i64> {
        let start = self.start_date?;
        let end = self.end_date?;
        Some((end - start).num_days())
    }
}

/// Chronological comparator for the active store: floating tasks sort last;
/// among timed tasks the earlier start instant sorts first.
pub fn chronological(a: &Task, b: &Task) -> Ordering {
    match (a.start_instant(), b.start_instant()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

/// Whether two timed intervals overlap: any boundary of one strictly inside
/// the other counts, shared boundaries do not.
pub fn intervals_overlap(
    a: (NaiveDateTime, NaiveDateTime),
    b: (NaiveDateTime, NaiveDateTime),
) -> bool {
    let inside = |point: NaiveDateTime, range: (NaiveDateTime, NaiveDateTime)| {
        point > range.0 && point < range.1
    };
    inside(a.0, b) || inside(a.1, b) || inside(b.0, a) || inside(b.1, a)
}
