//! Recurrence scheduler: lazy catch-up of recurring tasks.
//!
//! Nothing fires on a timer. Instead every command begins with a sweep that
//! walks the active store and advances any recurring task whose reference
//! instant (end when present, else start) has passed. Advancing is iterative,
//! one occurrence at a time, so a store that slept for a month catches up the
//! same way as one that slept overnight.
//!
//! Each consumed occurrence decrements the remaining count; a task on its
//! final occurrence is dropped and its id released. A timed candidate that
//! would overlap an existing timed task is pushed to the following occurrence
//! without consuming one; when every slot in the retry window overlaps, the
//! task stays where it is and is retried on a later sweep.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use tracing::debug;

use crate::error::Result;
use crate::id_bank::IdBank;
use crate::task::{intervals_overlap, Cadence, Task};
use crate::vault::Vault;

/// Slots to try past an overlapping candidate before giving up and leaving
/// the task un-advanced. Only reachable when the store is packed solid.
const OVERLAP_RETRY_LIMIT: u32 = 1000;

/// Advance every recurring task in `active` until its reference instant is
/// not in the past. Returns the number of tasks advanced or expired; saves
/// the store when anything changed.
pub fn sweep(active: &mut Vault, bank: &mut IdBank, now: NaiveDateTime) -> Result<usize> {
    let due: Vec<String> = active
        .iter()
        .filter(|task| task.is_recurring() && task.due_instant().is_some_and(|d| d < now))
        .map(|task| task.name.clone())
        .collect();
    if due.is_empty() {
        return Ok(0);
    }

    for name in &due {
        let Some(task) = active.remove(name) else {
            continue;
        };
        match catch_up(task, active, bank, now)? {
            Some(next) => {
                debug!(name = %name, "advanced recurring task");
                active.store(next);
            }
            None => debug!(name = %name, "recurring task expired"),
        }
    }
    active.save()?;
    Ok(due.len())
}

/// Advance one occurrence, as `complete` does for a recurring task. The task
/// must already be out of `active`. `None` means the final occurrence was
/// consumed and the id released.
pub fn roll_over(task: Task, active: &Vault, bank: &mut IdBank) -> Result<Option<Task>> {
    let Some(recurrence) = task.recurrence else {
        return Ok(Some(task));
    };
    if recurrence.remaining == Some(1) {
        if let Some(id) = &task.id {
            bank.release(id)?;
        }
        return Ok(None);
    }
    match next_occurrence(&task, active) {
        Some(next) => Ok(Some(next)),
        // Could not advance; the task keeps its current occurrence.
        None => Ok(Some(task)),
    }
}

fn catch_up(
    task: Task,
    active: &Vault,
    bank: &mut IdBank,
    now: NaiveDateTime,
) -> Result<Option<Task>> {
    let mut task = task;
    loop {
        let Some(recurrence) = task.recurrence else {
            return Ok(Some(task));
        };
        match task.due_instant() {
            Some(due) if due < now => {}
            _ => return Ok(Some(task)),
        }
        if recurrence.remaining == Some(1) {
            if let Some(id) = &task.id {
                bank.release(id)?;
            }
            return Ok(None);
        }
        match next_occurrence(&task, active) {
            Some(next) => task = next,
            None => return Ok(Some(task)),
        }
    }
}

/// Project the task onto its next occurrence, consuming one recurrence.
/// Overlapping timed candidates are pushed further without consuming more.
/// `None` means the task cannot advance (no schedule, date overflow, or
/// every slot in the retry window overlaps) and must stay as it is.
fn next_occurrence(task: &Task, others: &Vault) -> Option<Task> {
    next_occurrence_within(task, others, OVERLAP_RETRY_LIMIT)
}

fn next_occurrence_within(task: &Task, others: &Vault, retry_limit: u32) -> Option<Task> {
    let recurrence = task.recurrence?;
    let span = task.span_days();

    let mut start = task.start_date?;
    let mut retries = 0;
    loop {
        start = step(start, recurrence.cadence)?;

        let mut candidate = task.clone();
        candidate.start_date = Some(start);
        candidate.end_date = span.map(|days| start + Duration::days(days));
        candidate.recurrence = Some(crate::task::Recurrence::new(
            recurrence.cadence,
            recurrence.remaining.map(|n| n.saturating_sub(1)),
        ));

        if overlaps_any(&candidate, others) {
            retries += 1;
            if retries >= retry_limit {
                return None;
            }
            continue;
        }
        return Some(candidate);
    }
}

fn overlaps_any(candidate: &Task, others: &Vault) -> bool {
    let Some(interval) = candidate.interval() else {
        return false;
    };
    others
        .iter()
        .filter_map(Task::interval)
        .any(|other| intervals_overlap(interval, other))
}

/// One step of the cadence from the given date.
fn step(date: NaiveDate, cadence: Cadence) -> Option<NaiveDate> {
    match cadence {
        Cadence::Daily => date.checked_add_signed(Duration::days(1)),
        Cadence::Weekly(target) => Some(next_weekday(date, target)),
        Cadence::Monthly(day) => {
            let (year, month) = if date.month() == 12 {
                (date.year() + 1, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            clamped_date(year, month, day)
        }
        Cadence::Yearly { month, day } => clamped_date(date.year() + 1, month, day),
    }
}

/// First date strictly after `date` falling on `target`.
fn next_weekday(date: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (target.num_days_from_monday() + 7 - date.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    date + Duration::days(i64::from(ahead))
}

/// The given day of month, or the closest earlier day that exists (31 in
/// April becomes 30, 29 February off leap years becomes 28).
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let mut day = day;
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
        if day <= 1 {
            return None;
        }
        day -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Recurrence;
    use crate::vault::{Order, TASK_FILE};
    use chrono::NaiveTime;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, min: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, min, 0).unwrap()
    }

    fn recurring(name: &str, start: NaiveDate, cadence: Cadence, remaining: Option<u32>) -> Task {
        Task {
            start_date: Some(start),
            start_time: Some(time(9, 0)),
            recurrence: Some(Recurrence::new(cadence, remaining)),
            ..Task::named(name)
        }
    }

    struct Fixture {
        _temp: TempDir,
        active: Vault,
        bank: IdBank,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let active = Vault::open(temp.path(), TASK_FILE, Order::Chronological).unwrap();
        let bank = IdBank::open(temp.path()).unwrap();
        Fixture {
            active,
            bank,
            _temp: temp,
        }
    }

    #[test]
    fn daily_task_catches_up_past_days() {
        let mut f = fixture();
        f.active
            .store(recurring("standup", date(2025, 6, 1), Cadence::Daily, Some(10)));
        let now = date(2025, 6, 4).and_time(time(8, 0));

        assert_eq!(sweep(&mut f.active, &mut f.bank, now).unwrap(), 1);
        let task = f.active.get("standup").unwrap();
        // 1 -> 2 -> 3 -> 4 June, three occurrences consumed.
        assert_eq!(task.start_date, Some(date(2025, 6, 4)));
        assert_eq!(task.recurrence.unwrap().remaining, Some(7));

        // A second sweep right after the catch-up is a no-op.
        assert_eq!(sweep(&mut f.active, &mut f.bank, now).unwrap(), 0);
        let task = f.active.get("standup").unwrap();
        assert_eq!(task.start_date, Some(date(2025, 6, 4)));
        assert_eq!(task.recurrence.unwrap().remaining, Some(7));
    }

    #[test]
    fn weekly_task_lands_on_its_weekday() {
        let mut f = fixture();
        // 2025-06-02 is a Monday.
        f.active.store(recurring(
            "review",
            date(2025, 6, 2),
            Cadence::Weekly(Weekday::Wed),
            None,
        ));
        let now = date(2025, 6, 3).and_time(time(0, 0));

        sweep(&mut f.active, &mut f.bank, now).unwrap();
        let task = f.active.get("review").unwrap();
        assert_eq!(task.start_date, Some(date(2025, 6, 4)));
        assert_eq!(task.start_date.unwrap().weekday(), Weekday::Wed);
        assert_eq!(task.recurrence.unwrap().remaining, None);
    }

    #[test]
    fn monthly_day_clamps_in_short_months() {
        assert_eq!(
            step(date(2025, 1, 31), Cadence::Monthly(31)),
            Some(date(2025, 2, 28))
        );
        assert_eq!(
            step(date(2025, 2, 28), Cadence::Monthly(31)),
            Some(date(2025, 3, 31))
        );
        assert_eq!(
            step(date(2025, 12, 15), Cadence::Monthly(15)),
            Some(date(2026, 1, 15))
        );
    }

    #[test]
    fn yearly_leap_day_clamps_off_leap_years() {
        assert_eq!(
            step(date(2024, 2, 29), Cadence::Yearly { month: 2, day: 29 }),
            Some(date(2025, 2, 28))
        );
    }

    #[test]
    fn final_occurrence_expires_and_releases_the_id() {
        let mut f = fixture();
        let id = f.bank.generate("last call").unwrap();
        let mut task = recurring("last call", date(2025, 6, 1), Cadence::Daily, Some(1));
        task.id = Some(id.clone());
        f.active.store(task);

        let now = date(2025, 6, 2).and_time(time(0, 0));
        sweep(&mut f.active, &mut f.bank, now).unwrap();

        assert!(f.active.get("last call").is_none());
        assert!(!f.bank.exists(&id));
    }

    #[test]
    fn overlap_pushes_forward_without_consuming() {
        let mut f = fixture();
        // An existing event occupies the next daily slot.
        f.active.store(Task {
            start_date: Some(date(2025, 6, 2)),
            start_time: Some(time(8, 30)),
            end_date: Some(date(2025, 6, 2)),
            end_time: Some(time(10, 0)),
            ..Task::named("blocker")
        });

        let mut task = recurring("sync", date(2025, 6, 1), Cadence::Daily, Some(5));
        task.end_date = Some(date(2025, 6, 1));
        task.end_time = Some(time(9, 30));
        f.active.store(task);

        let now = date(2025, 6, 1).and_time(time(12, 0));
        sweep(&mut f.active, &mut f.bank, now).unwrap();

        let task = f.active.get("sync").unwrap();
        // June 2nd overlapped, so the slot on the 3rd is taken instead, at
        // the cost of a single recurrence.
        assert_eq!(task.start_date, Some(date(2025, 6, 3)));
        assert_eq!(task.recurrence.unwrap().remaining, Some(4));
    }

    #[test]
    fn exhausted_retry_window_leaves_the_task_in_place() {
        let mut f = fixture();
        // All-day events occupy every slot inside the retry window.
        for day in 2..=4 {
            f.active.store(Task {
                start_date: Some(date(2025, 6, day)),
                start_time: Some(time(0, 0)),
                end_date: Some(date(2025, 6, day)),
                end_time: Some(time(23, 59)),
                ..Task::named(format!("blocker-{day}"))
            });
        }
        let mut task = recurring("sync", date(2025, 6, 1), Cadence::Daily, Some(5));
        task.end_date = Some(date(2025, 6, 1));
        task.end_time = Some(time(9, 30));

        assert!(next_occurrence_within(&task, &f.active, 3).is_none());
    }

    #[test]
    fn sweep_is_idempotent_when_nothing_is_due() {
        let mut f = fixture();
        f.active
            .store(recurring("standup", date(2025, 6, 10), Cadence::Daily, Some(3)));
        let now = date(2025, 6, 4).and_time(time(8, 0));

        assert_eq!(sweep(&mut f.active, &mut f.bank, now).unwrap(), 0);
        assert_eq!(sweep(&mut f.active, &mut f.bank, now).unwrap(), 0);
        let task = f.active.get("standup").unwrap();
        assert_eq!(task.start_date, Some(date(2025, 6, 10)));
        assert_eq!(task.recurrence.unwrap().remaining, Some(3));
    }

    #[test]
    fn roll_over_advances_one_occurrence() {
        let mut f = fixture();
        let task = recurring("report", date(2025, 6, 2), Cadence::Weekly(Weekday::Mon), Some(4));

        let next = roll_over(task, &f.active, &mut f.bank).unwrap().unwrap();
        assert_eq!(next.start_date, Some(date(2025, 6, 9)));
        assert_eq!(next.recurrence.unwrap().remaining, Some(3));
    }
}
