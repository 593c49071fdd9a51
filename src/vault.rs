//! File-backed task stores ("vaults").
//!
//! Four vaults share one implementation: the active list (kept in
//! chronological order), trash, completed, and the undo history (strictly
//! insertion-ordered, duplicate names allowed, popped LIFO by name).
//!
//! # Record grammar (v1)
//!
//! One record per task, consecutive lines, terminated by a fixed marker:
//!
//! ```text
//! <name>
//! comment <text>          blank sentinel: "comment" + two spaces
//! startdate <ISO date>    blank sentinel likewise
//! starttime <ISO time>
//! enddate <ISO date>
//! endtime <ISO time>
//! recurring <n | inf>     optional, followed by exactly one of:
//! daily | weekly <WEEKDAY> | monthly <n> | yearly <MM-DD>
//! id <@base36>            blank sentinel: "id"
//! end of task
//! ```
//!
//! Loading tolerates missing optional lines but rejects a record without a
//! terminator. `save()` truncates and rewrites the whole file, so the file
//! always mirrors the in-memory list exactly.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime, Weekday};
use tracing::debug;

use crate::error::{Error, Result};
use crate::task::{chronological, Cadence, Recurrence, Task, ID_PREFIX};

pub const TASK_FILE: &str = "taskList.txt";
pub const TRASH_FILE: &str = "trash.txt";
pub const COMPLETED_FILE: &str = "completed.txt";
pub const HISTORY_FILE: &str = "history.txt";

/// Record terminator line. Also rejected as a task name, since a task named
/// this would be unreadable on reload.
pub const END_OF_TASK: &str = "end of task";

/// How a vault keeps its list ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Re-sorted by the chronological comparator after every insert.
    Chronological,
    /// Append-only insertion order (trash, completed, history).
    Insertion,
}

/// An ordered list of tasks mirrored to a text file.
#[derive(Debug)]
pub struct Vault {
    order: Order,
    file_name: &'static str,
    file_path: PathBuf,
    list: Vec<Task>,
}

impl Vault {
    /// Open a vault backed by `dir/file_name`, loading it when present.
    pub fn open(dir: &Path, file_name: &'static str, order: Order) -> Result<Self> {
        let file_path = dir.join(file_name);
        let list = match fs::read_to_string(&file_path) {
            Ok(contents) => parse_records(&contents, &file_path)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let mut vault = Self {
            order,
            file_name,
            file_path,
            list,
        };
        vault.resort();
        debug!(file = vault.file_name, tasks = vault.list.len(), "opened vault");
        Ok(vault)
    }

    /// First task matching `name` from the front. A `@`-prefixed argument
    /// matches by id instead.
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.list.iter().find(|task| matches_name(task, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert a task. Rejects empty names, the record terminator phrase,
    /// and, for the chronological variant, names already present.
    pub fn store(&mut self, task: Task) -> bool {
        if task.name.trim().is_empty() || task.name == END_OF_TASK {
            return false;
        }
        if self.order == Order::Chronological && self.contains(&task.name) {
            return false;
        }
        self.list.push(task);
        self.resort();
        true
    }

    /// Remove the first task matching `name` (or `@id`) from the front.
    pub fn remove(&mut self, name: &str) -> Option<Task> {
        let idx = self.list.iter().position(|task| matches_name(task, name))?;
        Some(self.list.remove(idx))
    }

    /// Move the first match into `trash`.
    pub fn delete_to_trash(&mut self, name: &str, trash: &mut Vault) -> bool {
        match self.remove(name) {
            Some(task) => trash.store(task),
            None => false,
        }
    }

    /// Remove the last task with this exact name (LIFO, duplicates
    /// allowed). This is how the history store is consumed by undo.
    pub fn pop(&mut self, name: &str) -> Option<Task> {
        let idx = self.list.iter().rposition(|task| task.name == name)?;
        Some(self.list.remove(idx))
    }

    /// Name of the most recently inserted task.
    pub fn last_name(&self) -> Option<&str> {
        self.list.last().map(|task| task.name.as_str())
    }

    /// Ordered snapshot of the list.
    pub fn all(&self) -> Vec<Task> {
        self.list.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Truncate and rewrite the backing file from the in-memory list.
    pub fn save(&self) -> Result<()> {
        let mut out = String::new();
        for task in &self.list {
            write_record(&mut out, task);
        }
        fs::write(&self.file_path, out)?;
        Ok(())
    }

    /// Drop every task and persist the empty file.
    pub fn clear(&mut self) -> Result<()> {
        self.list.clear();
        self.save()
    }

    /// Repoint the vault at a new directory (the caller saves).
    pub fn set_dir(&mut self, dir: &Path) {
        self.file_path = dir.join(self.file_name);
    }

    /// Delete the backing file, leaving the in-memory list intact.
    pub fn delete_file(&self) -> Result<()> {
        match fs::remove_file(&self.file_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn resort(&mut self) {
        if self.order == Order::Chronological {
            self.list.sort_by(chronological);
        }
    }
}

fn matches_name(task: &Task, name: &str) -> bool {
    if name.starts_with(ID_PREFIX) {
        task.id.as_deref() == Some(name)
    } else {
        task.name == name
    }
}

// =============================================================================
// Record serialization
// =============================================================================

fn write_record(out: &mut String, task: &Task) {
    out.push_str(&task.name);
    out.push('\n');
    write_field(out, "comment", task.comment.as_deref());
    write_field(
        out,
        "startdate",
        task.start_date.map(|d| d.to_string()).as_deref(),
    );
    write_field(
        out,
        "starttime",
        task.start_time.map(|t| t.to_string()).as_deref(),
    );
    write_field(
        out,
        "enddate",
        task.end_date.map(|d| d.to_string()).as_deref(),
    );
    write_field(
        out,
        "endtime",
        task.end_time.map(|t| t.to_string()).as_deref(),
    );

    if let Some(recurrence) = &task.recurrence {
        match recurrence.remaining {
            Some(n) => out.push_str(&format!("recurring {n}\n")),
            None => out.push_str("recurring inf\n"),
        }
        match recurrence.cadence {
            Cadence::Daily => out.push_str("daily\n"),
            Cadence::Weekly(day) => out.push_str(&format!("weekly {}\n", weekday_name(day))),
            Cadence::Monthly(day) => out.push_str(&format!("monthly {day}\n")),
            Cadence::Yearly { month, day } => {
                out.push_str(&format!("yearly {month:02}-{day:02}\n"));
            }
        }
    }

    match &task.id {
        Some(id) => out.push_str(&format!("id {id}\n")),
        None => out.push_str("id\n"),
    }
    out.push_str(END_OF_TASK);
    out.push('\n');
}

fn write_field(out: &mut String, key: &str, value: Option<&str>) {
    match value {
        Some(value) => out.push_str(&format!("{key} {value}\n")),
        None => out.push_str(&format!("{key}  \n")),
    }
}

fn parse_records(contents: &str, path: &Path) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    let mut lines = contents.lines().peekable();

    while let Some(name_line) = lines.next() {
        if name_line.trim().is_empty() {
            continue;
        }
        if name_line == END_OF_TASK {
            return Err(Error::corrupt(path, "record without a name"));
        }

        let mut task = Task::named(name_line);
        let mut terminated = false;

        while let Some(line) = lines.next() {
            if line == END_OF_TASK {
                terminated = true;
                break;
            }
            if let Some(value) = field_value(line, "comment") {
                task.comment = value.map(str::to_string);
            } else if let Some(value) = field_value(line, "startdate") {
                task.start_date = parse_opt(value, path, "startdate", |v| {
                    v.parse::<NaiveDate>().ok()
                })?;
            } else if let Some(value) = field_value(line, "starttime") {
                task.start_time = parse_opt(value, path, "starttime", |v| {
                    v.parse::<NaiveTime>().ok()
                })?;
            } else if let Some(value) = field_value(line, "enddate") {
                task.end_date =
                    parse_opt(value, path, "enddate", |v| v.parse::<NaiveDate>().ok())?;
            } else if let Some(value) = field_value(line, "endtime") {
                task.end_time =
                    parse_opt(value, path, "endtime", |v| v.parse::<NaiveTime>().ok())?;
            } else if let Some(value) = field_value(line, "recurring") {
                let remaining = match value {
                    Some("inf") | None => None,
                    Some(raw) => Some(raw.parse::<u32>().map_err(|_| {
                        Error::corrupt(path, format!("bad recurrence count: {raw}"))
                    })?),
                };
                let cadence_line = lines
                    .next()
                    .ok_or_else(|| Error::corrupt(path, "recurrence without cadence"))?;
                let cadence = parse_cadence(cadence_line, path)?;
                task.recurrence = Some(Recurrence::new(cadence, remaining));
            } else if let Some(value) = field_value(line, "id") {
                task.id = value.map(str::to_string);
            } else if line == "id" {
                task.id = None;
            }
            // Unknown lines are skipped; the format is tolerant of additions.
        }

        if !terminated {
            return Err(Error::corrupt(path, "record without a terminator"));
        }
        tasks.push(task);
    }

    Ok(tasks)
}

/// Split a `key value` line; returns `Some(None)` for the blank sentinel.
fn field_value<'a>(line: &'a str, key: &str) -> Option<Option<&'a str>> {
    let rest = line.strip_prefix(key)?;
    let rest = rest.strip_prefix(' ')?;
    let trimmed = rest.trim();
    if trimmed.is_empty() {
        Some(None)
    } else {
        Some(Some(trimmed))
    }
}

fn parse_opt<T>(
    value: Option<&str>,
    path: &Path,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(raw) => parse(raw)
            .map(Some)
            .ok_or_else(|| Error::corrupt(path, format!("bad {field}: {raw}"))),
    }
}

fn parse_cadence(line: &str, path: &Path) -> Result<Cadence> {
    if line == "daily" {
        return Ok(Cadence::Daily);
    }
    if let Some(day) = line.strip_prefix("weekly ") {
        let day = parse_weekday_name(day.trim())
            .ok_or_else(|| Error::corrupt(path, format!("bad weekday: {day}")))?;
        return Ok(Cadence::Weekly(day));
    }
    if let Some(day) = line.strip_prefix("monthly ") {
        let day = day
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|d| (1..=31).contains(d))
            .ok_or_else(|| Error::corrupt(path, format!("bad day of month: {day}")))?;
        return Ok(Cadence::Monthly(day));
    }
    if let Some(month_day) = line.strip_prefix("yearly ") {
        let (month, day) = month_day
            .trim()
            .split_once('-')
            .ok_or_else(|| Error::corrupt(path, format!("bad month-day: {month_day}")))?;
        let month = month.parse::<u32>().ok().filter(|m| (1..=12).contains(m));
        let day = day.parse::<u32>().ok().filter(|d| (1..=31).contains(d));
        return match (month, day) {
            (Some(month), Some(day)) => Ok(Cadence::Yearly { month, day }),
            _ => Err(Error::corrupt(path, format!("bad month-day: {month_day}"))),
        };
    }
    Err(Error::corrupt(path, format!("bad cadence line: {line}")))
}

/// Uppercase weekday name used in records and replies.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

fn parse_weekday_name(name: &str) -> Option<Weekday> {
    match name {
        "MONDAY" => Some(Weekday::Mon),
        "TUESDAY" => Some(Weekday::Tue),
        "WEDNESDAY" => Some(Weekday::Wed),
        "THURSDAY" => Some(Weekday::Thu),
        "FRIDAY" => Some(Weekday::Fri),
        "SATURDAY" => Some(Weekday::Sat),
        "SUNDAY" => Some(Weekday::Sun),
        _ => None,
    }
}
