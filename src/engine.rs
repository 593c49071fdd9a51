//! Command interpreter: one `Engine` owns all mutable state.
//!
//! `execute_command` takes the raw user text and returns the reply to print.
//! Failures a user can cause (bad format, unknown task, rejected validation)
//! come back as `Ok(message)`; only I/O faults and store corruption surface
//! as `Err`. Every call begins with a recurrence sweep, and every mutating
//! command records its undo state before replying.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::id_bank::IdBank;
use crate::parse::{self, CommandKind};
use crate::recurrence;
use crate::task::{intervals_overlap, Cadence, Recurrence, Task, ID_PREFIX};
use crate::undo::Undoable;
use crate::vault::{
    weekday_name, Order, Vault, COMPLETED_FILE, END_OF_TASK, HISTORY_FILE, TASK_FILE, TRASH_FILE,
};

pub const CONFIG_FILE: &str = "config.txt";

const MSG_NO_UNDO: &str = "no more undo left";
const MSG_NONEXIST: &str = "Directory doesnt exist";
const MSG_INVALID_LIST: &str = "Invalid list command";
const MSG_INVALID_EDIT: &str = "invalid edit command";
const MSG_NOT_CHRON: &str = "new date not chronologically correct";
const MSG_EDIT_SUCCESS: &str = "edit complete";
const MSG_RECUR_FLOATING: &str = "cannot recur floating task";
const MSG_INVALID_RECURRENCES: &str = "insert valid number for number of recurrence";
const MSG_INVALID_RECURFORMAT: &str = "invalid recurrence format";
const MSG_SPECIFY_RECURRENCE: &str = "specify to recur daily, weekly, monthly, or yearly";

/// The task engine. All four stores, the identity bank, the undo stack, and
/// the display buffer hang off one value; nothing is global.
pub struct Engine {
    pub(crate) active: Vault,
    pub(crate) trash: Vault,
    pub(crate) completed: Vault,
    pub(crate) history: Vault,
    pub(crate) bank: IdBank,
    pub(crate) undo_stack: Vec<Undoable>,
    display: Vec<Task>,
    pub(crate) vault_dir: PathBuf,
    pub(crate) config_path: PathBuf,
    exit_requested: bool,
}

impl Engine {
    /// Open an engine rooted at `base_dir`. `config.txt` in `base_dir` names
    /// the store directory; it is created pointing at `base_dir` when absent.
    /// The undo history never survives a process, so it is cleared here.
    pub fn open(base_dir: &Path) -> Result<Self> {
        if !base_dir.is_dir() {
            return Err(Error::NotADirectory(base_dir.to_path_buf()));
        }
        let config_path = base_dir.join(CONFIG_FILE);
        let vault_dir = match fs::read_to_string(&config_path) {
            Ok(contents) if !contents.trim().is_empty() => {
                let configured = PathBuf::from(contents.trim());
                if configured.is_dir() {
                    configured
                } else {
                    warn!(path = %configured.display(), "configured store directory is gone, falling back");
                    fs::write(&config_path, base_dir.display().to_string())?;
                    base_dir.to_path_buf()
                }
            }
            Ok(_) | Err(_) => {
                fs::write(&config_path, base_dir.display().to_string())?;
                base_dir.to_path_buf()
            }
        };

        let mut engine = Self {
            active: Vault::open(&vault_dir, TASK_FILE, Order::Chronological)?,
            trash: Vault::open(&vault_dir, TRASH_FILE, Order::Insertion)?,
            completed: Vault::open(&vault_dir, COMPLETED_FILE, Order::Insertion)?,
            history: Vault::open(&vault_dir, HISTORY_FILE, Order::Insertion)?,
            bank: IdBank::open(&vault_dir)?,
            undo_stack: Vec::new(),
            display: Vec::new(),
            vault_dir,
            config_path,
            exit_requested: false,
        };
        engine.history.clear()?;
        recurrence::sweep(&mut engine.active, &mut engine.bank, now())?;
        engine.update_display();
        info!(dir = %engine.vault_dir.display(), tasks = engine.active.len(), "engine opened");
        Ok(engine)
    }

    /// Execute one free-text command and return the reply.
    pub fn execute_command(&mut self, raw: &str) -> Result<String> {
        recurrence::sweep(&mut self.active, &mut self.bank, now())?;

        if raw.trim().is_empty() {
            return Ok(invalid_format(raw));
        }
        let kind = parse::command_kind(parse::first_word(raw));
        let args = parse::rest(raw);
        debug!(?kind, "dispatching command");

        match kind {
            CommandKind::Add => self.add(args),
            CommandKind::Delete => self.delete(args),
            CommandKind::List => self.list(args),
            CommandKind::Empty => self.empty(args),
            CommandKind::Search => self.search(args),
            CommandKind::Complete => self.complete(args),
            CommandKind::Edit => self.edit(args),
            CommandKind::Undo => self.undo(),
            CommandKind::ChangeDir => self.change_dir(args),
            CommandKind::GetDir => Ok(format!(
                "Working directory: {}",
                self.vault_dir.display()
            )),
            CommandKind::Recur => self.recur(args),
            CommandKind::AddRecur => self.addrecur(args),
            CommandKind::Help => Ok(help_text(args).to_string()),
            CommandKind::Show => self.show(args),
            CommandKind::Exit => {
                self.exit_requested = true;
                Ok("exiting".to_string())
            }
            CommandKind::Invalid => Ok(invalid_format(raw)),
        }
    }

    /// Snapshot of the active store, in chronological order.
    pub fn get_task_list(&self) -> Vec<Task> {
        self.active.all()
    }

    /// Snapshot of whatever the last `list` or `search` selected.
    pub fn get_display_list(&self) -> Vec<Task> {
        self.display.clone()
    }

    /// Whether `exit` has been requested.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Directory currently holding the store files.
    pub fn dir(&self) -> &Path {
        &self.vault_dir
    }

    // =========================================================================
    // add / addrecur
    // =========================================================================

    fn add(&mut self, args: &str) -> Result<String> {
        let name = parse::task_name(args).to_string();
        let comment = parse::trailing_comment(args);

        let mut dates = Vec::new();
        for raw in parse::extract_dates(args) {
            match parse::parse_date(raw) {
                Some(date) => dates.push(date),
                None => return Ok(format!("Date {raw} is not valid")),
            }
        }
        let mut times = Vec::new();
        for raw in parse::extract_times(args) {
            match parse::parse_time(raw) {
                Some(time) => times.push(time),
                None => return Ok(format!("Time {raw} is not valid")),
            }
        }

        let start_date = dates.first().copied();
        let end_date = dates.get(1).copied();
        let start_time = times.first().copied();
        let end_time = times.get(1).copied();

        if self.active.contains(&name) {
            return Ok(format!("\"{name}\" already exists"));
        }
        if name.starts_with(ID_PREFIX) {
            return Ok("Task Name cannot start with \"@\"".to_string());
        }
        if name.is_empty() {
            return Ok("Task name cannot be empty".to_string());
        }
        if start_date.is_some() && start_time.is_none() {
            return Ok("Start date must be accompanied with start time".to_string());
        }
        if let Some(end_date) = end_date {
            let Some(end_time) = end_time else {
                return Ok("End date must be accompanied with an end time".to_string());
            };
            let (Some(sd), Some(st)) = (start_date, start_time) else {
                return Ok("Start date must be accompanied with start time".to_string());
            };
            let start = sd.and_time(st);
            let end = end_date.and_time(end_time);
            if end < start {
                return Ok("Task cannot end before it starts".to_string());
            }
            for other in self.active.iter() {
                if let Some(interval) = other.interval() {
                    if intervals_overlap((start, end), interval) {
                        return Ok(format!(
                            "\"{name}\" cannot overlap with \"{}\"",
                            other.name
                        ));
                    }
                }
            }
        }

        let id = self.bank.generate(&name)?;
        let task = Task {
            name: name.clone(),
            comment,
            start_date,
            start_time,
            end_date,
            end_time,
            id: Some(id.clone()),
            recurrence: None,
        };
        if !self.active.store(task.clone()) {
            self.bank.release(&id)?;
            return Ok(format!("Task \"{name}\" cannot be added"));
        }
        self.undo_stack.push(Undoable::Add);
        self.history.store(task);
        self.update_display();
        self.save_all()?;
        Ok(format!("Task \"{name}\" successfully added"))
    }

    fn addrecur(&mut self, args: &str) -> Result<String> {
        let response = self.add(args)?;
        if !response.contains("successfully added") {
            return Ok(response);
        }
        let name = parse::task_name(args).to_string();
        // The cadence words trail the last time token, so add() read them as
        // the comment. Reclaim them and drop the bogus comment.
        let details = parse::trailing_comment(args);
        if let Some(mut task) = self.active.remove(&name) {
            task.comment = None;
            let floating = task.start_date.is_none();
            self.active.store(task);
            if floating {
                self.rollback_add(&name)?;
                return Ok(MSG_RECUR_FLOATING.to_string());
            }
        }
        let Some(details) = details else {
            self.rollback_add(&name)?;
            return Ok("insert recursion details".to_string());
        };

        let response = self.recur(&format!("{name} {details}"))?;
        if !response.contains("will recur") {
            self.rollback_add(&name)?;
            return Ok(response);
        }
        self.save_all()?;
        Ok(response)
    }

    /// Back out a half-finished addrecur: drop the task, its id, its history
    /// snapshot, and the pending undo tag.
    fn rollback_add(&mut self, name: &str) -> Result<()> {
        if let Some(task) = self.active.remove(name) {
            if let Some(id) = &task.id {
                self.bank.release(id)?;
            }
        }
        self.history.pop(name);
        if matches!(self.undo_stack.last(), Some(Undoable::Add)) {
            self.undo_stack.pop();
        }
        self.update_display();
        self.save_all()
    }

    // =========================================================================
    // delete / complete / empty
    // =========================================================================

    fn delete(&mut self, args: &str) -> Result<String> {
        let name = args.trim();
        let Some(task) = self.active.get(name).cloned() else {
            return Ok("Delete not successful".to_string());
        };
        self.undo_stack.push(Undoable::Delete);
        self.history.store(task.clone());
        self.active.remove(&task.name);
        self.trash.store(task);
        self.update_display();
        self.save_all()?;
        Ok(format!("\"{name}\" deleted successfully"))
    }

    fn complete(&mut self, args: &str) -> Result<String> {
        let name = args.trim();
        let Some(task) = self.active.get(name).cloned() else {
            return Ok(format!("\"{name}\" could not be completed"));
        };
        self.undo_stack.push(Undoable::Complete);
        self.history.store(task.clone());
        self.active.remove(&task.name);
        self.completed.store(task.clone());
        if task.is_recurring() {
            if let Some(next) = recurrence::roll_over(task, &self.active, &mut self.bank)? {
                self.active.store(next);
            }
        }
        self.update_display();
        self.save_all()?;
        Ok(format!("\"{name}\" completed successfully"))
    }

    fn empty(&mut self, args: &str) -> Result<String> {
        match args.trim().to_ascii_lowercase().as_str() {
            "trash" => {
                self.release_ids_of(&self.trash.all())?;
                self.trash.clear()?;
                Ok("trash emptied successfully".to_string())
            }
            "completed" => {
                self.release_ids_of(&self.completed.all())?;
                self.completed.clear()?;
                Ok("Completed tasks cleared".to_string())
            }
            _ => Ok("Specify to empty trash or completed tasks".to_string()),
        }
    }

    /// A completed copy of a recurring task shares its id with the live
    /// occurrence still in the active store, so only orphaned ids go.
    fn release_ids_of(&mut self, tasks: &[Task]) -> Result<()> {
        for task in tasks {
            if let Some(id) = &task.id {
                if self.active.get(id).is_none() {
                    self.bank.release(id)?;
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // list / search / show
    // =========================================================================

    fn list(&mut self, args: &str) -> Result<String> {
        let args = args.trim();
        self.display.clear();

        if args.is_empty() {
            self.update_display();
            return Ok("All tasks displayed".to_string());
        }
        match args.to_ascii_lowercase().as_str() {
            "today" => {
                let n = self.list_date(now().date());
                return Ok(format!("{n} tasks displayed"));
            }
            "week" => {
                let today = now().date();
                let n = self.list_day_period(today, today + chrono::Duration::weeks(1));
                return Ok(format!("{n} tasks displayed"));
            }
            "trash" | "deleted" => {
                self.display = self.trash.all();
                return Ok("trash displayed".to_string());
            }
            "completed" => {
                self.display = self.completed.all();
                return Ok("completed tasks displayed".to_string());
            }
            "history" => {
                self.display = self.history.all();
                return Ok("history displayed".to_string());
            }
            _ => {}
        }

        let raw_dates = parse::extract_dates(args);
        let raw_times = parse::extract_times(args);
        let mut dates = Vec::new();
        for raw in &raw_dates {
            match parse::parse_date(raw) {
                Some(date) => dates.push(date),
                None => {
                    self.update_display();
                    return Ok(MSG_INVALID_LIST.to_string());
                }
            }
        }
        let times: Vec<_> = raw_times.iter().filter_map(|raw| parse::parse_time(raw)).collect();

        let n = match (dates.as_slice(), times.as_slice()) {
            ([date], []) => self.list_date(*date),
            ([date], [time]) => self.list_date_time(date.and_time(*time)),
            ([first, second], []) => self.list_day_period(*first, *second),
            ([d1, d2], [t1, t2]) => {
                let from = d1.and_time(*t1);
                let to = d2.and_time(*t2);
                if from >= to {
                    self.update_display();
                    return Ok(MSG_INVALID_LIST.to_string());
                }
                self.list_period(from, to)
            }
            _ => {
                self.update_display();
                return Ok(MSG_INVALID_LIST.to_string());
            }
        };
        Ok(format!("{n} tasks displayed"))
    }

    /// Tasks touching a single day: events that start, end, or span it,
    /// deadlines that fall on it.
    fn list_date(&mut self, date: NaiveDate) -> usize {
        for task in self.active.all() {
            let hit = match (task.start_date, task.end_date) {
                (Some(start), Some(end)) => {
                    start == date || end == date || (start < date && end > date)
                }
                (Some(start), None) => start == date,
                _ => false,
            };
            if hit {
                self.display.push(task);
            }
        }
        self.display.len()
    }

    fn list_day_period(&mut self, from: NaiveDate, to: NaiveDate) -> usize {
        for task in self.active.all() {
            let hit = match (task.start_date, task.end_date) {
                (Some(start), Some(end)) => !(start > to || end < from),
                (Some(start), None) => from <= start && start <= to,
                _ => false,
            };
            if hit {
                self.display.push(task);
            }
        }
        self.display.len()
    }

    /// Tasks touching an exact instant: anchored at it, or an event in
    /// progress across it.
    fn list_date_time(&mut self, at: NaiveDateTime) -> usize {
        for task in self.active.all() {
            let spans = task
                .interval()
                .is_some_and(|(start, end)| start < at && end > at);
            if task.start_instant() == Some(at) || task.end_instant() == Some(at) || spans {
                self.display.push(task);
            }
        }
        self.display.len()
    }

    fn list_period(&mut self, from: NaiveDateTime, to: NaiveDateTime) -> usize {
        for task in self.active.all() {
            let within = |instant: Option<NaiveDateTime>| {
                instant.is_some_and(|i| from <= i && i <= to)
            };
            if within(task.start_instant()) || within(task.end_instant()) {
                self.display.push(task);
            }
        }
        self.display.len()
    }

    fn search(&mut self, args: &str) -> Result<String> {
        let query = args.trim();
        self.display.clear();
        let tasks = self.active.all();

        for task in &tasks {
            if task.name == query {
                self.display.push(task.clone());
            }
        }
        for word in query.split_whitespace() {
            for task in &tasks {
                let already = self.display.iter().any(|t| t.name == task.name);
                if !already && task.name.contains(word) {
                    self.display.push(task.clone());
                }
            }
        }
        Ok(format!("{} tasks found", self.display.len()))
    }

    fn show(&mut self, args: &str) -> Result<String> {
        let name = args.trim();
        let Some(task) = self.active.get(name) else {
            return Ok(format!("task {name} not found"));
        };
        let stamp = |instant: Option<NaiveDateTime>| {
            instant
                .map(|i| i.format("%H:%M %d/%m/%Y").to_string())
                .unwrap_or_default()
        };
        let mut details = format!(
            "Task Name: {}\nStart: {}\nEnd: {}\nComment: {}\n",
            task.name,
            stamp(task.start_instant()),
            stamp(task.end_instant()),
            task.comment.clone().unwrap_or_default()
        );
        if let Some(recurrence) = task.recurrence {
            details.push_str(&match recurrence.cadence {
                Cadence::Daily => "Recurs daily".to_string(),
                Cadence::Weekly(day) => format!("Recurs every {}", weekday_name(day)),
                Cadence::Monthly(day) => format!("Recurs every {day} of the month"),
                Cadence::Yearly { month, day } => {
                    format!("Recurs every {day:02}/{month:02} of the year")
                }
            });
        }
        Ok(details)
    }

    // =========================================================================
    // edit
    // =========================================================================

    fn edit(&mut self, args: &str) -> Result<String> {
        for field in [
            "taskname",
            "startdate",
            "starttime",
            "enddate",
            "endtime",
            "addcomment",
        ] {
            if let Some(idx) = args.find(field) {
                let name = args[..idx].trim().to_string();
                let value = args[idx + field.len()..].trim().to_string();
                return self.edit_field(field, &name, &value);
            }
        }
        Ok(MSG_INVALID_EDIT.to_string())
    }

    fn edit_field(&mut self, field: &str, name: &str, value: &str) -> Result<String> {
        let Some(old) = self.active.get(name).cloned() else {
            return Ok(format!("task {name} not found"));
        };
        let mut new = old.clone();

        match field {
            "taskname" => {
                if value.is_empty() {
                    return Ok("Enter a valid name".to_string());
                }
                if value == END_OF_TASK {
                    return Ok(format!("\"{value}\" cannot be used as a task name"));
                }
                if self.active.contains(value) {
                    return Ok(format!("\"{value}\" already exists"));
                }
                new.name = value.to_string();
            }
            "startdate" => {
                if old.start_date.is_none() {
                    return Ok("Cannot edit start date of floating task".to_string());
                }
                let Some(raw) = parse::extract_dates(value).first().copied() else {
                    return Ok("Enter a valid date".to_string());
                };
                let Some(date) = parse::parse_date(raw) else {
                    return Ok(format!("Date {raw} is not valid"));
                };
                new.start_date = Some(date);
            }
            "starttime" => {
                if old.start_time.is_none() {
                    return Ok("Cannot edit start time of floating task".to_string());
                }
                let Some(raw) = parse::extract_times(value).first().copied() else {
                    return Ok("Enter a valid time".to_string());
                };
                let Some(time) = parse::parse_time(raw) else {
                    return Ok(format!("Time {raw} is not valid"));
                };
                new.start_time = Some(time);
            }
            "enddate" => {
                if old.end_date.is_none() {
                    return Ok(if old.start_time.is_none() {
                        "cannot edit end date of floating task".to_string()
                    } else {
                        "cannot edit end date of deadline".to_string()
                    });
                }
                let Some(raw) = parse::extract_dates(value).first().copied() else {
                    return Ok("Enter a valid date".to_string());
                };
                let Some(date) = parse::parse_date(raw) else {
                    return Ok(format!("Date {raw} is not valid"));
                };
                new.end_date = Some(date);
            }
            "endtime" => {
                if old.end_time.is_none() {
                    return Ok(if old.start_time.is_none() {
                        "Cannot edit end time of floating task".to_string()
                    } else {
                        "Cannot edit end time of deadline".to_string()
                    });
                }
                let Some(raw) = parse::extract_times(value).first().copied() else {
                    return Ok("Enter a valid time".to_string());
                };
                let Some(time) = parse::parse_time(raw) else {
                    return Ok(format!("Time {raw} is not valid"));
                };
                new.end_time = Some(time);
            }
            "addcomment" => {
                new.comment = Some(value.to_string());
            }
            _ => return Ok(MSG_INVALID_EDIT.to_string()),
        }

        // Schedule edits must keep start strictly before end.
        if field != "taskname" && field != "addcomment" {
            if let (Some(start), Some(end)) = (new.start_instant(), new.end_instant()) {
                if start >= end {
                    return Ok(MSG_NOT_CHRON.to_string());
                }
            }
        }

        self.replace_task(&old, new)?;
        Ok(if field == "addcomment" {
            "comment added".to_string()
        } else {
            MSG_EDIT_SUCCESS.to_string()
        })
    }

    /// Swap `old` for `new` in the active store, keeping the identity key
    /// pointed at the (possibly renamed) task, and record the edit for undo.
    fn replace_task(&mut self, old: &Task, new: Task) -> Result<()> {
        self.active.remove(&old.name);
        if let Some(id) = &new.id {
            self.bank.rebind(id, &new.name)?;
        }
        self.active.store(new.clone());
        self.history.store(old.clone());
        self.history.store(new);
        self.undo_stack.push(Undoable::Edit);
        self.update_display();
        self.save_all()
    }

    // =========================================================================
    // recur
    // =========================================================================

    fn recur(&mut self, args: &str) -> Result<String> {
        let text = args.trim();
        let Some((name, matched)) = self.find_task_target(text) else {
            return Ok(format!("task {text} not found"));
        };
        let Some(task) = self.active.get(&name) else {
            return Ok(format!("task {text} not found"));
        };
        if task.start_date.is_none() {
            return Ok(MSG_RECUR_FLOATING.to_string());
        }
        let start_date = task.start_date;

        let rest = text.replacen(&matched, "", 1);
        let rest = rest.trim();
        let cadence_word = parse::first_word(rest).to_ascii_lowercase();
        let details: Vec<&str> = parse::rest(rest).split_whitespace().collect();

        match cadence_word.as_str() {
            "daily" => self.recur_daily(&name, &details),
            "weekly" => self.recur_weekly(&name, start_date, &details),
            "monthly" => self.recur_monthly(&name, start_date, &details),
            "yearly" => self.recur_yearly(&name, start_date, &details),
            _ => Ok(MSG_SPECIFY_RECURRENCE.to_string()),
        }
    }

    fn recur_daily(&mut self, name: &str, details: &[&str]) -> Result<String> {
        match details {
            [] => {
                self.apply_recurrence(name, Cadence::Daily, None)?;
                Ok(format!("{name} will recur daily forever"))
            }
            [count] => {
                let Some(count) = parse_count(count) else {
                    return Ok(MSG_INVALID_RECURRENCES.to_string());
                };
                self.apply_recurrence(name, Cadence::Daily, Some(count))?;
                Ok(format!("{name} will recur daily for {count} times"))
            }
            _ => Ok(MSG_INVALID_RECURFORMAT.to_string()),
        }
    }

    fn recur_weekly(
        &mut self,
        name: &str,
        start_date: Option<NaiveDate>,
        details: &[&str],
    ) -> Result<String> {
        let fallback_day = start_date.map(|d| d.weekday());
        let (day, count) = match details {
            [] => (fallback_day, None),
            [count] => match parse_count(count) {
                Some(count) => (fallback_day, Some(count)),
                None => return Ok(MSG_INVALID_RECURRENCES.to_string()),
            },
            [day, count] => {
                let Some(count) = parse_count(count) else {
                    return Ok(MSG_INVALID_RECURRENCES.to_string());
                };
                match parse::parse_weekday(day) {
                    Some(day) => (Some(day), Some(count)),
                    None => return Ok("insert valid day to recur on".to_string()),
                }
            }
            _ => return Ok(MSG_INVALID_RECURFORMAT.to_string()),
        };
        let Some(day) = day else {
            return Ok(MSG_RECUR_FLOATING.to_string());
        };
        self.apply_recurrence(name, Cadence::Weekly(day), count)?;
        Ok(match count {
            Some(count) => format!(
                "{name} will recur on {} weekly for {count} times",
                weekday_name(day)
            ),
            None => format!("{name} will recur on {} weekly", weekday_name(day)),
        })
    }

    fn recur_monthly(
        &mut self,
        name: &str,
        start_date: Option<NaiveDate>,
        details: &[&str],
    ) -> Result<String> {
        let fallback_day = start_date.map(|d| d.day());
        let (day, count) = match details {
            [] => (fallback_day, None),
            [count] => match parse_count(count) {
                Some(count) => (fallback_day, Some(count)),
                None => return Ok(MSG_INVALID_RECURRENCES.to_string()),
            },
            [day, count] => {
                let Ok(day) = day.parse::<u32>() else {
                    return Ok("insert valid number for day of the month".to_string());
                };
                let Some(count) = parse_count(count) else {
                    return Ok(MSG_INVALID_RECURRENCES.to_string());
                };
                (Some(day), Some(count))
            }
            _ => return Ok(MSG_INVALID_RECURFORMAT.to_string()),
        };
        let Some(day) = day else {
            return Ok(MSG_RECUR_FLOATING.to_string());
        };
        if !(1..=31).contains(&day) {
            return Ok("day of month must be between 1 and 31".to_string());
        }
        self.apply_recurrence(name, Cadence::Monthly(day), count)?;
        Ok(match count {
            Some(count) => format!("{name} will recur on {day} monthly for {count} times"),
            None => format!("{name} will recur on {day} monthly"),
        })
    }

    fn recur_yearly(
        &mut self,
        name: &str,
        start_date: Option<NaiveDate>,
        details: &[&str],
    ) -> Result<String> {
        let fallback = start_date.map(|d| (d.month(), d.day()));
        let (month_day, count) = match details {
            [] => (fallback, None),
            [count] => match parse_count(count) {
                Some(count) => (fallback, Some(count)),
                None => return Ok(MSG_INVALID_RECURRENCES.to_string()),
            },
            [month_day, count] => {
                let Some(month_day) = parse_month_day(month_day) else {
                    return Ok("insert valid day and month (dd/mm)".to_string());
                };
                let Some(count) = parse_count(count) else {
                    return Ok(MSG_INVALID_RECURRENCES.to_string());
                };
                (Some(month_day), Some(count))
            }
            _ => return Ok(MSG_INVALID_RECURFORMAT.to_string()),
        };
        let Some((month, day)) = month_day else {
            return Ok(MSG_RECUR_FLOATING.to_string());
        };
        self.apply_recurrence(name, Cadence::Yearly { month, day }, count)?;
        Ok(match count {
            Some(count) => format!(
                "{name} will recur on {day:02}/{month:02} yearly for {count} times"
            ),
            None => format!("{name} will recur on {day:02}/{month:02} yearly"),
        })
    }

    fn apply_recurrence(
        &mut self,
        name: &str,
        cadence: Cadence,
        remaining: Option<u32>,
    ) -> Result<()> {
        if let Some(mut task) = self.active.remove(name) {
            task.recurrence = Some(Recurrence::new(cadence, remaining));
            if let Some(id) = &task.id {
                self.bank.rebind(id, name)?;
            }
            self.active.store(task);
            self.save_all()?;
        }
        Ok(())
    }

    /// Resolve the task a `recur` argument names: the longest existing task
    /// name contained in the text, or the longest live id when the text is
    /// `@`-prefixed. Returns the name plus the matched substring.
    fn find_task_target(&self, text: &str) -> Option<(String, String)> {
        let mut best: Option<(String, String)> = None;
        for task in self.active.iter() {
            let candidate = if text.starts_with(ID_PREFIX) {
                match &task.id {
                    Some(id) => id.clone(),
                    None => continue,
                }
            } else {
                task.name.clone()
            };
            if text.contains(&candidate)
                && best
                    .as_ref()
                    .is_none_or(|(_, matched)| candidate.len() > matched.len())
            {
                best = Some((task.name.clone(), candidate));
            }
        }
        best
    }

    // =========================================================================
    // directories
    // =========================================================================

    fn change_dir(&mut self, args: &str) -> Result<String> {
        let arg = args.trim();
        let Ok(new_dir) = Path::new(arg).canonicalize() else {
            return Ok(MSG_NONEXIST.to_string());
        };
        if !new_dir.is_dir() {
            return Ok(MSG_NONEXIST.to_string());
        }
        self.history
            .store(Task::named(self.vault_dir.display().to_string()));
        self.undo_stack.push(Undoable::ChangeDir);
        self.relocate(&new_dir)?;
        Ok(format!("Files moved to \"{arg}\""))
    }

    /// Move every store file to `dir` and repoint the config at it.
    pub(crate) fn relocate(&mut self, dir: &Path) -> Result<()> {
        self.active.delete_file()?;
        self.trash.delete_file()?;
        self.completed.delete_file()?;
        self.history.delete_file()?;
        self.bank.delete_file()?;
        self.active.set_dir(dir);
        self.trash.set_dir(dir);
        self.completed.set_dir(dir);
        self.history.set_dir(dir);
        self.bank.set_dir(dir);
        fs::write(&self.config_path, dir.display().to_string())?;
        self.vault_dir = dir.to_path_buf();
        self.save_all()?;
        self.bank.save()?;
        info!(dir = %dir.display(), "store relocated");
        Ok(())
    }

    // =========================================================================
    // shared plumbing
    // =========================================================================

    pub(crate) fn update_display(&mut self) {
        self.display = self.active.all();
    }

    pub(crate) fn save_all(&self) -> Result<()> {
        self.active.save()?;
        self.trash.save()?;
        self.completed.save()?;
        self.history.save()
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn invalid_format(raw: &str) -> String {
    format!("invalid command format :{raw}")
}

/// Recurrence counts must be positive integers.
fn parse_count(word: &str) -> Option<u32> {
    word.parse::<u32>().ok().filter(|n| *n >= 1)
}

/// `dd/mm` (or `dd-mm`), validated against a leap year so 29/02 is allowed.
fn parse_month_day(word: &str) -> Option<(u32, u32)> {
    let (day, month) = word.split_once(['/', '-'])?;
    let day = day.parse::<u32>().ok()?;
    let month = month.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(2024, month, day)?;
    Some((month, day))
}

fn help_text(args: &str) -> &'static str {
    match args.trim().to_ascii_lowercase().as_str() {
        "" => {
            "A list of commands that you can use:\n\
             add, list, edit, delete, search, undo, help, addrecur, recur, complete, empty, getdir, changedir, exit\n\
             Enter help [command] for help with specific command syntax.\n"
        }
        "add" => "Action: Creates a task\nSyntax: add [TaskName] {StartDate StartTime} {EndDate EndTime}\n",
        "delete" => "Action: Deletes a task\nSyntax: delete [TaskName]\n",
        "edit" => "Action: Edit a field in a task\nSyntax: edit [TaskName] [Field To Edit] [New Value]\n",
        "list" => "Action: List out tasks\nSyntax: list {today/week/date/completed/trash}\n",
        "search" => "Action: Search for tasks through keywords\nSyntax: search [keywords]\n",
        "complete" => "Action: Sets a task as complete\nSyntax: complete [TaskName]\n",
        "empty" => "Action: Empty a list\nSyntax: empty {completed/trash}\n",
        "undo" => "Action: Undo the last command\nSyntax: undo\n",
        "changedir" => "Action: Change the directory that stores your data\nSyntax: changedir [PATH]\n",
        "getdir" => "Action: Get the current directory that stores your data\nSyntax: getdir\n",
        "recur" => "Action: Recur a task\nSyntax: recur [TaskName] {daily/weekly/monthly/yearly} [day of week/day of month/day and month] [recurrence]\n",
        "addrecur" => "Action: Creates a recurring task\nSyntax: addrecur [same as adding tasks] {daily/weekly/monthly/yearly} [day of week/day of month/day and month] [recurrence]\n",
        "show" => "Action: Show the details of a task\nSyntax: show [TaskName]\n",
        "exit" => "Action: Exits the program\nSyntax: exit\n",
        _ => "Invalid help command: Enter \"help\" for list of commands\n",
    }
}
