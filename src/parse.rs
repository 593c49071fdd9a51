//! Command grammar: token classification and date/time scanning.
//!
//! Commands are free text. The first whitespace-delimited word selects the
//! command kind; the remainder is scanned for up to two date tokens
//! (`dd/mm/yyyy` or `dd-mm-yy`) and up to two time tokens (`HH:MM`,
//! 24-hour), assigned positionally to start and end. Everything before the
//! first date/time token is the task name; free text after the last time
//! token is the comment.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime, Weekday};
use regex::Regex;

/// Date token: two-digit day and month, two- or four-digit year, `-` or `/`
/// separators.
const DATE_PATTERN: &str = r"([0-9]{2})[-/]([0-9]{2})[-/]([0-9]{4}|[0-9]{2})";

/// Time token: 24-hour `HH:MM`, with an optional leading zero on the hour.
const TIME_PATTERN: &str = r"([01]?[0-9]|2[0-3]):[0-5][0-9]";

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DATE_PATTERN).unwrap())
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TIME_PATTERN).unwrap())
}

/// Command selected by the first word of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Add,
    Delete,
    List,
    Empty,
    Search,
    Complete,
    Edit,
    Undo,
    ChangeDir,
    GetDir,
    Recur,
    AddRecur,
    Help,
    Show,
    Exit,
    Invalid,
}

/// Classify the first word of a command, case-insensitively.
pub fn command_kind(word: &str) -> CommandKind {
    match word.to_ascii_lowercase().as_str() {
        "add" => CommandKind::Add,
        "delete" => CommandKind::Delete,
        "list" => CommandKind::List,
        "empty" => CommandKind::Empty,
        "search" => CommandKind::Search,
        "complete" => CommandKind::Complete,
        "edit" => CommandKind::Edit,
        "undo" => CommandKind::Undo,
        "changedir" => CommandKind::ChangeDir,
        "getdir" => CommandKind::GetDir,
        "recur" => CommandKind::Recur,
        "addrecur" => CommandKind::AddRecur,
        "help" => CommandKind::Help,
        "show" => CommandKind::Show,
        "exit" => CommandKind::Exit,
        _ => CommandKind::Invalid,
    }
}

/// First whitespace-delimited word of the input.
pub fn first_word(text: &str) -> &str {
    text.trim().split_whitespace().next().unwrap_or("")
}

/// Input with its first word removed.
pub fn rest(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.find(char::is_whitespace) {
        Some(idx) => trimmed[idx..].trim_start(),
        None => "",
    }
}

/// Raw date tokens in left-to-right order, at most two.
pub fn extract_dates(text: &str) -> Vec<&str> {
    date_re()
        .find_iter(text)
        .take(2)
        .map(|m| m.as_str())
        .collect()
}

/// Raw time tokens in left-to-right order, at most two.
pub fn extract_times(text: &str) -> Vec<&str> {
    time_re()
        .find_iter(text)
        .take(2)
        .map(|m| m.as_str())
        .collect()
}

/// Whether the text is exactly one date token.
pub fn is_date_token(text: &str) -> bool {
    date_re()
        .find(text)
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
}

/// Whether the text is exactly one time token.
pub fn is_time_token(text: &str) -> bool {
    time_re()
        .find(text)
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
}

/// Parse a raw date token. Two-digit years are taken as 20yy. Returns `None`
/// for calendar-invalid dates such as `31/02/2025`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let caps = date_re().captures(raw)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let mut year: i32 = caps[3].parse().ok()?;
    if caps[3].len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a raw `HH:MM` token.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    if !is_time_token(raw) {
        return None;
    }
    let (hours, minutes) = raw.split_once(':')?;
    NaiveTime::from_hms_opt(hours.parse().ok()?, minutes.parse().ok()?, 0)
}

/// Task name for `add`: everything before the first date or time token.
pub fn task_name(text: &str) -> &str {
    let date_start = date_re().find(text).map(|m| m.start());
    let time_start = time_re().find(text).map(|m| m.start());
    let cut = match (date_start, time_start) {
        (Some(d), Some(t)) => d.min(t),
        (Some(d), None) => d,
        (None, Some(t)) => t,
        (None, None) => text.len(),
    };
    text[..cut].trim()
}

/// Free text after the last time token, used as the task comment. A trailing
/// date token is part of the schedule, not a comment.
pub fn trailing_comment(text: &str) -> Option<String> {
    let last = time_re().find_iter(text).last()?;
    let tail = text[last.end()..].trim();
    if tail.is_empty() || is_date_token(tail) {
        return None;
    }
    Some(tail.to_string())
}

/// Match a weekday argument by its three-letter prefix (`mon`..`sun`),
/// anywhere in the word and case-insensitively.
pub fn parse_weekday(word: &str) -> Option<Weekday> {
    let lower = word.to_ascii_lowercase();
    for (prefix, day) in [
        ("mon", Weekday::Mon),
        ("tue", Weekday::Tue),
        ("wed", Weekday::Wed),
        ("thu", Weekday::Thu),
        ("fri", Weekday::Fri),
        ("sat", Weekday::Sat),
        ("sun", Weekday::Sun),
    ] {
        if lower.contains(prefix) {
            return Some(day);
        }
    }
    None
}
