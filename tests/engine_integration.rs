//! End-to-end command scenarios driven through the library API.

use cdo::task::Cadence;
use cdo::Engine;
use chrono::{Datelike, NaiveDate, Weekday};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Engine {
    Engine::open(dir.path()).expect("engine")
}

fn run(engine: &mut Engine, command: &str) -> String {
    engine.execute_command(command).expect("command")
}

#[test]
fn add_then_undo_restores_the_previous_state() {
    let dir = TempDir::new().unwrap();
    let mut engine = open(&dir);

    run(&mut engine, "add keep me 01/06/2030 09:00");
    let before: Vec<String> = engine.get_task_list().into_iter().map(|t| t.name).collect();

    run(&mut engine, "add transient 02/06/2030 09:00");
    assert_eq!(engine.get_task_list().len(), 2);

    run(&mut engine, "undo");
    let after: Vec<String> = engine.get_task_list().into_iter().map(|t| t.name).collect();
    assert_eq!(after, before);
}

#[test]
fn edit_startdate_then_undo_restores_the_date() {
    let dir = TempDir::new().unwrap();
    let mut engine = open(&dir);

    run(&mut engine, "add review 01/06/2030 09:00");
    assert_eq!(
        run(&mut engine, "edit review startdate 05/06/2030"),
        "edit complete"
    );
    assert_eq!(
        engine.get_task_list()[0].start_date,
        NaiveDate::from_ymd_opt(2030, 6, 5)
    );

    run(&mut engine, "undo");
    assert_eq!(
        engine.get_task_list()[0].start_date,
        NaiveDate::from_ymd_opt(2030, 6, 1)
    );
}

#[test]
fn overlapping_event_is_rejected_and_leaves_no_trace() {
    let dir = TempDir::new().unwrap();
    let mut engine = open(&dir);

    run(&mut engine, "add meeting 01/06/2030 09:00 01/06/2030 10:00");
    assert_eq!(
        run(&mut engine, "add call 01/06/2030 09:30 01/06/2030 09:45"),
        "\"call\" cannot overlap with \"meeting\""
    );

    assert_eq!(engine.get_task_list().len(), 1);
    // The rejected add must not be undoable.
    assert_eq!(
        run(&mut engine, "undo"),
        "Undo add: \"meeting\" removed from tasks"
    );
}

#[test]
fn completing_a_recurring_task_rolls_it_over() {
    let dir = TempDir::new().unwrap();
    let mut engine = open(&dir);

    // 2030-06-01 is a Saturday.
    run(&mut engine, "add report 01/06/2030 09:00");
    run(&mut engine, "recur report weekly 3");
    run(&mut engine, "complete report");

    let tasks = engine.get_task_list();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].start_date, NaiveDate::from_ymd_opt(2030, 6, 8));
    assert_eq!(tasks[0].start_date.unwrap().weekday(), Weekday::Sat);
    assert_eq!(tasks[0].recurrence.unwrap().remaining, Some(2));

    run(&mut engine, "list completed");
    assert_eq!(engine.get_display_list().len(), 1);
}

#[test]
fn final_occurrence_in_the_past_expires_on_the_next_command() {
    let dir = TempDir::new().unwrap();
    let mut engine = open(&dir);

    run(&mut engine, "add old chore 05/01/2020 09:00");
    run(&mut engine, "recur old chore weekly 1");

    // The sweep at the start of any command consumes the elapsed final
    // occurrence.
    run(&mut engine, "list");
    assert!(engine.get_task_list().is_empty());
}

#[test]
fn recurrence_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    {
        let mut engine = open(&dir);
        run(&mut engine, "add rent 01/06/2030 09:00");
        run(&mut engine, "recur rent monthly 1 12");
    }

    let engine = open(&dir);
    let tasks = engine.get_task_list();
    assert_eq!(tasks.len(), 1);
    let recurrence = tasks[0].recurrence.expect("still recurring");
    assert_eq!(recurrence.cadence, Cadence::Monthly(1));
    assert_eq!(recurrence.remaining, Some(12));
}

#[test]
fn changedir_relocates_the_store_files() {
    let dir = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    let mut engine = open(&dir);

    run(&mut engine, "add movable");
    let response = run(
        &mut engine,
        &format!("changedir {}", other.path().display()),
    );
    assert!(response.starts_with("Files moved to"), "{response}");

    assert!(other.path().join("taskList.txt").exists());
    assert!(!dir.path().join("taskList.txt").exists());
    assert_eq!(engine.get_task_list()[0].name, "movable");

    let config = std::fs::read_to_string(dir.path().join("config.txt")).unwrap();
    assert_eq!(
        config.trim(),
        other.path().canonicalize().unwrap().display().to_string()
    );
}

#[test]
fn getdir_reports_the_store_directory() {
    let dir = TempDir::new().unwrap();
    let mut engine = open(&dir);

    let response = run(&mut engine, "getdir");
    assert!(response.starts_with("Working directory: "), "{response}");
}

#[test]
fn ids_stay_stable_across_restarts_and_edits() {
    let dir = TempDir::new().unwrap();
    let id = {
        let mut engine = open(&dir);
        run(&mut engine, "add tracked");
        engine.get_task_list()[0].id.clone().unwrap()
    };

    let mut engine = open(&dir);
    run(&mut engine, "edit tracked taskname renamed");
    let task = &engine.get_task_list()[0];
    assert_eq!(task.name, "renamed");
    assert_eq!(task.id.as_deref(), Some(id.as_str()));

    run(&mut engine, "add fresh");
    let fresh = engine
        .get_task_list()
        .into_iter()
        .find(|t| t.name == "fresh")
        .and_then(|t| t.id)
        .unwrap();
    assert_ne!(fresh, id);
}
