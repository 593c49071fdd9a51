//! Undo engine: a stack of operation tags paired with history snapshots.
//!
//! Every mutating command pushes a tag here and stores the affected task in
//! the history vault (edits store two snapshots, old then new). Undoing pops
//! the tag and replays the inverse. A snapshot whose id is no longer live in
//! the identity bank belongs to a task that was destroyed some other way
//! (emptied, expired); such an entry is stale and undo skips past it to the
//! next one.

use std::path::Path;

use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::Result;
use crate::task::Task;

/// Tag of one undoable operation. The matching snapshots live in the
/// history vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Undoable {
    Add,
    Delete,
    Complete,
    Edit,
    ChangeDir,
}

impl Engine {
    pub(crate) fn undo(&mut self) -> Result<String> {
        let Some(tag) = self.undo_stack.pop() else {
            return Ok("no more undo left".to_string());
        };
        debug!(?tag, "undoing");
        match tag {
            Undoable::Add => self.undo_add(),
            Undoable::Delete => self.undo_delete(),
            Undoable::Complete => self.undo_complete(),
            Undoable::Edit => self.undo_edit(),
            Undoable::ChangeDir => self.undo_change_dir(),
        }
    }

    fn undo_add(&mut self) -> Result<String> {
        let Some(snapshot) = self.pop_last_snapshot() else {
            return self.undo();
        };
        if self.is_stale(&snapshot) {
            return self.undo();
        }
        // Undoing an add destroys the task for good, so the key goes too.
        if let Some(task) = self.active.remove(&snapshot.name) {
            if let Some(id) = &task.id {
                self.bank.release(id)?;
            }
        }
        self.update_display();
        self.save_all()?;
        Ok(format!(
            "Undo add: \"{}\" removed from tasks",
            snapshot.name
        ))
    }

    fn undo_delete(&mut self) -> Result<String> {
        let Some(snapshot) = self.pop_last_snapshot() else {
            return self.undo();
        };
        if self.is_stale(&snapshot) {
            return self.undo();
        }
        let name = snapshot.name.clone();
        if !self.active.store(snapshot) {
            warn!(name = %name, "restore from trash blocked, name back in use");
            return Ok(format!("Undo delete: \"{name}\" could not be restored"));
        }
        self.trash.remove(&name);
        self.update_display();
        self.save_all()?;
        Ok(format!(
            "Undo delete: \"{name}\" moved back from trash to tasks"
        ))
    }

    fn undo_complete(&mut self) -> Result<String> {
        let Some(snapshot) = self.pop_last_snapshot() else {
            return self.undo();
        };
        if self.is_stale(&snapshot) {
            return self.undo();
        }
        // A recurring task has already rolled over into the active store;
        // restoring the pre-complete snapshot replaces that occurrence
        // rather than re-triggering the rollover.
        self.active.remove(&snapshot.name);
        let name = snapshot.name.clone();
        if !self.active.store(snapshot) {
            warn!(name = %name, "restore from completed blocked");
            return Ok(format!("Undo complete: \"{name}\" could not be restored"));
        }
        self.completed.remove(&name);
        self.update_display();
        self.save_all()?;
        Ok(format!(
            "Undo complete: \"{name}\" moved back from completed to tasks"
        ))
    }

    fn undo_edit(&mut self) -> Result<String> {
        let Some(new) = self.pop_last_snapshot() else {
            return self.undo();
        };
        let Some(old) = self.pop_last_snapshot() else {
            return self.undo();
        };
        if self.is_stale(&new) {
            return self.undo();
        }
        self.active.remove(&new.name);
        if let Some(id) = &old.id {
            self.bank.rebind(id, &old.name)?;
        }
        let name = old.name.clone();
        self.active.store(old);
        self.update_display();
        self.save_all()?;
        Ok(format!("Undo edit: Change made to \"{name}\" discarded"))
    }

    /// The snapshot for a directory change is a pseudo-task whose name is
    /// the previous store path.
    fn undo_change_dir(&mut self) -> Result<String> {
        let Some(snapshot) = self.pop_last_snapshot() else {
            return self.undo();
        };
        let previous = Path::new(&snapshot.name).to_path_buf();
        if !previous.is_dir() {
            return Ok("Directory doesnt exist".to_string());
        }
        self.relocate(&previous)?;
        Ok(format!("Files moved to \"{}\"", previous.display()))
    }

    fn pop_last_snapshot(&mut self) -> Option<Task> {
        let name = self.history.last_name()?.to_string();
        self.history.pop(&name)
    }

    /// A snapshot is stale when it carries an id the bank no longer knows.
    fn is_stale(&self, snapshot: &Task) -> bool {
        snapshot
            .id
            .as_deref()
            .is_some_and(|id| !self.bank.exists(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine() -> (TempDir, Engine) {
        let temp = TempDir::new().unwrap();
        let engine = Engine::open(temp.path()).unwrap();
        (temp, engine)
    }

    fn run(engine: &mut Engine, command: &str) -> String {
        engine.execute_command(command).unwrap()
    }

    #[test]
    fn empty_stack_reports_nothing_to_undo() {
        let (_temp, mut engine) = engine();
        assert_eq!(run(&mut engine, "undo"), "no more undo left");
    }

    #[test]
    fn undo_add_removes_the_task() {
        let (_temp, mut engine) = engine();

        run(&mut engine, "add chore");
        assert_eq!(
            run(&mut engine, "undo"),
            "Undo add: \"chore\" removed from tasks"
        );
        assert!(engine.get_task_list().is_empty());
    }

    #[test]
    fn undo_delete_restores_from_trash() {
        let (_temp, mut engine) = engine();

        run(&mut engine, "add chore");
        run(&mut engine, "delete chore");
        assert_eq!(
            run(&mut engine, "undo"),
            "Undo delete: \"chore\" moved back from trash to tasks"
        );
        assert_eq!(engine.get_task_list()[0].name, "chore");
        run(&mut engine, "list trash");
        assert!(engine.get_display_list().is_empty());
    }

    #[test]
    fn undo_complete_restores_from_completed() {
        let (_temp, mut engine) = engine();

        run(&mut engine, "add chore");
        run(&mut engine, "complete chore");
        assert_eq!(
            run(&mut engine, "undo"),
            "Undo complete: \"chore\" moved back from completed to tasks"
        );
        assert_eq!(engine.get_task_list()[0].name, "chore");
        run(&mut engine, "list completed");
        assert!(engine.get_display_list().is_empty());
    }

    #[test]
    fn undo_edit_restores_the_old_task() {
        let (_temp, mut engine) = engine();

        run(&mut engine, "add deadline 01/06/2030 09:00");
        run(&mut engine, "edit deadline startdate 02/06/2030");
        assert_eq!(
            run(&mut engine, "undo"),
            "Undo edit: Change made to \"deadline\" discarded"
        );
        let task = &engine.get_task_list()[0];
        assert_eq!(
            task.start_date,
            chrono::NaiveDate::from_ymd_opt(2030, 6, 1)
        );
    }

    #[test]
    fn undo_edit_restores_a_rename() {
        let (_temp, mut engine) = engine();

        run(&mut engine, "add old name");
        let id = engine.get_task_list()[0].id.clone().unwrap();
        run(&mut engine, "edit old name taskname new name");
        run(&mut engine, "undo");

        let task = &engine.get_task_list()[0];
        assert_eq!(task.name, "old name");
        assert_eq!(engine.bank.owner(&id), Some("old name"));
    }

    #[test]
    fn undo_is_lifo_across_operations() {
        let (_temp, mut engine) = engine();

        run(&mut engine, "add first");
        run(&mut engine, "add second");
        run(&mut engine, "delete first");

        assert_eq!(
            run(&mut engine, "undo"),
            "Undo delete: \"first\" moved back from trash to tasks"
        );
        assert_eq!(
            run(&mut engine, "undo"),
            "Undo add: \"second\" removed from tasks"
        );
        assert_eq!(
            run(&mut engine, "undo"),
            "Undo add: \"first\" removed from tasks"
        );
        assert_eq!(run(&mut engine, "undo"), "no more undo left");
    }

    #[test]
    fn stale_entries_are_skipped() {
        let (_temp, mut engine) = engine();

        run(&mut engine, "add keeper");
        run(&mut engine, "add disposable");
        run(&mut engine, "delete disposable");
        // Emptying the trash releases the id, making the delete entry stale.
        run(&mut engine, "empty trash");

        assert_eq!(
            run(&mut engine, "undo"),
            "Undo add: \"keeper\" removed from tasks"
        );
        assert!(engine.get_task_list().is_empty());
    }

    #[test]
    fn blocked_restore_from_trash_is_reported() {
        let (_temp, mut engine) = engine();

        run(&mut engine, "add chore");
        // A delete entry whose task name is back in use.
        engine.history.store(Task::named("chore"));
        engine.undo_stack.push(Undoable::Delete);

        assert_eq!(
            run(&mut engine, "undo"),
            "Undo delete: \"chore\" could not be restored"
        );
        assert_eq!(engine.get_task_list().len(), 1);
    }

    #[test]
    fn undo_change_dir_moves_the_store_back() {
        let (_temp, mut engine) = engine();
        let original = engine.dir().to_path_buf();
        let other = TempDir::new().unwrap();

        let response = run(
            &mut engine,
            &format!("changedir {}", other.path().display()),
        );
        assert!(response.starts_with("Files moved to"), "{response}");
        assert_ne!(engine.dir(), original.as_path());

        let response = run(&mut engine, "undo");
        assert!(response.starts_with("Files moved to"), "{response}");
        assert_eq!(engine.dir(), original.as_path());
    }
}
