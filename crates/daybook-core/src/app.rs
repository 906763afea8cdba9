use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::{debug, error};

use crate::datastore::{self, KeyValueStore};
use crate::filter::{self, Horizon, TodayStats, ViewSelector};
use crate::store::{FolderStore, TaskStore};
use crate::task::{Folder, Task, TaskDraft};

/// Create/edit form contents: the draft plus the task being edited, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
    pub editing: Option<String>,
    pub draft: TaskDraft,
}

impl TaskForm {
    /// A blank "add" form: date and time default to `now`, the folder to the
    /// folder currently selected in the sidebar.
    pub fn for_new(now: NaiveDateTime, selected_folder: Option<&str>) -> Self {
        Self {
            editing: None,
            draft: TaskDraft {
                title: String::new(),
                memo: None,
                date: Some(now.date()),
                time: NaiveTime::from_hms_opt(now.hour(), now.minute(), 0),
                folder_id: selected_folder.map(str::to_string),
            },
        }
    }

    pub fn for_edit(task: &Task) -> Self {
        Self {
            editing: Some(task.id.clone()),
            draft: task.to_draft(),
        }
    }
}

/// Everything the presentation layer drives: both collections, the current
/// view, and the slot store they persist to.
#[derive(Debug)]
pub struct AppState<S: KeyValueStore> {
    pub tasks: TaskStore,
    pub folders: FolderStore,
    pub view: ViewSelector,
    storage: S,
}

impl<S: KeyValueStore> AppState<S> {
    #[tracing::instrument(skip(storage))]
    pub fn load(mut storage: S) -> anyhow::Result<Self> {
        let tasks = datastore::load_tasks(&mut storage).context("failed to load tasks")?;
        let folders = datastore::load_folders(&mut storage).context("failed to load folders")?;
        debug!(
            tasks = tasks.len(),
            folders = folders.len(),
            "application state loaded"
        );

        Ok(Self {
            tasks: TaskStore::new(tasks),
            folders: FolderStore::new(folders),
            view: ViewSelector::default(),
            storage,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the new id, or `None` when the title was blank.
    pub fn create_task(&mut self, draft: TaskDraft) -> anyhow::Result<Option<String>> {
        let created = self.tasks.create(draft);
        if created.is_some() {
            self.persist_tasks()?;
        }
        Ok(created)
    }

    pub fn update_task(&mut self, id: &str, draft: TaskDraft) -> anyhow::Result<bool> {
        let changed = self.tasks.update(id, draft);
        if changed {
            self.persist_tasks()?;
        }
        Ok(changed)
    }

    pub fn toggle_complete(&mut self, id: &str) -> anyhow::Result<bool> {
        let changed = self.tasks.toggle_complete(id);
        if changed {
            self.persist_tasks()?;
        }
        Ok(changed)
    }

    pub fn delete_task(&mut self, id: &str) -> anyhow::Result<bool> {
        let changed = self.tasks.delete(id);
        if changed {
            self.persist_tasks()?;
        }
        Ok(changed)
    }

    pub fn create_folder(&mut self, name: &str, color: &str) -> anyhow::Result<String> {
        let id = self.folders.create(name, color)?;
        self.persist_folders()?;
        Ok(id)
    }

    pub fn select_tab(&mut self, horizon: Horizon) {
        self.view.select_tab(horizon);
    }

    pub fn select_folder(&mut self, folder_id: &str) {
        self.view.select_folder(folder_id);
    }

    pub fn folders(&self) -> &[Folder] {
        self.folders.all()
    }

    pub fn folder_color(&self, folder_id: Option<&str>) -> &str {
        self.folders.color_of(folder_id)
    }

    pub fn visible_tasks(&self, today: NaiveDate) -> Vec<&Task> {
        filter::visible_tasks(self.tasks.all(), &self.view, today)
    }

    pub fn today_stats(&self, today: NaiveDate) -> TodayStats {
        filter::today_stats(self.tasks.all(), today)
    }

    pub fn new_form(&self, now: NaiveDateTime) -> TaskForm {
        TaskForm::for_new(now, self.view.selected_folder.as_deref())
    }

    pub fn edit_form(&self, id: &str) -> Option<TaskForm> {
        self.tasks.get(id).map(TaskForm::for_edit)
    }

    /// Edits the target task if the form has one, creates a task otherwise.
    /// `false` means nothing changed: blank title or a vanished edit target.
    pub fn submit(&mut self, form: TaskForm) -> anyhow::Result<bool> {
        match form.editing {
            Some(id) => self.update_task(&id, form.draft),
            None => Ok(self.create_task(form.draft)?.is_some()),
        }
    }

    // The in-memory change stays committed when the write fails.
    fn persist_tasks(&mut self) -> anyhow::Result<()> {
        datastore::save_tasks(&mut self.storage, self.tasks.all()).inspect_err(|err| {
            error!(error = %format!("{err:#}"), "task changes were not persisted");
        })
    }

    fn persist_folders(&mut self) -> anyhow::Result<()> {
        datastore::save_folders(&mut self.storage, self.folders.all()).inspect_err(|err| {
            error!(error = %format!("{err:#}"), "folder changes were not persisted");
        })
    }
}
