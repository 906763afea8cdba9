use anyhow::anyhow;
use tracing::{debug, info};

use crate::color::normalize_hex_color;
use crate::task::{Folder, NO_FOLDER_COLOR, Task, TaskDraft, new_id};

/// In-memory task collection. Mutations report whether anything changed so
/// the caller knows when to persist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Appends a new task and returns its id; `None` for a blank title.
    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    pub fn create(&mut self, draft: TaskDraft) -> Option<String> {
        if !draft.has_title() {
            debug!("ignoring task with blank title");
            return None;
        }

        let mut id = new_id();
        while self.get(&id).is_some() {
            id = new_id();
        }

        self.tasks.push(Task::from_draft(id.clone(), draft));
        info!(id = %id, count = self.tasks.len(), "task created");
        Some(id)
    }

    #[tracing::instrument(skip(self, draft))]
    pub fn update(&mut self, id: &str, draft: TaskDraft) -> bool {
        if !draft.has_title() {
            debug!("ignoring update with blank title");
            return false;
        }
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!("no task to update");
            return false;
        };
        task.apply_draft(draft);
        true
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_complete(&mut self, id: &str) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!("no task to toggle");
            return false;
        };
        task.completed = !task.completed;
        debug!(completed = task.completed, "toggled task");
        true
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(idx) = self.tasks.iter().position(|t| t.id == id) else {
            debug!("no task to delete");
            return false;
        };
        self.tasks.remove(idx);
        true
    }

    /// Finds a task by its full id or by a prefix that only one id starts with.
    pub fn resolve(&self, reference: &str) -> anyhow::Result<&Task> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(anyhow!("task id cannot be empty"));
        }
        if let Some(task) = self.get(reference) {
            return Ok(task);
        }

        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(reference));
        let first = matches
            .next()
            .ok_or_else(|| anyhow!("no task matches {reference}"))?;
        if matches.next().is_some() {
            return Err(anyhow!("task id {reference} is ambiguous"));
        }
        Ok(first)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderStore {
    folders: Vec<Folder>,
}

impl FolderStore {
    pub fn new(folders: Vec<Folder>) -> Self {
        Self { folders }
    }

    pub fn all(&self) -> &[Folder] {
        &self.folders
    }

    pub fn get(&self, id: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    /// Folder color, or the neutral swatch for no folder or a dangling id.
    pub fn color_of(&self, folder_id: Option<&str>) -> &str {
        folder_id
            .and_then(|id| self.get(id))
            .map(|folder| folder.color.as_str())
            .unwrap_or(NO_FOLDER_COLOR)
    }

    pub fn name_of(&self, folder_id: Option<&str>) -> Option<&str> {
        folder_id
            .and_then(|id| self.get(id))
            .map(|folder| folder.name.as_str())
    }

    #[tracing::instrument(skip(self))]
    pub fn create(&mut self, name: &str, color: &str) -> anyhow::Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("folder name cannot be empty"));
        }
        let color = normalize_hex_color(color)
            .ok_or_else(|| anyhow!("invalid folder color {color:?}; expected #rgb or #rrggbb"))?;

        let mut id = new_id();
        while self.get(&id).is_some() {
            id = new_id();
        }

        self.folders.push(Folder {
            id: id.clone(),
            name: name.to_string(),
            color,
        });
        info!(id = %id, "folder created");
        Ok(id)
    }
}
