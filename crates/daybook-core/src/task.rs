use anyhow::anyhow;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::datetime::{DATE_FORMAT, TIME_FORMAT};

/// Swatch used for tasks without a folder or with a folder that no longer exists.
pub const NO_FOLDER_COLOR: &str = "#f0f0f0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredTask", into = "StoredTask")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub memo: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub folder_id: Option<String>,
    pub completed: bool,
}

/// The editable part of a task, as filled in by the create/edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub memo: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(deserialize_with = "loose_id")]
    pub id: String,
    pub name: String,
    pub color: String,
}

impl Task {
    pub fn from_draft(id: String, draft: TaskDraft) -> Self {
        let mut task = Self {
            id,
            title: String::new(),
            memo: None,
            date: None,
            time: None,
            folder_id: None,
            completed: false,
        };
        task.apply_draft(draft);
        task
    }

    /// Replaces every mutable field except `completed`.
    pub fn apply_draft(&mut self, draft: TaskDraft) {
        self.title = draft.title.trim().to_string();
        self.memo = non_blank(draft.memo);
        self.date = draft.date;
        self.time = draft.time;
        self.folder_id = non_blank(draft.folder_id);
    }

    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            memo: self.memo.clone(),
            date: self.date,
            time: self.time,
            folder_id: self.folder_id.clone(),
        }
    }

    /// The chronological point used for ordering. A missing time means the
    /// start of the day; an undated task has no point at all.
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        self.date
            .map(|date| date.and_time(self.time.unwrap_or(NaiveTime::MIN)))
    }
}

impl TaskDraft {
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn default_folders() -> Vec<Folder> {
    [
        ("f1", "업무", "#E1F5FE"),
        ("f2", "개인", "#FCE4EC"),
        ("f3", "공부", "#E8F5E9"),
    ]
    .into_iter()
    .map(|(id, name, color)| Folder {
        id: id.to_string(),
        name: name.to_string(),
        color: color.to_string(),
    })
    .collect()
}

// Storage shape: camelCase keys, empty strings standing in for absent values,
// ids that may have been written as numbers.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTask {
    #[serde(deserialize_with = "loose_id")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    folder_id: Option<String>,
    #[serde(default)]
    completed: bool,
}

impl TryFrom<StoredTask> for Task {
    type Error = anyhow::Error;

    fn try_from(raw: StoredTask) -> Result<Self, Self::Error> {
        let id = raw.id.trim().to_string();
        if id.is_empty() {
            return Err(anyhow!("task has an empty id"));
        }

        let title = raw.title.trim().to_string();
        if title.is_empty() {
            return Err(anyhow!("task {id} has an empty title"));
        }

        let date = non_blank(raw.date)
            .map(|value| {
                NaiveDate::parse_from_str(&value, DATE_FORMAT)
                    .map_err(|err| anyhow!("task {id} has invalid date {value:?}: {err}"))
            })
            .transpose()?;

        let time = non_blank(raw.time)
            .map(|value| {
                NaiveTime::parse_from_str(&value, TIME_FORMAT)
                    .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M:%S"))
                    .map_err(|err| anyhow!("task {id} has invalid time {value:?}: {err}"))
            })
            .transpose()?;

        Ok(Self {
            id,
            title,
            memo: non_blank(raw.memo),
            date,
            time,
            folder_id: non_blank(raw.folder_id),
            completed: raw.completed,
        })
    }
}

impl From<Task> for StoredTask {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            memo: task.memo,
            date: task.date.map(|d| d.format(DATE_FORMAT).to_string()),
            time: task.time.map(|t| t.format(TIME_FORMAT).to_string()),
            folder_id: task.folder_id,
            completed: task.completed,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseId {
    Text(String),
    Number(serde_json::Number),
}

fn loose_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match LooseId::deserialize(deserializer)? {
        LooseId::Text(text) => text,
        LooseId::Number(number) => number.to_string(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
