//! Derives the visible task list from the
//! full collection and the current view.

use std::cmp::Ordering;

use chrono::NaiveDate;
use tracing::trace;

use crate::datetime::week_bounds;
use crate::task::Task;

/// Time horizon tab. `All` is what a folder
/// selection switches to: no date filter.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  clap::ValueEnum,
)]
pub enum Horizon {
  #[default]
  Today,
  Week,
  Later,
  All
}

impl Horizon {
  pub fn as_str(self) -> &'static str {
    match self {
      | Horizon::Today => "today",
      | Horizon::Week => "week",
      | Horizon::Later => "later",
      | Horizon::All => "all"
    }
  }

  #[must_use]
  pub fn matches(
    self,
    task: &Task,
    today: NaiveDate
  ) -> bool {
    match self {
      | Horizon::Today => {
        is_due_today(task, today)
      }
      | Horizon::Week => {
        is_this_week(task, today)
      }
      | Horizon::Later => {
        is_later(task, today)
      }
      | Horizon::All => true
    }
  }
}

impl std::str::FromStr for Horizon {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "today" => Ok(Horizon::Today),
      | "week" => Ok(Horizon::Week),
      | "later" => Ok(Horizon::Later),
      | "all" => Ok(Horizon::All),
      | other => {
        Err(anyhow::anyhow!(
          "unknown view: {other} \
           (expected today, week, \
           later or all)"
        ))
      }
    }
  }
}

/// Navigational state. The two fields are
/// independent; `select_tab` and
/// `select_folder` keep them mutually
/// exclusive the way the sidebar does.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct ViewSelector {
  pub active:          Horizon,
  pub selected_folder: Option<String>
}

impl ViewSelector {
  pub fn select_tab(
    &mut self,
    horizon: Horizon
  ) {
    self.active = horizon;
    self.selected_folder = None;
  }

  pub fn select_folder(
    &mut self,
    folder_id: impl Into<String>
  ) {
    self.selected_folder =
      Some(folder_id.into());
    self.active = Horizon::All;
  }

  #[must_use]
  pub fn matches(
    &self,
    task: &Task,
    today: NaiveDate
  ) -> bool {
    if let Some(folder) =
      self.selected_folder.as_deref()
      && task.folder_id.as_deref()
        != Some(folder)
    {
      return false;
    }

    self.active.matches(task, today)
  }
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub struct TodayStats {
  pub total:     usize,
  pub completed: usize
}

#[must_use]
pub fn is_due_today(
  task: &Task,
  today: NaiveDate
) -> bool {
  task.date == Some(today)
}

#[must_use]
pub fn is_this_week(
  task: &Task,
  today: NaiveDate
) -> bool {
  let (start, end) = week_bounds(today);
  task
    .date
    .map(|date| {
      start <= date && date <= end
    })
    .unwrap_or(false)
}

/// Undated, or strictly after today. The
/// time of day never matters here.
#[must_use]
pub fn is_later(
  task: &Task,
  today: NaiveDate
) -> bool {
  task
    .date
    .map(|date| date > today)
    .unwrap_or(true)
}

#[tracing::instrument(skip(tasks, view))]
pub fn visible_tasks<'a>(
  tasks: &'a [Task],
  view: &ViewSelector,
  today: NaiveDate
) -> Vec<&'a Task> {
  let mut visible: Vec<&Task> = tasks
    .iter()
    .filter(|task| view.matches(task, today))
    .collect();
  sort_chronologically(&mut visible);

  trace!(
    total = tasks.len(),
    visible = visible.len(),
    view = view.active.as_str(),
    folder = ?view.selected_folder,
    "derived visible tasks"
  );
  visible
}

/// Ascending by date and time. Undated
/// tasks go last; equal points keep their
/// collection order.
pub fn sort_chronologically(
  tasks: &mut [&Task]
) {
  tasks.sort_by(|a, b| {
    compare_schedule(a, b)
  });
}

fn compare_schedule(
  a: &Task,
  b: &Task
) -> Ordering {
  match (a.scheduled_at(), b.scheduled_at())
  {
    | (Some(x), Some(y)) => x.cmp(&y),
    | (Some(_), None) => Ordering::Less,
    | (None, Some(_)) => {
      Ordering::Greater
    }
    | (None, None) => Ordering::Equal
  }
}

/// Dashboard numbers. Always computed over
/// the whole collection, never the
/// filtered view.
#[must_use]
pub fn today_stats(
  tasks: &[Task],
  today: NaiveDate
) -> TodayStats {
  tasks
    .iter()
    .filter(|task| is_due_today(task, today))
    .fold(
      TodayStats::default(),
      |mut stats, task| {
        stats.total += 1;
        if task.completed {
          stats.completed += 1;
        }
        stats
      }
    )
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    NaiveTime
  };

  use super::{
    Horizon,
    ViewSelector,
    today_stats,
    visible_tasks
  };
  use crate::task::{
    Task,
    TaskDraft
  };

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d)
      .expect("valid date")
  }

  fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0)
      .expect("valid time")
  }

  fn task(
    id: &str,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    folder: Option<&str>
  ) -> Task {
    Task::from_draft(
      id.to_string(),
      TaskDraft {
        title: format!("task {id}"),
        memo: None,
        date,
        time,
        folder_id: folder
          .map(str::to_string)
      }
    )
  }

  fn ids(
    tasks: &[Task],
    view: &ViewSelector,
    today: NaiveDate
  ) -> Vec<String> {
    visible_tasks(tasks, view, today)
      .into_iter()
      .map(|t| t.id.clone())
      .collect()
  }

  fn tab(horizon: Horizon) -> ViewSelector {
    let mut view = ViewSelector::default();
    view.select_tab(horizon);
    view
  }

  #[test]
  fn monday_scenario() {
    let tasks = vec![
      task("mon", Some(day(10)), None, None),
      task("fri", Some(day(14)), None, None),
      task(
        "next-mon",
        Some(day(17)),
        None,
        None
      ),
      task("undated", None, None, None),
    ];
    let today = day(10);

    assert_eq!(
      ids(&tasks, &tab(Horizon::Today), today),
      vec!["mon"]
    );
    assert_eq!(
      ids(&tasks, &tab(Horizon::Week), today),
      vec!["mon", "fri"]
    );
    assert_eq!(
      ids(&tasks, &tab(Horizon::Later), today),
      vec!["fri", "next-mon", "undated"]
    );
  }

  #[test]
  fn sunday_still_belongs_to_the_week() {
    let tasks = vec![
      task("sun", Some(day(16)), None, None),
      task("prev-sun", Some(day(9)), None, None),
    ];
    assert_eq!(
      ids(&tasks, &tab(Horizon::Week), day(13)),
      vec!["sun"]
    );
  }

  #[test]
  fn earlier_today_is_today_not_later() {
    let tasks = vec![task(
      "early",
      Some(day(10)),
      Some(at(0, 5)),
      None
    )];
    assert_eq!(
      ids(&tasks, &tab(Horizon::Today), day(10)),
      vec!["early"]
    );
    assert!(
      ids(&tasks, &tab(Horizon::Later), day(10))
        .is_empty()
    );
  }

  #[test]
  fn past_dates_are_in_no_forward_view() {
    let tasks =
      vec![task("old", Some(day(3)), None, None)];
    for horizon in [
      Horizon::Today,
      Horizon::Week,
      Horizon::Later
    ] {
      assert!(
        ids(&tasks, &tab(horizon), day(10))
          .is_empty(),
        "{horizon:?}"
      );
    }
    assert_eq!(
      ids(&tasks, &tab(Horizon::All), day(10)),
      vec!["old"]
    );
  }

  #[test]
  fn folder_and_horizon_compose_with_and() {
    let tasks = vec![
      task("a", Some(day(10)), None, Some("f1")),
      task("b", Some(day(10)), None, Some("f2")),
      task("c", Some(day(20)), None, Some("f1")),
      task("d", None, None, Some("f1")),
    ];

    let view = ViewSelector {
      active:          Horizon::Today,
      selected_folder: Some("f1".to_string())
    };
    assert_eq!(
      ids(&tasks, &view, day(10)),
      vec!["a"]
    );

    let view = ViewSelector {
      active:          Horizon::Later,
      selected_folder: Some("f1".to_string())
    };
    assert_eq!(
      ids(&tasks, &view, day(10)),
      vec!["c", "d"]
    );

    let mut view = ViewSelector::default();
    view.select_folder("f1");
    assert_eq!(view.active, Horizon::All);
    assert_eq!(
      ids(&tasks, &view, day(10)),
      vec!["a", "c", "d"]
    );
  }

  #[test]
  fn selecting_a_tab_clears_the_folder() {
    let mut view = ViewSelector::default();
    view.select_folder("f2");
    view.select_tab(Horizon::Week);
    assert_eq!(view.selected_folder, None);
    assert_eq!(view.active, Horizon::Week);
  }

  #[test]
  fn sorts_by_date_then_time_undated_last() {
    let tasks = vec![
      task("undated-1", None, None, None),
      task(
        "late",
        Some(day(11)),
        Some(at(18, 0)),
        None
      ),
      task(
        "early",
        Some(day(11)),
        Some(at(7, 30)),
        None
      ),
      task("no-time", Some(day(11)), None, None),
      task("first", Some(day(10)), Some(at(23, 0)), None),
      task("undated-2", None, None, None),
    ];
    assert_eq!(
      ids(&tasks, &tab(Horizon::All), day(10)),
      vec![
        "first",
        "no-time",
        "early",
        "late",
        "undated-1",
        "undated-2"
      ]
    );
  }

  #[test]
  fn dashboard_ignores_folder_selection() {
    let mut done = task(
      "done",
      Some(day(10)),
      None,
      Some("f2")
    );
    done.completed = true;
    let tasks = vec![
      task("open", Some(day(10)), None, Some("f1")),
      done,
      task("tomorrow", Some(day(11)), None, None),
      task("undated", None, None, None),
    ];

    let stats = today_stats(&tasks, day(10));
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 1);
  }

  #[test]
  fn horizon_parses_case_insensitively() {
    assert_eq!(
      "Week".parse::<Horizon>().ok(),
      Some(Horizon::Week)
    );
    assert!("soon".parse::<Horizon>().is_err());
  }
}
