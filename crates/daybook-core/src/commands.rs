use anyhow::{anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::app::{AppState, TaskForm};
use crate::cli::{AddArgs, Command, EditArgs, FolderAddArgs, ListArgs};
use crate::config::Config;
use crate::datastore::KeyValueStore;
use crate::datetime::{Zone, parse_date_input, parse_time_input};
use crate::filter::{Horizon, ViewSelector};
use crate::render::Renderer;

#[instrument(skip(app, cfg, renderer, command))]
pub fn dispatch<S: KeyValueStore>(
    app: &mut AppState<S>,
    cfg: &Config,
    renderer: &mut Renderer,
    zone: Zone,
    command: Option<Command>,
) -> anyhow::Result<()> {
    let now = zone.local_now(Utc::now());
    let today = now.date();
    debug!(?command, %today, "dispatching command");

    match command {
        None => cmd_list(app, renderer, cfg, ListArgs::default(), today),
        Some(Command::List(args)) => cmd_list(app, renderer, cfg, args, today),
        Some(Command::Add(args)) => cmd_add(app, args, now),
        Some(Command::Edit(args)) => cmd_edit(app, args, today),
        Some(Command::Done { id }) => cmd_done(app, &id),
        Some(Command::Delete { id }) => cmd_delete(app, &id),
        Some(Command::Info { id }) => cmd_info(app, renderer, &id),
        Some(Command::Stats) => renderer.print_dashboard(app.today_stats(today), today),
        Some(Command::Folders) => renderer.print_folders(app.folders(), app.tasks.all()),
        Some(Command::FolderAdd(args)) => cmd_folder_add(app, args),
    }
}

#[instrument(skip(app, renderer, cfg))]
fn cmd_list<S: KeyValueStore>(
    app: &mut AppState<S>,
    renderer: &mut Renderer,
    cfg: &Config,
    args: ListArgs,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command list");

    if let Some(folder) = args.folder.as_deref()
        && app.folders.get(folder).is_none()
    {
        warn!(folder, "listing an unknown folder");
    }
    apply_list_args(&mut app.view, &args, cfg.default_view);

    let visible = app.visible_tasks(today);
    renderer.print_task_table(&visible, &app.folders, today)?;
    renderer.print_dashboard(app.today_stats(today), today)
}

/// A folder selects "all dates" like the sidebar does; an explicit horizon
/// then narrows it further.
fn apply_list_args(view: &mut ViewSelector, args: &ListArgs, default_view: Horizon) {
    match (args.folder.as_deref(), args.horizon) {
        (Some(folder), horizon) => {
            view.select_folder(folder);
            if let Some(horizon) = horizon {
                view.active = horizon;
            }
        }
        (None, horizon) => view.select_tab(horizon.unwrap_or(default_view)),
    }
}

#[instrument(skip(app, args))]
fn cmd_add<S: KeyValueStore>(
    app: &mut AppState<S>,
    args: AddArgs,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    info!("command add");

    let form = add_form(app, args, now)?;
    let created = app.create_task(form.draft)?;
    let Some(id) = created else {
        bail!("task title cannot be blank");
    };

    println!("Created task {id}.");
    Ok(())
}

fn add_form<S: KeyValueStore>(
    app: &AppState<S>,
    args: AddArgs,
    now: NaiveDateTime,
) -> anyhow::Result<TaskForm> {
    let mut form = app.new_form(now);
    form.draft.title = args.title.join(" ");
    form.draft.memo = args.memo;

    if args.no_date {
        form.draft.date = None;
        form.draft.time = None;
    }
    if let Some(date) = args.date.as_deref() {
        form.draft.date = Some(parse_date_input(date, now.date())?);
    }
    if let Some(time) = args.time.as_deref() {
        form.draft.time = Some(parse_time_input(time)?);
    }
    if let Some(folder) = args.folder {
        ensure_folder(app, &folder)?;
        form.draft.folder_id = Some(folder);
    }

    Ok(form)
}

#[instrument(skip(app, args))]
fn cmd_edit<S: KeyValueStore>(
    app: &mut AppState<S>,
    args: EditArgs,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command edit");

    let form = edit_form(app, args, today)?;
    let id = form.editing.clone().unwrap_or_default();
    if !app.submit(form)? {
        bail!("task title cannot be blank");
    }

    println!("Modified task {id}.");
    Ok(())
}

fn edit_form<S: KeyValueStore>(
    app: &AppState<S>,
    args: EditArgs,
    today: NaiveDate,
) -> anyhow::Result<TaskForm> {
    let id = app.tasks.resolve(&args.id)?.id.clone();
    let mut form = app
        .edit_form(&id)
        .ok_or_else(|| anyhow!("no task matches {id}"))?;

    if let Some(title) = args.title {
        form.draft.title = title;
    }
    if let Some(memo) = args.memo {
        form.draft.memo = Some(memo);
    }
    if args.no_date {
        form.draft.date = None;
        form.draft.time = None;
    }
    if let Some(date) = args.date.as_deref() {
        form.draft.date = Some(parse_date_input(date, today)?);
    }
    if let Some(time) = args.time.as_deref() {
        form.draft.time = Some(parse_time_input(time)?);
    }
    if args.no_folder {
        form.draft.folder_id = None;
    }
    if let Some(folder) = args.folder {
        ensure_folder(app, &folder)?;
        form.draft.folder_id = Some(folder);
    }

    Ok(form)
}

#[instrument(skip(app))]
fn cmd_done<S: KeyValueStore>(app: &mut AppState<S>, reference: &str) -> anyhow::Result<()> {
    info!("command done");

    let id = app.tasks.resolve(reference)?.id.clone();
    app.toggle_complete(&id)?;
    let completed = app.tasks.get(&id).map(|t| t.completed).unwrap_or(false);

    if completed {
        println!("Completed task {id}.");
    } else {
        println!("Reopened task {id}.");
    }
    Ok(())
}

#[instrument(skip(app))]
fn cmd_delete<S: KeyValueStore>(app: &mut AppState<S>, reference: &str) -> anyhow::Result<()> {
    info!("command delete");

    let task = app.tasks.resolve(reference)?;
    let (id, title) = (task.id.clone(), task.title.clone());
    app.delete_task(&id)?;

    println!("Deleted task {id} '{title}'.");
    Ok(())
}

#[instrument(skip(app, renderer))]
fn cmd_info<S: KeyValueStore>(
    app: &AppState<S>,
    renderer: &mut Renderer,
    reference: &str,
) -> anyhow::Result<()> {
    let task = app.tasks.resolve(reference)?;
    renderer.print_task_info(task, &app.folders)
}

#[instrument(skip(app, args))]
fn cmd_folder_add<S: KeyValueStore>(
    app: &mut AppState<S>,
    args: FolderAddArgs,
) -> anyhow::Result<()> {
    info!("command folder-add");

    let name = args.name.join(" ");
    let id = app.create_folder(&name, &args.color)?;
    println!("Created folder {id} '{}'.", name.trim());
    Ok(())
}

// The form only offers existing folders, so an unknown id here is a typo.
fn ensure_folder<S: KeyValueStore>(app: &AppState<S>, folder: &str) -> anyhow::Result<()> {
    if app.folders.get(folder).is_none() {
        bail!("unknown folder: {folder} (see `daybook folders`)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::datastore::MemoryStore;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .and_then(|d| d.and_hms_opt(9, 15, 0))
            .expect("valid datetime")
    }

    fn add_args(title: &str) -> AddArgs {
        AddArgs {
            title: title.split(' ').map(str::to_string).collect(),
            memo: None,
            date: None,
            time: None,
            folder: None,
            no_date: false,
        }
    }

    fn edit_args(id: &str) -> EditArgs {
        EditArgs {
            id: id.to_string(),
            title: None,
            memo: None,
            date: None,
            time: None,
            folder: None,
            no_date: false,
            no_folder: false,
        }
    }

    #[test]
    fn add_defaults_to_now() {
        let app = AppState::load(MemoryStore::new()).expect("load");
        let form = add_form(&app, add_args("water plants"), now()).expect("form");
        assert_eq!(form.draft.title, "water plants");
        assert_eq!(form.draft.date, NaiveDate::from_ymd_opt(2024, 6, 10));
        assert_eq!(form.draft.time, NaiveTime::from_hms_opt(9, 15, 0));
    }

    #[test]
    fn add_parses_date_time_and_folder() {
        let app = AppState::load(MemoryStore::new()).expect("load");
        let mut args = add_args("review");
        args.date = Some("friday".to_string());
        args.time = Some("4:30pm".to_string());
        args.folder = Some("f1".to_string());

        let form = add_form(&app, args, now()).expect("form");
        assert_eq!(form.draft.date, NaiveDate::from_ymd_opt(2024, 6, 14));
        assert_eq!(form.draft.time, NaiveTime::from_hms_opt(16, 30, 0));
        assert_eq!(form.draft.folder_id.as_deref(), Some("f1"));
    }

    #[test]
    fn add_rejects_unknown_folder_and_honours_no_date() {
        let app = AppState::load(MemoryStore::new()).expect("load");
        let mut args = add_args("x");
        args.folder = Some("f9".to_string());
        assert!(add_form(&app, args, now()).is_err());

        let mut args = add_args("someday");
        args.no_date = true;
        let form = add_form(&app, args, now()).expect("form");
        assert_eq!(form.draft.date, None);
        assert_eq!(form.draft.time, None);
    }

    #[test]
    fn edit_changes_only_given_fields() {
        let mut app = AppState::load(MemoryStore::new()).expect("load");
        let form = add_form(&app, add_args("draft"), now()).expect("form");
        let id = app.create_task(form.draft).expect("create").expect("created");

        let mut args = edit_args(&id[..6]);
        args.memo = Some("bring charger".to_string());
        args.folder = Some("f2".to_string());
        let form = edit_form(&app, args, now().date()).expect("edit form");
        assert!(app.submit(form).expect("submit"));

        let task = app.tasks.get(&id).expect("stored");
        assert_eq!(task.title, "draft");
        assert_eq!(task.memo.as_deref(), Some("bring charger"));
        assert_eq!(task.folder_id.as_deref(), Some("f2"));
        assert_eq!(task.date, NaiveDate::from_ymd_opt(2024, 6, 10));

        let mut args = edit_args(&id);
        args.no_folder = true;
        args.no_date = true;
        let form = edit_form(&app, args, now().date()).expect("edit form");
        assert!(app.submit(form).expect("submit"));
        let task = app.tasks.get(&id).expect("stored");
        assert_eq!(task.folder_id, None);
        assert_eq!(task.date, None);
    }

    #[test]
    fn list_args_follow_sidebar_rules() {
        let mut view = ViewSelector::default();
        apply_list_args(&mut view, &ListArgs::default(), Horizon::Week);
        assert_eq!(view.active, Horizon::Week);

        let folder_only = ListArgs {
            horizon: None,
            folder: Some("f1".to_string()),
        };
        apply_list_args(&mut view, &folder_only, Horizon::Today);
        assert_eq!(view.active, Horizon::All);
        assert_eq!(view.selected_folder.as_deref(), Some("f1"));

        let both = ListArgs {
            horizon: Some(Horizon::Later),
            folder: Some("f1".to_string()),
        };
        apply_list_args(&mut view, &both, Horizon::Today);
        assert_eq!(view.active, Horizon::Later);
        assert_eq!(view.selected_folder.as_deref(), Some("f1"));

        let tab_only = ListArgs {
            horizon: Some(Horizon::Today),
            folder: None,
        };
        apply_list_args(&mut view, &tab_only, Horizon::Week);
        assert_eq!(view.selected_folder, None);
    }
}
