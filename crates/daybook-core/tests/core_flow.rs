use std::fs;

use chrono::{NaiveDate, NaiveTime};
use daybook_core::app::AppState;
use daybook_core::datastore::{FileStore, KeyValueStore, TASKS_KEY};
use daybook_core::filter::Horizon;
use daybook_core::task::TaskDraft;
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn dated(title: &str, day: Option<NaiveDate>, time: Option<NaiveTime>) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        date: day,
        time,
        ..TaskDraft::default()
    }
}

#[test]
fn tasks_survive_a_reload_from_disk() {
    let temp = tempdir().expect("tempdir");
    let mut app = AppState::load(FileStore::open(temp.path()).expect("open")).expect("load");

    let keep = app
        .create_task(TaskDraft {
            title: "pay rent".to_string(),
            memo: Some("transfer before noon".to_string()),
            date: Some(date(2024, 6, 10)),
            time: NaiveTime::from_hms_opt(11, 0, 0),
            folder_id: Some("f2".to_string()),
        })
        .expect("create")
        .expect("created");
    let drop = app
        .create_task(dated("throwaway", None, None))
        .expect("create")
        .expect("created");

    app.toggle_complete(&keep).expect("toggle");
    app.delete_task(&drop).expect("delete");

    let reopened = AppState::load(FileStore::open(temp.path()).expect("reopen")).expect("reload");
    assert_eq!(reopened.tasks, app.tasks);
    assert_eq!(reopened.folders.all().len(), 3);

    let task = reopened.tasks.get(&keep).expect("stored");
    assert!(task.completed);
    assert_eq!(task.memo.as_deref(), Some("transfer before noon"));
    assert!(reopened.tasks.get(&drop).is_none());
}

#[test]
fn stored_entries_use_the_browser_field_names() {
    let temp = tempdir().expect("tempdir");
    let mut app = AppState::load(FileStore::open(temp.path()).expect("open")).expect("load");
    app.create_task(dated("call mom", Some(date(2024, 6, 11)), None))
        .expect("create");

    let raw = app
        .storage()
        .get(TASKS_KEY)
        .expect("get")
        .expect("stored");
    let value: serde_json::Value = serde_json::from_slice(&raw).expect("json");
    let record = &value[0];
    assert_eq!(record["title"], "call mom");
    assert_eq!(record["date"], "2024-06-11");
    assert_eq!(record["completed"], false);
    assert!(record.get("time").is_none());
    assert!(record.get("folderId").is_none());
}

#[test]
fn corrupt_file_is_set_aside_and_reads_empty() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("todos.json"), "{not json").expect("write");

    let app = AppState::load(FileStore::open(temp.path()).expect("open")).expect("load");
    assert!(app.tasks.is_empty());

    let preserved = fs::read_to_string(temp.path().join("todos.corrupt.json")).expect("preserved");
    assert_eq!(preserved, "{not json");
}

#[test]
fn undecodable_file_is_set_aside_and_reads_empty() {
    let temp = tempdir().expect("tempdir");
    let garbage = [0xff, 0xfe, b'[', b']'];
    fs::write(temp.path().join("todos.json"), garbage).expect("write");

    let mut app = AppState::load(FileStore::open(temp.path()).expect("open")).expect("load");
    assert!(app.tasks.is_empty());
    assert_eq!(
        fs::read(temp.path().join("todos.corrupt.json")).expect("preserved"),
        garbage
    );

    app.create_task(dated("fresh start", None, None))
        .expect("create");
    assert_eq!(
        fs::read(temp.path().join("todos.corrupt.json")).expect("still preserved"),
        garbage
    );
}

#[test]
fn rejected_records_outlive_the_next_save() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("todos.json"),
        r#"[{"id":"1","title":"keep"},{"id":"2","title":"bad date","date":"2024/06/10"}]"#,
    )
    .expect("write");

    let mut app = AppState::load(FileStore::open(temp.path()).expect("open")).expect("load");
    assert_eq!(app.tasks.len(), 1);
    app.create_task(dated("new", None, None)).expect("create");

    let saved: serde_json::Value = serde_json::from_slice(
        &app.storage().get(TASKS_KEY).expect("get").expect("stored"),
    )
    .expect("json");
    let titles: Vec<&str> = saved
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|record| record["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["keep", "new"]);

    let rejected: serde_json::Value = serde_json::from_slice(
        &fs::read(temp.path().join("todos.rejected.json")).expect("rejected kept"),
    )
    .expect("json");
    assert_eq!(rejected[0]["title"], "bad date");
    assert_eq!(rejected[0]["date"], "2024/06/10");
}

#[test]
fn monday_horizons_over_persisted_tasks() {
    let temp = tempdir().expect("tempdir");
    let mut app = AppState::load(FileStore::open(temp.path()).expect("open")).expect("load");
    let today = date(2024, 6, 10);

    for draft in [
        dated("sunday review", Some(date(2024, 6, 16)), None),
        dated("standup", Some(today), NaiveTime::from_hms_opt(9, 0, 0)),
        dated("someday", None, None),
        dated("next monday", Some(date(2024, 6, 17)), None),
        dated("last week", Some(date(2024, 6, 7)), None),
    ] {
        app.create_task(draft).expect("create");
    }

    let titles = |app: &AppState<FileStore>| -> Vec<String> {
        app.visible_tasks(today)
            .into_iter()
            .map(|t| t.title.clone())
            .collect()
    };

    app.select_tab(Horizon::Today);
    assert_eq!(titles(&app), vec!["standup"]);

    app.select_tab(Horizon::Week);
    assert_eq!(titles(&app), vec!["standup", "sunday review"]);

    app.select_tab(Horizon::Later);
    assert_eq!(titles(&app), vec!["sunday review", "next monday", "someday"]);

    app.select_tab(Horizon::All);
    assert_eq!(
        titles(&app),
        vec!["last week", "standup", "sunday review", "next monday", "someday"]
    );

    let stats = app.today_stats(today);
    assert_eq!((stats.total, stats.completed), (1, 0));
}
