use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use taskmirror::clock::ManualClock;
use taskmirror::config::ReminderConfig;
use taskmirror::mirror::SyncState;
use taskmirror::notification::MemorySink;
use taskmirror::reminder::ReminderScheduler;
use taskmirror::remote::{DocumentStore, FileStore, MemoryStore};
use taskmirror::session::Session;
use taskmirror::task::{Priority, TaskDraft};
use taskmirror::view::{project, SortKey, StatusFilter, ViewCriteria};

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn created_task_appears_after_echo_and_sinks_when_completed() {
    let store = MemoryStore::new();
    let mut session = Session::new(Arc::new(store.clone()));
    session.sign_in("u1").await;
    session
        .tasks()
        .wait_synced(Duration::from_secs(1))
        .await
        .expect("synced");

    let mut other = TaskDraft::new("Pay rent");
    other.due_at = Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
    session.add_task(other).await.expect("add");

    let mut milk = TaskDraft::new("Buy milk");
    milk.category = "Shopping".to_string();
    milk.priority = Priority::Low;
    let id = session.add_task(milk).await.expect("add");
    assert!(session.tasks().items().iter().all(|task| task.id != id));

    settle().await;
    let items = session.tasks().items();
    let milk = items.iter().find(|task| task.id == id).expect("echoed");
    assert_eq!(milk.category_color, "#22c55e");

    let pending = ViewCriteria {
        status: StatusFilter::Pending,
        ..ViewCriteria::default()
    };
    assert!(project(&items, &pending).iter().any(|task| task.id == id));

    session
        .tasks()
        .toggle_completed(&id, true)
        .await
        .expect("toggle");
    settle().await;
    let items = session.tasks().items();
    for sort in [SortKey::DueAt, SortKey::Priority, SortKey::CreatedAt] {
        let criteria = ViewCriteria {
            sort,
            ..ViewCriteria::default()
        };
        let view = project(&items, &criteria);
        assert_eq!(view.last().map(|task| task.id.as_str()), Some(id.as_str()));
    }
    assert!(project(&items, &pending).iter().all(|task| task.id != id));
}

#[tokio::test(start_paused = true)]
async fn sign_out_while_subscribing_releases_everything() {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    let store = MemoryStore::with_clock(Arc::new(clock.clone()));
    let mut draft = TaskDraft::new("Call mom");
    draft.reminder_at = Some(start);
    store
        .create("tasks", draft.to_write("u1"))
        .await
        .expect("seed");

    let sink = MemorySink::granted();
    let scheduler = ReminderScheduler::new(
        Arc::new(sink.clone()),
        Arc::new(clock.clone()),
        ReminderConfig::default(),
    );
    let mut session = Session::new(Arc::new(store.clone())).with_reminders(scheduler);

    session.sign_in("u1").await;
    assert_eq!(session.tasks().sync_state(), SyncState::Subscribing);
    session.sign_out();

    tokio::time::sleep(Duration::from_secs(180)).await;
    assert!(session.tasks().items().is_empty());
    assert_eq!(session.tasks().sync_state(), SyncState::Unbound);
    assert!(!session.scheduler_running());
    assert!(sink.delivered().is_empty());
    assert_eq!(store.live_subscriptions("tasks"), 0);
}

#[tokio::test(start_paused = true)]
async fn reminder_fires_once_through_the_session() {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    let store = MemoryStore::with_clock(Arc::new(clock.clone()));
    let mut draft = TaskDraft::new("Stretch");
    draft.reminder_at = Some(start - chrono::Duration::seconds(30));
    store
        .create("tasks", draft.to_write("u1"))
        .await
        .expect("seed");

    let sink = MemorySink::granted();
    let (tx, mut reports) = tokio::sync::mpsc::unbounded_channel();
    let scheduler = ReminderScheduler::new(
        Arc::new(sink.clone()),
        Arc::new(clock.clone()),
        ReminderConfig::default(),
    )
    .with_reports(tx);
    let mut session = Session::new(Arc::new(store)).with_reminders(scheduler);
    session.sign_in("u1").await;

    let first = reports.recv().await.expect("first scan");
    assert_eq!(first.emitted(), 1);
    clock.advance(chrono::Duration::seconds(60));
    let second = reports.recv().await.expect("second scan");
    assert_eq!(second.emitted(), 0);

    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].body, "It's time for: Stretch");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_store_sessions_see_each_others_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let writer_store: Arc<dyn DocumentStore> =
        Arc::new(FileStore::open(dir.path()).expect("open"));
    let reader_store: Arc<dyn DocumentStore> =
        Arc::new(FileStore::open(dir.path()).expect("open"));

    let mut reader = Session::new(reader_store);
    reader.sign_in("u1").await;
    reader
        .tasks()
        .wait_synced(Duration::from_secs(5))
        .await
        .expect("synced");

    let mut writer = Session::new(writer_store);
    writer.sign_in("u1").await;
    writer
        .add_task(TaskDraft::new("From elsewhere"))
        .await
        .expect("add");

    let mut watch = reader.tasks().watch();
    let seen = tokio::time::timeout(
        Duration::from_secs(10),
        watch.wait_for(|state| state.items().iter().any(|task| task.title == "From elsewhere")),
    )
    .await
    .map(|found| found.is_ok());
    assert_eq!(seen, Ok(true), "reader never saw the write");
}
