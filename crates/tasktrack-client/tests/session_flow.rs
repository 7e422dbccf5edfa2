mod common;

use std::time::Duration;

use common::{FakeRepository, task};
use tasktrack_client::{
    Command, CommandOutcome, GRACE_PERIOD, Session, SessionError, ValidationError,
};
use tasktrack_shared::TaskUpdate;

async fn seeded_session() -> (FakeRepository, Session<FakeRepository>) {
    let repo = FakeRepository::with_tasks(vec![
        task("a", "Write report", "quarterly numbers"),
        task("b", "Call plumber", "kitchen sink"),
        task("c", "Water plants", "balcony only"),
    ]);
    let session = Session::new(repo.clone());
    session.refresh().await.expect("initial list");
    (repo, session)
}

fn ids(session: &Session<FakeRepository>) -> Vec<String> {
    session.tasks().into_iter().map(|t| t.id).collect()
}

async fn let_grace_period_pass() {
    tokio::time::sleep(GRACE_PERIOD + Duration::from_millis(1)).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn undo_before_expiry_restores_task_in_place() {
    let (repo, session) = seeded_session().await;

    let deleted = session.request_delete("b").await.expect("delete");
    assert_eq!(deleted.title, "Call plumber");
    assert_eq!(ids(&session), vec!["a", "c"]);
    assert_eq!(repo.deletes(), vec!["b".to_string()]);

    let pending = session.pending_deletion().expect("b is pending");
    assert_eq!(pending.task.id, "b");

    tokio::time::sleep(Duration::from_millis(4_000)).await;
    let restored = session.undo().expect("still inside grace period");
    assert_eq!(restored.id, "b");
    assert_eq!(ids(&session), vec!["a", "b", "c"]);
    assert!(session.pending_deletion().is_none());
}

#[tokio::test(start_paused = true)]
async fn grace_period_elapsing_makes_deletion_final() {
    let (_repo, session) = seeded_session().await;

    session.request_delete("a").await.expect("delete");
    let_grace_period_pass().await;

    assert!(session.pending_deletion().is_none());
    assert!(session.undo().is_none());
    assert!(session.task("a").is_none());
    assert_eq!(ids(&session), vec!["b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn second_delete_finalizes_the_first() {
    let (repo, session) = seeded_session().await;

    session.request_delete("a").await.expect("delete a");
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    session.request_delete("c").await.expect("delete c");

    let restored = session.undo().expect("c is undoable");
    assert_eq!(restored.id, "c");
    assert!(session.undo().is_none(), "a cannot be restored");
    assert_eq!(ids(&session), vec!["b", "c"]);
    assert_eq!(repo.deletes(), vec!["a".to_string(), "c".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn superseded_timer_does_not_cut_newer_window_short() {
    let (_repo, session) = seeded_session().await;

    session.request_delete("a").await.expect("delete a");
    tokio::time::sleep(Duration::from_millis(3_000)).await;
    session.request_delete("b").await.expect("delete b");

    // a's timer would have fired here; b still has 3s left.
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    tokio::task::yield_now().await;

    let pending = session.pending_deletion().expect("b still pending");
    assert_eq!(pending.task.id, "b");
    assert_eq!(session.undo().map(|t| t.id), Some("b".to_string()));
}

#[tokio::test(start_paused = true)]
async fn undo_without_pending_deletion_is_a_no_op() {
    let (_repo, session) = seeded_session().await;
    assert!(session.undo().is_none());
    assert_eq!(ids(&session), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn identical_create_is_rejected_without_remote_call() {
    let repo = FakeRepository::default();
    let session = Session::new(repo.clone());

    session.create("X", "Y").await.expect("first create");
    let err = session.create("X", "Y").await.expect_err("duplicate");

    assert!(matches!(
        err,
        SessionError::Validation(ValidationError::Duplicate { .. })
    ));
    assert_eq!(repo.calls("create"), 1);
    let titled_x = session.tasks().iter().filter(|t| t.title == "X").count();
    assert_eq!(titled_x, 1);
    assert!(session.error_notice().is_none());
}

#[tokio::test]
async fn empty_fields_are_rejected_before_the_store() {
    let repo = FakeRepository::default();
    let session = Session::new(repo.clone());

    let err = session.create("   ", "body").await.expect_err("empty title");
    assert!(matches!(
        err,
        SessionError::Validation(ValidationError::EmptyField("title"))
    ));
    let err = session.create("title", "").await.expect_err("empty description");
    assert!(err.is_validation());
    assert_eq!(repo.calls("create"), 0);
}

#[tokio::test]
async fn toggling_twice_round_trips_completion_only() {
    let (repo, session) = seeded_session().await;

    let once = session.toggle_complete("a").await.expect("toggle");
    assert!(once.completed);
    let twice = session.toggle_complete("a").await.expect("toggle back");
    assert!(!twice.completed);
    assert_eq!(twice.title, "Write report");
    assert_eq!(twice.description, "quarterly numbers");

    let updates = repo.updates();
    assert_eq!(updates.len(), 2);
    assert!(updates[0].completed);
    assert!(!updates[1].completed);
}

#[tokio::test]
async fn edit_preserves_completed_flag() {
    let (repo, session) = seeded_session().await;
    session.toggle_complete("c").await.expect("toggle");

    let edited = session
        .edit("c", "Water plants", "balcony and kitchen")
        .await
        .expect("edit");
    assert!(edited.completed);
    assert_eq!(
        repo.updates().last(),
        Some(&TaskUpdate {
            id: "c".to_string(),
            title: "Water plants".to_string(),
            description: "balcony and kitchen".to_string(),
            completed: true,
        })
    );
}

#[tokio::test]
async fn failed_list_offers_retry_that_replaces_state() {
    let repo = FakeRepository::with_tasks(vec![
        task("a", "one", "first"),
        task("b", "two", "second"),
    ]);
    let session = Session::new(repo.clone());
    repo.fail("list", 1);

    let err = session.refresh().await.expect_err("list fails");
    assert!(!err.is_validation());
    let notice = session.error_notice().expect("notice surfaced");
    assert_eq!(notice.retry, Command::List);
    assert!(notice.message.starts_with("Failed to fetch tasks"));
    assert!(session.tasks().is_empty());

    let outcome = session.retry().await.expect("retry succeeds");
    assert_eq!(outcome, Some(CommandOutcome::Listed(2)));
    assert_eq!(repo.calls("list"), 2);
    assert_eq!(ids_of(&session.tasks()), vec!["a", "b"]);
    assert!(session.error_notice().is_none());
}

fn ids_of(tasks: &[tasktrack_shared::Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}

#[tokio::test]
async fn failed_create_retries_with_original_arguments() {
    let repo = FakeRepository::default();
    let session = Session::new(repo.clone());
    repo.fail("create", 1);

    session.create(" Plan trip ", "book train").await.expect_err("create fails");
    assert!(session.tasks().is_empty());
    assert_eq!(
        session.error_notice().map(|n| n.retry),
        Some(Command::Create {
            title: "Plan trip".to_string(),
            description: "book train".to_string(),
        })
    );

    let outcome = session.retry().await.expect("retry").expect("had a notice");
    let CommandOutcome::Created(task) = outcome else {
        panic!("expected a created task, got {outcome:?}");
    };
    assert_eq!(task.title, "Plan trip");
    assert_eq!(session.tasks(), vec![task]);
    assert_eq!(repo.calls("create"), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_delete_keeps_task_removed_and_retries_same_id() {
    let (repo, session) = seeded_session().await;
    repo.fail("delete", 1);

    session.request_delete("b").await.expect_err("delete fails");
    assert!(session.task("b").is_none());
    let notice = session.error_notice().expect("notice surfaced");
    assert_eq!(
        notice.retry,
        Command::Delete {
            id: "b".to_string()
        }
    );

    // The store still holds b, but the listing keeps it hidden while pending.
    session.refresh().await.expect("list");
    assert_eq!(ids(&session), vec!["a", "c"]);

    let outcome = session.retry().await.expect("retry").expect("had a notice");
    assert_eq!(outcome, CommandOutcome::Deleted("b".to_string()));
    assert!(repo.stored().iter().all(|t| t.id != "b"));
}

#[tokio::test]
async fn dismissing_an_error_does_not_retry() {
    let (repo, session) = seeded_session().await;
    repo.fail("update", 1);

    session.toggle_complete("a").await.expect_err("update fails");
    // Optimistic: the local flip stays.
    assert_eq!(session.task("a").map(|t| t.completed), Some(true));

    let dismissed = session.dismiss_error().expect("notice present");
    assert_eq!(dismissed.retry.name(), "update");
    assert!(session.retry().await.expect("nothing to retry").is_none());
    assert_eq!(repo.calls("update"), 1);
}

#[tokio::test]
async fn operations_on_unknown_ids_are_validation_errors() {
    let (repo, session) = seeded_session().await;

    let err = session.request_delete("zzz").await.expect_err("unknown");
    assert!(matches!(
        err,
        SessionError::Validation(ValidationError::UnknownTask(ref id)) if id == "zzz"
    ));
    assert!(session.toggle_complete("zzz").await.is_err());
    assert_eq!(repo.calls("delete"), 0);
    assert_eq!(repo.calls("update"), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_creates_reach_the_store_once() {
    let repo = FakeRepository::default();
    repo.slow_create(Duration::from_millis(50));
    let session = Session::new(repo.clone());

    let (first, second) = tokio::join!(
        session.create("Buy milk", "two liters"),
        session.create("Buy milk", "two liters")
    );

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(SessionError::Validation(ValidationError::Duplicate { .. }))
    ));
    assert_eq!(repo.calls("create"), 1);
    assert_eq!(repo.stored().len(), 1);
    assert_eq!(session.tasks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_create_does_not_block_the_same_fields_later() {
    let repo = FakeRepository::default();
    repo.fail("create", 1);
    let session = Session::new(repo.clone());

    assert!(session.create("Buy milk", "two liters").await.is_err());
    session.dismiss_error();

    let created = session
        .create("Buy milk", "two liters")
        .await
        .expect("second attempt is not a duplicate");
    assert_eq!(created.title, "Buy milk");
    assert_eq!(repo.calls("create"), 2);
}

#[tokio::test(start_paused = true)]
async fn undo_drops_the_failed_delete_retry() {
    let (repo, session) = seeded_session().await;
    repo.fail("delete", 1);

    assert!(session.request_delete("b").await.is_err());
    assert!(matches!(
        session.error_notice().map(|notice| notice.retry),
        Some(Command::Delete { .. })
    ));

    let restored = session.undo().expect("b is restorable");
    assert_eq!(restored.id, "b");
    assert!(session.error_notice().is_none());

    assert_eq!(session.retry().await.expect("nothing to retry"), None);
    assert_eq!(ids(&session), vec!["a", "b", "c"]);
    assert!(repo.stored().iter().any(|task| task.id == "b"));
    assert_eq!(repo.calls("delete"), 1);
}

#[tokio::test(start_paused = true)]
async fn undo_keeps_an_unrelated_notice() {
    let (repo, session) = seeded_session().await;
    repo.fail("update", 1);

    assert!(session.toggle_complete("a").await.is_err());
    session.request_delete("c").await.expect("delete");
    session.undo().expect("c is restorable");

    let notice = session.error_notice().expect("update failure still surfaced");
    assert!(matches!(notice.retry, Command::Update(_)));
}
