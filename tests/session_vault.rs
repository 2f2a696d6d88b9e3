use std::collections::BTreeMap;

use session_vault::{
    SessionError, SessionFileHandler, SessionRecord, SessionStore, SessionValue,
};
use tempfile::TempDir;
use time::Duration;

fn sessions_dir() -> (TempDir, SessionFileHandler) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let handler = SessionFileHandler::new(dir.path());
    (dir, handler)
}

fn next_cycle(handler: &SessionFileHandler) -> SessionStore {
    SessionStore::start(handler.clone()).expect("session should start")
}

#[test]
fn fresh_start_initializes_id_token_and_empty_data() {
    let (_dir, handler) = sessions_dir();

    let store = next_cycle(&handler);
    assert_eq!(store.id().len(), 40);
    assert_eq!(store.token().len(), 40);
    assert!(store.all().is_empty());
    assert!(handler.session_path(store.id()).is_file());
}

#[test]
fn written_records_round_trip_through_the_handler() {
    let (_dir, handler) = sessions_dir();

    let mut record = SessionRecord::with_data(BTreeMap::from([(
        "profile".to_owned(),
        SessionValue::Map(BTreeMap::from([
            ("name".to_owned(), SessionValue::Text("ada".to_owned())),
            (
                "roles".to_owned(),
                SessionValue::Seq(vec![
                    SessionValue::Text("admin".to_owned()),
                    SessionValue::Int(7),
                ]),
            ),
        ])),
    )]));
    record.token = "t".repeat(40);
    record.flash.fresh.push("notice".to_owned());

    handler
        .write("fixture-session", &record)
        .expect("record should be written");

    let file = handler
        .latest_session_file()
        .expect("listing should succeed")
        .expect("the written file should be found");
    assert_eq!(file.id, "fixture-session");

    let read_back = handler.read(&file).expect("record should decode");
    assert_eq!(read_back, record);
}

#[test]
fn latest_session_file_prefers_newest_mtime_over_name_order() {
    let (_dir, handler) = sessions_dir();

    handler
        .write("zzz-older", &SessionRecord::default())
        .expect("older record should be written");
    std::thread::sleep(std::time::Duration::from_millis(50));
    handler
        .write("aaa-newer", &SessionRecord::default())
        .expect("newer record should be written");

    let latest = handler
        .latest_session_file()
        .expect("listing should succeed")
        .expect("a live file should be found");
    assert_eq!(latest.id, "aaa-newer");
}

#[test]
fn expired_files_are_not_selected() {
    let (dir, handler) = sessions_dir();

    handler
        .write("expired-soon", &SessionRecord::default())
        .expect("record should be written");

    let strict = SessionFileHandler::new(dir.path()).with_ttl(Duration::ZERO);
    assert_eq!(strict.ttl(), Duration::ZERO);
    assert_eq!(strict.dir(), dir.path());
    assert!(strict
        .latest_session_file()
        .expect("listing should succeed")
        .is_none());

    // The file itself is untouched; only selection ignores it.
    assert!(handler.session_path("expired-soon").is_file());
}

#[test]
fn flash_survives_exactly_one_extra_cycle() {
    let (_dir, handler) = sessions_dir();

    let mut cycle1 = next_cycle(&handler);
    cycle1.flash("msg", "hi").expect("flash should persist");
    assert_eq!(cycle1.get("msg").expect("visible in cycle 1").as_str(), Some("hi"));

    let cycle2 = next_cycle(&handler);
    assert_eq!(cycle2.id(), cycle1.id());
    assert_eq!(cycle2.get("msg").expect("visible in cycle 2").as_str(), Some("hi"));

    let cycle3 = next_cycle(&handler);
    let error = cycle3.get("msg").expect_err("purged by cycle 3");
    assert!(matches!(error, SessionError::KeyNotFound { .. }));
}

#[test]
fn reflashing_extends_the_lifetime() {
    let (_dir, handler) = sessions_dir();

    let mut cycle1 = next_cycle(&handler);
    cycle1.flash("msg", "hi").expect("flash should persist");

    let mut cycle2 = next_cycle(&handler);
    cycle2.flash("msg", "hi again").expect("re-flash should persist");

    let cycle3 = next_cycle(&handler);
    assert_eq!(
        cycle3.get("msg").expect("re-flash keeps it alive").as_str(),
        Some("hi again")
    );

    let cycle4 = next_cycle(&handler);
    assert!(cycle4.lookup("msg").is_none());
}

#[test]
fn now_values_are_purged_at_the_next_tick() {
    let (_dir, handler) = sessions_dir();

    let mut cycle1 = next_cycle(&handler);
    cycle1.now("x", "y").expect("now should persist");
    assert_eq!(cycle1.get("x").expect("visible in cycle 1").as_str(), Some("y"));

    let cycle2 = next_cycle(&handler);
    assert!(cycle2.lookup("x").is_none());
}

#[test]
fn flash_input_is_readable_for_one_extra_cycle() {
    let (_dir, handler) = sessions_dir();

    let mut cycle1 = next_cycle(&handler);
    cycle1
        .flash_input(BTreeMap::from([(
            "email".to_owned(),
            SessionValue::Text("ada@example.com".to_owned()),
        )]))
        .expect("flash_input should persist");

    let cycle2 = next_cycle(&handler);
    assert_eq!(
        cycle2.old_input("email").and_then(SessionValue::as_str),
        Some("ada@example.com")
    );
    assert_eq!(
        cycle2.old_input_or("missing", "fallback"),
        SessionValue::Text("fallback".to_owned())
    );

    let cycle3 = next_cycle(&handler);
    assert!(cycle3.old_input("email").is_none());
}

#[test]
fn remove_is_idempotent_but_still_persists() {
    let (_dir, handler) = sessions_dir();

    let mut store = next_cycle(&handler);
    let rev_before = handler
        .peek_rev(store.id())
        .expect("peek should succeed")
        .expect("the session file should exist");

    store.remove("never-existed").expect("remove should not fail");

    let rev_after = handler
        .peek_rev(store.id())
        .expect("peek should succeed")
        .expect("the session file should still exist");
    assert_eq!(rev_after, rev_before + 1);
    assert!(store.all().is_empty());
}

#[test]
fn get_or_returns_default_without_touching_state() {
    let (_dir, handler) = sessions_dir();

    let store = next_cycle(&handler);
    assert_eq!(store.get_or("theme", "dark"), SessionValue::Text("dark".to_owned()));
    assert!(!store.has("theme"));
}

#[test]
fn regenerate_changes_id_and_preserves_contents() {
    let (_dir, handler) = sessions_dir();

    let mut store = next_cycle(&handler);
    store.put("user_id", 42).expect("put should persist");
    let old_id = store.id().to_owned();
    let old_token = store.token().to_owned();

    store.regenerate().expect("regenerate should persist");

    assert_ne!(store.id(), old_id);
    assert_eq!(store.token(), old_token);
    assert_eq!(store.get("user_id").expect("content preserved").as_int(), Some(42));

    // The superseded file stays on disk; the new one is simply more recent.
    assert!(handler.session_path(&old_id).is_file());
    std::thread::sleep(std::time::Duration::from_millis(50));
    let resumed = next_cycle(&handler);
    assert_eq!(resumed.id(), store.id());
}

#[test]
fn token_survives_ordinary_mutations_and_restarts() {
    let (_dir, handler) = sessions_dir();

    let mut store = next_cycle(&handler);
    let token = store.token().to_owned();
    assert_eq!(token.len(), 40);

    store.put("a", 1).expect("put should persist");
    store.flash("b", 2).expect("flash should persist");
    store.remove("a").expect("remove should persist");
    assert_eq!(store.token(), token);

    let resumed = next_cycle(&handler);
    assert_eq!(resumed.token(), token);
}

#[test]
fn flush_clears_in_memory_only_until_the_next_persist() {
    let (_dir, handler) = sessions_dir();

    let mut store = next_cycle(&handler);
    store.put("a", 1).expect("put should persist");

    store.flush();
    assert!(store.all().is_empty());
    assert_eq!(store.token().len(), 40);

    // Nothing was written, so a new cycle still sees the old data.
    let resumed = next_cycle(&handler);
    assert_eq!(resumed.get("a").expect("flush alone does not persist").as_int(), Some(1));
}

#[test]
fn mutating_after_flush_persists_the_cleared_state() {
    let (_dir, handler) = sessions_dir();

    let mut store = next_cycle(&handler);
    store.put("a", 1).expect("put should persist");
    store.flush();
    store.put("b", 2).expect("put should persist");

    let resumed = next_cycle(&handler);
    assert!(resumed.lookup("a").is_none());
    assert_eq!(resumed.get("b").expect("written after flush").as_int(), Some(2));
}

#[test]
fn concurrent_cycles_surface_stale_writes_instead_of_losing_data() {
    let (_dir, handler) = sessions_dir();

    let mut first = next_cycle(&handler);
    // The second activation loads the same session and persists its tick,
    // advancing the on-disk revision past what `first` observed.
    let mut second = next_cycle(&handler);
    assert_eq!(second.id(), first.id());

    let error = first
        .put("winner", "first")
        .expect_err("the outdated cycle must not overwrite");
    assert!(matches!(error, SessionError::StaleWrite { .. }));

    second.put("winner", "second").expect("the current cycle may write");
}

#[test]
fn corrupt_session_file_falls_back_to_a_fresh_session() {
    let (_dir, handler) = sessions_dir();

    let first = next_cycle(&handler);
    let old_id = first.id().to_owned();
    std::fs::write(
        handler.session_path(&old_id),
        b"this is not a session payload",
    )
    .expect("corrupting the file should succeed");

    let recovered = next_cycle(&handler);
    assert_ne!(recovered.id(), old_id);
    assert!(recovered.all().is_empty());
    assert_eq!(recovered.token().len(), 40);
}

#[test]
fn sweep_removes_expired_files_and_reports_the_count() {
    let (dir, handler) = sessions_dir();

    handler
        .write("first", &SessionRecord::default())
        .expect("record should be written");
    handler
        .write("second", &SessionRecord::default())
        .expect("record should be written");

    // Under the default TTL everything is still live.
    assert_eq!(handler.sweep_expired().expect("sweep should succeed"), 0);
    assert!(handler.session_path("first").is_file());

    let strict = SessionFileHandler::new(dir.path()).with_ttl(Duration::ZERO);
    assert_eq!(strict.sweep_expired().expect("sweep should succeed"), 2);
    assert!(!handler.session_path("first").is_file());
    assert!(!handler.session_path("second").is_file());
}

#[test]
fn delete_is_a_no_op_for_missing_files() {
    let (_dir, handler) = sessions_dir();

    handler.delete("never-written").expect("delete should not fail");

    handler
        .write("short-lived", &SessionRecord::default())
        .expect("record should be written");
    handler.delete("short-lived").expect("delete should succeed");
    assert!(!handler.session_path("short-lived").is_file());
}
