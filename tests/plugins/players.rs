use badgectl::core::db;
use badgectl::core::error::BadgeError;
use badgectl::core::schemas;
use badgectl::core::store::Store;
use badgectl::plugins::players::{Level, PlayerStore, SqlitePlayerStore, promote};
use tempfile::tempdir;

fn store_in(dir: &std::path::Path) -> Store {
    let store = Store::new(dir);
    db::initialize_challenge_db(&store.root).unwrap();
    store
}

#[test]
fn test_insert_then_fetch_round_trip() {
    let tmp = tempdir().unwrap();
    let players = SqlitePlayerStore::new(&store_in(tmp.path()));

    let inserted = players.insert("DEADBEEF").unwrap();
    let fetched = players.fetch("DEADBEEF").unwrap().unwrap();

    assert_eq!(inserted, fetched);
    assert_eq!(fetched.user_id, "u0xf2f8d0d5");
    assert_eq!(fetched.password, "5F78C332");
    assert_eq!(fetched.level, Level::Registered);
    assert_eq!(fetched.result_ts, None);
    assert_eq!(fetched.token, None);
}

#[test]
fn test_fetch_missing_badge_is_none() {
    let tmp = tempdir().unwrap();
    let players = SqlitePlayerStore::new(&store_in(tmp.path()));
    assert!(players.fetch("01020304").unwrap().is_none());
}

#[test]
fn test_duplicate_insert_is_rejected() {
    let tmp = tempdir().unwrap();
    let players = SqlitePlayerStore::new(&store_in(tmp.path()));
    players.insert("01020304").unwrap();
    let err = players.insert("01020304").unwrap_err();
    assert!(matches!(err, BadgeError::RusqliteError(_)), "{err}");
}

#[test]
fn test_insert_rejects_non_hex_badge() {
    let tmp = tempdir().unwrap();
    let players = SqlitePlayerStore::new(&store_in(tmp.path()));
    let err = players.insert("NOTAHEX!").unwrap_err();
    assert!(matches!(err, BadgeError::InvalidBadgeId(_)));
    assert!(players.fetch("NOTAHEX!").unwrap().is_none());
}

#[test]
fn test_redeemed_level_stamps_only_that_badge() {
    let tmp = tempdir().unwrap();
    let players = SqlitePlayerStore::new(&store_in(tmp.path()));
    players.insert("01020304").unwrap();
    players.insert("DEADBEEF").unwrap();

    players.set_level("01020304", Level::Stage4).unwrap();
    assert_eq!(players.fetch("01020304").unwrap().unwrap().result_ts, None);

    players.set_level("01020304", Level::Redeemed).unwrap();
    let done = players.fetch("01020304").unwrap().unwrap();
    assert_eq!(done.level, Level::Redeemed);
    assert!(done.result_ts.is_some());

    let other = players.fetch("DEADBEEF").unwrap().unwrap();
    assert_eq!(other.result_ts, None);
    assert_eq!(other.level, Level::Registered);
}

#[test]
fn test_result_is_stamped_once() {
    let tmp = tempdir().unwrap();
    let players = SqlitePlayerStore::new(&store_in(tmp.path()));
    players.insert("01020304").unwrap();

    players.record_result("01020304").unwrap();
    let first = players.fetch("01020304").unwrap().unwrap().result_ts;
    assert!(first.is_some());

    std::thread::sleep(std::time::Duration::from_millis(20));
    players.record_result("01020304").unwrap();
    players.set_level("01020304", Level::Redeemed).unwrap();
    assert_eq!(players.fetch("01020304").unwrap().unwrap().result_ts, first);
}

#[test]
fn test_updates_on_unknown_badge_are_not_found() {
    let tmp = tempdir().unwrap();
    let players = SqlitePlayerStore::new(&store_in(tmp.path()));
    assert!(matches!(
        players.set_level("01020304", Level::Stage4),
        Err(BadgeError::NotFound(_))
    ));
    assert!(matches!(
        players.record_result("01020304"),
        Err(BadgeError::NotFound(_))
    ));
}

#[test]
fn test_promote_refuses_to_lower_level() {
    let tmp = tempdir().unwrap();
    let players = SqlitePlayerStore::new(&store_in(tmp.path()));
    players.insert("01020304").unwrap();

    promote(&players, "01020304", Level::VoucherReady).unwrap();
    let err = promote(&players, "01020304", Level::DecryptionHint).unwrap_err();
    assert!(matches!(err, BadgeError::ValidationError(_)));
    assert_eq!(
        players.fetch("01020304").unwrap().unwrap().level,
        Level::VoucherReady
    );

    // same level is a no-op
    promote(&players, "01020304", Level::VoucherReady).unwrap();
    assert!(matches!(
        promote(&players, "CAFEBABE", Level::Stage4),
        Err(BadgeError::NotFound(_))
    ));
}

#[test]
fn test_every_operation_leaves_a_broker_event() {
    let tmp = tempdir().unwrap();
    let store = store_in(tmp.path());
    let players = SqlitePlayerStore::new(&store);
    players.insert("01020304").unwrap();
    players.fetch("01020304").unwrap();

    let log = std::fs::read_to_string(store.root.join(schemas::BROKER_EVENTS_NAME)).unwrap();
    let ops: Vec<String> = log
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["op"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ops, vec!["challenge.init", "players.insert", "players.fetch"]);
}

#[test]
fn test_redeeming_goes_through_the_result_stamp() {
    let tmp = tempdir().unwrap();
    let store = store_in(tmp.path());
    let players = SqlitePlayerStore::new(&store);
    players.insert("01020304").unwrap();
    players.set_level("01020304", Level::Stage5).unwrap();
    players.set_level("01020304", Level::Redeemed).unwrap();

    let log = std::fs::read_to_string(store.root.join(schemas::BROKER_EVENTS_NAME)).unwrap();
    let ops: Vec<String> = log
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["op"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        ops,
        vec![
            "challenge.init",
            "players.insert",
            "players.set_level",
            "players.set_level",
            "players.record_result"
        ]
    );
}
