use chrono::{Duration, Utc};
use ido_core::Database;
use ido_model::{
    Action, Activity, Event, EventId, PreferenceKind, SessionPreference,
    SettingValue,
};

async fn open_db(dir: &tempfile::TempDir) -> Database {
    Database::open(dir.path().join("ido.db"))
        .await
        .expect("open database")
}

fn sample_action(offset_minutes: i64) -> Action {
    Action::new(
        format!("action {offset_minutes}"),
        "typed in the editor",
        vec!["editor".to_string()],
        Utc::now() - Duration::minutes(offset_minutes),
    )
}

fn sample_event(start_minutes_ago: i64, duration_seconds: i64, actions: &[Action]) -> Event {
    let start = Utc::now() - Duration::minutes(start_minutes_ago);
    Event {
        id: EventId::new(),
        title: "editing session".to_string(),
        description: "worked on a file".to_string(),
        start_time: start,
        end_time: start + Duration::seconds(duration_seconds),
        source_action_ids: actions.iter().map(|a| a.id).collect(),
        aggregated_into_activity_id: None,
        version: 1,
        deleted: false,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn action_save_roundtrip_is_structural() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let action = sample_action(5);
    db.actions.save(&action).await.unwrap();
    let loaded = db.actions.get(action.id).await.unwrap().unwrap();
    assert_eq!(loaded, action);

    // Upsert is idempotent.
    db.actions.save(&action).await.unwrap();
    let again = db.actions.get(action.id).await.unwrap().unwrap();
    assert_eq!(again, action);
}

#[tokio::test]
async fn event_save_roundtrip_and_aggregation_marking() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let actions = [sample_action(10), sample_action(8)];
    for action in &actions {
        db.actions.save(action).await.unwrap();
    }
    let event = sample_event(10, 300, &actions);
    db.events.save(&event).await.unwrap();

    let loaded = db.events.get(event.id).await.unwrap().unwrap();
    assert_eq!(loaded, event);

    db.actions
        .mark_as_aggregated(&event.source_action_ids, event.id)
        .await
        .unwrap();
    for action in &actions {
        let stored = db.actions.get(action.id).await.unwrap().unwrap();
        assert_eq!(stored.aggregated_into_event_id, Some(event.id));
    }
    let unaggregated = db
        .actions
        .get_unaggregated_in_range(Utc::now() - Duration::hours(2), Utc::now())
        .await
        .unwrap();
    assert!(unaggregated.is_empty());
}

#[tokio::test]
async fn event_invariants_are_enforced_on_save() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let action = sample_action(3);
    let mut inverted = sample_event(5, 120, std::slice::from_ref(&action));
    inverted.end_time = inverted.start_time - Duration::seconds(1);
    assert!(db.events.save(&inverted).await.is_err());

    let mut empty = sample_event(5, 120, &[]);
    empty.source_action_ids.clear();
    assert!(db.events.save(&empty).await.is_err());
}

#[tokio::test]
async fn activity_save_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let start = Utc::now() - Duration::minutes(40);
    let mut activity = Activity::new(
        "afternoon of refactoring",
        "moved modules around",
        start,
        start + Duration::minutes(35),
        vec![EventId::new(), EventId::new()],
        vec!["refactor".to_string()],
    );
    db.activities.save(&activity).await.unwrap();
    let loaded = db.activities.get(activity.id).await.unwrap().unwrap();
    assert_eq!(loaded.title, activity.title);
    assert_eq!(loaded.source_event_ids, activity.source_event_ids);
    assert_eq!(loaded.session_duration_minutes, 35);

    // Soft delete hides it from reads.
    activity.deleted = true;
    db.activities.save(&activity).await.unwrap();
    assert!(db.activities.get(activity.id).await.unwrap().is_none());
}

#[tokio::test]
async fn retention_hard_prunes_old_events_only() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let old_actions = [sample_action(40 * 24 * 60)];
    let mid_actions = [sample_action(25 * 24 * 60)];
    let new_actions = [sample_action(5 * 24 * 60)];
    for action in old_actions
        .iter()
        .chain(mid_actions.iter())
        .chain(new_actions.iter())
    {
        db.actions.save(action).await.unwrap();
    }

    let old = sample_event(40 * 24 * 60, 600, &old_actions);
    let mid = sample_event(25 * 24 * 60, 600, &mid_actions);
    let new = sample_event(5 * 24 * 60, 600, &new_actions);
    for event in [&old, &mid, &new] {
        db.events.save(event).await.unwrap();
    }
    // Image references of the action folded into the expired event.
    db.actions
        .mark_as_aggregated(&old.source_action_ids, old.id)
        .await
        .unwrap();
    db.actions
        .add_image(old_actions[0].id, "deadbeef")
        .await
        .unwrap();

    let cutoff = Utc::now() - Duration::days(30);
    let counts = db.delete_old_data(cutoff).await.unwrap();
    assert_eq!(counts.events, 1);
    assert_eq!(counts.action_images, 1);

    assert!(db.events.get(old.id).await.unwrap().is_none());
    let survivors = db
        .events
        .get_in_timeframe(Utc::now() - Duration::days(60), Utc::now())
        .await
        .unwrap();
    assert_eq!(survivors.len(), 2);
    assert!(survivors.iter().all(|e| e.start_time >= cutoff));
}

#[tokio::test]
async fn retention_soft_deletes_activities() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let start = Utc::now() - Duration::days(45);
    let activity = Activity::new(
        "ancient history",
        "",
        start,
        start + Duration::minutes(30),
        vec![EventId::new()],
        Vec::new(),
    );
    db.activities.save(&activity).await.unwrap();

    let counts = db
        .delete_old_data(Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(counts.activities, 1);
    assert!(db.activities.get(activity.id).await.unwrap().is_none());

    // A second sweep finds nothing left to transition.
    let counts = db
        .delete_old_data(Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(counts.activities, 0);
}

#[tokio::test]
async fn referenced_image_hashes_track_non_deleted_actions() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let kept = sample_action(10);
    let dropped = sample_action(12);
    db.actions.save(&kept).await.unwrap();
    db.actions.save(&dropped).await.unwrap();
    db.actions.add_image(kept.id, "h1").await.unwrap();
    db.actions.add_image(kept.id, "h2").await.unwrap();
    db.actions.add_image(dropped.id, "h3").await.unwrap();

    db.actions.delete(dropped.id).await.unwrap();

    let referenced =
        db.actions.get_all_referenced_image_hashes().await.unwrap();
    assert!(referenced.contains("h1"));
    assert!(referenced.contains("h2"));
    assert!(!referenced.contains("h3"));
}

#[tokio::test]
async fn settings_round_trip_typed_values() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    db.settings
        .set("language", &SettingValue::String("zh".into()), None)
        .await
        .unwrap();
    db.settings
        .set("image.memory_cache_size", &SettingValue::Int(250), None)
        .await
        .unwrap();
    db.settings
        .set(
            "image_optimization.enable_content_analysis",
            &SettingValue::Bool(false),
            Some("content gate"),
        )
        .await
        .unwrap();

    assert_eq!(
        db.settings.get("language").await.unwrap(),
        Some(SettingValue::String("zh".into()))
    );
    assert_eq!(
        db.settings.get("image.memory_cache_size").await.unwrap(),
        Some(SettingValue::Int(250))
    );
    assert_eq!(
        db.settings
            .get("image_optimization.enable_content_analysis")
            .await
            .unwrap(),
        Some(SettingValue::Bool(false))
    );
    assert_eq!(db.settings.get("missing").await.unwrap(), None);

    let all = db.settings.get_all().await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn preferences_reinforce_and_hard_delete() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let preference = SessionPreference::new(
        PreferenceKind::MergePattern,
        "merges editor work with terminal work on the same project",
    );
    db.preferences.save(&preference).await.unwrap();

    db.preferences
        .increment_observation(preference.id, Utc::now())
        .await
        .unwrap();
    db.preferences
        .update_confidence(preference.id, 0.8)
        .await
        .unwrap();

    let stored = db.preferences.get(preference.id).await.unwrap().unwrap();
    assert_eq!(stored.times_observed, 2);
    assert!((stored.confidence - 0.8).abs() < 1e-9);

    db.preferences.delete(preference.id).await.unwrap();
    assert!(db.preferences.get(preference.id).await.unwrap().is_none());
}

#[tokio::test]
async fn schema_reopen_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ido.db");

    let db = Database::open(&path).await.expect("first open");
    let action = sample_action(1);
    db.actions.save(&action).await.unwrap();
    drop(db);

    // Second open replays DDL and migrations without damage.
    let db = Database::open(&path).await.expect("second open");
    assert!(db.actions.get(action.id).await.unwrap().is_some());
}
