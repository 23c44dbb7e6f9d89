mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use ido_config::SessionConfig;
use ido_core::Database;
use ido_core::agents::{ActivitySupervisor, SessionAgent};
use ido_model::{Action, Event, EventId};
use support::ScriptedLlm;

async fn open_db(dir: &tempfile::TempDir) -> Database {
    Database::open(dir.path().join("ido.db"))
        .await
        .expect("open database")
}

fn action_at(minutes_ago: i64, title: &str) -> Action {
    Action::new(
        title,
        format!("{title} in detail"),
        vec!["work".to_string()],
        Utc::now() - Duration::minutes(minutes_ago),
    )
}

#[tokio::test]
async fn empty_store_aggregates_without_llm_calls() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    let llm = Arc::new(ScriptedLlm::new(Vec::<String>::new()));

    let agent = Arc::new(SessionAgent::new(
        db.clone(),
        llm.clone(),
        SessionConfig::default(),
        "en",
    ));
    agent.aggregate_once().await.expect("no-op cycle");

    assert_eq!(llm.calls(), 0);
    assert!(db.activities.get_recent(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn full_cycle_builds_events_then_activities() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let actions = [
        action_at(30, "drafted the outline"),
        action_at(25, "wrote section one"),
        action_at(20, "edited section one"),
    ];
    for action in &actions {
        db.actions.save(action).await.unwrap();
    }

    let llm = Arc::new(ScriptedLlm::new([
        // Actions -> events clustering.
        r#"{"events": [{"title": "Writing the report", "description": "Drafting and editing", "source": [1, 2, 3]}]}"#,
        // Supervisor pass over the new events: nothing to revise.
        r#"{"is_valid": true, "issues": [], "suggestions": []}"#,
        // Events -> activities clustering.
        r#"{"activities": [{"title": "Report session", "description": "Afternoon of writing", "topic_tags": ["docs"], "source": [1]}]}"#,
        // Supervisor pass over the new activity.
        r#"{"is_valid": true, "issues": [], "suggestions": []}"#,
    ]));

    let agent = Arc::new(SessionAgent::new(
        db.clone(),
        llm.clone(),
        SessionConfig::default(),
        "en",
    ));
    agent.aggregate_once().await.expect("cycle");
    assert_eq!(llm.calls(), 4);

    // One event holding the three actions, marked aggregated.
    let events = db
        .events
        .get_in_timeframe(Utc::now() - Duration::hours(2), Utc::now())
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.title, "Writing the report");
    assert_eq!(event.source_action_ids.len(), 3);
    assert!(event.aggregated_into_activity_id.is_some());
    assert_eq!(
        event.start_time,
        actions.iter().map(|a| a.timestamp).min().unwrap()
    );
    assert_eq!(
        event.end_time,
        actions.iter().map(|a| a.timestamp).max().unwrap()
    );

    for action in &actions {
        let stored = db.actions.get(action.id).await.unwrap().unwrap();
        assert_eq!(stored.aggregated_into_event_id, Some(event.id));
    }

    // One activity over that event, times matching.
    let activities = db.activities.get_recent(10, 0).await.unwrap();
    assert_eq!(activities.len(), 1);
    let activity = &activities[0];
    assert_eq!(activity.title, "Report session");
    assert_eq!(activity.source_event_ids, vec![event.id]);
    assert_eq!(activity.topic_tags, vec!["docs".to_string()]);
    assert_eq!(activity.start_time, event.start_time);
    assert_eq!(activity.end_time, event.end_time);

    let stats = agent.stats();
    assert_eq!(stats.events_created, 1);
    assert_eq!(stats.activities_created, 1);
    assert_eq!(stats.actions_aggregated, 3);

    // Running again with nothing new is a no-op: no writes, no calls.
    agent.aggregate_once().await.expect("idempotent cycle");
    assert_eq!(llm.calls(), 4);
    assert_eq!(db.activities.get_recent(10, 0).await.unwrap().len(), 1);
    let stats = agent.stats();
    assert_eq!(stats.activities_created, 1);
    assert_eq!(stats.events_created, 1);
}

#[tokio::test]
async fn short_events_fail_the_quality_gate() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let actions = [action_at(10, "blip"), action_at(9, "blip again")];
    for action in &actions {
        db.actions.save(action).await.unwrap();
    }
    let start = Utc::now() - Duration::minutes(10);
    let short_event = Event {
        id: EventId::new(),
        title: "momentary glance".to_string(),
        description: String::new(),
        start_time: start,
        end_time: start + Duration::seconds(119),
        source_action_ids: actions.iter().map(|a| a.id).collect(),
        aggregated_into_activity_id: None,
        version: 1,
        deleted: false,
        created_at: Utc::now(),
    };
    db.events.save(&short_event).await.unwrap();
    db.actions
        .mark_as_aggregated(&short_event.source_action_ids, short_event.id)
        .await
        .unwrap();

    let llm = Arc::new(ScriptedLlm::new(Vec::<String>::new()));
    let agent = Arc::new(SessionAgent::new(
        db.clone(),
        llm.clone(),
        SessionConfig::default(),
        "en",
    ));
    agent.aggregate_once().await.expect("cycle");

    // 119s < the 120s minimum: no clustering call, no activity.
    assert_eq!(llm.calls(), 0);
    assert!(db.activities.get_recent(10, 0).await.unwrap().is_empty());
    assert_eq!(agent.stats().events_filtered_quality, 1);
}

#[tokio::test]
async fn clustering_failure_produces_zero_activities() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;

    let actions = [action_at(30, "one"), action_at(20, "two")];
    for action in &actions {
        db.actions.save(action).await.unwrap();
    }

    // Unparseable clustering output; the cycle logs and moves on.
    let llm = Arc::new(ScriptedLlm::new(["this is not json at all"]));
    let agent = Arc::new(SessionAgent::new(
        db.clone(),
        llm.clone(),
        SessionConfig::default(),
        "en",
    ));
    agent.aggregate_once().await.expect("cycle survives");

    assert!(
        db.events
            .get_in_timeframe(Utc::now() - Duration::hours(2), Utc::now())
            .await
            .unwrap()
            .is_empty()
    );
    assert!(db.activities.get_recent(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn supervisor_count_mismatch_keeps_originals() {
    let llm = Arc::new(ScriptedLlm::new([
        // Two revised items against three inputs: a split/merge proposal.
        r#"{"is_valid": false, "issues": ["too many"], "revised_content": [
            {"title": "A", "description": "a"},
            {"title": "B", "description": "b"}
        ]}"#,
    ]));
    let supervisor = ActivitySupervisor::new(llm.clone(), "en", 512);

    let start = Utc::now() - Duration::minutes(30);
    let mut activities: Vec<_> = (0..3)
        .map(|i| {
            ido_model::Activity::new(
                format!("original {i}"),
                "unchanged",
                start,
                start + Duration::minutes(5),
                vec![EventId::new()],
                Vec::new(),
            )
        })
        .collect();

    supervisor.revise(&mut activities, None).await;

    assert_eq!(llm.calls(), 1);
    assert_eq!(activities.len(), 3);
    for (i, activity) in activities.iter().enumerate() {
        assert_eq!(activity.title, format!("original {i}"));
    }
}

#[tokio::test]
async fn supervisor_revisions_are_applied() {
    let llm = Arc::new(ScriptedLlm::new([r#"{
        "is_valid": true,
        "revised_content": [
            {"title": "Focused writing", "description": "Polished prose"}
        ]
    }"#]));
    let supervisor = ActivitySupervisor::new(llm.clone(), "en", 512);

    let start = Utc::now() - Duration::minutes(30);
    let mut activities = vec![ido_model::Activity::new(
        "untitled",
        "rough",
        start,
        start + Duration::minutes(5),
        vec![EventId::new()],
        Vec::new(),
    )];

    supervisor.revise(&mut activities, None).await;

    assert_eq!(llm.calls(), 1);
    assert_eq!(activities[0].title, "Focused writing");
    assert_eq!(activities[0].description, "Polished prose");
}
