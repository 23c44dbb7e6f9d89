mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use ido_config::{LlmConfig, ProcessingConfig};
use ido_core::Database;
use ido_core::image::{ImageManager, ImageProcessor};
use ido_core::processing::{ProcessingPipeline, RecordQueue};
use ido_model::{
    KeyAction, KeyboardRecord, RawRecord, ScreenshotRecord,
};
use support::{ScriptedLlm, sample_jpeg};

struct Fixture {
    queue: Arc<RecordQueue>,
    db: Database,
    manager: Arc<ImageManager>,
    llm: Arc<ScriptedLlm>,
    pipeline: ProcessingPipeline,
    _dir: tempfile::TempDir,
}

async fn fixture<I, S>(responses: I) -> Fixture
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("ido.db")).await.unwrap();
    let manager = Arc::new(
        ImageManager::new(dir.path().join("screenshots"), 10, false).unwrap(),
    );
    let llm = Arc::new(ScriptedLlm::new(responses));
    let queue = Arc::new(RecordQueue::new(1024));

    let pipeline = ProcessingPipeline::new(
        Arc::clone(&queue),
        db.clone(),
        Arc::clone(&manager),
        llm.clone(),
        ImageProcessor::new(&Default::default()),
        ProcessingConfig::default(),
        LlmConfig::default(),
    );

    Fixture {
        queue,
        db,
        manager,
        llm,
        pipeline,
        _dir: dir,
    }
}

fn keyboard(seconds_ago: i64, key: &str) -> RawRecord {
    RawRecord::Keyboard(KeyboardRecord {
        timestamp: Utc::now() - Duration::seconds(seconds_ago),
        key: key.to_string(),
        key_type: "key".into(),
        action: KeyAction::Press,
        modifiers: Vec::new(),
    })
}

fn screenshot(seconds_ago: i64, hash: &str, bytes: Vec<u8>) -> RawRecord {
    RawRecord::Screenshot(ScreenshotRecord {
        timestamp: Utc::now() - Duration::seconds(seconds_ago),
        hash: hash.to_string(),
        bytes: Some(bytes),
        optimized_base64: None,
        monitor_index: Some(1),
        path: None,
        sequence: None,
    })
}

#[tokio::test]
async fn tick_summarises_a_batch_into_an_action() {
    let f = fixture([
        r#"{"title": "Replied to review comments", "description": "Typed responses in the browser", "keywords": ["review", "browser"]}"#,
    ])
    .await;

    f.queue.push(screenshot(30, "abc123", sample_jpeg(1, 640, 480)));
    f.queue.push(keyboard(25, "r"));
    f.queue.push(keyboard(20, "enter"));

    f.pipeline.tick().await.expect("tick");

    let actions = f
        .db
        .actions
        .get_unaggregated_in_range(Utc::now() - Duration::hours(1), Utc::now())
        .await
        .unwrap();
    assert_eq!(actions.len(), 1);
    let action = &actions[0];
    assert_eq!(action.title, "Replied to review comments");
    assert_eq!(action.keywords, vec!["review", "browser"]);

    // The screenshot's hash landed in the join table and on disk.
    let hashes = f.db.actions.get_image_hashes(action.id).await.unwrap();
    assert_eq!(hashes, vec!["abc123".to_string()]);
    assert!(f.manager.thumbnails_dir().join("abc123.jpg").exists());

    assert!(f.queue.is_empty());
    assert_eq!(f.pipeline.stats().actions_created, 1);
}

#[tokio::test]
async fn failed_summarisation_is_retried_next_tick() {
    let f = fixture([
        "the model rambled instead of returning JSON",
        r#"{"title": "Wrote notes", "description": "", "keywords": []}"#,
    ])
    .await;

    f.queue.push(keyboard(40, "n"));
    f.queue.push(keyboard(35, "o"));

    // First tick: summarisation fails, the segment is parked, nothing is
    // persisted.
    f.pipeline.tick().await.expect("first tick");
    assert_eq!(f.llm.calls(), 1);
    assert!(
        f.db
            .actions
            .get_unaggregated_in_range(
                Utc::now() - Duration::hours(1),
                Utc::now()
            )
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(f.pipeline.stats().segments_retried, 1);

    // Second tick drains nothing new but replays the parked segment.
    f.pipeline.tick().await.expect("second tick");
    assert_eq!(f.llm.calls(), 2);
    let actions = f
        .db
        .actions
        .get_unaggregated_in_range(Utc::now() - Duration::hours(1), Utc::now())
        .await
        .unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].title, "Wrote notes");
}

#[tokio::test]
async fn empty_queue_tick_is_a_no_op() {
    let f = fixture(Vec::<String>::new()).await;
    f.pipeline.tick().await.expect("tick");
    assert_eq!(f.llm.calls(), 0);
    assert_eq!(f.pipeline.stats().actions_created, 0);
}
