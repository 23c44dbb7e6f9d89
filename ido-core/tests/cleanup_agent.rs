mod support;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use ido_config::CleanupConfig;
use ido_core::Database;
use ido_core::agents::CleanupAgent;
use ido_core::image::ImageManager;
use ido_model::{Action, Activity, EventId};
use support::sample_jpeg;

#[tokio::test]
async fn sweep_enforces_retention_and_collects_orphans() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("ido.db")).await.unwrap();
    let manager = Arc::new(
        ImageManager::new(dir.path().join("screenshots"), 10, false).unwrap(),
    );

    // A live action referencing h1; h3 belongs to nobody.
    let action = Action::new(
        "reading docs",
        "",
        Vec::new(),
        Utc::now() - Duration::minutes(5),
    );
    db.actions.save(&action).await.unwrap();
    db.actions.add_image(action.id, "h1").await.unwrap();

    let bytes = sample_jpeg(1, 320, 240);
    manager.process_image_for_cache("h1", &bytes).unwrap();
    manager.process_image_for_cache("h3", &bytes).unwrap();
    let aged = filetime::FileTime::from_system_time(
        std::time::SystemTime::now() - StdDuration::from_secs(45 * 60),
    );
    for hash in ["h1", "h3"] {
        filetime::set_file_mtime(
            manager.thumbnails_dir().join(format!("{hash}.jpg")),
            aged,
        )
        .unwrap();
    }

    // An activity well past retention.
    let start = Utc::now() - Duration::days(45);
    let stale = Activity::new(
        "long forgotten",
        "",
        start,
        start + Duration::minutes(20),
        vec![EventId::new()],
        Vec::new(),
    );
    db.activities.save(&stale).await.unwrap();

    let agent = Arc::new(CleanupAgent::new(
        db.clone(),
        Some(Arc::clone(&manager)),
        CleanupConfig::default(),
    ));
    agent.cleanup_once().await.expect("sweep");

    // Retention: the stale activity flipped to deleted.
    assert!(db.activities.get(stale.id).await.unwrap().is_none());

    // Orphan GC: unreferenced and old enough -> gone; referenced -> kept.
    assert!(manager.thumbnails_dir().join("h1.jpg").exists());
    assert!(!manager.thumbnails_dir().join("h3.jpg").exists());

    let stats = agent.stats();
    assert_eq!(stats.total_cleanups, 1);
    assert_eq!(stats.last_cleanup_counts.activities, 1);
    assert_eq!(stats.last_orphaned_images_count, 1);
    assert!(stats.last_cleanup_time.is_some());
}
