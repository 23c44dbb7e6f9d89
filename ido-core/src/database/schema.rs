//! DDL executed on first open. All statements are `IF NOT EXISTS` so the
//! schema pass is idempotent; column additions live in the migration
//! registry instead.

pub const ALL_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS actions (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        keywords TEXT,
        timestamp TEXT NOT NULL,
        aggregated_into_event_id TEXT,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS action_images (
        action_id TEXT NOT NULL,
        image_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (action_id, image_hash)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        source_action_ids TEXT NOT NULL,
        aggregated_into_activity_id TEXT,
        version INTEGER NOT NULL DEFAULT 1,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS activities (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        source_event_ids TEXT NOT NULL,
        session_duration_minutes INTEGER,
        topic_tags TEXT,
        user_merged_from_ids TEXT,
        user_split_into_ids TEXT,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS diaries (
        id TEXT PRIMARY KEY,
        date TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS todos (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'open',
        source_activity_id TEXT,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS knowledge (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        category TEXT,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL DEFAULT '',
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS llm_models (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        provider TEXT NOT NULL DEFAULT '',
        base_url TEXT NOT NULL DEFAULT '',
        model_id TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        type TEXT NOT NULL DEFAULT 'string',
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS session_preferences (
        id TEXT PRIMARY KEY,
        preference_type TEXT NOT NULL,
        pattern_description TEXT NOT NULL,
        confidence_score REAL NOT NULL DEFAULT 0.5,
        times_observed INTEGER NOT NULL DEFAULT 1,
        last_observed TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pomodoro_sessions (
        id TEXT PRIMARY KEY,
        start_time TEXT NOT NULL,
        end_time TEXT,
        status TEXT NOT NULL DEFAULT 'running',
        rounds INTEGER NOT NULL DEFAULT 0,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
];

pub const ALL_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_actions_timestamp ON actions (timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_actions_aggregated ON actions (aggregated_into_event_id)",
    "CREATE INDEX IF NOT EXISTS idx_action_images_hash ON action_images (image_hash)",
    "CREATE INDEX IF NOT EXISTS idx_events_start_time ON events (start_time)",
    "CREATE INDEX IF NOT EXISTS idx_events_aggregated ON events (aggregated_into_activity_id)",
    "CREATE INDEX IF NOT EXISTS idx_activities_start_time ON activities (start_time)",
    "CREATE INDEX IF NOT EXISTS idx_activities_end_time ON activities (end_time)",
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages (conversation_id)",
];
