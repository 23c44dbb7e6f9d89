//! Session aggregation agent.
//!
//! Periodically folds unaggregated actions into events, then events into
//! activities: LLM clustering, deterministic overlap/proximity merging, a
//! supervisor-revision pass, and a merge against recently written
//! activities. Also learns merge/split preferences from user operations.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ido_config::SessionConfig;
use ido_model::{
    Activity, ActivityId, Event, EventId, PreferenceKind, SessionPreference,
};
use serde_json::{Value, json};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::error::Result;
use crate::llm::{ChatMessage, LlmClient, extract_json};

use super::supervisor::{ActivitySupervisor, Titled};

/// Lookback for unaggregated work and for merge-eligible activities.
const LOOKBACK_HOURS: i64 = 2;

impl Titled for Activity {
    fn title(&self) -> &str {
        &self.title
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn set_title(&mut self, title: String) {
        self.title = title;
    }
    fn set_description(&mut self, description: String) {
        self.description = description;
    }
}

impl Titled for Event {
    fn title(&self) -> &str {
        &self.title
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn set_title(&mut self, title: String) {
        self.title = title;
    }
    fn set_description(&mut self, description: String) {
        self.description = description;
    }
}

#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub events_created: u64,
    pub actions_aggregated: u64,
    pub activities_created: u64,
    pub activities_updated: u64,
    pub events_aggregated: u64,
    pub events_filtered_quality: u64,
    pub last_aggregation_time: Option<DateTime<Utc>>,
}

/// Planned update of an existing activity absorbing new candidates.
#[derive(Debug, Clone)]
pub(crate) struct ActivityUpdate {
    pub activity: Activity,
    pub new_event_ids: Vec<EventId>,
    pub reason: String,
}

pub struct SessionAgent {
    db: Database,
    llm: Arc<dyn LlmClient>,
    supervisor: ActivitySupervisor,
    config: SessionConfig,
    paused: AtomicBool,
    cycle_guard: AsyncMutex<()>,
    stats: StdMutex<SessionStats>,
}

impl std::fmt::Debug for SessionAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAgent")
            .field("config", &self.config)
            .field("paused", &self.paused.load(Ordering::Relaxed))
            .finish()
    }
}

impl SessionAgent {
    pub fn new(
        db: Database,
        llm: Arc<dyn LlmClient>,
        config: SessionConfig,
        language: impl Into<String>,
    ) -> Self {
        let supervisor =
            ActivitySupervisor::new(Arc::clone(&llm), language, 1024);
        Self {
            db,
            llm,
            supervisor,
            config,
            paused: AtomicBool::new(false),
            cycle_guard: AsyncMutex::new(()),
            stats: StdMutex::new(SessionStats::default()),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.lock().expect("stats lock").clone()
    }

    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let agent = Arc::clone(self);
        let interval =
            Duration::from_secs(self.config.aggregation_interval.max(1));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("session agent cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if agent.paused.load(Ordering::SeqCst) {
                            debug!("session agent paused, skipping cycle");
                            continue;
                        }
                        if let Err(e) = agent.aggregate_once().await {
                            warn!("aggregation cycle failed: {e}");
                        }
                    }
                }
            }
        })
    }

    /// One full aggregation cycle. Cycles are serialised: a second call
    /// while one is in flight is a no-op.
    pub async fn aggregate_once(&self) -> Result<()> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            debug!("aggregation already in flight, skipping");
            return Ok(());
        };

        self.aggregate_actions_into_events().await?;
        self.aggregate_events_into_activities().await?;

        self.stats.lock().expect("stats lock").last_aggregation_time =
            Some(Utc::now());
        Ok(())
    }

    // Actions -> Events

    async fn aggregate_actions_into_events(&self) -> Result<()> {
        let end = Utc::now();
        let start = end - chrono::Duration::hours(LOOKBACK_HOURS);
        let actions =
            self.db.actions.get_unaggregated_in_range(start, end).await?;
        if actions.is_empty() {
            debug!("no actions to aggregate into events");
            return Ok(());
        }

        let items = actions
            .iter()
            .enumerate()
            .map(|(i, action)| {
                json!({
                    "index": i + 1,
                    "title": action.title,
                    "description": action.description,
                    "timestamp": action.timestamp,
                })
            })
            .collect::<Vec<_>>();

        let clusters = match self
            .cluster(
                "events",
                "You group fine-grained desktop actions into medium-grained \
                 events: contiguous segments of the same piece of work. \
                 Respond with JSON: {\"events\": [{\"title\": str, \
                 \"description\": str, \"source\": [int]}]}.",
                &items,
            )
            .await
        {
            Ok(clusters) => clusters,
            Err(e) => {
                warn!("action clustering failed, creating no events: {e}");
                return Ok(());
            }
        };

        let mut events = Vec::new();
        for cluster in &clusters {
            let indexes =
                normalize_source_indexes(&cluster["source"], actions.len());
            if indexes.is_empty() {
                continue;
            }

            let members: Vec<_> =
                indexes.iter().map(|&i| &actions[i - 1]).collect();
            let start_time = members
                .iter()
                .map(|a| a.timestamp)
                .min()
                .unwrap_or_else(Utc::now);
            let end_time = members
                .iter()
                .map(|a| a.timestamp)
                .max()
                .unwrap_or(start_time);

            events.push(Event {
                id: EventId::new(),
                title: cluster["title"]
                    .as_str()
                    .unwrap_or("Unnamed event")
                    .to_string(),
                description: cluster["description"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                start_time,
                end_time,
                source_action_ids: members.iter().map(|a| a.id).collect(),
                aggregated_into_activity_id: None,
                version: 1,
                deleted: false,
                created_at: Utc::now(),
            });
        }
        if events.is_empty() {
            return Ok(());
        }

        self.supervisor.revise(&mut events, None).await;

        for event in &events {
            self.db.events.save(event).await?;
            self.db
                .actions
                .mark_as_aggregated(&event.source_action_ids, event.id)
                .await?;
            let mut stats = self.stats.lock().expect("stats lock");
            stats.events_created += 1;
            stats.actions_aggregated += event.source_action_ids.len() as u64;
        }
        debug!(count = events.len(), "events created from actions");
        Ok(())
    }

    // Events -> Activities

    async fn aggregate_events_into_activities(&self) -> Result<()> {
        let events = self.fetch_unaggregated_events().await?;
        if events.is_empty() {
            debug!("no events to aggregate into sessions");
            return Ok(());
        }

        let mut candidates = match self.cluster_events(&events).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("event clustering failed, creating no activities: {e}");
                return Ok(());
            }
        };
        if candidates.is_empty() {
            return Ok(());
        }

        candidates = merge_overlapping_candidates(
            candidates,
            self.config.merge_time_gap_tolerance,
            self.config.merge_similarity_threshold,
        );

        let context = json!({
            "events": events
                .iter()
                .map(|event| json!({
                    "id": event.id,
                    "title": event.title,
                    "description": event.description,
                    "start_time": event.start_time,
                    "end_time": event.end_time,
                }))
                .collect::<Vec<_>>(),
        });
        self.supervisor.revise(&mut candidates, Some(context)).await;

        let existing = self
            .db
            .activities
            .get_ending_since(Utc::now() - chrono::Duration::hours(LOOKBACK_HOURS))
            .await?;
        let (to_save, to_update) = plan_existing_merges(
            candidates,
            existing,
            self.config.merge_time_gap_tolerance,
            self.config.merge_similarity_threshold,
        );

        for update in &to_update {
            self.db.activities.save(&update.activity).await?;
            if !update.new_event_ids.is_empty() {
                self.db
                    .events
                    .mark_as_aggregated(
                        &update.new_event_ids,
                        update.activity.id,
                    )
                    .await?;
            }
            let mut stats = self.stats.lock().expect("stats lock");
            stats.activities_updated += 1;
            stats.events_aggregated += update.new_event_ids.len() as u64;
            debug!(
                activity = %update.activity.id,
                new_events = update.new_event_ids.len(),
                reason = %update.reason,
                "existing activity extended"
            );
        }

        for activity in &to_save {
            self.db.activities.save(activity).await?;
            self.db
                .events
                .mark_as_aggregated(&activity.source_event_ids, activity.id)
                .await?;
            let mut stats = self.stats.lock().expect("stats lock");
            stats.activities_created += 1;
            stats.events_aggregated +=
                activity.source_event_ids.len() as u64;
        }

        debug!(
            created = to_save.len(),
            updated = to_update.len(),
            "session aggregation complete"
        );
        Ok(())
    }

    /// Unaggregated events from the lookback window, quality-gated.
    async fn fetch_unaggregated_events(&self) -> Result<Vec<Event>> {
        let end = Utc::now();
        let start = end - chrono::Duration::hours(LOOKBACK_HOURS);
        let events = self.db.events.get_in_timeframe(start, end).await?;

        let mut kept = Vec::with_capacity(events.len());
        let mut quality_filtered = 0u64;
        for event in events {
            if event.aggregated_into_activity_id.is_some() {
                continue;
            }
            if event.source_action_ids.len() < self.config.min_event_actions
                || (event.duration_seconds() as i64)
                    < self.config.min_event_duration_seconds
            {
                quality_filtered += 1;
                continue;
            }
            kept.push(event);
        }

        if quality_filtered > 0 {
            self.stats
                .lock()
                .expect("stats lock")
                .events_filtered_quality += quality_filtered;
        }
        Ok(kept)
    }

    async fn cluster_events(
        &self,
        events: &[Event],
    ) -> Result<Vec<Activity>> {
        let items = events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                json!({
                    "index": i + 1,
                    "title": event.title,
                    "description": event.description,
                    "start_time": event.start_time,
                    "end_time": event.end_time,
                })
            })
            .collect::<Vec<_>>();

        let clusters = self
            .cluster(
                "activities",
                "You group work events into coarse session-level \
                 activities by theme, goal, and time continuity. Respond \
                 with JSON: {\"activities\": [{\"title\": str, \
                 \"description\": str, \"topic_tags\": [str], \
                 \"source\": [int]}]}.",
                &items,
            )
            .await?;

        let mut activities = Vec::new();
        for cluster in &clusters {
            let indexes =
                normalize_source_indexes(&cluster["source"], events.len());
            if indexes.is_empty() {
                continue;
            }
            let members: Vec<_> =
                indexes.iter().map(|&i| &events[i - 1]).collect();

            let start_time = members
                .iter()
                .map(|e| e.start_time)
                .min()
                .unwrap_or_else(Utc::now);
            let end_time = members
                .iter()
                .map(|e| e.end_time)
                .max()
                .unwrap_or(start_time);
            let topic_tags = cluster["topic_tags"]
                .as_array()
                .map(|tags| {
                    tags.iter()
                        .filter_map(|t| t.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();

            activities.push(Activity::new(
                cluster["title"].as_str().unwrap_or("Unnamed session"),
                cluster["description"].as_str().unwrap_or_default(),
                start_time,
                end_time,
                members.iter().map(|e| e.id).collect(),
                topic_tags,
            ));
        }

        debug!(count = activities.len(), "candidate activities clustered");
        Ok(activities)
    }

    /// Shared clustering call: items in, array of cluster objects out.
    async fn cluster(
        &self,
        key: &str,
        system_prompt: &str,
        items: &[Value],
    ) -> Result<Vec<Value>> {
        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(serde_json::to_string_pretty(&json!({
                "items": items,
            }))?),
        ];

        let response =
            self.llm.chat_completion(&messages, 2048, 0.3).await?;
        let value = extract_json(&response.content)?;
        Ok(value[key].as_array().cloned().unwrap_or_default())
    }

    // Learning from user operations

    /// Extracts and persists a merge rule from a user-initiated merge.
    pub async fn record_user_merge(
        &self,
        merged_activity_id: ActivityId,
        original_activities: &[Activity],
    ) -> Result<()> {
        debug!(
            merged = %merged_activity_id,
            originals = original_activities.len(),
            "recording user merge"
        );

        let summary = original_activities
            .iter()
            .map(|a| {
                json!({
                    "title": a.title,
                    "description": a.description,
                    "start_time": a.start_time,
                    "end_time": a.end_time,
                })
            })
            .collect::<Vec<_>>();

        let pattern = self
            .extract_pattern(&format!(
                "User merged these activities:\n{}\n\nWhat pattern or rule \
                 can we learn from this merge? Describe in one concise \
                 sentence.",
                serde_json::to_string_pretty(&summary)?
            ))
            .await?;

        if let Some(pattern) = pattern {
            let preference = SessionPreference::new(
                PreferenceKind::MergePattern,
                pattern.clone(),
            );
            self.db.preferences.save(&preference).await?;
            info!(pattern = %pattern, "learned merge pattern");
        }
        Ok(())
    }

    /// Extracts and persists a split rule from a user-initiated split.
    pub async fn record_user_split(
        &self,
        original_activity: &Activity,
        new_activity_ids: &[ActivityId],
        source_events: &[Event],
    ) -> Result<()> {
        debug!(
            original = %original_activity.id,
            pieces = new_activity_ids.len(),
            "recording user split"
        );

        let summary = json!({
            "title": original_activity.title,
            "description": original_activity.description,
            "duration_minutes": original_activity.session_duration_minutes,
            "num_events": source_events.len(),
        });

        let pattern = self
            .extract_pattern(&format!(
                "User split this activity into {} separate activities:\n{}\n\n\
                 What pattern or rule can we learn from this split? \
                 Describe in one concise sentence.",
                new_activity_ids.len(),
                serde_json::to_string_pretty(&summary)?
            ))
            .await?;

        if let Some(pattern) = pattern {
            let preference = SessionPreference::new(
                PreferenceKind::SplitPattern,
                pattern.clone(),
            );
            self.db.preferences.save(&preference).await?;
            info!(pattern = %pattern, "learned split pattern");
        }
        Ok(())
    }

    async fn extract_pattern(
        &self,
        prompt: &str,
    ) -> Result<Option<String>> {
        let messages = [
            ChatMessage::system(
                "You are an expert at analyzing user behavior patterns. \
                 Extract a reusable pattern description (max 100 words).",
            ),
            ChatMessage::user(prompt),
        ];
        let response = self.llm.chat_completion(&messages, 200, 0.3).await?;
        let pattern = response.content.trim().to_string();
        Ok((!pattern.is_empty()).then_some(pattern))
    }
}

// Pure aggregation helpers

/// Semantic similarity of two activities: byte-equal lowercased titles are
/// 1.0; otherwise 0.7 * word Jaccard over titles + 0.3 * tag Jaccard.
/// Empty operands score 0.
pub(crate) fn activity_similarity(a: &Activity, b: &Activity) -> f64 {
    let title_a = a.title.trim().to_lowercase();
    let title_b = b.title.trim().to_lowercase();
    if title_a.is_empty() || title_b.is_empty() {
        return 0.0;
    }
    if title_a == title_b {
        return 1.0;
    }

    let jaccard = |xs: &std::collections::HashSet<String>,
                   ys: &std::collections::HashSet<String>| {
        if xs.is_empty() || ys.is_empty() {
            return 0.0;
        }
        let intersection = xs.intersection(ys).count() as f64;
        let union = xs.union(ys).count() as f64;
        intersection / union
    };

    let words_a: std::collections::HashSet<String> =
        title_a.split_whitespace().map(str::to_string).collect();
    let words_b: std::collections::HashSet<String> =
        title_b.split_whitespace().map(str::to_string).collect();
    let tags_a: std::collections::HashSet<String> =
        a.topic_tags.iter().cloned().collect();
    let tags_b: std::collections::HashSet<String> =
        b.topic_tags.iter().cloned().collect();

    0.7 * jaccard(&words_a, &words_b) + 0.3 * jaccard(&tags_a, &tags_b)
}

/// Embeds a secondary activity's text under the primary's description as a
/// `[Related: <title>]` block. Already-embedded titles are not repeated.
fn fold_descriptions(
    primary_description: &str,
    secondary_title: &str,
    secondary_description: &str,
) -> String {
    if secondary_description.is_empty() || secondary_title.is_empty() {
        if primary_description.is_empty() {
            return secondary_description.to_string();
        }
        return primary_description.to_string();
    }
    if primary_description.is_empty() {
        return secondary_description.to_string();
    }
    let marker = format!("[Related: {secondary_title}]");
    if primary_description.contains(&marker) {
        return primary_description.to_string();
    }
    format!("{primary_description}\n\n{marker}\n{secondary_description}")
}

fn union_preserving_order<T: PartialEq + Clone>(
    base: &[T],
    extra: &[T],
) -> Vec<T> {
    let mut out = base.to_vec();
    for item in extra {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Merges `next` into `current`: union of events and tags, widened time
/// range, primary-by-duration title selection, refreshed duration.
fn merge_into(current: &mut Activity, next: &Activity) {
    let current_duration = current.duration_seconds();
    let next_duration = next.duration_seconds();

    current.source_event_ids = union_preserving_order(
        &current.source_event_ids,
        &next.source_event_ids,
    );
    current.topic_tags =
        union_preserving_order(&current.topic_tags, &next.topic_tags);
    current.start_time = current.start_time.min(next.start_time);
    current.end_time = current.end_time.max(next.end_time);

    if !next.title.is_empty() && next.title != current.title {
        if next_duration > current_duration {
            current.description = fold_descriptions(
                &next.description,
                &current.title,
                &current.description,
            );
            current.title = next.title.clone();
        } else {
            current.description = fold_descriptions(
                &current.description,
                &next.title,
                &next.description,
            );
        }
    } else if !next.description.is_empty()
        && next.description != current.description
    {
        current.description = if current.description.is_empty() {
            next.description.clone()
        } else {
            format!("{}\n\n{}", current.description, next.description)
        };
    }

    current.refresh_duration();
}

/// Deterministic pass over candidate activities: sort by start time, merge
/// adjacent pairs that overlap or sit within the gap tolerance with
/// sufficient similarity.
pub(crate) fn merge_overlapping_candidates(
    mut candidates: Vec<Activity>,
    gap_tolerance_seconds: i64,
    similarity_threshold: f64,
) -> Vec<Activity> {
    if candidates.len() <= 1 {
        return candidates;
    }
    candidates.sort_by_key(|a| a.start_time);

    let mut merged = Vec::with_capacity(candidates.len());
    let mut iter = candidates.into_iter();
    let mut current = iter.next().expect("non-empty candidates");

    for next in iter {
        let gap = (next.start_time - current.end_time).num_seconds();

        let reason = if next.start_time < current.end_time {
            Some("time_overlap")
        } else if (0..=gap_tolerance_seconds).contains(&gap)
            && activity_similarity(&current, &next) >= similarity_threshold
        {
            Some("proximity_similarity")
        } else {
            None
        };

        match reason {
            Some(reason) => {
                debug!(
                    first = %current.title,
                    second = %next.title,
                    reason,
                    "merging candidate activities"
                );
                merge_into(&mut current, &next);
            }
            None => {
                merged.push(std::mem::replace(&mut current, next));
            }
        }
    }
    merged.push(current);
    merged
}

/// Tests each new candidate against recently written activities. Matches
/// become update records (folded together when several candidates hit the
/// same existing row); the rest are returned for insertion.
pub(crate) fn plan_existing_merges(
    new_activities: Vec<Activity>,
    mut existing: Vec<Activity>,
    gap_tolerance_seconds: i64,
    similarity_threshold: f64,
) -> (Vec<Activity>, Vec<ActivityUpdate>) {
    if existing.is_empty() {
        return (new_activities, Vec::new());
    }
    existing.sort_by_key(|a| a.end_time);

    let mut to_save = Vec::new();
    let mut updates: Vec<ActivityUpdate> = Vec::new();

    for candidate in new_activities {
        let mut merged = false;

        for activity in &existing {
            let gap =
                (candidate.start_time - activity.end_time).num_seconds();

            let reason = if candidate.start_time < activity.end_time {
                Some("time_overlap".to_string())
            } else if (0..=gap_tolerance_seconds).contains(&gap)
                && activity_similarity(activity, &candidate)
                    >= similarity_threshold
            {
                Some(format!("proximity_similarity (gap: {gap}s)"))
            } else {
                None
            };

            let Some(reason) = reason else {
                continue;
            };

            let new_event_ids: Vec<EventId> = candidate
                .source_event_ids
                .iter()
                .filter(|id| !activity.source_event_ids.contains(id))
                .copied()
                .collect();

            match updates
                .iter()
                .position(|u| u.activity.id == activity.id)
            {
                Some(i) => {
                    let update = &mut updates[i];
                    merge_into(&mut update.activity, &candidate);
                    update.new_event_ids = union_preserving_order(
                        &update.new_event_ids,
                        &new_event_ids,
                    );
                }
                None => {
                    let mut updated = activity.clone();
                    merge_into(&mut updated, &candidate);
                    updates.push(ActivityUpdate {
                        activity: updated,
                        new_event_ids,
                        reason,
                    });
                }
            }

            merged = true;
            break;
        }

        if !merged {
            to_save.push(candidate);
        }
    }

    (to_save, updates)
}

/// Normalizes LLM-provided 1-based indexes: integers only, in range,
/// first occurrence wins, order preserved.
pub(crate) fn normalize_source_indexes(
    raw: &Value,
    total: usize,
) -> Vec<usize> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut normalized = Vec::new();
    for item in items {
        let Some(index) = item.as_i64() else {
            continue;
        };
        if index < 1 || index as usize > total {
            continue;
        }
        let index = index as usize;
        if seen.insert(index) {
            normalized.push(index);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
            + chrono::Duration::seconds(seconds)
    }

    fn candidate(
        title: &str,
        start: i64,
        end: i64,
        tags: &[&str],
    ) -> Activity {
        Activity::new(
            title,
            format!("{title} description"),
            at(start),
            at(end),
            vec![EventId::new()],
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[test]
    fn exact_title_match_is_full_similarity() {
        let a = candidate("Code Review", 0, 100, &[]);
        let b = candidate("  code review ", 200, 300, &[]);
        assert_eq!(activity_similarity(&a, &b), 1.0);
    }

    #[test]
    fn similarity_combines_title_and_tags() {
        // Spec worked example: one shared word out of three, shared tag
        // set; 0.7 * (1/3) + 0.3 * 1 = 0.533...
        let a = candidate("code review", 0, 600, &["pr", "review"]);
        let b =
            candidate("code review comments", 800, 1400, &["pr", "review"]);
        let similarity = activity_similarity(&a, &b);
        assert!((similarity - (0.7 / 3.0 + 0.3)).abs() < 1e-9);
        assert!(similarity < 0.6);
    }

    #[test]
    fn empty_title_scores_zero() {
        let a = candidate("", 0, 100, &["x"]);
        let b = candidate("something", 0, 100, &["x"]);
        assert_eq!(activity_similarity(&a, &b), 0.0);
    }

    #[test]
    fn overlap_merges_candidates() {
        let merged = merge_overlapping_candidates(
            vec![
                candidate("write tests", 0, 600, &[]),
                candidate("debug tests", 500, 1200, &[]),
            ],
            300,
            0.6,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start_time, at(0));
        assert_eq!(merged[0].end_time, at(1200));
        assert_eq!(merged[0].session_duration_minutes, 20);
        assert_eq!(merged[0].source_event_ids.len(), 2);
    }

    #[test]
    fn near_identical_but_distant_titles_do_not_merge() {
        let merged = merge_overlapping_candidates(
            vec![
                candidate("sprint planning", 0, 600, &[]),
                candidate("sprint planning", 2000, 2600, &[]),
            ],
            300,
            0.6,
        );
        // Gap of 1400s exceeds the tolerance, identical titles or not.
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn gap_with_low_similarity_does_not_merge() {
        // Spec worked example: gap 200s within tolerance, similarity
        // 0.233 under the 0.6 bar.
        let merged = merge_overlapping_candidates(
            vec![
                candidate("code review", 0, 600, &[]),
                candidate("code review comments", 800, 1400, &[]),
            ],
            300,
            0.6,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn single_candidate_returned_verbatim() {
        let only = candidate("solo", 0, 600, &[]);
        let id = only.id;
        let merged = merge_overlapping_candidates(vec![only], 300, 0.6);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, id);
    }

    #[test]
    fn longer_duration_wins_the_title() {
        let short = candidate("short task", 0, 300, &[]);
        let long = candidate("long task", 200, 1800, &[]);
        let merged =
            merge_overlapping_candidates(vec![short, long], 300, 0.6);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "long task");
        assert!(merged[0].description.contains("[Related: short task]"));
    }

    #[test]
    fn related_block_is_not_duplicated() {
        let folded = fold_descriptions(
            "primary\n\n[Related: side quest]\nold note",
            "side quest",
            "new note",
        );
        assert_eq!(folded.matches("[Related: side quest]").count(), 1);
    }

    #[test]
    fn existing_merge_folds_repeated_hits() {
        let existing = vec![candidate("deep work", 0, 1000, &[])];
        let existing_id = existing[0].id;
        let hits = vec![
            candidate("deep work", 900, 1500, &[]),
            candidate("deep work", 950, 2000, &[]),
        ];

        let (to_save, updates) =
            plan_existing_merges(hits, existing, 300, 0.6);
        assert!(to_save.is_empty());
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].activity.id, existing_id);
        assert_eq!(updates[0].activity.end_time, at(2000));
        assert_eq!(updates[0].new_event_ids.len(), 2);
        assert_eq!(updates[0].activity.source_event_ids.len(), 3);
    }

    #[test]
    fn unrelated_candidate_is_saved_as_new() {
        let existing = vec![candidate("emails", 0, 600, &[])];
        let fresh = vec![candidate("guitar practice", 5000, 6000, &[])];
        let (to_save, updates) =
            plan_existing_merges(fresh, existing, 300, 0.6);
        assert_eq!(to_save.len(), 1);
        assert!(updates.is_empty());
    }

    #[test]
    fn normalizes_indexes() {
        let raw = json!([2, 1, 2, 0, 99, "x", 3]);
        assert_eq!(normalize_source_indexes(&raw, 3), vec![2, 1, 3]);
        assert!(normalize_source_indexes(&json!("nope"), 3).is_empty());
    }
}
