//! Supervisor-revision loop.
//!
//! A supervisor collaborator critiques generated titles/descriptions and
//! may return revised content. Revisions that change the item count are a
//! split/merge proposal, which the loop conservatively rejects: it keeps
//! the original set and logs a warning.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::llm::{ChatMessage, LlmClient, extract_json};

const MAX_ITERATIONS: usize = 3;

/// Anything with a revisable title and description.
pub trait Titled {
    fn title(&self) -> &str;
    fn description(&self) -> &str;
    fn set_title(&mut self, title: String);
    fn set_description(&mut self, description: String);
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupervisorReview {
    #[serde(default)]
    pub is_valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub revised_content: Option<Vec<RevisedItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevisedItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub struct ActivitySupervisor {
    llm: Arc<dyn LlmClient>,
    language: String,
    max_tokens: u32,
}

impl std::fmt::Debug for ActivitySupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivitySupervisor")
            .field("language", &self.language)
            .finish()
    }
}

impl ActivitySupervisor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        language: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            llm,
            language: language.into(),
            max_tokens,
        }
    }

    /// One validation round over `(title, description)` pairs.
    pub async fn validate(
        &self,
        items: &[(String, String)],
        context: Option<&serde_json::Value>,
    ) -> Result<SupervisorReview> {
        let payload = json!({
            "items": items
                .iter()
                .map(|(title, description)| json!({
                    "title": title,
                    "description": description,
                }))
                .collect::<Vec<_>>(),
            "source_context": context,
        });

        let messages = [
            ChatMessage::system(format!(
                "You review activity summaries for accuracy and clarity \
                 (answer in language: {}). Respond with JSON: \
                 {{\"is_valid\": bool, \"issues\": [str], \
                 \"suggestions\": [str], \"revised_content\": \
                 [{{\"title\": str, \"description\": str}}]?}}. Omit \
                 revised_content when nothing needs to change.",
                self.language
            )),
            ChatMessage::user(serde_json::to_string_pretty(&payload)?),
        ];

        let response = self
            .llm
            .chat_completion(&messages, self.max_tokens, 0.2)
            .await?;
        let value = extract_json(&response.content)?;
        let review: SupervisorReview = serde_json::from_value(value)?;
        Ok(review)
    }

    /// Up to three revision rounds over `items`. Falls back to the
    /// unrevised content on any collaborator failure.
    pub async fn revise<T: Titled>(
        &self,
        items: &mut [T],
        context: Option<serde_json::Value>,
    ) {
        if items.is_empty() {
            return;
        }

        for iteration in 1..=MAX_ITERATIONS {
            let pairs: Vec<(String, String)> = items
                .iter()
                .map(|item| {
                    (item.title().to_string(), item.description().to_string())
                })
                .collect();

            let review =
                match self.validate(&pairs, context.as_ref()).await {
                    Ok(review) => review,
                    Err(e) => {
                        warn!(iteration, "supervisor unavailable: {e}");
                        return;
                    }
                };

            let Some(revised) = review.revised_content else {
                if !review.issues.is_empty() || !review.suggestions.is_empty()
                {
                    info!(
                        iteration,
                        issues = ?review.issues,
                        suggestions = ?review.suggestions,
                        "supervisor flagged items without revisions"
                    );
                }
                return;
            };

            if revised.len() != items.len() {
                warn!(
                    iteration,
                    current = items.len(),
                    revised = revised.len(),
                    "supervisor changed item count; keeping originals \
                     (split/merge revisions unsupported)"
                );
                return;
            }

            let mut changed = false;
            for (item, revision) in items.iter_mut().zip(revised) {
                if let Some(title) = revision.title
                    && title != item.title()
                {
                    item.set_title(title);
                    changed = true;
                }
                if let Some(description) = revision.description
                    && description != item.description()
                {
                    item.set_description(description);
                    changed = true;
                }
            }

            if !changed {
                debug!(iteration, "supervisor made no changes, stopping");
                return;
            }
            if review.is_valid {
                debug!(iteration, "supervisor satisfied after revision");
                return;
            }
        }

        warn!(
            max_iterations = MAX_ITERATIONS,
            "supervisor revision loop hit the iteration cap"
        );
    }
}
