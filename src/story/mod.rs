// src/story/mod.rs
//! Grounded generation: prompt → draft → validation → one-shot repair.
//! Silence beats a low-quality story, so the only outcomes are a validated
//! story, a model-declared `NO_STORY`, or a tagged rejection.

pub mod prompt;
pub mod validator;

use std::sync::Arc;

use anyhow::Result;
use metrics::counter;
use tracing::{debug, info};

use crate::llm::{CompletionRequest, TextGenerator};
use crate::story::prompt::{build_repair_prompt, build_system_prompt, build_user_prompt, StoryContext, NO_STORY};
use crate::story::validator::{validate, ValidationFailure};

/// Outcome of the generation loop. Generator transport failures are real
/// errors and propagate separately.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryOutcome {
    /// A validated story.
    Story(String),
    /// The model declared the facts insufficient on the first pass.
    NoStory,
    /// Validation failed even after the repair pass; carries the subreason.
    Rejected(&'static str),
}

pub struct StoryEngine {
    generator: Arc<dyn TextGenerator>,
}

impl StoryEngine {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Run the full loop for one candidate.
    pub async fn tell(&self, ctx: &StoryContext) -> Result<StoryOutcome> {
        let system = build_system_prompt(&ctx.lang);
        let user = build_user_prompt(ctx);
        let draft = self
            .generator
            .complete(&CompletionRequest::new(system.clone(), user))
            .await?;

        match validate(&draft, &ctx.lang, ctx.min_words, ctx.max_words) {
            Ok(()) => {
                counter!("story_generated_total").increment(1);
                return Ok(StoryOutcome::Story(draft));
            }
            Err(ValidationFailure::ModelNoStory) => {
                info!(place = %ctx.place_label, "model declared NO_STORY");
                return Ok(StoryOutcome::NoStory);
            }
            Err(failure) => {
                debug!(place = %ctx.place_label, reason = failure.as_str(), words = validator::word_count(&draft), "draft rejected, attempting repair");
                counter!("story_repairs_total").increment(1);
                let repair_user = build_repair_prompt(ctx, failure.as_str(), &draft);
                let rewrite = self
                    .generator
                    .complete(&CompletionRequest::new(system, repair_user).temperature(0.2))
                    .await?;
                if rewrite.trim() == NO_STORY {
                    return Ok(StoryOutcome::Rejected(ValidationFailure::ModelNoStory.as_str()));
                }
                match validate(&rewrite, &ctx.lang, ctx.min_words, ctx.max_words) {
                    Ok(()) => {
                        counter!("story_generated_total").increment(1);
                        Ok(StoryOutcome::Story(rewrite))
                    }
                    Err(second) => {
                        counter!("story_rejected_total").increment(1);
                        Ok(StoryOutcome::Rejected(second.as_str()))
                    }
                }
            }
        }
    }
}
