// src/story/prompt.rs
//! Prompt construction: the FACTS block is the sole permitted ground truth,
//! and both prompts bind the model to it explicitly.

use crate::facts::Fact;
use crate::taste::TasteProfile;

/// The sentinel a compliant model emits when the facts cannot ground a story.
pub const NO_STORY: &str = "NO_STORY";

/// At most this many facts enter the FACTS block.
pub const MAX_PROMPT_FACTS: usize = 18;

/// Everything the prompt needs about the selected candidate.
#[derive(Debug, Clone)]
pub struct StoryContext {
    pub place_label: String,
    pub distance_m: u32,
    pub lang: String,
    pub facts: Vec<Fact>,
    pub taste: TasteProfile,
    pub min_words: usize,
    pub max_words: usize,
}

/// Approximate-distance phrasing per language; unknown languages read the
/// English rendering.
pub fn render_distance(lang: &str, distance_m: u32) -> String {
    match lang.split(['-', '_']).next().unwrap_or(lang) {
        "he" => format!("במרחק של כ-{distance_m} מטרים ממך"),
        "fr" => format!("à environ {distance_m} mètres de vous"),
        _ => format!("about {distance_m} meters away from you"),
    }
}

/// Header lines plus `FACT N:` lines, capped at [`MAX_PROMPT_FACTS`].
pub fn build_facts_block(ctx: &StoryContext) -> String {
    let mut block = String::new();
    block.push_str(&format!("PLACE: {}\n", ctx.place_label));
    block.push_str(&format!("DISTANCE: {}\n", render_distance(&ctx.lang, ctx.distance_m)));
    for (i, fact) in ctx.facts.iter().take(MAX_PROMPT_FACTS).enumerate() {
        block.push_str(&format!("FACT {}: {}\n", i + 1, fact.text));
    }
    block
}

/// The system contract. Violations are caught by the validator, but the
/// contract states them up front so compliant output is the common case.
pub fn build_system_prompt(lang: &str) -> String {
    format!(
        "You are a roadside storyteller. Write in the language with code \"{lang}\".\n\
         Rules, all binding:\n\
         - Use ONLY the FACTS block in the user message. No outside knowledge. No invented details.\n\
         - No filler, no superlatives, no generic driving advice, no cliché closers.\n\
         - Content must be safe for teenagers; if conflict appears in the facts, mention it briefly and without graphic detail.\n\
         - Output a single paragraph: no headings, no lists, no blank lines.\n\
         - Every sentence must contain at least one concrete fact: a year, date, number, name, event, place, body of water or route.\n\
         - If the facts are insufficient to ground a story, output exactly {NO_STORY} and nothing else."
    )
}

fn taste_hints(taste: &TasteProfile) -> Vec<&'static str> {
    let mut hints = Vec::new();
    if taste.humor > 0.65 {
        hints.push("a light touch of dry humor is welcome");
    }
    if taste.nerdy > 0.65 {
        hints.push("lean into technical and numerical detail");
    }
    if taste.dramatic > 0.65 {
        hints.push("let the narrative build some tension");
    }
    if taste.shortness > 0.65 {
        hints.push("stay close to the lower word bound");
    }
    hints
}

/// The user prompt: structure requirements, target length, taste
/// conditioning, then the FACTS block itself.
pub fn build_user_prompt(ctx: &StoryContext) -> String {
    let facts_block = build_facts_block(ctx);
    let mut prompt = format!(
        "Tell a short spoken story about this place for a passing traveler.\n\
         Structure:\n\
         - Sentences 1-2: anchor the place by name, {distance}; enter the story directly.\n\
         - Sentences 3-8 or 9: one distinct concrete fact per sentence, preferring facts with years, dates or named people.\n\
         - Closing sentence: reference a concrete fact from the FACTS block.\n\
         Target length: between {min} and {max} words.\n\
         If the facts cannot support this, output exactly {NO_STORY}.\n",
        distance = render_distance(&ctx.lang, ctx.distance_m),
        min = ctx.min_words,
        max = ctx.max_words,
    );
    let hints = taste_hints(&ctx.taste);
    if !hints.is_empty() {
        prompt.push_str(&format!("Tone: {}.\n", hints.join("; ")));
    }
    prompt.push('\n');
    prompt.push_str(&facts_block);
    prompt
}

/// The one-shot repair prompt: same FACTS block, the failure, the bad
/// draft, and an instruction to comply without introducing new facts.
pub fn build_repair_prompt(ctx: &StoryContext, failure_reason: &str, bad_draft: &str) -> String {
    format!(
        "Your previous draft violated a constraint: {failure_reason}.\n\
         Rewrite it so it complies. Use only the FACTS block below; do not introduce any new fact.\n\
         Target length: between {} and {} words, one paragraph.\n\
         If you cannot comply, output exactly {NO_STORY}.\n\n\
         {}\nPREVIOUS DRAFT:\n{bad_draft}",
        ctx.min_words,
        ctx.max_words,
        build_facts_block(ctx),
    )
}
