// src/story/validator.rs
//! Output validation. All rules must pass before a story is spoken; any
//! failure carries a machine-readable reason tag.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::story::prompt::NO_STORY;

static RE_BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("blank line regex"));

/// Operator-supplied additions to the denylists, read once:
/// `FILLER_DENYLIST_JSON={"en": ["phrase", ...], "he": [...]}`.
static EXTRA_FILLER: Lazy<HashMap<String, Vec<String>>> = Lazy::new(|| {
    std::env::var("FILLER_DENYLIST_JSON")
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
});

/// Why a draft was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    BadLength,
    BannedFiller,
    NotOneParagraph,
    ModelNoStory,
}

impl ValidationFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationFailure::BadLength => "bad_length",
            ValidationFailure::BannedFiller => "banned_filler",
            ValidationFailure::NotOneParagraph => "not_one_paragraph",
            ValidationFailure::ModelNoStory => "model_no_story",
        }
    }
}

/// Filler phrases per language. Latin-script entries match
/// case-insensitively; other scripts match exactly.
fn filler_denylist(lang: &str) -> &'static [&'static str] {
    match lang.split(['-', '_']).next().unwrap_or(lang) {
        "he" => &["פנינה נסתרת", "עוצר נשימה", "חובה לבקר", "אוצר חבוי", "שלל צבעים"],
        "fr" => &[
            "joyau caché",
            "à couper le souffle",
            "incontournable",
            "riche histoire",
            "au fil du temps",
        ],
        _ => &[
            "nestled",
            "hidden gem",
            "breathtaking",
            "must-see",
            "must see",
            "rich history",
            "rich tapestry",
            "stands as a testament",
            "whether you're",
            "as you drive",
            "buckle up",
            "journey through time",
            "steeped in history",
        ],
    }
}

/// Whitespace word count, ignoring empty splits.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn phrase_hits(text: &str, folded: &str, phrase: &str) -> bool {
    if phrase.chars().all(|c| c.is_ascii()) {
        folded.contains(&phrase.to_lowercase())
    } else {
        text.contains(phrase)
    }
}

/// Returns the first banned phrase found, for diagnostics. Built-in lists
/// plus any configured additions for the language.
pub fn find_banned_filler(text: &str, lang: &str) -> Option<String> {
    let folded = text.to_lowercase();
    let base_lang = lang.split(['-', '_']).next().unwrap_or(lang);
    if let Some(hit) = filler_denylist(lang)
        .iter()
        .find(|phrase| phrase_hits(text, &folded, phrase))
    {
        return Some((*hit).to_string());
    }
    EXTRA_FILLER
        .get(base_lang)
        .and_then(|extra| extra.iter().find(|phrase| phrase_hits(text, &folded, phrase)))
        .cloned()
}

/// Validate a draft against all rules. `Ok(())` means speakable.
pub fn validate(text: &str, lang: &str, min_words: usize, max_words: usize) -> Result<(), ValidationFailure> {
    let trimmed = text.trim();
    if trimmed == NO_STORY {
        return Err(ValidationFailure::ModelNoStory);
    }
    let words = word_count(trimmed);
    if words < min_words || words > max_words {
        return Err(ValidationFailure::BadLength);
    }
    if find_banned_filler(trimmed, lang).is_some() {
        return Err(ValidationFailure::BannedFiller);
    }
    if RE_BLANK_LINE.is_match(trimmed) {
        return Err(ValidationFailure::NotOneParagraph);
    }
    Ok(())
}
