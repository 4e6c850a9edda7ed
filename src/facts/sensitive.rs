// src/facts/sensitive.rs
//! Sensitive-content filter: drops fact lines matching a language-keyed
//! denylist of conflict, terror and graphic-violence patterns. Filtering is
//! line-level; the rest of the fact set is retained.

use std::collections::HashMap;

use tracing::debug;

/// Patterns applied to every language in addition to the language-specific
/// lists. Matching is case-insensitive for Latin scripts, exact otherwise.
const COMMON_PATTERNS: &[&str] = &["massacre", "genocide", "pogrom", "terror"];

fn default_lists() -> HashMap<String, Vec<String>> {
    let mut m = HashMap::new();
    m.insert(
        "en".to_string(),
        ["war", "terror", "massacre", "bombing", "lynching", "execution", "atrocity"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    m.insert(
        "he".to_string(),
        ["מלחמה", "טרור", "טבח", "פיגוע", "הפצצה", "אינתיפאדה", "1948", "1967"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    m.insert(
        "fr".to_string(),
        ["guerre", "terreur", "massacre", "attentat", "bombardement"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    m
}

pub struct SensitiveFilter {
    lists: HashMap<String, Vec<String>>,
}

impl SensitiveFilter {
    pub fn new() -> Self {
        Self { lists: default_lists() }
    }

    /// Replace the list for one language (used by config overrides).
    pub fn with_list(mut self, lang: &str, patterns: Vec<String>) -> Self {
        self.lists.insert(lang.to_string(), patterns);
        self
    }

    /// True when a line trips the denylist for `lang`.
    pub fn is_sensitive(&self, lang: &str, line: &str) -> bool {
        let base_lang = lang.split(['-', '_']).next().unwrap_or(lang);
        let line_folded = line.to_lowercase();

        let lang_hits = self
            .lists
            .get(base_lang)
            .map(|patterns| patterns.iter().any(|p| matches_pattern(&line_folded, line, p)))
            .unwrap_or(false);
        if lang_hits {
            return true;
        }
        COMMON_PATTERNS.iter().any(|p| matches_pattern(&line_folded, line, p))
    }

    /// Keep only the safe lines; dropped lines are logged at debug level
    /// without their content.
    pub fn retain_safe(&self, lang: &str, lines: Vec<String>) -> Vec<String> {
        let before = lines.len();
        let kept: Vec<String> = lines.into_iter().filter(|l| !self.is_sensitive(lang, l)).collect();
        if kept.len() < before {
            debug!(lang, dropped = before - kept.len(), "sensitive filter removed fact lines");
        }
        kept
    }
}

impl Default for SensitiveFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Latin-script patterns match case-insensitively against the folded line;
/// other scripts match exactly.
fn matches_pattern(line_folded: &str, line_exact: &str, pattern: &str) -> bool {
    if pattern.chars().all(|c| c.is_ascii()) {
        line_folded.contains(&pattern.to_lowercase())
    } else {
        line_exact.contains(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_war_line_is_dropped() {
        let f = SensitiveFilter::new();
        let kept = f.retain_safe(
            "en",
            vec![
                "The fortress was destroyed during the war of 1812.".to_string(),
                "The walls are nine meters tall.".to_string(),
            ],
        );
        assert_eq!(kept, vec!["The walls are nine meters tall.".to_string()]);
    }

    #[test]
    fn latin_matching_is_case_insensitive() {
        let f = SensitiveFilter::new();
        assert!(f.is_sensitive("en", "A WAR memorial stands at the corner."));
        assert!(f.is_sensitive("fr", "Détruit pendant la Guerre."));
    }

    #[test]
    fn hebrew_matching_is_exact() {
        let f = SensitiveFilter::new();
        assert!(f.is_sensitive("he", "האתר נפגע במלחמה."));
        assert!(!f.is_sensitive("he", "המגדל נבנה במאה התשע עשרה."));
    }

    #[test]
    fn common_patterns_apply_to_unknown_languages() {
        let f = SensitiveFilter::new();
        assert!(f.is_sensitive("de", "Site of a 1944 massacre."));
        assert!(!f.is_sensitive("de", "Die Brücke wurde 1890 gebaut."));
    }

    #[test]
    fn region_suffix_falls_back_to_base_language() {
        let f = SensitiveFilter::new();
        assert!(f.is_sensitive("en-us", "Ruined in the civil war."));
    }

    #[test]
    fn override_list_replaces_default() {
        let f = SensitiveFilter::new().with_list("en", vec!["dragon".to_string()]);
        assert!(f.is_sensitive("en", "Here be dragons."));
        // "war" is no longer in the en list, but the common list still applies.
        assert!(!f.is_sensitive("en", "A war memorial."));
        assert!(f.is_sensitive("en", "A massacre site."));
    }
}
