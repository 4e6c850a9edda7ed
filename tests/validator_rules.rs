// tests/validator_rules.rs
//
// Validator and anchor-regex properties over the public API: the length
// law, the single-paragraph law, the year-anchor pattern, and the FACTS
// block shape the generator is bound to.

use roadside_narrator::facts::{merge_facts, Fact};
use roadside_narrator::story::prompt::{build_facts_block, build_system_prompt, StoryContext};
use roadside_narrator::story::validator::{validate, word_count, ValidationFailure};
use roadside_narrator::taste::TasteProfile;

fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

#[test]
fn length_law_holds_across_the_whole_boundary() {
    for n in [0, 1, 179, 180, 181, 339, 340, 341, 1000] {
        let verdict = validate(&words(n), "en", 180, 340);
        if (180..=340).contains(&n) {
            assert!(verdict.is_ok(), "{n} words should pass");
        } else {
            assert_eq!(verdict, Err(ValidationFailure::BadLength), "{n} words should fail");
        }
    }
}

#[test]
fn single_paragraph_law_catches_every_blank_line_shape() {
    for sep in ["\n\n", "\n \n", "\n\t\n", "\n  \n\n"] {
        let text = format!("{}{}{}", words(100), sep, words(100));
        assert_eq!(
            validate(&text, "en", 180, 340),
            Err(ValidationFailure::NotOneParagraph),
            "separator {sep:?} must be rejected"
        );
    }
    // Single newlines are fine.
    let text = format!("{}\n{}", words(100), words(100));
    assert!(validate(&text, "en", 180, 340).is_ok());
}

#[test]
fn year_anchor_regex_matches_the_specified_window() {
    for year in [1500, 1776, 1999, 2000, 2099] {
        let f = Fact::new(&format!("Completed in {year}.")).unwrap();
        assert!(f.has_year, "{year} must anchor");
    }
    for not_year in [1206, 1499, 2100, 9999] {
        let f = Fact::new(&format!("Completed in {not_year}.")).unwrap();
        assert!(!f.has_year, "{not_year} must not anchor");
    }
    // A year embedded in a longer number is not a year.
    let f = Fact::new("Catalogue entry 218595 describes the site.").unwrap();
    assert!(!f.has_year);
}

#[test]
fn merged_fact_sets_never_exceed_caps_or_duplicate() {
    let graph: Vec<String> = (0..30).map(|i| format!("Graph fact {i} with year {}.", 1500 + i)).collect();
    let ency: Vec<String> = (0..30).map(|i| format!("graph fact {i} with year {}.", 1500 + i)).collect();
    let merged = merge_facts(graph, ency);
    assert!(merged.len() <= 22);
    let mut folded: Vec<String> = merged.iter().map(|f| f.text.to_lowercase()).collect();
    folded.sort();
    folded.dedup();
    assert_eq!(folded.len(), merged.len(), "case-folded duplicates must not survive");
}

#[test]
fn facts_block_is_the_only_ground_truth_offered() {
    let ctx = StoryContext {
        place_label: "Old Mill".into(),
        distance_m: 450,
        lang: "en".into(),
        facts: vec![
            Fact::new("The mill was built in 1832.").unwrap(),
            Fact::new("Its wheel is seven meters wide.").unwrap(),
        ],
        taste: TasteProfile::default(),
        min_words: 180,
        max_words: 340,
    };
    let block = build_facts_block(&ctx);
    assert!(block.contains("PLACE: Old Mill"));
    assert!(block.contains("FACT 1: The mill was built in 1832."));
    assert!(block.contains("FACT 2: Its wheel is seven meters wide."));

    let system = build_system_prompt("en");
    assert!(system.contains("ONLY the FACTS block"));
    assert!(system.contains("No outside knowledge"));
}

#[test]
fn word_count_is_whitespace_split_ignoring_empties() {
    assert_eq!(word_count("a  b\t c \n d"), 4);
    assert_eq!(word_count("   "), 0);
}
