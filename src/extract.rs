//! Per-kind fragment extraction heuristics.
//!
//! Each [`ReferenceKind`] has its own extractor turning a document plus the
//! current [`GenerationContext`] into scored [`Fragment`]s:
//!
//! | Kind | Scoring |
//! |------|---------|
//! | Characters | base 1, +5 protagonist title, +3 context character mention, +2 voice/dialogue wording |
//! | Style | flat 4 per section |
//! | World | base 2, +3 scene-type mention, +2 rules/culture/society title |
//! | Outline | current-chapter line window (2 before, 5 after) at priority 5 |
//! | Timeline | first 500 chars at priority 2, gated on a current-chapter or "current"/"now" mention |
//!
//! Extractors are total: malformed or empty documents yield fewer fragments,
//! never an error.

use crate::estimate::estimate_tokens;
use crate::models::{Fragment, GenerationContext, ReferenceDoc, ReferenceKind};
use crate::sections::split_sections;

/// Title wording that marks a character section as a protagonist's sheet.
const PROTAGONIST_HINTS: &[&str] = &["protagonist", "main character", "hero", "heroine", "lead"];

/// Wording that marks a section as covering a character's voice.
const VOICE_HINTS: &[&str] = &["voice", "dialogue", "speech"];

/// Title wording that marks world notes as broadly applicable.
const WORLD_RULE_HINTS: &[&str] = &["rule", "culture", "society"];

/// Outline window kept around a current-chapter match.
const OUTLINE_LINES_BEFORE: usize = 2;
const OUTLINE_LINES_AFTER: usize = 5;

/// Timeline prefix length, in characters.
const TIMELINE_PREFIX_CHARS: usize = 500;

/// Extract scored fragments from one document for the given context.
/// Zero-priority fragments are dropped here, before ranking.
pub fn extract_fragments(doc: &ReferenceDoc, context: &GenerationContext) -> Vec<Fragment> {
    let fragments = match doc.kind {
        ReferenceKind::Characters => character_fragments(doc, context),
        ReferenceKind::Style => style_fragments(doc),
        ReferenceKind::World => world_fragments(doc, context),
        ReferenceKind::Outline => outline_fragments(doc, context),
        ReferenceKind::Timeline => timeline_fragments(doc, context),
    };
    fragments.into_iter().filter(|f| f.priority > 0).collect()
}

// ============ Section-based extractors ============

fn character_fragments(doc: &ReferenceDoc, context: &GenerationContext) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    for section in split_sections(&doc.content) {
        if section.body.is_empty() {
            continue;
        }
        let title = section.title.to_lowercase();
        let body = section.body.to_lowercase();

        let mut priority = 1;
        if PROTAGONIST_HINTS.iter().any(|hint| title.contains(hint)) {
            priority += 5;
        }
        let named = context.characters.iter().any(|name| {
            let name = name.trim().to_lowercase();
            !name.is_empty() && (title.contains(&name) || body.contains(&name))
        });
        if named {
            priority += 3;
        }
        if VOICE_HINTS
            .iter()
            .any(|hint| title.contains(hint) || body.contains(hint))
        {
            priority += 2;
        }
        fragments.push(section_fragment(
            &doc.name,
            &section.title,
            &section.body,
            priority,
        ));
    }
    fragments
}

/// Style guidance applies to every scene, so all sections score the same.
fn style_fragments(doc: &ReferenceDoc) -> Vec<Fragment> {
    split_sections(&doc.content)
        .into_iter()
        .filter(|s| !s.body.is_empty())
        .map(|s| section_fragment(&doc.name, &s.title, &s.body, 4))
        .collect()
}

fn world_fragments(doc: &ReferenceDoc, context: &GenerationContext) -> Vec<Fragment> {
    let scene = context
        .scene_type
        .as_ref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut fragments = Vec::new();
    for section in split_sections(&doc.content) {
        if section.body.is_empty() {
            continue;
        }
        let title = section.title.to_lowercase();
        let body = section.body.to_lowercase();

        let mut priority = 2;
        if let Some(ref scene) = scene {
            if title.contains(scene.as_str()) || body.contains(scene.as_str()) {
                priority += 3;
            }
        }
        if WORLD_RULE_HINTS.iter().any(|hint| title.contains(hint)) {
            priority += 2;
        }
        fragments.push(section_fragment(
            &doc.name,
            &section.title,
            &section.body,
            priority,
        ));
    }
    fragments
}

fn section_fragment(name: &str, title: &str, body: &str, priority: u32) -> Fragment {
    let source = if title.is_empty() {
        name.to_string()
    } else {
        format!("{}#{}", name, title)
    };
    Fragment {
        source,
        text: body.to_string(),
        priority,
        tokens: estimate_tokens(body),
    }
}

// ============ Line-based extractors ============

/// The current chapter's outline entry is the single most relevant fact
/// available, so its window takes the highest priority. First match wins.
fn outline_fragments(doc: &ReferenceDoc, context: &GenerationContext) -> Vec<Fragment> {
    let lines: Vec<&str> = doc.content.lines().collect();
    let hit = lines
        .iter()
        .position(|line| mentions_chapter(line, context.chapter_number));
    let Some(hit) = hit else {
        return Vec::new();
    };

    let start = hit.saturating_sub(OUTLINE_LINES_BEFORE);
    let end = (hit + OUTLINE_LINES_AFTER + 1).min(lines.len());
    let window = lines[start..end].join("\n");
    let window = window.trim();
    if window.is_empty() {
        return Vec::new();
    }

    vec![Fragment {
        source: format!("{}#chapter-{}", doc.name, context.chapter_number),
        text: window.to_string(),
        priority: 5,
        tokens: estimate_tokens(window),
    }]
}

fn timeline_fragments(doc: &ReferenceDoc, context: &GenerationContext) -> Vec<Fragment> {
    let relevant = doc.content.lines().any(|line| {
        let lower = line.to_lowercase();
        mentions_chapter(line, context.chapter_number)
            || contains_word(&lower, "current")
            || contains_word(&lower, "now")
    });
    if !relevant {
        return Vec::new();
    }

    let prefix = char_prefix(&doc.content, TIMELINE_PREFIX_CHARS).trim();
    if prefix.is_empty() {
        return Vec::new();
    }

    vec![Fragment {
        source: doc.name.clone(),
        text: prefix.to_string(),
        priority: 2,
        tokens: estimate_tokens(prefix),
    }]
}

// ============ Matching helpers ============

/// True when `line` references the given chapter as "chapter N", "ch N",
/// or an "N." list entry at the start of the line.
fn mentions_chapter(line: &str, chapter: u32) -> bool {
    let lower = line.to_lowercase();
    if contains_numbered(&lower, "chapter", chapter) || contains_numbered(&lower, "ch", chapter) {
        return true;
    }
    lower.trim_start().starts_with(&format!("{}.", chapter))
}

/// Substring match for `"{label} {n}"` bounded on both sides, so
/// "chapter 3" matches neither "chapter 31" nor "march 3".
fn contains_numbered(lower: &str, label: &str, n: u32) -> bool {
    contains_bounded(lower, &format!("{} {}", label, n), |c| c.is_ascii_digit())
}

/// True when the line contains `word` between non-alphanumeric boundaries.
fn contains_word(lower: &str, word: &str) -> bool {
    contains_bounded(lower, word, |c| c.is_alphanumeric())
}

/// Scan for `needle` occurrences whose preceding char is non-alphanumeric
/// and whose following char fails `joins_after`.
fn contains_bounded(haystack: &str, needle: &str, joins_after: impl Fn(char) -> bool) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !joins_after(c));
        if before_ok && after_ok {
            return true;
        }
        from = end;
    }
    false
}

/// First `max_chars` characters of `text`, cut on a char boundary.
fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(kind: ReferenceKind, name: &str, content: &str) -> ReferenceDoc {
        ReferenceDoc::new(kind, name, content)
    }

    fn ctx(chapter: u32) -> GenerationContext {
        GenerationContext::new(chapter, "draft", "fantasy")
    }

    #[test]
    fn test_character_base_priority() {
        let d = doc(
            ReferenceKind::Characters,
            "characters.md",
            "## Greta\nA wandering merchant with a sharp tongue.",
        );
        let frags = extract_fragments(&d, &ctx(1));
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].priority, 1);
        assert_eq!(frags[0].source, "characters.md#Greta");
    }

    #[test]
    fn test_character_priorities_stack() {
        let d = doc(
            ReferenceKind::Characters,
            "characters.md",
            "## Protagonist: Maya\nvoice: clipped, analytical",
        );
        let mut c = ctx(3);
        c.characters.push("Maya".to_string());
        let frags = extract_fragments(&d, &c);
        assert_eq!(frags.len(), 1);
        // 1 base + 5 protagonist + 3 named + 2 voice
        assert_eq!(frags[0].priority, 11);
    }

    #[test]
    fn test_character_named_mention_in_body() {
        let d = doc(
            ReferenceKind::Characters,
            "characters.md",
            "## The Rival\nAlways one step behind Tomas.",
        );
        let mut c = ctx(1);
        c.characters.push("tomas".to_string());
        let frags = extract_fragments(&d, &c);
        assert_eq!(frags[0].priority, 4); // 1 base + 3 named
    }

    #[test]
    fn test_character_blank_names_ignored() {
        let d = doc(ReferenceKind::Characters, "characters.md", "## Greta\nbody");
        let mut c = ctx(1);
        c.characters.push("   ".to_string());
        let frags = extract_fragments(&d, &c);
        assert_eq!(frags[0].priority, 1);
    }

    #[test]
    fn test_style_flat_priority() {
        let d = doc(
            ReferenceKind::Style,
            "style.md",
            "## Prose\nShort sentences.\n## Dialogue\nNo dashes.",
        );
        let frags = extract_fragments(&d, &ctx(1));
        assert_eq!(frags.len(), 2);
        assert!(frags.iter().all(|f| f.priority == 4));
    }

    #[test]
    fn test_world_scene_type_boost() {
        let d = doc(
            ReferenceKind::World,
            "world.md",
            "## The Harbor\nWhere every battle at sea begins.\n## Currency\nCopper and salt.",
        );
        let mut c = ctx(1);
        c.scene_type = Some("battle".to_string());
        let frags = extract_fragments(&d, &c);
        assert_eq!(frags[0].priority, 5); // 2 base + 3 scene
        assert_eq!(frags[1].priority, 2);
    }

    #[test]
    fn test_world_rules_title_boost() {
        let d = doc(
            ReferenceKind::World,
            "world.md",
            "## Rules of Magic\nNames have power.",
        );
        let frags = extract_fragments(&d, &ctx(1));
        assert_eq!(frags[0].priority, 4); // 2 base + 2 rules title
    }

    #[test]
    fn test_outline_window() {
        let content = "line 0\nline 1\nline 2\nChapter 3: The Bridge\nline 4\nline 5\nline 6\nline 7\nline 8\nline 9\nline 10";
        let d = doc(ReferenceKind::Outline, "outline.md", content);
        let frags = extract_fragments(&d, &ctx(3));
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].priority, 5);
        assert_eq!(frags[0].source, "outline.md#chapter-3");
        // 2 before, the match, 5 after
        assert!(frags[0].text.starts_with("line 1"));
        assert!(frags[0].text.ends_with("line 8"));
    }

    #[test]
    fn test_outline_window_clamped_at_edges() {
        let d = doc(
            ReferenceKind::Outline,
            "outline.md",
            "Chapter 2: Opening\nnext",
        );
        let frags = extract_fragments(&d, &ctx(2));
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].text, "Chapter 2: Opening\nnext");
    }

    #[test]
    fn test_outline_chapter_digit_boundary() {
        let d = doc(
            ReferenceKind::Outline,
            "outline.md",
            "Chapter 31: Endgame\nch 30 recap",
        );
        assert!(extract_fragments(&d, &ctx(3)).is_empty());
    }

    #[test]
    fn test_outline_ch_abbreviation_and_word_boundary() {
        let d = doc(ReferenceKind::Outline, "outline.md", "ch 7 setup");
        assert_eq!(extract_fragments(&d, &ctx(7)).len(), 1);

        // "march 3" must not match "ch 3"
        let d = doc(ReferenceKind::Outline, "outline.md", "march 3 festival");
        assert!(extract_fragments(&d, &ctx(3)).is_empty());
    }

    #[test]
    fn test_outline_dotted_entry_at_line_start() {
        let d = doc(
            ReferenceKind::Outline,
            "outline.md",
            "  3. Maya confronts the captain",
        );
        assert_eq!(extract_fragments(&d, &ctx(3)).len(), 1);

        // "31." is not an entry for chapter 3
        let d = doc(ReferenceKind::Outline, "outline.md", "31. Endgame");
        assert!(extract_fragments(&d, &ctx(3)).is_empty());
    }

    #[test]
    fn test_outline_first_match_wins() {
        let content =
            "Chapter 3: First\nfiller\nfiller\nfiller\nfiller\nfiller\nfiller\nChapter 3 revisited";
        let d = doc(ReferenceKind::Outline, "outline.md", content);
        let frags = extract_fragments(&d, &ctx(3));
        assert_eq!(frags.len(), 1);
        assert!(frags[0].text.starts_with("Chapter 3: First"));
    }

    #[test]
    fn test_timeline_gated_out_without_markers() {
        let d = doc(
            ReferenceKind::Timeline,
            "timeline.md",
            "Year 1: the flood\nYear 2: the famine",
        );
        assert!(extract_fragments(&d, &ctx(3)).is_empty());
    }

    #[test]
    fn test_timeline_gates_in_on_chapter_mention() {
        let d = doc(
            ReferenceKind::Timeline,
            "timeline.md",
            "Year 1: the flood\nchapter 3 begins here",
        );
        let frags = extract_fragments(&d, &ctx(3));
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].priority, 2);
        assert_eq!(frags[0].source, "timeline.md");
    }

    #[test]
    fn test_timeline_now_needs_word_boundary() {
        let d = doc(
            ReferenceKind::Timeline,
            "timeline.md",
            "All known events of the age",
        );
        assert!(extract_fragments(&d, &ctx(9)).is_empty());

        let d = doc(
            ReferenceKind::Timeline,
            "timeline.md",
            "Events happening now in the capital",
        );
        assert_eq!(extract_fragments(&d, &ctx(9)).len(), 1);
    }

    #[test]
    fn test_timeline_prefix_capped() {
        let long = format!("the current era\n{}", "x".repeat(2000));
        let d = doc(ReferenceKind::Timeline, "timeline.md", &long);
        let frags = extract_fragments(&d, &ctx(1));
        assert_eq!(frags.len(), 1);
        assert!(frags[0].text.chars().count() <= 500);
    }

    #[test]
    fn test_extractors_total_on_empty_docs() {
        for kind in [
            ReferenceKind::Characters,
            ReferenceKind::Style,
            ReferenceKind::World,
            ReferenceKind::Outline,
            ReferenceKind::Timeline,
        ] {
            let d = doc(kind, "empty.md", "");
            assert!(extract_fragments(&d, &ctx(0)).is_empty());
        }
    }
}
