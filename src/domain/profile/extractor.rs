//! Semantic profile extraction
//!
//! Markdown-aware: fenced code is treated as examples only, headings and
//! `Step N` lines become task markers, and prose feeds entity, decision and
//! anchor detection.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;

use super::entity::{DecisionPoint, Relationship, SemanticProfile};
use crate::domain::text::sentences;

/// Default cap on sampled examples
pub const MAX_EXAMPLES: usize = 5;

/// Cap on entity pairs tracked for relationship scoring
pub const MAX_RELATIONSHIPS: usize = 256;

/// Longest inline-code or bold span still treated as a term
const MAX_TERM_CHARS: usize = 64;

static STEP_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:step|stage|phase)\s+\d+[a-z]?\b").unwrap());

static CONDITIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:if|when|whenever|unless|otherwise|else|only if)\b").unwrap()
});

static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)(?:>=|<=|==|!=|≥|≤|>|<)\s*-?\d",
        r"|\b(?:at least|at most|more than|less than|greater than|fewer than|exceeds?|below|above)\s+-?\d",
    ))
    .unwrap()
});

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?%?").unwrap());

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\b(?:",
        r"[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]*)+",
        r"|[a-z][a-z0-9]*(?:[A-Z][a-z0-9]*)+",
        r"|[A-Z][A-Z0-9]*(?:_[A-Z0-9]+)+",
        r"|[A-Z]{2,}[0-9]*",
        r"|[a-z][a-z0-9]*(?:_[a-z0-9]+)+",
        r")\b",
    ))
    .unwrap()
});

static NUMERIC_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b\d+(?:\.\d+)?\s*(?:%|(?:percent|ms|milliseconds|seconds|secs?|s|minutes|mins?",
        r"|hours?|h|tokens|words|characters|chars|lines|kb|mb|gb|x)\b)",
        r"|\b0\.\d+\b",
    ))
    .unwrap()
});

static CRITERION_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:MUST NOT|MUST|SHALL NOT|SHALL|SHOULD NOT|SHOULD|REQUIRED|NEVER|ALWAYS)\b")
        .unwrap()
});

static EXAMPLE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:for example\b|examples?\b|e\.g\.)").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Upper-case words that are emphasis or criteria, not entities
const SHOUTED_WORDS: &[&str] = &[
    "MUST",
    "SHALL",
    "SHOULD",
    "REQUIRED",
    "NEVER",
    "ALWAYS",
    "NOT",
    "MAY",
    "OPTIONAL",
    "RECOMMENDED",
    "NOTE",
    "TODO",
    "WARNING",
    "IMPORTANT",
];

/// One flushed markdown block
#[derive(Debug)]
struct Block {
    text: String,
    heading: bool,
}

/// Output of the markdown walk
#[derive(Debug, Default)]
struct Walk {
    blocks: Vec<Block>,
    terms: Vec<String>,
    examples: Vec<String>,
}

impl Walk {
    /// Heading and prose text in document order, one block per line
    fn prose(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Extracts semantic profiles from source documents
#[derive(Debug, Clone)]
pub struct SemanticProfiler {
    max_examples: usize,
}

impl Default for SemanticProfiler {
    fn default() -> Self {
        Self {
            max_examples: MAX_EXAMPLES,
        }
    }
}

impl SemanticProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the example sample cap
    pub fn with_max_examples(mut self, max_examples: usize) -> Self {
        self.max_examples = max_examples;
        self
    }

    /// Builds the profile of `content`; pure and deterministic
    pub fn extract(&self, content: &str) -> SemanticProfile {
        let walk = Self::walk(content);

        let prose = walk.prose();
        let prose_sentences = sentences(&prose);

        let entities = Self::entities(&prose, &walk.terms);
        let decision_points = Self::decision_points(&prose_sentences, &entities);
        let relationships = Self::relationships(&prose_sentences, &entities);

        let mut examples = walk.examples;
        examples.truncate(self.max_examples);

        SemanticProfile {
            task_markers: Self::task_markers(&walk.blocks),
            anchors: Self::anchors(&prose),
            entities,
            decision_points,
            examples,
            relationships,
        }
    }

    fn walk(content: &str) -> Walk {
        let mut walk = Walk::default();
        let mut current = String::new();
        let mut in_heading = false;
        let mut in_code = false;
        let mut code = String::new();
        let mut in_strong = false;
        let mut strong = String::new();

        for event in Parser::new(content) {
            match event {
                Event::Start(Tag::Heading(..)) => {
                    Self::flush(&mut walk, &mut current, false);
                    in_heading = true;
                }
                Event::End(Tag::Heading(..)) => {
                    Self::flush(&mut walk, &mut current, true);
                    in_heading = false;
                }
                Event::Start(Tag::Paragraph)
                | Event::End(Tag::Paragraph)
                | Event::Start(Tag::Item)
                | Event::End(Tag::Item) => {
                    Self::flush(&mut walk, &mut current, in_heading);
                }
                Event::Start(Tag::CodeBlock(_)) => {
                    Self::flush(&mut walk, &mut current, in_heading);
                    in_code = true;
                    code.clear();
                }
                Event::End(Tag::CodeBlock(_)) => {
                    in_code = false;
                    let sample = code.trim();

                    if !sample.is_empty() {
                        walk.examples.push(sample.to_string());
                    }
                }
                Event::Start(Tag::Strong) => {
                    in_strong = true;
                    strong.clear();
                }
                Event::End(Tag::Strong) => {
                    in_strong = false;
                    Self::push_term(&mut walk.terms, &strong);
                }
                Event::Text(text) => {
                    if in_code {
                        code.push_str(&text);
                    } else {
                        current.push_str(&text);

                        if in_strong {
                            strong.push_str(&text);
                        }
                    }
                }
                Event::Code(text) => {
                    current.push_str(&text);
                    Self::push_term(&mut walk.terms, &text);

                    if in_strong {
                        strong.push_str(&text);
                    }
                }
                Event::SoftBreak | Event::HardBreak => {
                    if in_heading {
                        current.push(' ');
                    } else {
                        current.push('\n');
                    }
                }
                _ => {}
            }
        }

        Self::flush(&mut walk, &mut current, in_heading);
        walk
    }

    fn flush(walk: &mut Walk, current: &mut String, heading: bool) {
        let text = current.trim();

        if !text.is_empty() {
            if !heading {
                for line in text.lines().map(str::trim) {
                    if EXAMPLE_LINE.is_match(line) {
                        walk.examples.push(line.to_string());
                    }
                }
            }

            walk.blocks.push(Block {
                text: text.to_string(),
                heading,
            });
        }

        current.clear();
    }

    fn push_term(terms: &mut Vec<String>, raw: &str) {
        let term = raw.trim();

        if !term.is_empty() && term.chars().count() <= MAX_TERM_CHARS {
            terms.push(term.to_string());
        }
    }

    fn task_markers(blocks: &[Block]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut markers = Vec::new();

        for block in blocks {
            let candidates: Vec<String> = if block.heading {
                vec![block.text.clone()]
            } else {
                block
                    .text
                    .lines()
                    .filter_map(|line| STEP_MARKER.find(line.trim()))
                    .map(|m| m.as_str().to_string())
                    .collect()
            };

            for marker in candidates {
                if seen.insert(marker.clone()) {
                    markers.push(marker);
                }
            }
        }

        markers
    }

    fn entities(prose: &str, terms: &[String]) -> BTreeSet<String> {
        let mut entities: BTreeSet<String> = IDENTIFIER
            .find_iter(prose)
            .map(|m| m.as_str())
            .filter(|word| !SHOUTED_WORDS.contains(word))
            .map(str::to_string)
            .collect();

        entities.extend(terms.iter().cloned());
        entities
    }

    fn decision_points(
        prose_sentences: &[String],
        entities: &BTreeSet<String>,
    ) -> Vec<DecisionPoint> {
        prose_sentences
            .iter()
            .filter(|s| CONDITIONAL.is_match(s) || COMPARISON.is_match(s))
            .map(|sentence| {
                let mut operands: Vec<String> = Vec::new();

                let numbers = NUMBER.find_iter(sentence).map(|m| m.as_str().to_string());
                let named = entities
                    .iter()
                    .filter(|e| sentence.contains(e.as_str()))
                    .cloned();

                for operand in numbers.chain(named) {
                    if !operands.contains(&operand) {
                        operands.push(operand);
                    }
                }

                DecisionPoint::new(sentence.clone(), operands)
            })
            .collect()
    }

    fn anchors(prose: &str) -> BTreeSet<String> {
        NUMERIC_ANCHOR
            .find_iter(prose)
            .chain(CRITERION_ANCHOR.find_iter(prose))
            .map(|m| WHITESPACE.replace_all(m.as_str().trim(), " ").into_owned())
            .collect()
    }

    fn relationships(
        prose_sentences: &[String],
        entities: &BTreeSet<String>,
    ) -> BTreeSet<Relationship> {
        let mut relationships = BTreeSet::new();

        for sentence in prose_sentences {
            let present: Vec<&String> = entities
                .iter()
                .filter(|e| sentence.contains(e.as_str()))
                .collect();

            for (i, a) in present.iter().enumerate() {
                for b in &present[i + 1..] {
                    if relationships.len() >= MAX_RELATIONSHIPS {
                        return relationships;
                    }
                    relationships.insert(Relationship::between(a.as_str(), b.as_str()));
                }
            }
        }

        relationships
    }
}

/// Extracts a profile with the default example cap
pub fn extract_profile(content: &str) -> SemanticProfile {
    SemanticProfiler::default().extract(content)
}

/// Markdown-stripped heading and prose text, the text profiles are built from
///
/// Code blocks are dropped; inline code and emphasis keep only their text.
pub fn render_prose(content: &str) -> String {
    SemanticProfiler::walk(content).prose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = "\
# Release Checklist

The `CacheStore` persists entries for the OrchestratorService.

## Step 1: Validate

If the weighted score is below 0.85, reject the output.
Retries MUST NOT exceed 3 attempts and each call times out after 120 seconds.

Step 2 runs the `idempotency_check` when the output shrinks by more than 40%.

Example: compress a 2000 tokens runbook.

```
cache.get(key)
```
";

    #[test]
    fn test_extracts_task_markers_in_order() {
        let profile = extract_profile(DOCUMENT);

        assert_eq!(
            profile.task_markers,
            vec!["Release Checklist", "Step 1: Validate", "Step 2"]
        );
    }

    #[test]
    fn test_extracts_entities() {
        let profile = extract_profile(DOCUMENT);

        assert!(profile.entities.contains("CacheStore"));
        assert!(profile.entities.contains("OrchestratorService"));
        assert!(profile.entities.contains("idempotency_check"));
        assert!(!profile.entities.contains("MUST"));
    }

    #[test]
    fn test_extracts_decision_points_with_operands() {
        let profile = extract_profile(DOCUMENT);

        let threshold = profile
            .decision_points
            .iter()
            .find(|d| d.text.starts_with("If the weighted score"))
            .expect("threshold decision point");
        assert_eq!(threshold.operands, vec!["0.85"]);

        let shrink = profile
            .decision_points
            .iter()
            .find(|d| d.text.contains("idempotency_check"))
            .expect("shrink decision point");
        assert!(shrink.operands.contains(&"40%".to_string()));
        assert!(shrink.operands.contains(&"idempotency_check".to_string()));
    }

    #[test]
    fn test_extracts_anchors() {
        let profile = extract_profile(DOCUMENT);

        assert!(profile.anchors.contains("0.85"));
        assert!(profile.anchors.contains("120 seconds"));
        assert!(profile.anchors.contains("40%"));
        assert!(profile.anchors.contains("2000 tokens"));
        assert!(profile.anchors.contains("MUST NOT"));
    }

    #[test]
    fn test_extracts_examples_from_code_and_prose() {
        let profile = extract_profile(DOCUMENT);

        assert_eq!(
            profile.examples,
            vec!["Example: compress a 2000 tokens runbook.", "cache.get(key)"]
        );
    }

    #[test]
    fn test_code_blocks_do_not_feed_decision_points() {
        let profile = extract_profile("Intro text.\n\n```\nif x > 5 { run() }\n```\n");

        assert!(profile.decision_points.is_empty());
        assert_eq!(profile.examples, vec!["if x > 5 { run() }"]);
    }

    #[test]
    fn test_examples_are_capped() {
        let content = (0..8)
            .map(|i| format!("```\nsample {}\n```\n", i))
            .collect::<Vec<_>>()
            .join("\n");

        let profile = SemanticProfiler::new().with_max_examples(3).extract(&content);
        assert_eq!(profile.examples.len(), 3);
        assert_eq!(profile.examples[0], "sample 0");

        assert_eq!(extract_profile(&content).examples.len(), MAX_EXAMPLES);
    }

    #[test]
    fn test_relationships_from_shared_sentences() {
        let profile = extract_profile(DOCUMENT);

        assert!(
            profile
                .relationships
                .contains(&Relationship::between("CacheStore", "OrchestratorService"))
        );
    }

    #[test]
    fn test_extraction_is_deterministic() {
        assert_eq!(extract_profile(DOCUMENT), extract_profile(DOCUMENT));
    }

    #[test]
    fn test_empty_content() {
        assert!(extract_profile("").is_empty());
    }

    #[test]
    fn test_render_prose_strips_markup() {
        let rendered = render_prose(
            "# Configure `max_tokens`\n\nCalls time out after **120** seconds.\n\n```\nrun()\n```\n",
        );

        assert_eq!(rendered, "Configure max_tokens\nCalls time out after 120 seconds.");
    }
}
