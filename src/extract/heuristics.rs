//! Heuristic topic-candidate extraction and the noise filter.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::cache::normalize_key;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+(.+?)\s*$").unwrap());

/// Line prefixes that look like topics but never are.
const NOISE_PREFIXES: &[&str] = &["answer", "page", "figure", "table"];

/// Low-signal topic strings that never reach a compiled guide.
const NOISE_TOPICS: &[&str] = &[
    "importing libraries",
    "import libraries",
    "imports",
    "data cleaning",
    "visualization",
    "visualizations",
    "introduction",
    "conclusion",
    "summary",
    "exercises",
    "load data",
    "loading data",
];

/// True for topic strings excluded from any downstream guide.
pub fn is_noise(topic: &str) -> bool {
    NOISE_TOPICS.contains(&normalize_key(topic).as_str())
}

/// Scan text line by line for topic candidates: markdown headings and
/// short Title-Case-starting lines. Deduplicated case-insensitively,
/// order preserved.
pub fn heuristic_topics(text: &str) -> Vec<String> {
    let mut topics = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let candidate = if let Some(caps) = HEADING_RE.captures(line) {
            let heading = caps[1].trim();
            ((3..=90).contains(&heading.len())).then(|| heading.to_string())
        } else {
            title_case_candidate(line)
        };

        if let Some(topic) = candidate {
            if seen.insert(normalize_key(&topic)) {
                topics.push(topic);
            }
        }
    }

    topics
}

fn title_case_candidate(line: &str) -> Option<String> {
    if line.len() >= 60 || line.len() < 3 {
        return None;
    }
    if !line.starts_with(|c: char| c.is_uppercase()) {
        return None;
    }
    let lower = line.to_lowercase();
    if NOISE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return None;
    }
    Some(line.trim_end_matches(':').to_string())
}
