//! Starter-topic generation for a job position.
//!
//! Three sources, in order: a hierarchical topic configuration file, a
//! completion-API request parsed defensively, and a hardcoded default
//! list. Every path applies the same configurable cap, and none of them
//! surfaces an error — degraded inputs degrade the output instead.

use std::path::Path;

use serde::Deserialize;

use crate::config::AppConfig;
use crate::db::{Priority, TopicSeed};
use crate::llm::{Completion, CompletionRequest};

/// Category names too generic to keep from a model response.
const CATEGORY_STOPWORDS: &[&str] = &["category", "topic", "skill", "subject"];

/// Lines containing these phrases are echoed instructions, not content.
const SKIP_PATTERNS: &[&str] = &[
    "format",
    "example",
    "provide",
    "each category",
    "each subtopic",
    "hierarchical",
    "organized by",
    "main categories",
    "technical skills",
];

/// Lines longer than this are prose, not a topic.
const MAX_CONTENT_LINE: usize = 150;

/// Hierarchical topic configuration document.
#[derive(Debug, Deserialize)]
struct TopicConfig {
    #[serde(default)]
    categories: Vec<CategoryNode>,
    #[serde(default)]
    uncategorized_topics: Vec<String>,
}

/// A category with either nested subcategories or leaf topics.
#[derive(Debug, Deserialize)]
struct CategoryNode {
    #[serde(default)]
    name: String,
    #[serde(default)]
    subcategories: Vec<CategoryNode>,
    #[serde(default)]
    topics: Vec<String>,
}

/// Generate starter topics for a position.
pub async fn generate_topics<C: Completion>(
    client: &C,
    config: &AppConfig,
    position: &str,
) -> Vec<TopicSeed> {
    let cap = config.limits.topic_cap;

    let from_file = load_topic_config(&config.topics_file);
    if !from_file.is_empty() {
        tracing::debug!(count = from_file.len(), "topics loaded from config file");
        return apply_cap(from_file, cap);
    }

    if client.is_configured() {
        match request_model_topics(client, position).await {
            Ok(topics) if !topics.is_empty() => return apply_cap(topics, cap),
            Ok(_) => tracing::warn!("model returned no parseable topics, using defaults"),
            Err(e) => tracing::warn!("topic generation failed, using defaults: {e}"),
        }
    }

    apply_cap(default_topics(), cap)
}

fn apply_cap(mut topics: Vec<TopicSeed>, cap: Option<usize>) -> Vec<TopicSeed> {
    if let Some(cap) = cap {
        topics.truncate(cap);
    }
    topics
}

/// Flatten the hierarchical topic configuration file depth-first.
/// Absent or malformed files yield an empty list, never an error.
pub fn load_topic_config(path: &Path) -> Vec<TopicSeed> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    let config: TopicConfig = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("ignoring malformed topic config: {e}");
            return Vec::new();
        }
    };

    let mut topics = Vec::new();
    for category in &config.categories {
        flatten_node(category, &[], &mut topics);
    }
    for name in &config.uncategorized_topics {
        topics.push(TopicSeed {
            name: name.clone(),
            category: None,
            priority: Priority::Medium,
        });
    }
    topics
}

fn flatten_node(node: &CategoryNode, ancestors: &[&str], out: &mut Vec<TopicSeed>) {
    let mut path: Vec<&str> = ancestors.to_vec();
    if !node.name.is_empty() {
        path.push(&node.name);
    }

    if !node.subcategories.is_empty() {
        for sub in &node.subcategories {
            flatten_node(sub, &path, out);
        }
        return;
    }

    let category = if path.is_empty() {
        None
    } else {
        Some(path.join(" > "))
    };
    for (i, name) in node.topics.iter().enumerate() {
        out.push(TopicSeed {
            name: name.clone(),
            category: category.clone(),
            // First two leaves under a parent are the ones to study first.
            priority: if i < 2 { Priority::High } else { Priority::Medium },
        });
    }
}

async fn request_model_topics<C: Completion>(
    client: &C,
    position: &str,
) -> crate::error::Result<Vec<TopicSeed>> {
    let prompt = format!(
        "For a {position} position interview, provide a hierarchical list of technical \
         skills organized by main categories.\n\n\
         Format your response as follows:\n\
         CATEGORY_NAME:\n- Subtopic 1\n- Subtopic 2\n- Subtopic 3\n\n\
         Provide 5-7 main categories with 2-4 subtopics each. Each subtopic should be a \
         specific, actionable skill that can be studied independently."
    );
    let req = CompletionRequest::new(
        "You are a helpful interview preparation assistant. Provide concise, practical \
         lists of interview-relevant topics.",
        prompt,
    )
    .with_budget(300, 0.7);

    let completed = client.complete(&req).await?;
    Ok(parse_model_topics(&completed.text))
}

/// Parse a "CATEGORY:\n- item" formatted model response defensively.
pub fn parse_model_topics(text: &str) -> Vec<TopicSeed> {
    let content_lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let lower = line.to_lowercase();
            !SKIP_PATTERNS.iter().any(|p| lower.contains(p))
        })
        .filter(|line| line.len() <= MAX_CONTENT_LINE)
        .collect();

    let mut topics: Vec<TopicSeed> = Vec::new();
    let mut current_category: Option<String> = None;

    for (i, line) in content_lines.iter().enumerate() {
        if is_category_line(line, content_lines.get(i + 1).copied()) {
            let name = line.trim_end_matches(':').trim_end_matches('*').trim();
            let valid = (2..=80).contains(&name.len())
                && !CATEGORY_STOPWORDS.contains(&name.to_lowercase().as_str());
            current_category = valid.then(|| name.to_string());
            continue;
        }

        let topic = line
            .trim_start_matches(['-', '•', '*', '.', ' '])
            .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ' ')
            .trim_end_matches('*')
            .trim();
        if topic.len() > 1 {
            if let Some(category) = &current_category {
                let in_category = topics
                    .iter()
                    .filter(|t| t.category.as_deref() == Some(category))
                    .count();
                topics.push(TopicSeed {
                    name: topic.to_string(),
                    category: Some(category.clone()),
                    priority: if in_category < 2 {
                        Priority::High
                    } else {
                        Priority::Medium
                    },
                });
            }
        }
    }

    topics
}

fn is_bullet(line: &str) -> bool {
    line.starts_with('-') || line.starts_with('•') || line.starts_with('*')
}

fn is_category_line(line: &str, next: Option<&str>) -> bool {
    if line.ends_with(':') {
        return true;
    }
    if is_bullet(line) || line.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    next.map(is_bullet).unwrap_or(false)
}

/// Hardwired fallback covering generic technical-interview categories.
pub fn default_topics() -> Vec<TopicSeed> {
    fn t(name: &str, category: &str, priority: Priority) -> TopicSeed {
        TopicSeed {
            name: name.to_string(),
            category: Some(category.to_string()),
            priority,
        }
    }

    vec![
        t("Python Data Structures (lists, dicts, sets, tuples)", "Core Programming", Priority::High),
        t("Python Control Flow & Functions", "Core Programming", Priority::High),
        t("List & Dict Comprehensions", "Core Programming", Priority::High),
        t("Python OOP (classes, methods)", "Core Programming", Priority::Medium),
        t("groupby, agg, transform", "Data Manipulation & Analysis", Priority::High),
        t("Merging/joining data", "Data Manipulation & Analysis", Priority::High),
        t("Handling missing data", "Data Manipulation & Analysis", Priority::High),
        t("Datetime operations", "Data Manipulation & Analysis", Priority::Medium),
        t("Vectorization vs loops", "Data Manipulation & Analysis", Priority::Medium),
        t("SQL SELECT, WHERE, JOIN", "SQL", Priority::High),
        t("SQL GROUP BY, HAVING", "SQL", Priority::High),
        t("SQL Window Functions", "SQL", Priority::High),
        t("SQL Subqueries & CTEs", "SQL", Priority::Medium),
        t("Descriptive Statistics", "Statistics", Priority::High),
        t("Probability Distributions", "Statistics", Priority::High),
        t("Hypothesis Testing & p-values", "Statistics", Priority::High),
        t("A/B Testing", "Statistics", Priority::High),
        t("Linear & Logistic Regression", "Machine Learning", Priority::High),
        t("Decision Trees", "Machine Learning", Priority::High),
        t("Random Forests", "Machine Learning", Priority::High),
        t("Gradient Boosting (XGBoost/LightGBM)", "Machine Learning", Priority::High),
        t("Model Evaluation Metrics", "Machine Learning", Priority::High),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flatten_nested_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "categories": [
                    {{
                        "name": "A",
                        "subcategories": [
                            {{ "name": "A1", "topics": ["x", "y"] }}
                        ]
                    }}
                ],
                "uncategorized_topics": ["z"]
            }}"#
        )
        .unwrap();

        let topics = load_topic_config(file.path());
        assert_eq!(topics.len(), 3);
        assert_eq!(topics[0].name, "x");
        assert_eq!(topics[0].category.as_deref(), Some("A > A1"));
        assert_eq!(topics[0].priority, Priority::High);
        assert_eq!(topics[1].name, "y");
        assert_eq!(topics[1].priority, Priority::High);
        assert_eq!(topics[2].name, "z");
        assert_eq!(topics[2].category, None);
        assert_eq!(topics[2].priority, Priority::Medium);
    }

    #[test]
    fn test_third_leaf_is_medium_priority() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "categories": [ {{ "name": "A", "topics": ["a", "b", "c"] }} ] }}"#
        )
        .unwrap();
        let topics = load_topic_config(file.path());
        assert_eq!(topics[2].priority, Priority::Medium);
    }

    #[test]
    fn test_missing_and_malformed_config_are_empty() {
        assert!(load_topic_config(Path::new("/nonexistent/topics.json")).is_empty());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_topic_config(file.path()).is_empty());
    }

    #[test]
    fn test_parse_model_response() {
        let response = "\
Core Programming:
- Data structures
- Recursion
- Big-O analysis

Machine Learning
- Regression
- Classification";
        let topics = parse_model_topics(response);
        assert_eq!(topics.len(), 5);
        assert_eq!(topics[0].category.as_deref(), Some("Core Programming"));
        assert_eq!(topics[0].priority, Priority::High);
        assert_eq!(topics[1].priority, Priority::High);
        assert_eq!(topics[2].priority, Priority::Medium);
        // Header without colon recognized via bullet lookahead.
        assert_eq!(topics[3].category.as_deref(), Some("Machine Learning"));
    }

    #[test]
    fn test_parse_skips_instructions_prose_and_stopwords() {
        let response = "\
Here is the format you asked for, organized by main categories
Topic:
- orphan item under stopword header
SQL:
- Joins";
        let topics = parse_model_topics(response);
        // The "Topic:" header is a stopword, so its item has no category and
        // is dropped; only the SQL item survives.
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name, "Joins");
        assert_eq!(topics[0].category.as_deref(), Some("SQL"));
    }

    #[test]
    fn test_parse_strips_markers_and_asterisks() {
        let response = "SQL:\n1. Window Functions**\n- **CTEs";
        let topics = parse_model_topics(response);
        assert_eq!(topics[0].name, "Window Functions");
        assert_eq!(topics[1].name, "CTEs");
    }

    #[test]
    fn test_cap_applies() {
        let capped = apply_cap(default_topics(), Some(5));
        assert_eq!(capped.len(), 5);
        let uncapped = apply_cap(default_topics(), None);
        assert!(uncapped.len() > 20);
    }
}
