//! Guide compilation: extracted topics grouped into modules, summarized
//! per module through the completion API, assembled into one markdown
//! document.
//!
//! Modules come from the first path segment of each source file. A
//! topic-level summary cache (keyed by topic text alone) is consulted
//! before the model is asked, so folders sharing topics reuse each
//! other's summaries.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::cache::{self, normalize_key, CacheLookup};
use crate::db::{Database, GuideKind};
use crate::error::{Error, Result};
use crate::extract::{is_noise, ExtractedTopics};
use crate::llm::{Completion, CompletionRequest};

/// Result of one compilation run.
#[derive(Debug, Clone)]
pub struct GuideSummary {
    pub guide_id: i64,
    pub module_count: usize,
}

/// A module with its deduplicated, noise-filtered topics.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub topics: Vec<String>,
}

/// Module name for a source-file path: the first path segment, or
/// "General" for files at the folder root.
pub fn module_of(path: &str) -> String {
    match path.split_once('/') {
        Some((first, _)) => first.to_string(),
        None => "General".to_string(),
    }
}

/// Sort key: modules with a leading integer prefix first in numeric
/// order, the rest alphabetically after them.
fn module_sort_key(name: &str) -> (u8, i64, String) {
    static NUM_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)").unwrap());
    match NUM_PREFIX.captures(name).and_then(|c| c[1].parse().ok()) {
        Some(n) => (0, n, name.to_lowercase()),
        None => (1, 0, name.to_lowercase()),
    }
}

/// Collect a folder's extracted topics grouped by module, sorted.
pub fn collect_modules(db: &Database, folder_id: &str) -> Result<Vec<Module>> {
    let files = db.files_in_folder(folder_id)?;
    let mut by_module: HashMap<String, Vec<String>> = HashMap::new();
    let mut seen: HashMap<String, std::collections::HashSet<String>> = HashMap::new();

    for file in &files {
        let Some(json) = file.extracted_topics_json.as_deref() else {
            continue;
        };
        let extracted: ExtractedTopics = match serde_json::from_str(json) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(file = %file.name, "skipping unreadable topic list: {e}");
                continue;
            }
        };

        let module = module_of(&file.path);
        for topic in extracted.topics {
            if is_noise(&topic) {
                continue;
            }
            let key = normalize_key(&topic);
            if seen.entry(module.clone()).or_default().insert(key) {
                by_module.entry(module.clone()).or_default().push(topic);
            }
        }
    }

    let mut modules: Vec<Module> = by_module
        .into_iter()
        .map(|(name, topics)| Module { name, topics })
        .collect();
    modules.sort_by_key(|m| module_sort_key(&m.name));
    Ok(modules)
}

/// Compile a guide for a folder and persist it as a new row.
pub async fn compile_guide<C: Completion>(
    db: &Database,
    client: &C,
    folder_id: &str,
    kind: GuideKind,
) -> Result<GuideSummary> {
    let modules = collect_modules(db, folder_id)?;
    if modules.is_empty() {
        return Err(Error::not_found("extracted topics for folder"));
    }

    let mut body = String::new();
    for module in &modules {
        let section = render_module(db, client, module, kind).await;
        body.push_str(&section);
        body.push('\n');
    }

    let mut document = format!("{}\n\n{}\n{}", title(kind), toc(&modules), body);
    document = fix_math_delimiters(&document);

    let guide_id = db.insert_guide(folder_id, kind, &document)?;
    tracing::info!(guide_id, modules = modules.len(), "guide compiled");

    Ok(GuideSummary {
        guide_id,
        module_count: modules.len(),
    })
}

fn title(kind: GuideKind) -> &'static str {
    match kind {
        GuideKind::Concise => "# Concise Review Guide",
        GuideKind::DsMid => "# Data Science Review Guide (Mid-Level)",
    }
}

fn anchor(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == ' ' || c == '-' {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

fn toc(modules: &[Module]) -> String {
    let mut out = String::from("## Contents\n\n");
    for module in modules {
        out.push_str(&format!("- [{}](#{})\n", module.name, anchor(&module.name)));
    }
    out
}

/// Render one module section, reusing cached topic summaries and asking
/// the model once for the remainder. A module whose completion call fails
/// degrades to a plain topic list instead of aborting the run.
async fn render_module<C: Completion>(
    db: &Database,
    client: &C,
    module: &Module,
    kind: GuideKind,
) -> String {
    let mut cached: Vec<(String, String)> = Vec::new();
    let mut uncached: Vec<String> = Vec::new();
    for topic in &module.topics {
        match cache::get_topic_summary(db, topic) {
            CacheLookup::Hit(summary) => cached.push((topic.clone(), summary)),
            _ => uncached.push(topic.clone()),
        }
    }

    let mut overview = String::new();
    let mut summaries: HashMap<String, String> = cached
        .iter()
        .map(|(t, s)| (normalize_key(t), s.clone()))
        .collect();

    if !uncached.is_empty() && client.is_configured() {
        match request_module_section(client, &module.name, &uncached, kind).await {
            Ok(text) => {
                let (head, parsed) = parse_module_response(&text);
                overview = head;
                for (topic_key, summary) in parsed {
                    // Back-fill the cache so other folders reuse this work.
                    if let Some(topic) = uncached.iter().find(|t| normalize_key(t) == topic_key) {
                        cache::put_topic_summary(db, topic, &summary);
                    }
                    summaries.insert(topic_key, summary);
                }
            }
            Err(e) => {
                tracing::warn!(module = %module.name, "module summary failed: {e}");
            }
        }
    }

    let mut out = format!("## {}\n\n", module.name);
    if !overview.is_empty() {
        out.push_str(overview.trim());
        out.push_str("\n\n");
    }
    for topic in &module.topics {
        out.push_str(&format!("### {topic}\n\n"));
        match summaries.get(&normalize_key(topic)) {
            Some(summary) => {
                out.push_str(summary.trim());
                out.push_str("\n\n");
            }
            None => out.push_str("- Review this topic from the source material.\n\n"),
        }
    }
    out
}

async fn request_module_section<C: Completion>(
    client: &C,
    module: &str,
    topics: &[String],
    kind: GuideKind,
) -> Result<String> {
    let depth = match kind {
        GuideKind::Concise => "Keep each topic to 2-3 tight bullets.",
        GuideKind::DsMid => {
            "Write 3-5 bullets per topic at mid-level data science interview depth, \
             including one common pitfall."
        }
    };
    let topic_list = topics
        .iter()
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "Write a markdown review section for the module \"{module}\".\n\
         Start with 2-4 overview bullets for the module, then one '### <topic>' \
         section per topic below, in order. {depth}\n\nTopics:\n{topic_list}"
    );

    let req = CompletionRequest::new(
        "You write compact, accurate study guides in markdown.",
        prompt,
    )
    .with_budget(900, 0.4);

    Ok(client.complete(&req).await?.text)
}

/// Split a module response into the overview (text before the first
/// topic heading) and per-topic summaries keyed by normalized heading.
fn parse_module_response(text: &str) -> (String, Vec<(String, String)>) {
    let mut overview = String::new();
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in text.lines() {
        if let Some(heading) = line.strip_prefix("### ") {
            if let Some((key, body)) = current.take() {
                sections.push((key, body.trim().to_string()));
            }
            current = Some((normalize_key(heading.trim_end_matches(':')), String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        } else {
            overview.push_str(line);
            overview.push('\n');
        }
    }
    if let Some((key, body)) = current.take() {
        sections.push((key, body.trim().to_string()));
    }

    // Strip a "## Module" heading the model may have echoed.
    let overview = overview
        .lines()
        .filter(|l| !l.trim_start().starts_with("##"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    (overview, sections)
}

/// Rewrite `(...)` into `\(...\)` when the parenthesized content looks
/// like LaTeX: it contains a backslash command or a sub/superscript
/// marker, and no `\left`/`\right`.
pub fn fix_math_delimiters(text: &str) -> String {
    static PAREN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\\?)\(([^()]*)\)").unwrap());
    static TEX_CMD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\[a-zA-Z]+").unwrap());

    PAREN_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let already_delimited = &caps[1] == "\\";
            let content = &caps[2];
            let looks_mathy = TEX_CMD_RE.is_match(content)
                || content.contains('^')
                || content.contains('_');
            let bracketed = content.contains("\\left") || content.contains("\\right");
            if !already_delimited && looks_mathy && !bracketed {
                format!("\\({content}\\)")
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::test_support::MockCompletion;

    fn index_extracted(db: &Database, file_id: &str, path: &str, topics: &[&str]) {
        let now = chrono::Utc::now().to_rfc3339();
        db.upsert_indexed_file(&crate::db::IndexedFile {
            file_id: file_id.to_string(),
            folder_id: "folder1".to_string(),
            name: path.rsplit('/').next().unwrap().to_string(),
            mime_type: "application/pdf".to_string(),
            modified_time: None,
            size: 1,
            path: path.to_string(),
            parent_id: None,
            extracted_topics_json: None,
            text_excerpt: None,
            extracted_at: None,
            indexed_at: now,
        })
        .unwrap();
        let extracted = ExtractedTopics {
            topics: topics.iter().map(|s| s.to_string()).collect(),
            heuristic: Vec::new(),
            source: "model".to_string(),
        };
        db.store_extraction(file_id, "excerpt", &serde_json::to_string(&extracted).unwrap())
            .unwrap();
    }

    #[test]
    fn test_module_of_and_sort() {
        assert_eq!(module_of("1 - Basics/intro.pdf"), "1 - Basics");
        assert_eq!(module_of("notes.pdf"), "General");

        let mut names = vec![
            "Appendix".to_string(),
            "10 - Advanced".to_string(),
            "2 - Middle".to_string(),
            "1 - Basics".to_string(),
        ];
        names.sort_by_key(|n| module_sort_key(n));
        assert_eq!(names, vec!["1 - Basics", "2 - Middle", "10 - Advanced", "Appendix"]);
    }

    #[test]
    fn test_collect_modules_filters_noise_and_dedups() {
        let db = Database::open_memory().unwrap();
        index_extracted(
            &db,
            "f1",
            "1 - Basics/a.pdf",
            &["Linear Regression", "Importing Libraries", "linear regression"],
        );
        index_extracted(&db, "f2", "1 - Basics/b.pdf", &["Linear Regression", "SQL Joins"]);

        let modules = collect_modules(&db, "folder1").unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].topics, vec!["Linear Regression", "SQL Joins"]);
    }

    #[tokio::test]
    async fn test_compile_reuses_topic_summary_cache() {
        let db = Database::open_memory().unwrap();
        index_extracted(&db, "f1", "1 - Basics/a.pdf", &["Gradient Boosting"]);
        cache::put_topic_summary(&db, "Gradient Boosting", "- cached bullet");

        // No uncached topics remain, so the model is never called.
        let client = MockCompletion::replying("should not be used");
        let summary = compile_guide(&db, &client, "folder1", GuideKind::Concise)
            .await
            .unwrap();
        assert_eq!(summary.module_count, 1);
        assert_eq!(client.call_count(), 0);

        let guide = db.latest_guide("folder1", GuideKind::Concise).unwrap().unwrap();
        assert!(guide.content_markdown.contains("- cached bullet"));
        assert!(guide.content_markdown.contains("### Gradient Boosting"));
    }

    #[tokio::test]
    async fn test_compile_populates_cache_from_response() {
        let db = Database::open_memory().unwrap();
        index_extracted(&db, "f1", "1 - Basics/a.pdf", &["SQL Joins"]);

        let client = MockCompletion::replying(
            "- module overview bullet\n\n### SQL Joins\n- inner vs outer\n- join keys",
        );
        compile_guide(&db, &client, "folder1", GuideKind::Concise).await.unwrap();
        assert_eq!(client.call_count(), 1);

        assert_eq!(
            cache::get_topic_summary(&db, "sql joins").into_option().as_deref(),
            Some("- inner vs outer\n- join keys")
        );
    }

    #[tokio::test]
    async fn test_compile_without_topics_is_not_found() {
        let db = Database::open_memory().unwrap();
        let client = MockCompletion::replying("x");
        let result = compile_guide(&db, &client, "empty", GuideKind::Concise).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_parse_module_response_sections() {
        let (overview, sections) = parse_module_response(
            "## Module\n- intro bullet\n\n### Topic A\n- a1\n\n### Topic B:\n- b1\n- b2",
        );
        assert_eq!(overview, "- intro bullet");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], ("topic a".to_string(), "- a1".to_string()));
        assert_eq!(sections[1].1, "- b1\n- b2");
    }

    #[test]
    fn test_math_delimiter_fix() {
        assert_eq!(
            fix_math_delimiters(r"the loss (\frac{1}{n}\sum e_i) is small"),
            r"the loss \(\frac{1}{n}\sum e_i\) is small"
        );
        assert_eq!(fix_math_delimiters("x_i squared (x_i^2)"), r"x_i squared \(x_i^2\)");
        // Plain prose parentheses untouched.
        assert_eq!(fix_math_delimiters("mean (average) value"), "mean (average) value");
        // Already delimited or \left/\right content untouched.
        assert_eq!(fix_math_delimiters(r"\(x_i\)"), r"\(x_i\)");
        assert_eq!(
            fix_math_delimiters(r"(\left. f \right|_0)"),
            r"(\left. f \right|_0)"
        );
    }
}
