//! Notebook (.ipynb) text extraction.
//!
//! Markdown cells are kept verbatim. Code cells are filtered to the lines
//! that carry signal for topic extraction: imports, def/class
//! declarations, and comments. Everything else is noise for this purpose.

use serde_json::Value;

/// Extract study-relevant text from notebook bytes. Any parse failure
/// yields an empty string.
pub fn extract_notebook_text(bytes: &[u8], line_cap: usize, char_budget: usize) -> String {
    let json: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("notebook parse failed: {e}");
            return String::new();
        }
    };

    let Some(cells) = json["cells"].as_array() else {
        return String::new();
    };

    let mut out = String::new();
    let mut kept_code_lines = 0usize;

    for cell in cells {
        let source = cell_source(cell);
        match cell["cell_type"].as_str() {
            Some("markdown") => {
                out.push_str(source.trim_end());
                out.push_str("\n\n");
            }
            Some("code") if kept_code_lines < line_cap => {
                let mut kept = Vec::new();
                for line in source.lines() {
                    if kept_code_lines >= line_cap {
                        break;
                    }
                    if is_signal_line(line) {
                        kept.push(line);
                        kept_code_lines += 1;
                    }
                }
                if !kept.is_empty() {
                    out.push_str("```\n");
                    out.push_str(&kept.join("\n"));
                    out.push_str("\n```\n\n");
                }
            }
            _ => {}
        }
        if out.len() >= char_budget * 4 {
            // Way past budget even before the final character-accurate cut.
            break;
        }
    }

    truncate_chars(out.trim_end().to_string(), char_budget)
}

fn cell_source(cell: &Value) -> String {
    match &cell["source"] {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .concat(),
        _ => String::new(),
    }
}

fn is_signal_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("import ")
        || trimmed.starts_with("from ")
        || trimmed.starts_with("def ")
        || trimmed.starts_with("class ")
        || trimmed.starts_with('#')
}

/// Cut a string to at most `budget` characters on a char boundary.
pub fn truncate_chars(s: String, budget: usize) -> String {
    match s.char_indices().nth(budget) {
        Some((offset, _)) => s[..offset].to_string(),
        None => s,
    }
}
