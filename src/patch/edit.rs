use serde::{Deserialize, Serialize};

const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
const DIVIDER: &str = "=======";
const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

/// One search/replace step. An empty `search` appends `replace` to the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditStep {
    pub file: String,
    pub search: String,
    pub replace: String,
}

enum State {
    Outside,
    Search,
    Replace,
}

/// Parses `FILE: <path>` headers followed by SEARCH/REPLACE blocks, in
/// order. Text outside blocks (prose, code fences) is ignored, as are blocks
/// with no preceding `FILE:` line or no closing marker.
pub fn parse_edit_instructions(text: &str) -> Vec<EditStep> {
    let mut steps = Vec::new();
    let mut file: Option<String> = None;
    let mut search: Vec<&str> = Vec::new();
    let mut replace: Vec<&str> = Vec::new();
    let mut state = State::Outside;

    for line in text.lines() {
        let trimmed = line.trim_end_matches('\r');
        match state {
            State::Outside => {
                if let Some(path) = file_header(trimmed) {
                    file = Some(path);
                } else if trimmed.trim() == SEARCH_MARKER {
                    search.clear();
                    replace.clear();
                    state = State::Search;
                }
            }
            State::Search => {
                if trimmed.trim() == DIVIDER {
                    state = State::Replace;
                } else {
                    search.push(trimmed);
                }
            }
            State::Replace => {
                if trimmed.trim() == REPLACE_MARKER {
                    if let Some(file) = &file {
                        steps.push(EditStep {
                            file: file.clone(),
                            search: search.join("\n"),
                            replace: replace.join("\n"),
                        });
                    }
                    state = State::Outside;
                } else {
                    replace.push(trimmed);
                }
            }
        }
    }

    steps
}

fn file_header(line: &str) -> Option<String> {
    let line = line.trim();
    let rest = line
        .strip_prefix("FILE:")
        .or_else(|| line.strip_prefix("File:"))
        .or_else(|| line.strip_prefix("file:"))?;
    let path = rest.trim().trim_matches('`').trim();
    if path.is_empty() {
        None
    } else {
        Some(crate::source::normalize_path(path))
    }
}

/// Applies one step to in-memory content. `None` when the search text does
/// not occur; only the first occurrence is replaced.
pub(crate) fn apply_step(content: &str, step: &EditStep) -> Option<String> {
    if step.search.is_empty() {
        let mut out = content.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&step.replace);
        out.push('\n');
        return Some(out);
    }

    if content.contains(&step.search) {
        return Some(content.replacen(&step.search, &step.replace, 1));
    }

    // Files with CRLF endings against LF instructions
    if content.contains("\r\n") {
        let search = step.search.replace('\n', "\r\n");
        if content.contains(&search) {
            return Some(content.replacen(&search, &step.replace.replace('\n', "\r\n"), 1));
        }
    }

    None
}
