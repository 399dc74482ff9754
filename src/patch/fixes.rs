//! Text transforms behind the auto-fixable convention violations
//!
//! Both transforms keep the file's existing line ending.

fn line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Inserts `directive` after the file's leading comment block. Returns
/// `None` when the content already carries the directive.
pub fn insert_include_guard(content: &str, directive: &str) -> Option<String> {
    if crate::diagnostics::has_include_guard(content, directive) {
        return None;
    }

    let lines: Vec<&str> = content.lines().collect();
    let mut insert_at = 0;
    let mut in_block = false;

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if in_block {
            if trimmed.contains("*/") {
                in_block = false;
                insert_at = idx + 1;
            }
            continue;
        }
        if trimmed.starts_with("//") {
            insert_at = idx + 1;
        } else if trimmed.starts_with("/*") {
            if trimmed.contains("*/") {
                insert_at = idx + 1;
            } else {
                in_block = true;
            }
        } else if !trimmed.is_empty() {
            break;
        }
    }

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 2);
    out.extend_from_slice(&lines[..insert_at]);
    if insert_at > 0 {
        out.push("");
    }
    out.push(directive);
    match lines.get(insert_at) {
        Some(next) if next.trim().is_empty() => {}
        Some(_) => out.push(""),
        None => {}
    }
    out.extend_from_slice(&lines[insert_at..]);

    let eol = line_ending(content);
    let mut text = out.join(eol);
    text.push_str(eol);
    Some(text)
}

/// Appends `include` at the end of the file. Returns `None` when the line is
/// already present.
pub fn append_meta_object_include(content: &str, include: &str) -> Option<String> {
    if content.lines().any(|line| line.trim() == include) {
        return None;
    }

    let eol = line_ending(content);
    let mut text = content.to_string();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push_str(eol);
    }
    if !text.is_empty() {
        text.push_str(eol);
    }
    text.push_str(include);
    text.push_str(eol);
    Some(text)
}
