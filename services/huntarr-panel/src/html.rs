//! HTML fragments shared by the history table and the log view

/// Operation types that have their own badge colour
pub const OPERATION_PALETTE: [&str; 5] = ["missing", "upgrade", "warning", "error", "success"];

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Upper-case the first letter of every whitespace, `-` or `_` separated word
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut start_of_word = true;
    for ch in input.chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            out.push(' ');
            start_of_word = true;
        } else if start_of_word {
            out.extend(ch.to_uppercase());
            start_of_word = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Render an operation type as a status badge
pub fn operation_badge(operation: &str) -> String {
    let key = operation.trim().to_ascii_lowercase();
    if OPERATION_PALETTE.contains(&key.as_str()) {
        format!(
            r#"<span class="operation-status {}">{}</span>"#,
            key,
            escape_html(&title_case(&key))
        )
    } else {
        escape_html(&title_case(operation))
    }
}
