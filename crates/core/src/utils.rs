//! Small text helpers shared by the result renderer and the transformers.

/// Escapes the XML special characters of `text`.
pub fn encode_chars(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => encoded.push_str("&lt;"),
            '>' => encoded.push_str("&gt;"),
            '&' => encoded.push_str("&amp;"),
            '"' => encoded.push_str("&quot;"),
            '\'' => encoded.push_str("&#39;"),
            _ => encoded.push(c),
        }
    }
    encoded
}

/// Drops a leading `<?xml ...?>` declaration and the whitespace after it.
pub fn skip_xml_declaration(text: &str) -> &str {
    let trimmed = text.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return trimmed[end + 2..].trim_start();
        }
    }
    text
}

/// Character-based substring over `[start, end)`, truncated to what is available.
pub fn char_window(text: &str, start: usize, end: usize) -> &str {
    let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let from = indices.clone().nth(start).unwrap_or(text.len());
    let to = indices.nth(end).unwrap_or(text.len());
    if from >= to {
        ""
    } else {
        &text[from..to]
    }
}
