pub fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Collapses every whitespace run (newlines included) to a single space and trims.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_dashes(value: &str) -> String {
    value.replace(['\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2212}'], "-")
}

pub fn strip_leading_zeros(value: &str) -> String {
    let trimmed = value.trim_start_matches('0');
    if trimmed.is_empty() && !value.is_empty() {
        return "0".to_string();
    }
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) || value == trimmed {
        trimmed.to_string()
    } else {
        // "0A" style designators keep their zero
        value.to_string()
    }
}

/// Pulls the designator out of a `<num>` text such as `§ 280A.`, `(a)`,
/// `CHAPTER 1—` or `[§ 280B.`.
pub fn extract_designator(text: &str) -> Option<String> {
    let trimmed = collapse_whitespace(text);
    let trimmed = trimmed.trim_start_matches('[').trim();
    if trimmed.is_empty() {
        return None;
    }

    let token = match trimmed.strip_prefix('§') {
        Some(rest) => rest.trim_start_matches('§').split_whitespace().next(),
        None => trimmed.split_whitespace().last(),
    }?;
    let candidate = token.trim_matches(|c: char| !c.is_alphanumeric());
    if candidate.is_empty() {
        return None;
    }
    Some(normalize_dashes(candidate))
}
