use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// 1) Trim whitespace + strip one pair of outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// 2) Collapse every run of internal whitespace to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 3) Fold a header for matching: accents removed, lowercased, and every run
///    of whitespace/punctuation turned into one `_`, none at the ends.
///
/// `" Tipo de  Acidente "` and `"tipo_de_acidente"` both give `tipo_de_acidente`.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}
