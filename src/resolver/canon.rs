use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Canonical form of a name, used as cache and lookup key.
///
/// Lowercase, NFKD, diacritics stripped, every run of non-alphanumerics
/// collapsed to one space, trimmed. `canonical_name(canonical_name(x)) ==
/// canonical_name(x)`.
pub fn canonical_name(input: &str) -> String {
    collapse_non_alphanumeric(&fold(&input.to_lowercase()))
}

/// NFKD without combining marks, lowercased again because compatibility
/// decomposition can produce capitals (`™` becomes `TM`).
pub(crate) fn fold(input: &str) -> String {
    input
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Replaces every run of non-alphanumeric characters by a single space and trims.
pub(crate) fn collapse_non_alphanumeric(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for c in input.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}
