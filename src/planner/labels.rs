use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::resolver::collapse_non_alphanumeric;

const LABEL_GLYPHS: [char; 4] = ['™', '®', '©', '℗'];

/// Words dropped from the end of a label name, repeatedly.
const LABEL_SUFFIXES: [&str; 9] = [
    "records",
    "recordings",
    "record",
    "music",
    "entertainment",
    "label",
    "ltd",
    "inc",
    "llc",
];

/// Normalized label key used for ban matching.
///
/// Lowercase, then Unicode fold (compatibility decomposition, combining marks
/// removed), then suffix stripping, then non-alphanumeric collapse, in that
/// order. Trademark glyphs are dropped before the fold, which would otherwise
/// spell ™ out as "tm". "Interscope Records", "INterscope™ MUSIC" and
/// "Ｉｎｔｅｒｓｃｏｐｅ" all become "interscope".
pub fn normalize_label(label: &str) -> String {
    let lowered: String = label
        .to_lowercase()
        .chars()
        .filter(|c| !LABEL_GLYPHS.contains(c))
        .collect();
    let folded: String = lowered.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    collapse_non_alphanumeric(&strip_suffixes(&folded))
}

fn strip_suffixes(label: &str) -> String {
    let mut current = label.to_string();

    loop {
        let trimmed = current.trim_end_matches(|c: char| !c.is_alphanumeric());
        let shorter = LABEL_SUFFIXES.iter().find_map(|suffix| {
            let rest = trimmed.strip_suffix(suffix)?;
            // Only whole words, and never strip a label down to nothing.
            let at_boundary = rest.ends_with(|c: char| !c.is_alphanumeric());
            let has_name = rest.chars().any(char::is_alphanumeric);
            (at_boundary && has_name).then(|| rest.to_string())
        });

        match shorter {
            Some(rest) => current = rest,
            None => return trimmed.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label_examples() {
        assert_eq!(normalize_label("Interscope Records"), "interscope");
        assert_eq!(normalize_label("INterscope™ MUSIC"), "interscope");
        assert_eq!(normalize_label("Sony Music Entertainment"), "sony");
        assert_eq!(normalize_label("Warner Records Inc."), "warner");
        assert_eq!(normalize_label("Éditions Måne®"), "editions mane");
    }

    #[test]
    fn test_normalize_label_folds_compatibility_forms() {
        assert_eq!(normalize_label("Ｉｎｔｅｒｓｃｏｐｅ"), "interscope");
        assert_eq!(normalize_label("Ｉｎｔｅｒｓｃｏｐｅ Ｒｅｃｏｒｄｓ™"), "interscope");
        assert_eq!(normalize_label("Def Jam™"), "def jam");
    }

    #[test]
    fn test_normalize_label_keeps_bare_suffix_words() {
        assert_eq!(normalize_label("Music"), "music");
        assert_eq!(normalize_label("Recordsmith"), "recordsmith");
        assert_eq!(normalize_label("Big Music Records"), "big");
    }

    #[test]
    fn test_normalize_label_is_idempotent() {
        for label in ["Interscope Records", "XL Recordings Ltd", "4AD", "  ", "Def Jam™"] {
            let once = normalize_label(label);
            assert_eq!(normalize_label(&once), once);
        }
    }
}
