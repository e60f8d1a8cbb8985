//! Whitespace normalization.

use serde::Serialize;
use std::fmt;
use std::ops::Deref;

/// Text with every whitespace run collapsed to a single ASCII space and no
/// leading or trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl Deref for NormalizedText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapse whitespace runs (spaces, tabs, newlines, form feeds, non-breaking
/// spaces) into single spaces and trim both ends.
pub fn normalize(raw: &str) -> NormalizedText {
    let mut out = String::with_capacity(raw.len());

    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }

    NormalizedText(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_collapses_mixed_whitespace() {
        let text = normalize("  Los glaciares\n\n\tretroceden \u{a0} cada\x0Caño.  ");
        assert_eq!(text.as_str(), "Los glaciares retroceden cada año.");
    }

    #[test]
    fn test_blank_input_is_empty() {
        assert!(normalize(" \n\t ").is_empty());
        assert_eq!(normalize("").char_len(), 0);
    }

    #[test]
    fn test_already_normal_is_unchanged() {
        let text = normalize("uno dos tres");
        assert_eq!(text.into_string(), "uno dos tres");
    }

    proptest! {
        #[test]
        fn prop_no_adjacent_or_edge_whitespace(raw in "[ a-zñé\\t\\n\\r]{0,80}") {
            let text = normalize(&raw);
            let chars: Vec<char> = text.chars().collect();

            prop_assert!(chars.first().map_or(true, |c| !c.is_whitespace()));
            prop_assert!(chars.last().map_or(true, |c| !c.is_whitespace()));
            for pair in chars.windows(2) {
                prop_assert!(!(pair[0].is_whitespace() && pair[1].is_whitespace()));
            }
        }

        #[test]
        fn prop_idempotent(raw in "[ a-z\\n]{0,60}") {
            let once = normalize(&raw);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
