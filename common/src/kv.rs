//! Tokenizer for the `key=value;` syntax shared by persisted records and the
//! `--bench`/`--graph` option families.

use std::collections::HashMap;

/// Parsed `key=value;` fields. The first occurrence of a key wins. Keys are
/// trimmed, values are kept as written.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Fields<'a> {
    values: HashMap<&'a str, &'a str>,
}

impl<'a> Fields<'a> {
    pub fn parse(text: &'a str) -> Self {
        let mut values = HashMap::new();
        for token in text.trim_end_matches(['\n', '\r']).split(';') {
            if token.trim().is_empty() {
                continue;
            }
            // A token without '=' carries no value and is ignored.
            if let Some((key, value)) = token.split_once('=') {
                values.entry(key.trim()).or_insert(value);
            }
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.values.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fields_in_any_order() {
        let fields = Fields::parse("planner=MCTS;domain=a/b/domain.pddl;");
        assert_eq!(fields.get("domain"), Some("a/b/domain.pddl"));
        assert_eq!(fields.get("planner"), Some("MCTS"));
        assert_eq!(fields.get("args"), None);
    }

    #[test]
    fn value_keeps_later_equals_signs() {
        let fields = Fields::parse("args=-e FAST_FORWARD -w=1.2;");
        assert_eq!(fields.get("args"), Some("-e FAST_FORWARD -w=1.2"));
    }

    #[test]
    fn first_occurrence_wins_and_trailing_newline_is_ignored() {
        let fields = Fields::parse("min=2;min=5;\n");
        assert_eq!(fields.get("min"), Some("2"));
        assert!(!fields.contains("max"));
    }

    #[test]
    fn values_keep_surrounding_whitespace() {
        let fields = Fields::parse("\n domain=a/domain.pddl ;args= -t 1;");
        assert_eq!(fields.get("domain"), Some("a/domain.pddl "));
        assert_eq!(fields.get("args"), Some(" -t 1"));
    }
}
