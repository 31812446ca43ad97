//! Class-id to class-name table parsing.
//!
//! Detection models embed their label table as a Python-style dict string
//! in the model metadata, e.g. `"{0: 'Fish', 1: 'Bee', 2: 'Cat'}"`. The
//! table is parsed once at model load and is immutable afterwards; a
//! string that does not parse yields the empty table rather than an error.

use std::collections::HashMap;

/// Immutable class-id → name mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNames {
    names: HashMap<usize, String>,
}

impl ClassNames {
    /// Create an empty table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a metadata string of the form `"{0: 'Fish', 1: 'Bee'}"`.
    ///
    /// Any malformed entry makes the whole parse fall back to the empty
    /// table; a missing label table must not be fatal to model loading.
    pub fn parse(metadata: &str) -> Self {
        parse_entries(metadata)
            .map(|names| Self { names })
            .unwrap_or_default()
    }

    /// Resolve a class id to its name.
    ///
    /// Unknown ids format as `"Class <id>"`.
    pub fn name(&self, id: usize) -> String {
        match self.names.get(&id) {
            Some(name) => name.clone(),
            None => format!("Class {id}"),
        }
    }

    /// Look up a class name without the fallback.
    pub fn get(&self, id: usize) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Number of known classes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn parse_entries(metadata: &str) -> Option<HashMap<usize, String>> {
    let mut s = metadata.trim();
    if let Some(stripped) = s.strip_prefix('{') {
        s = stripped.strip_suffix('}')?.trim();
    }
    if s.is_empty() {
        return Some(HashMap::new());
    }

    let mut entries = HashMap::new();
    for part in split_on_entry_commas(s) {
        let (key, value) = part.split_once(':')?;
        let id: usize = key.trim().parse().ok()?;
        let name = value.trim().trim_matches(|c| c == '\'' || c == '"' || c == ' ');
        entries.insert(id, name.to_string());
    }
    Some(entries)
}

/// Split on commas that are followed by a `<digits>:` key, so names
/// containing commas stay intact.
fn split_on_entry_commas(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if b == b',' && starts_new_entry(&s[i + 1..]) {
            parts.push(&s[start..i]);
            start = i + 1;
        }
    }
    parts.push(&s[start..]);
    parts
}

/// True when the remainder begins with `\s*\d+\s*:`.
fn starts_new_entry(rest: &str) -> bool {
    let rest = rest.trim_start();
    let digits: usize = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    rest[digits..].trim_start().starts_with(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_table() {
        let names = ClassNames::parse("{0: 'Fish', 1: 'Bee', 2: 'Cat'}");
        assert_eq!(names.len(), 3);
        assert_eq!(names.name(0), "Fish");
        assert_eq!(names.name(2), "Cat");
    }

    #[test]
    fn test_parse_double_quotes_and_spacing() {
        let names = ClassNames::parse(r#"{ 0 : "Dog" ,  5 :'Bird'}"#);
        assert_eq!(names.name(0), "Dog");
        assert_eq!(names.name(5), "Bird");
    }

    #[test]
    fn test_parse_name_containing_comma() {
        let names = ClassNames::parse("{0: 'Sedan, small', 1: 'Truck'}");
        assert_eq!(names.len(), 2);
        assert_eq!(names.name(0), "Sedan, small");
        assert_eq!(names.name(1), "Truck");
    }

    #[test]
    fn test_unknown_id_formats_fallback() {
        let names = ClassNames::parse("{0: 'Fish'}");
        assert_eq!(names.name(7), "Class 7");
        assert_eq!(names.get(7), None);
    }

    #[test]
    fn test_empty_braces() {
        let names = ClassNames::parse("{}");
        assert!(names.is_empty());
        assert_eq!(names.name(0), "Class 0");
    }

    #[test]
    fn test_malformed_falls_back_to_empty() {
        assert!(ClassNames::parse("{0 'Fish'}").is_empty());
        assert!(ClassNames::parse("{x: 'Fish'}").is_empty());
        assert!(ClassNames::parse("not a dict at all").is_empty());
    }

    #[test]
    fn test_empty_string() {
        assert!(ClassNames::parse("").is_empty());
        assert!(ClassNames::parse("   ").is_empty());
    }
}
