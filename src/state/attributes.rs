//! Ordered multi-map of descriptor fields
//!
//! Adapters attach protocol-specific fields (file name, message uid, link
//! URL) to entities. The engine never interprets them.

/// Ordered string multi-map; insertion order is preserved and keys may repeat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value; existing values for the same key are kept
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Builder-style variant of [`Attributes::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the first value stored for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value stored for `key`, in insertion order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Appends all entries of `other` after the existing ones
    pub fn extend(&mut self, other: Attributes) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes as `key=value` lines for storage
    pub fn to_lines(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.replace('\n', " ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<(String, String)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_keys_keep_order() {
        let mut attrs = Attributes::new();
        attrs.insert("link", "https://a.example.com/");
        attrs.insert("title", "A");
        attrs.insert("link", "https://b.example.com/");

        assert_eq!(attrs.get("link"), Some("https://a.example.com/"));
        let links: Vec<_> = attrs.get_all("link").collect();
        assert_eq!(links, vec!["https://a.example.com/", "https://b.example.com/"]);
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn test_missing_key() {
        let attrs = Attributes::new().with("fs.name", "a.txt");
        assert_eq!(attrs.get("fs.size"), None);
        assert!(attrs.contains("fs.name"));
    }

    #[test]
    fn test_extend_appends() {
        let mut attrs = Attributes::new().with("a", "1");
        attrs.extend(Attributes::new().with("b", "2").with("a", "3"));
        let keys: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_to_lines_flattens_newlines() {
        let attrs = Attributes::new().with("mail.subject", "hello\nworld");
        assert_eq!(attrs.to_lines(), "mail.subject=hello world");
    }
}
