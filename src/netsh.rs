//! Parser for the verbose rule listing printed by `netsh advfirewall`.
//!
//! The listing is a sequence of `Field Name:   value` lines; records are
//! separated by lines of dashes. Each record becomes a [`Rule`] whose keys
//! are normalized to lowercase with underscores (`Rule Name` becomes
//! `rule_name`).

use std::collections::BTreeMap;
use std::fmt;

/// One firewall rule: normalized field names mapped to trimmed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Rule {
    fields: BTreeMap<String, String>,
}

impl Rule {
    /// Creates an empty rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a normalized field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Sets a field, replacing any earlier value for the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Returns the `rule_name` field.
    pub fn name(&self) -> Option<&str> {
        self.get("rule_name")
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the rule has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the underlying map.
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.fields
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Rule {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.fields {
            writeln!(f, "{}: {}", key, value)?;
        }
        Ok(())
    }
}

/// Lowercases a field name and replaces spaces with underscores.
fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace(' ', "_")
}

/// Parses rule records from output lines.
///
/// Lines are trimmed and blank lines ignored. A line containing `:` is split
/// at the first colon into a field; otherwise a line containing `----` ends
/// the current record, if it has any fields. A trailing record without a
/// separator is kept. Lines matching neither form are ignored.
///
/// # Examples
///
/// ```rust
/// use reg_sweep::parse_rules;
///
/// let rules = parse_rules(["Rule Name: Block", "Enabled: Yes", "----------"]);
/// assert_eq!(rules.len(), 1);
/// assert_eq!(rules[0].name(), Some("Block"));
/// assert_eq!(rules[0].get("enabled"), Some("Yes"));
/// ```
pub fn parse_rules<I, S>(lines: I) -> Vec<Rule>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut rules = Vec::new();
    let mut current = Rule::new();

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            current.insert(normalize_key(key), value.trim());
        } else if line.contains("----") && !current.is_empty() {
            rules.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        rules.push(current);
    }
    rules
}

/// Parses a whole captured listing.
pub fn parse_output(text: &str) -> Vec<Rule> {
    parse_rules(text.lines())
}
