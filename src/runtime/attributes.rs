//! Host element attributes and their typed readers.

use indexmap::IndexMap;

/// A change to a single attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Attribute map of a component host, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    values: IndexMap<String, String>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Set (`Some`) or remove (`None`) an attribute.
    ///
    /// Returns the change, or `None` when the value is unchanged.
    pub fn set(&mut self, name: &str, value: Option<&str>) -> Option<AttributeChange> {
        let old_value = match value {
            Some(value) => {
                if self.get(name) == Some(value) {
                    return None;
                }
                self.values.insert(name.to_string(), value.to_string())
            }
            None => self.values.shift_remove(name)?.into(),
        };

        Some(AttributeChange {
            name: name.to_string(),
            old_value,
            new_value: value.map(str::to_string),
        })
    }

    /// String attribute, or `default` when absent
    pub fn get_string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_string()
    }

    /// Integer attribute; `default` when absent or not a number.
    ///
    /// Leading whitespace, a sign and leading digits are accepted, so
    /// `"12px"` reads as 12.
    pub fn get_int(&self, name: &str, default: i64) -> i64 {
        self.get(name).and_then(parse_leading_int).unwrap_or(default)
    }

    /// Boolean attribute: true when present, whatever its value
    pub fn get_bool(&self, name: &str) -> bool {
        self.has(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let digits_start = usize::from(text.starts_with(['+', '-']));
    let digits_len = text[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    text[..digits_start + digits_len].parse().ok()
}
