//! Ordered feature records

use std::fmt;

use serde::Serialize;

use crate::cube::ClassId;

/// Value of one feature column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Text(String),
    Float(f64),
    Int(i64),
    IntList(Vec<i64>),
}

impl FeatureValue {
    /// Numeric value, `None` for text and lists
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Float(v) => Some(*v),
            FeatureValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<&ClassId> for FeatureValue {
    fn from(id: &ClassId) -> Self {
        match id {
            ClassId::Single(v) => FeatureValue::Int(*v),
            ClassId::Multi(v) => FeatureValue::IntList(v.clone()),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Text(s) => write!(f, "{s}"),
            FeatureValue::Float(v) => write!(f, "{v}"),
            FeatureValue::Int(v) => write!(f, "{v}"),
            FeatureValue::IntList(v) => write!(f, "{}", ClassId::Multi(v.clone())),
        }
    }
}

/// Substitute for the column delimiter inside rendered values
pub const DELIMITER_ESCAPE: &str = "_";

/// Named feature values in schema order
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FeatureRecord {
    entries: Vec<(String, FeatureValue)>,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: FeatureValue) {
        self.entries.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of the named column
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Numeric value of the named column
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FeatureValue::as_f64)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &FeatureValue> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Render the values as one delimited line
    ///
    /// Occurrences of the delimiter inside a value are replaced by
    /// [`DELIMITER_ESCAPE`] so every row keeps one field per column.
    pub fn to_row(&self, delimiter: &str) -> String {
        self.values()
            .map(|v| {
                let text = v.to_string();
                if delimiter.is_empty() || !text.contains(delimiter) {
                    text
                } else {
                    text.replace(delimiter, DELIMITER_ESCAPE)
                }
            })
            .collect::<Vec<_>>()
            .join(delimiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lookup_and_row() {
        let mut record = FeatureRecord::new();
        record.push("sname", FeatureValue::Text("S1".into()));
        record.push("flux_ch1", FeatureValue::Float(2.5));
        record.push("id", FeatureValue::from(&ClassId::Multi(vec![1, 3])));

        assert_eq!(record.len(), 3);
        assert_eq!(record.get_f64("flux_ch1"), Some(2.5));
        assert_eq!(record.get_f64("sname"), None);
        assert!(record.get("missing").is_none());
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["sname", "flux_ch1", "id"]);
        assert_eq!(record.to_row(" "), "S1 2.5 [1,3]");
    }

    #[test]
    fn test_delimiter_inside_value_is_escaped() {
        let mut record = FeatureRecord::new();
        record.push("sname", FeatureValue::Text("NGC 1275 core".into()));
        record.push("flux_ch1", FeatureValue::Float(2.5));
        record.push("id", FeatureValue::from(&ClassId::Multi(vec![1, 3])));

        let row = record.to_row(" ");
        assert_eq!(row, "NGC_1275_core 2.5 [1,3]");
        assert_eq!(row.split(' ').count(), record.len());

        let row = record.to_row(",");
        assert_eq!(row, "NGC 1275 core,2.5,[1_3]");
        assert_eq!(row.split(',').count(), record.len());
    }

    #[test]
    fn test_single_class_id_is_int() {
        assert_eq!(FeatureValue::from(&ClassId::Single(4)), FeatureValue::Int(4));
        assert_eq!(FeatureValue::Int(4).as_f64(), Some(4.0));
    }
}
