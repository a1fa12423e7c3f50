use std::fmt;

/// Scalar value of one record field.
///
/// Only scalars and null are representable; anything richer has to be
/// flattened to a string before it is put into a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    /// Plain textual form, without quoting or escaping.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::UInt(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Str(v) => f.write_str(v),
        }
    }
}

macro_rules! impl_from {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    FieldValue::$variant(v.into())
                }
            }
        )+
    };
}

impl_from!(Bool: bool);
impl_from!(Int: i8, i16, i32, i64);
impl_from!(UInt: u8, u16, u32, u64);
impl_from!(Float: f32, f64);
impl_from!(Str: String, &str, &String);

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        FieldValue::UInt(v as u64)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// Ordered set of named fields making up one emitted record.
///
/// Insertion order is emission order. Overwriting an existing key keeps its
/// original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRecord {
    fields: Vec<(String, FieldValue)>,
}

impl LogRecord {
    pub fn new() -> Self {
        LogRecord::default()
    }

    /// Insert or overwrite `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove `key`; remaining fields keep their relative order.
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let idx = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order() {
        let mut record = LogRecord::new();
        record.insert("b", 1);
        record.insert("a", "x");
        record.insert("c", true);

        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut record = LogRecord::new();
        record.insert("first", 1);
        record.insert("second", 2);

        let previous = record.insert("first", "replaced");
        assert_eq!(previous, Some(FieldValue::Int(1)));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["first", "second"]);
        assert_eq!(record.get("first").and_then(FieldValue::as_str), Some("replaced"));
    }

    #[test]
    fn test_remove() {
        let mut record = LogRecord::new();
        record.insert("a", 1);
        record.insert("b", 2);
        record.insert("c", 3);

        assert_eq!(record.remove("b"), Some(FieldValue::Int(2)));
        assert_eq!(record.remove("missing"), None);
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(FieldValue::from(200u16), FieldValue::UInt(200));
        assert_eq!(FieldValue::from(-3), FieldValue::Int(-3));
        assert_eq!(FieldValue::from(None::<String>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("id")), FieldValue::Str("id".to_string()));
        assert_eq!(FieldValue::from(1.5f32), FieldValue::Float(1.5));
        assert!(FieldValue::Null.is_null());
    }
}
