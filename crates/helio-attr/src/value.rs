//! Scalar leaf values and the field paths they are stored under.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;

/// An ordered sequence of field-name segments, e.g. `time.start`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Split a dotted name (`"wave.wavemin"`) into a path.
    pub fn dotted(name: &str) -> Self { Self::new(name.split('.')) }

    pub fn segments(&self) -> &[String] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// The final segment, the name of the leaf field.
    pub fn leaf(&self) -> Option<&str> { self.0.last().map(String::as_str) }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0.join(".")) }
}

impl From<&str> for FieldPath {
    fn from(name: &str) -> Self { Self::dotted(name) }
}

impl<const N: usize> From<[&str; N]> for FieldPath {
    fn from(segments: [&str; N]) -> Self { Self::new(segments) }
}

/// A scalar attribute value.
///
/// Values carry a total order so that attribute sets have a canonical
/// ordering and range bounds can be compared. Floats compare with
/// [`f64::total_cmp`].
#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Time(NaiveDateTime),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Str(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
            Value::Bool(_) => 3,
            Value::Time(_) => 4,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// JSON rendering used by the generic applier. Times use ISO 8601.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Str(s) => serde_json::Value::from(s.as_str()),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Value::from(*v),
            Value::Bool(v) => serde_json::Value::from(*v),
            Value::Time(t) => serde_json::Value::from(t.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Str(s) => s.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Bool(v) => v.hash(state),
            Value::Time(t) => t.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Str(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::Str(s) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Float(v) }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self { Value::Time(t) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_path() {
        let path = FieldPath::dotted("time.start");
        assert_eq!(path.segments(), ["time", "start"]);
        assert_eq!(path.leaf(), Some("start"));
        assert_eq!(path.to_string(), "time.start");
        assert_eq!(path, FieldPath::from(["time", "start"]));
    }

    #[test]
    fn test_float_order_is_total() {
        assert!(Value::Float(1.0) < Value::Float(2.5));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert!(Value::Str("z".into()) < Value::Int(0));
    }
}
