//! Records, field values and sort keys.
//!
//! A [`Record`] is a fixed-arity tuple of [`Value`]s. Records are immutable
//! once built and cheap to clone (the fields are reference counted), which
//! is what the merge engines rely on when they shuffle records between the
//! two halves of a buffer pair.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// A single field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

/// The kind of a [`Value`], used in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    Str,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Int => "integer",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
        })
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
        }
    }

    /// Natural ordering between two values of the same kind.
    ///
    /// Integers compare numerically, floats by IEEE total order (so `NaN`
    /// sorts after every other value and the ordering stays total) and
    /// strings byte-wise. Returns `None` when the kinds differ.
    ///
    /// Byte-wise order on UTF-8 is code point order. It differs from UTF-16
    /// code unit order only when a character above U+FFFF meets one in
    /// U+E000..=U+FFFF: here `"\u{10000}"` sorts after `"\u{FFFD}"`, while
    /// UTF-16 order puts it before.
    #[inline]
    pub fn try_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

/// An immutable, fixed-width tuple of field values.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    fields: Arc<[Value]>,
}

impl Record {
    pub fn new(fields: impl Into<Vec<Value>>) -> Self {
        let fields: Vec<Value> = fields.into();
        Self {
            fields: fields.into(),
        }
    }

    /// Number of fields.
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, column: usize) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }
}

impl From<Vec<Value>> for Record {
    fn from(fields: Vec<Value>) -> Self {
        Self::new(fields)
    }
}

impl Index<usize> for Record {
    type Output = Value;

    fn index(&self, column: usize) -> &Value {
        &self.fields[column]
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

/// Builds a [`Record`] from a list of values convertible into [`Value`].
///
/// ```
/// use forkmerge::{record, Value};
///
/// let r = record!["Smith, John", 42, 12.5];
/// assert_eq!(r[1], Value::Int(42));
/// ```
#[macro_export]
macro_rules! record {
    ($($value:expr),* $(,)?) => {
        $crate::Record::new(vec![$($crate::Value::from($value)),*])
    };
}

/// Sort direction of a single key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    #[inline]
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// One sort key: a column index and the direction to order it in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub column: usize,
    pub direction: Direction,
}

impl SortKey {
    pub fn new(column: usize, direction: Direction) -> Self {
        Self { column, direction }
    }

    pub fn asc(column: usize) -> Self {
        Self::new(column, Direction::Ascending)
    }

    pub fn desc(column: usize) -> Self {
        Self::new(column, Direction::Descending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_kind_ordering() {
        assert_eq!(Value::Int(1).try_cmp(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(
            Value::from("b").try_cmp(&Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Float(f64::NAN).try_cmp(&Value::Float(f64::INFINITY)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_strings_order_by_code_point() {
        let astral = Value::from("\u{10000}");
        let replacement = Value::from("\u{FFFD}");
        assert_eq!(astral.try_cmp(&replacement), Some(Ordering::Greater));
    }

    #[test]
    fn test_mixed_kinds_have_no_ordering() {
        assert_eq!(Value::Int(1).try_cmp(&Value::Float(1.0)), None);
        assert_eq!(Value::from("1").try_cmp(&Value::Int(1)), None);
    }

    #[test]
    fn test_record_macro_and_display() {
        let r = record!["Smith, John", 7, 1.5];
        assert_eq!(r.width(), 3);
        assert_eq!(r[0].kind(), ValueKind::Str);
        assert_eq!(
            r.fields(),
            &[Value::from("Smith, John"), Value::Int(7), Value::Float(1.5)]
        );
        assert_eq!(r.get(1), Some(&Value::Int(7)));
        assert_eq!(r.get(3), None);
        assert_eq!(r.to_string(), "[Smith, John, 7, 1.5]");
    }

    #[test]
    fn test_direction_apply() {
        assert_eq!(Direction::Descending.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(Direction::Ascending.apply(Ordering::Less), Ordering::Less);
    }
}
