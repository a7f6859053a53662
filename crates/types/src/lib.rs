use std::cmp::Ordering;

/// Nominal type a column declares for its cells.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CellType {
    Int,
    Float,
    Text,
    Bool,
}

/// A single cell value. Cells are heterogeneously typed and nullable.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or whitespace-only text counts as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(t) => t.trim().is_empty(),
            _ => false,
        }
    }

    /// Checkbox semantics: `true`, non-zero numbers, and the strings
    /// "true" / "yes" / "1" (any case) are checked; everything else is not.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(t) => {
                let t = t.trim();
                t.eq_ignore_ascii_case("true")
                    || t.eq_ignore_ascii_case("yes")
                    || t == "1"
            }
            Value::Null => false,
        }
    }

    /// Numeric view of the value, if it has one. Text is parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(t) => t.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Text rendering used by search, alerts, and export previews.
    /// Null renders as the empty string.
    pub fn display_text(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(t) => t.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
        }
    }

    /// Total order over values used by the sort pipeline.
    ///
    /// Numbers compare numerically (Int and Float interchangeably). Two
    /// text values compare numerically only when both parse as the same
    /// numeric type, otherwise case-insensitively with a case-sensitive
    /// tiebreak. Cross-type comparisons order by type rank
    /// (Bool < numeric < Text), with Null below everything.
    pub fn compare(&self, other: &Value) -> Ordering {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,

            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Int(a), Float(b)) => (*a as f64).total_cmp(b),
            (Float(a), Int(b)) => a.total_cmp(&(*b as f64)),

            (Bool(a), Bool(b)) => a.cmp(b),
            (Text(a), Text(b)) => compare_text(a, b),

            // Cross-type: Bool < numeric < Text
            (Bool(_), _) => Ordering::Less,
            (_, Bool(_)) => Ordering::Greater,
            (Text(_), _) => Ordering::Greater,
            (_, Text(_)) => Ordering::Less,
        }
    }

    /// Equality with numeric coercion: `Int(5)` equals `Float(5.0)` and
    /// the text "5"; text otherwise compares case-insensitively.
    pub fn loose_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Null, _) | (_, Null) => false,
            (Bool(a), Bool(b)) => a == b,
            // Same-type numerics compare exactly; f64 round-tripping
            // would conflate distinct large integers
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Text(a), Text(b)) => {
                if let (Some(x), Some(y)) = (self.as_number(), other.as_number()) {
                    x == y
                } else {
                    a.eq_ignore_ascii_case(b)
                }
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

/// Text ordering for sort: numeric strings of the same numeric type
/// compare numerically; everything else compares case-insensitively,
/// falling back to a case-sensitive comparison to keep the order total.
fn compare_text(a: &str, b: &str) -> Ordering {
    if let (Ok(x), Ok(y)) = (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        return x.cmp(&y);
    }
    if let (Ok(x), Ok(y)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        return x.total_cmp(&y);
    }
    let folded = a.to_lowercase().cmp(&b.to_lowercase());
    if folded != Ordering::Equal {
        folded
    } else {
        a.cmp(b)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
