//! Tagged return values from a top-level `return [..]`

/// One entry produced by a multi-value `return`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    /// A scalar value
    Scalar(f64),
    /// A snapshot of a vector's logical contents at return time
    Vector(Vec<f64>),
    /// A string value
    Str(String),
}

impl ResultValue {
    /// The scalar payload, if this entry is a scalar.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ResultValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// The vector payload, if this entry is a vector.
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            ResultValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// The string payload, if this entry is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResultValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Ordered collection of values produced by a `return [v0, v1, ...]`
/// that reaches the top level of a program.
///
/// Populated afresh by each evaluation: the previous contents are
/// discarded when `value()` is called again, and remain empty when the
/// program finishes without a top-level `return`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsContext {
    values: Vec<ResultValue>,
}

impl ResultsContext {
    /// Number of returned values.
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// True when the last evaluation produced no top-level `return`.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entry at position `i`, in return order.
    pub fn get(&self, i: usize) -> Option<&ResultValue> {
        self.values.get(i)
    }

    /// Iterate over the entries in return order.
    pub fn iter(&self) -> impl Iterator<Item = &ResultValue> {
        self.values.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }

    pub(crate) fn set(&mut self, values: Vec<ResultValue>) {
        self.values = values;
    }
}
