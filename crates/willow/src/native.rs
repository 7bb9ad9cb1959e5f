//! Native function interop
//!
//! Host callables enter the language in two shapes: fixed-arity scalar
//! functions, and generic functions declared with a signature grammar
//! over type tags (`T` scalar, `V` vector, `S` string) with `|`
//! separating alternatives and a trailing `*` meaning "one or more of
//! the preceding tag". Overload resolution happens once, at compile
//! time, against the tagged tuple of call-site argument types.

use std::rc::Rc;

use crate::vector_view::VectorView;

/// A host function over exactly `arity()` scalar arguments.
pub trait ScalarFunction {
    /// Number of scalar parameters.
    fn arity(&self) -> usize;

    /// Apply the function. `args.len()` equals `arity()`.
    fn call(&self, args: &[f64]) -> f64;

    /// Whether a call has observable side effects. Functions returning
    /// `false` may be folded at compile time when every argument is a
    /// constant. This is an optimization hint, not a correctness
    /// requirement.
    fn has_side_effects(&self) -> bool {
        true
    }
}

/// Adapter turning a closure into a [`ScalarFunction`].
pub struct ScalarFn<F> {
    arity: usize,
    func: F,
    pure: bool,
}

impl<F: Fn(&[f64]) -> f64> ScalarFn<F> {
    /// Wrap a closure with the given arity.
    pub fn new(arity: usize, func: F) -> Self {
        Self {
            arity,
            func,
            pure: false,
        }
    }

    /// Wrap a closure and declare it free of observable side effects.
    pub fn pure(arity: usize, func: F) -> Self {
        Self {
            arity,
            func,
            pure: true,
        }
    }
}

impl<F: Fn(&[f64]) -> f64> ScalarFunction for ScalarFn<F> {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, args: &[f64]) -> f64 {
        (self.func)(args)
    }

    fn has_side_effects(&self) -> bool {
        !self.pure
    }
}

/// Argument type tag used in generic-function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// `T`: a scalar expression
    Scalar,
    /// `V`: a vector (passed as a live, writable view)
    Vector,
    /// `S`: a string expression
    Str,
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TypeTag::Scalar => "T",
            TypeTag::Vector => "V",
            TypeTag::Str => "S",
        })
    }
}

/// One alternative in a signature: a fixed prefix of tags, optionally
/// with the last tag repeatable (`*`).
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    tags: Vec<TypeTag>,
    star: bool,
}

impl Alternative {
    fn matches(&self, args: &[TypeTag]) -> bool {
        if self.star {
            // Fixed prefix, then one or more of the final tag.
            let fixed = self.tags.len() - 1;
            args.len() > fixed
                && args[..fixed] == self.tags[..fixed]
                && args[fixed..].iter().all(|t| *t == self.tags[fixed])
        } else {
            args == self.tags.as_slice()
        }
    }
}

impl std::fmt::Display for Alternative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for tag in &self.tags {
            write!(f, "{tag}")?;
        }
        if self.star {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// A parsed generic-function signature, e.g. `"VTT|VT"` or `"TS*"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    alternatives: Vec<Alternative>,
}

impl Signature {
    /// Parse a pipe-separated signature string.
    pub fn parse(signature: &str) -> Result<Signature, String> {
        let mut alternatives = Vec::new();
        for alt in signature.split('|') {
            let mut tags = Vec::new();
            let mut star = false;
            for c in alt.chars() {
                if star {
                    return Err(format!(
                        "'*' must terminate an alternative in signature '{signature}'"
                    ));
                }
                match c {
                    'T' => tags.push(TypeTag::Scalar),
                    'V' => tags.push(TypeTag::Vector),
                    'S' => tags.push(TypeTag::Str),
                    '*' if !tags.is_empty() => star = true,
                    other => {
                        return Err(format!(
                            "invalid character '{other}' in signature '{signature}'"
                        ))
                    }
                }
            }
            if tags.is_empty() && !alt.is_empty() {
                return Err(format!("empty alternative in signature '{signature}'"));
            }
            alternatives.push(Alternative { tags, star });
        }
        if alternatives.is_empty() {
            return Err("empty signature".to_owned());
        }
        Ok(Signature { alternatives })
    }

    /// Index of the first alternative matching the argument tags.
    pub fn match_args(&self, args: &[TypeTag]) -> Option<usize> {
        self.alternatives.iter().position(|alt| alt.matches(args))
    }

    /// Render the alternatives for a "no matching overload" message.
    pub fn describe(&self) -> String {
        self.alternatives
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// An argument handed to a [`GenericFunction`] at call time.
///
/// Vectors are passed as live views: writes through the view are
/// visible to the program and the host. Scalars and strings are passed
/// by value.
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// A scalar argument
    Scalar(f64),
    /// A vector argument (shared, writable)
    Vector(VectorView),
    /// A string argument
    Str(String),
}

impl ArgValue {
    /// The scalar payload; `None` for other kinds.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ArgValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// The vector payload; `None` for other kinds.
    pub fn as_vector(&self) -> Option<&VectorView> {
        match self {
            ArgValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// The string payload; `None` for other kinds.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The type tag of this argument.
    pub fn tag(&self) -> TypeTag {
        match self {
            ArgValue::Scalar(_) => TypeTag::Scalar,
            ArgValue::Vector(_) => TypeTag::Vector,
            ArgValue::Str(_) => TypeTag::Str,
        }
    }
}

/// Result of a generic-function call.
#[derive(Debug, Clone, PartialEq)]
pub enum GenericResult {
    /// A scalar result
    Scalar(f64),
    /// A string result; only legal for functions whose
    /// [`returns_string`](GenericFunction::returns_string) is true
    Str(String),
}

/// A host function over a signature-described mix of scalar, vector
/// and string arguments.
pub trait GenericFunction {
    /// The signature grammar string, e.g. `"VTT|VT"`.
    fn signature(&self) -> &str;

    /// Whether the function produces a string instead of a scalar.
    /// String results are never coerced to numbers: the call site is a
    /// string-typed expression, usable where strings are expected or
    /// through the results context.
    fn returns_string(&self) -> bool {
        false
    }

    /// Side-effect hint, as for [`ScalarFunction::has_side_effects`].
    fn has_side_effects(&self) -> bool {
        true
    }

    /// Apply the function. `overload` is the index of the matched
    /// signature alternative, fixed at compile time.
    fn call(&self, overload: usize, args: &mut [ArgValue]) -> GenericResult;
}

/// Shared handle to a scalar function.
pub type ScalarFunctionRef = Rc<dyn ScalarFunction>;
/// Shared handle to a generic function.
pub type GenericFunctionRef = Rc<dyn GenericFunction>;
