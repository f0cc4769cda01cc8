//! Expression values: the four-variant closed sum type of `spec.md` §3.
//! Immutable once constructed, as the lifecycle section requires.

use std::collections::BTreeSet;
use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;

/// One constant-expression value. `Set` holds other `Value`s in a
/// `BTreeSet`, which gives us set algebra (union, intersection, subset
/// comparison) and order-irrelevant equality for free via `Ord`/`Eq`,
/// without needing a `Hash` impl for `BigRational`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Boolean(bool),
    Rational(BigRational),
    String(String),
    Set(ValueSet),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ValueSet(pub BTreeSet<Value>);

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "bool",
            Value::Rational(_) => "rational",
            Value::String(_) => "string",
            Value::Set(_) => "set",
        }
    }

    pub fn integer(n: i64) -> Self {
        Value::Rational(BigRational::from_integer(BigInt::from(n)))
    }
}

impl ValueSet {
    pub fn from_rationals(values: impl IntoIterator<Item = BigRational>) -> Self {
        ValueSet(values.into_iter().map(Value::Rational).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Rational(r) => write!(f, "{r}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Set(set) => {
                write!(f, "{{")?;
                for (i, v) in set.0.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
