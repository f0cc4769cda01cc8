//! The data-type model of `spec.md` §3: an exhaustive, closed set of
//! variants rather than an open class hierarchy (see "Sum types over
//! dynamic dispatch" in §9). Width/range validation lives here because it is
//! a property of the type itself, not of whoever is building one.

use std::fmt;

use num_bigint::BigInt;
use num_traits::pow as num_pow;
use triomphe::Arc;

use crate::bit_length_set::{bits_to_represent, BitLengthSet};
use crate::compound::CompoundType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastMode {
    Saturated,
    Truncated,
}

impl Default for CastMode {
    fn default() -> Self {
        CastMode::Saturated
    }
}

impl fmt::Display for CastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CastMode::Saturated => "saturated",
            CastMode::Truncated => "truncated",
        })
    }
}

#[derive(Debug, Clone)]
pub enum DataType {
    /// Padding only; never a field's or constant's declared type.
    Void(u8),
    Boolean,
    SignedInteger { bits: u8, cast_mode: CastMode },
    UnsignedInteger { bits: u8, cast_mode: CastMode },
    Float { bits: u8, cast_mode: CastMode },
    FixedLengthArray { element: Box<DataType>, capacity: u64 },
    VariableLengthArray { element: Box<DataType>, max_capacity: u64 },
    Composite(Arc<CompoundType>),
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        use DataType::*;
        match (self, other) {
            (Void(a), Void(b)) => a == b,
            (Boolean, Boolean) => true,
            (SignedInteger { bits: a, cast_mode: ca }, SignedInteger { bits: b, cast_mode: cb }) => {
                a == b && ca == cb
            }
            (UnsignedInteger { bits: a, cast_mode: ca }, UnsignedInteger { bits: b, cast_mode: cb }) => {
                a == b && ca == cb
            }
            (Float { bits: a, cast_mode: ca }, Float { bits: b, cast_mode: cb }) => a == b && ca == cb,
            (
                FixedLengthArray { element: ea, capacity: ca },
                FixedLengthArray { element: eb, capacity: cb },
            ) => ea == eb && ca == cb,
            (
                VariableLengthArray { element: ea, max_capacity: ca },
                VariableLengthArray { element: eb, max_capacity: cb },
            ) => ea == eb && ca == cb,
            // Compared by identity, not deep structure: two distinct
            // `CompoundType`s can legitimately share a full name and version
            // only across separate parse invocations, never within one.
            (Composite(a), Composite(b)) => Arc::ptr_eq(a, b) || (a.full_name() == b.full_name() && a.version() == b.version()),
            _ => false,
        }
    }
}

impl DataType {
    pub fn bit_length_set(&self) -> BitLengthSet {
        match self {
            DataType::Void(bits) => BitLengthSet::single(*bits as u64),
            DataType::Boolean => BitLengthSet::single(1),
            DataType::SignedInteger { bits, .. }
            | DataType::UnsignedInteger { bits, .. }
            | DataType::Float { bits, .. } => BitLengthSet::single(*bits as u64),
            DataType::FixedLengthArray { element, capacity } => {
                element.bit_length_set().repeat_sum(*capacity)
            }
            DataType::VariableLengthArray { element, max_capacity } => {
                let header_bits = bits_to_represent(*max_capacity + 1) as u64;
                BitLengthSet::variable_array(&element.bit_length_set(), header_bits, *max_capacity)
            }
            DataType::Composite(compound) => compound.bit_length_set(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, DataType::Composite(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, DataType::Boolean)
    }

    pub fn is_unsigned_integer(&self, bits: u8) -> bool {
        matches!(self, DataType::UnsignedInteger { bits: b, .. } if *b == bits)
    }

    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::FixedLengthArray { element, .. } => Some(element),
            DataType::VariableLengthArray { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Inclusive `[min, max]` for integer types; `None` otherwise.
    pub fn integer_range(&self) -> Option<(BigInt, BigInt)> {
        match self {
            DataType::UnsignedInteger { bits, .. } => {
                let max = num_pow(BigInt::from(2), *bits as usize) - BigInt::from(1);
                Some((BigInt::from(0), max))
            }
            DataType::SignedInteger { bits, .. } => {
                let half = num_pow(BigInt::from(2), *bits as usize - 1);
                Some((-half.clone(), half - BigInt::from(1)))
            }
            _ => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float { .. })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Void(bits) => write!(f, "void{bits}"),
            DataType::Boolean => write!(f, "bool"),
            DataType::SignedInteger { bits, cast_mode } => write!(f, "{cast_mode} int{bits}"),
            DataType::UnsignedInteger { bits, cast_mode } => write!(f, "{cast_mode} uint{bits}"),
            DataType::Float { bits, cast_mode } => write!(f, "{cast_mode} float{bits}"),
            DataType::FixedLengthArray { element, capacity } => write!(f, "{element}[{capacity}]"),
            DataType::VariableLengthArray { element, max_capacity } => {
                write!(f, "{element}[<={max_capacity}]")
            }
            DataType::Composite(compound) => {
                let (major, minor) = compound.version();
                write!(f, "{}.{major}.{minor}", compound.full_name())
            }
        }
    }
}

/// Builds a primitive (non-array, non-composite) type from its keyword and
/// an optional cast mode, validating width per §3. `void` and `bool` reject
/// an explicit cast mode.
pub fn primitive_from_name(name: &str, cast_mode: Option<CastMode>) -> Result<DataType, String> {
    if name == "bool" {
        if cast_mode.is_some() {
            return Err("a cast mode cannot be specified for bool".to_string());
        }
        return Ok(DataType::Boolean);
    }
    if let Some(digits) = name.strip_prefix("void") {
        if cast_mode.is_some() {
            return Err("a cast mode cannot be specified for void".to_string());
        }
        let bits = parse_width(digits, name)?;
        if !(1..=64).contains(&bits) {
            return Err(format!("void width {bits} is out of range [1, 64]"));
        }
        return Ok(DataType::Void(bits));
    }
    let cast_mode = cast_mode.unwrap_or_default();
    if let Some(digits) = name.strip_prefix("uint") {
        let bits = parse_integer_width(digits, name)?;
        return Ok(DataType::UnsignedInteger { bits, cast_mode });
    }
    if let Some(digits) = name.strip_prefix("int") {
        let bits = parse_integer_width(digits, name)?;
        return Ok(DataType::SignedInteger { bits, cast_mode });
    }
    if let Some(digits) = name.strip_prefix("float") {
        let bits = parse_width(digits, name)?;
        if !matches!(bits, 16 | 32 | 64) {
            return Err(format!("float width {bits} must be one of 16, 32 or 64"));
        }
        return Ok(DataType::Float { bits, cast_mode });
    }
    Err(format!("{name:?} is not a known primitive type"))
}

fn parse_width(digits: &str, full_name: &str) -> Result<u8, String> {
    digits
        .parse::<u8>()
        .map_err(|_| format!("{full_name:?} is not a valid primitive type name"))
}

fn parse_integer_width(digits: &str, full_name: &str) -> Result<u8, String> {
    let bits = parse_width(digits, full_name)?;
    if !(2..=64).contains(&bits) {
        return Err(format!("integer width {bits} is out of range [2, 64]"));
    }
    Ok(bits)
}

/// A cast mode on a composite-typed field or constant is rejected per §4.4.
pub fn composite(compound: Arc<CompoundType>, cast_mode: Option<CastMode>) -> Result<DataType, String> {
    if cast_mode.is_some() {
        return Err("a cast mode cannot be specified for compound types".to_string());
    }
    Ok(DataType::Composite(compound))
}

pub fn fixed_length_array(element: DataType, capacity: u64) -> Result<DataType, String> {
    if capacity < 1 {
        return Err(format!("array size {capacity} must be at least 1"));
    }
    Ok(DataType::FixedLengthArray { element: Box::new(element), capacity })
}

pub fn variable_length_array(element: DataType, max_capacity: u64) -> Result<DataType, String> {
    if max_capacity < 1 {
        return Err(format!("array size {max_capacity} must be at least 1"));
    }
    Ok(DataType::VariableLengthArray { element: Box::new(element), max_capacity })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_primitives_with_default_cast_mode() {
        let t = primitive_from_name("int8", None).unwrap();
        assert_eq!(t.to_string(), "saturated int8");
    }

    #[test]
    fn displays_truncated_variable_array() {
        let element = primitive_from_name("int64", Some(CastMode::Truncated)).unwrap();
        let array = variable_length_array(element, 32).unwrap();
        assert_eq!(array.to_string(), "truncated int64[<=32]");
    }

    #[test]
    fn rejects_integer_width_out_of_range() {
        assert!(primitive_from_name("int128", None).is_err());
        assert!(primitive_from_name("int1", None).is_err());
    }

    #[test]
    fn rejects_float_width_not_in_allowed_set() {
        assert!(primitive_from_name("float8", None).is_err());
        assert!(primitive_from_name("float32", None).is_ok());
    }

    #[test]
    fn uint10_range_matches_spec_example() {
        let t = primitive_from_name("uint10", None).unwrap();
        let (min, max) = t.integer_range().unwrap();
        assert_eq!(min, BigInt::from(0));
        assert_eq!(max, BigInt::from(1023));
    }

    #[test]
    fn bool_rejects_cast_mode() {
        assert!(primitive_from_name("bool", Some(CastMode::Saturated)).is_err());
    }

    #[test]
    fn array_of_size_zero_is_rejected() {
        let element = primitive_from_name("bool", None).unwrap();
        assert!(fixed_length_array(element, 0).is_err());
    }

    #[test]
    fn fixed_array_bit_length_is_k_fold_sum() {
        let element = primitive_from_name("uint8", None).unwrap();
        let array = fixed_length_array(element, 4).unwrap();
        assert_eq!(array.bit_length_set().min(), 32);
        assert_eq!(array.bit_length_set().max(), 32);
    }
}
