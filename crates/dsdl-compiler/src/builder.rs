//! Statement-stream consumer, `spec.md` §4.4: turns the parsed statement
//! stream of one definition into a [`CompoundType`]. Mirrors `_TypeBuilder`
//! in the original implementation, generalized to the exact directive and
//! attribute rules `spec.md` specifies.

use indexmap::IndexSet;
use triomphe::Arc;

use dsdl_parser::{ArraySuffix, CastModeKeyword, DefinitionDescriptor, Expr, Statement, TypeExpr, TypeExprBase};

use crate::bit_length_set::{bits_to_represent, BitLengthSet};
use crate::compound::{Attribute, CommonInfo, CompoundType};
use crate::data_type::{self, CastMode, DataType};
use crate::error::{ErrorKind, FrontendError};
use crate::evaluator::{evaluate, Environment};
use crate::value::Value;
use crate::ConfigurationOptions;

/// Resolves a composite type reference to its parsed, immutable peer.
/// Implemented by the resolver, which is the only thing holding the lookup
/// library and the recursion machinery.
pub(crate) trait CompositeLookup {
    fn resolve_composite(
        &self,
        current_namespace: &str,
        name: &str,
        major: u8,
        minor: Option<u8>,
    ) -> Result<Arc<CompoundType>, FrontendError>;
}

struct Accumulator {
    attributes: Vec<Attribute>,
    union: bool,
    empty: bool,
    seen_names: IndexSet<String>,
}

impl Accumulator {
    fn new() -> Self {
        Accumulator { attributes: Vec::new(), union: false, empty: true, seen_names: IndexSet::new() }
    }

    fn number_of_fields(&self) -> usize {
        self.attributes.iter().filter(|a| matches!(a, Attribute::Field { .. })).count()
    }

    /// The bit-length set of everything accumulated so far; surfaced to the
    /// evaluator as `_offset_`. Mirrors the formula `CompoundType` uses at
    /// finalisation, computed live and tolerant of a union with fewer than
    /// two variants so far (which is not yet a valid finished union, but
    /// `_offset_` may legitimately be read before the second variant lands).
    fn current_bit_length_set(&self) -> BitLengthSet {
        let field_sets: Vec<BitLengthSet> = self
            .attributes
            .iter()
            .filter_map(|a| match a {
                Attribute::Field { data_type, .. } | Attribute::PaddingField { data_type } => {
                    Some(data_type.bit_length_set())
                }
                Attribute::Constant { .. } => None,
            })
            .collect();

        if !self.union {
            return field_sets.into_iter().fold(BitLengthSet::single(0), |acc, s| acc.minkowski_sum(&s));
        }
        if field_sets.is_empty() {
            return BitLengthSet::single(0);
        }
        let mut iter = field_sets.into_iter();
        let first = iter.next().expect("checked non-empty above");
        let union_of_variants = iter.fold(first, |acc, s| acc.union(&s));
        let tag_bits = bits_to_represent((self.number_of_fields() as u64).max(2));
        union_of_variants.shift(tag_bits as u64)
    }

    fn add_named(&mut self, name: &str) -> Result<(), FrontendError> {
        if !self.seen_names.insert(name.to_string()) {
            return Err(FrontendError::new(ErrorKind::AttributeNameCollision(format!(
                "multiple attributes under the same name {name:?}"
            ))));
        }
        Ok(())
    }
}

impl Environment for Accumulator {
    fn resolve(&self, name: &str) -> Option<Value> {
        if name == "_offset_" {
            Some(Value::Set(self.current_bit_length_set().to_value_set()))
        } else {
            None
        }
    }
}

pub(crate) struct Builder<'a> {
    descriptor: &'a DefinitionDescriptor,
    lookup: &'a dyn CompositeLookup,
    options: &'a ConfigurationOptions<'a>,
    accumulators: Vec<Accumulator>,
    deprecated: bool,
}

pub(crate) fn build(
    descriptor: &DefinitionDescriptor,
    statements: &[Statement],
    lookup: &dyn CompositeLookup,
    options: &ConfigurationOptions,
) -> Result<CompoundType, FrontendError> {
    let mut builder = Builder {
        descriptor,
        lookup,
        options,
        accumulators: vec![Accumulator::new()],
        deprecated: false,
    };
    for statement in statements {
        builder.consume(statement)?;
    }
    builder.finalize()
}

fn type_param(message: impl Into<String>) -> FrontendError {
    FrontendError::new(ErrorKind::TypeParameter(message.into()))
}

fn invalid_directive(message: impl Into<String>) -> FrontendError {
    FrontendError::new(ErrorKind::InvalidDirectiveUsage(message.into()))
}

impl<'a> Builder<'a> {
    fn current(&mut self) -> &mut Accumulator {
        self.accumulators.last_mut().expect("at least one accumulator always exists")
    }

    fn consume(&mut self, statement: &Statement) -> Result<(), FrontendError> {
        tracing::trace!(full_name = %self.descriptor.full_name, ?statement, "consuming statement");
        match statement {
            Statement::Directive { line, name, expr } => {
                self.on_directive(name, expr.as_ref(), *line)
                    .map_err(|e| e.stamp_location_if_unknown(&self.descriptor.path, Some(*line)))
            }
            Statement::ServiceResponseMarker { line } => {
                if self.accumulators.len() > 1 {
                    return Err(FrontendError::at_line(
                        ErrorKind::InvalidDirectiveUsage(
                            "duplicated service response marker".to_string(),
                        ),
                        *line,
                    ));
                }
                self.accumulators.push(Accumulator::new());
                Ok(())
            }
            Statement::Field { line, type_expr, name } => self
                .on_field(type_expr, name)
                .map_err(|e| e.stamp_location_if_unknown(&self.descriptor.path, Some(*line))),
            Statement::PaddingField { line, bits } => self
                .on_padding_field(*bits)
                .map_err(|e| e.stamp_location_if_unknown(&self.descriptor.path, Some(*line))),
            Statement::Constant { line, type_expr, name, value_expr, source_expression_text } => self
                .on_constant(type_expr, name, value_expr, source_expression_text)
                .map_err(|e| e.stamp_location_if_unknown(&self.descriptor.path, Some(*line))),
        }
    }

    fn on_directive(&mut self, name: &str, expr: Option<&Expr>, line: u32) -> Result<(), FrontendError> {
        match name {
            "print" => self.on_print_directive(expr, line),
            "assert" => self.on_assert_directive(expr),
            "union" => self.on_union_directive(expr),
            "deprecated" => self.on_deprecated_directive(expr),
            other => Err(FrontendError::new(ErrorKind::InvalidDirectiveUsage(format!(
                "{other:?} is not a known directive"
            )))),
        }
    }

    fn on_print_directive(&mut self, expr: Option<&Expr>, line: u32) -> Result<(), FrontendError> {
        let value = expr.map(|e| evaluate(e, self.current())).transpose()?;
        if let Some(handler) = self.options.print_handler.as_ref() {
            handler(self.descriptor, line, value.as_ref());
        }
        Ok(())
    }

    fn on_assert_directive(&mut self, expr: Option<&Expr>) -> Result<(), FrontendError> {
        let expr = expr.ok_or_else(|| invalid_directive("the assert directive requires an expression"))?;
        let value = evaluate(expr, self.current())?;
        match value {
            Value::Boolean(true) => {
                tracing::debug!(full_name = %self.descriptor.full_name, "assertion check passed");
                Ok(())
            }
            Value::Boolean(false) => {
                if self.options.skip_assertion_checks {
                    tracing::warn!(full_name = %self.descriptor.full_name, "assertion check failed, ignored");
                    Ok(())
                } else {
                    Err(FrontendError::new(ErrorKind::AssertionCheckFailure(
                        "assertion check has failed".to_string(),
                    )))
                }
            }
            other => Err(invalid_directive(format!(
                "the assertion check expression must yield a boolean, not a {}",
                other.type_name()
            ))),
        }
    }

    fn on_union_directive(&mut self, expr: Option<&Expr>) -> Result<(), FrontendError> {
        if expr.is_some() {
            return Err(invalid_directive("the union directive does not expect an expression"));
        }
        let acc = self.current();
        if acc.union {
            return Err(invalid_directive("duplicated union directive"));
        }
        if !acc.empty {
            return Err(invalid_directive(
                "the union directive must be placed before the first attribute definition",
            ));
        }
        acc.union = true;
        Ok(())
    }

    fn on_deprecated_directive(&mut self, expr: Option<&Expr>) -> Result<(), FrontendError> {
        if expr.is_some() {
            return Err(invalid_directive("the deprecated directive does not expect an expression"));
        }
        if self.deprecated {
            return Err(invalid_directive("duplicated deprecated directive"));
        }
        if self.accumulators.len() > 1 {
            return Err(invalid_directive("the deprecated directive cannot be placed in the response section"));
        }
        if !self.current().empty {
            return Err(invalid_directive(
                "the deprecated directive must be placed before the first attribute definition",
            ));
        }
        self.deprecated = true;
        Ok(())
    }

    fn on_field(&mut self, type_expr: &TypeExpr, name: &str) -> Result<(), FrontendError> {
        let data_type = self.resolve_data_type(type_expr)?;
        let acc = self.current();
        acc.add_named(name)?;
        acc.attributes.push(Attribute::Field { data_type, name: name.to_string() });
        acc.empty = false;
        Ok(())
    }

    fn on_padding_field(&mut self, bits: u8) -> Result<(), FrontendError> {
        let acc = self.current();
        if acc.union {
            return Err(type_param("a tagged union cannot contain padding fields"));
        }
        acc.attributes.push(Attribute::PaddingField { data_type: DataType::Void(bits) });
        acc.empty = false;
        Ok(())
    }

    fn on_constant(
        &mut self,
        type_expr: &TypeExpr,
        name: &str,
        value_expr: &Expr,
        source_expression_text: &str,
    ) -> Result<(), FrontendError> {
        if type_expr.array.is_some() {
            return Err(type_param("a constant's type cannot be an array"));
        }
        let TypeExprBase::Primitive(primitive_name) = &type_expr.base else {
            return Err(type_param("a constant's declared type must be primitive"));
        };
        let cast_mode = type_expr.cast_mode.map(from_cast_mode_keyword);
        let data_type = data_type::primitive_from_name(primitive_name, cast_mode).map_err(type_param)?;

        let is_char_literal = matches!(value_expr, Expr::CharLiteral(_));
        let raw_value = evaluate(value_expr, self.current())?;
        let value = coerce_constant_value(&data_type, raw_value, is_char_literal)?;

        let acc = self.current();
        acc.add_named(name)?;
        acc.attributes.push(Attribute::Constant {
            data_type,
            name: name.to_string(),
            value,
            source_expression_text: source_expression_text.to_string(),
        });
        acc.empty = false;
        Ok(())
    }

    fn resolve_data_type(&self, type_expr: &TypeExpr) -> Result<DataType, FrontendError> {
        let cast_mode = type_expr.cast_mode.map(from_cast_mode_keyword);
        let base = match &type_expr.base {
            TypeExprBase::Primitive(name) => {
                data_type::primitive_from_name(name, cast_mode).map_err(type_param)?
            }
            TypeExprBase::Composite { name, major, minor } => {
                let compound =
                    self.lookup.resolve_composite(&self.descriptor.full_namespace, name, *major, *minor)?;
                data_type::composite(compound, cast_mode).map_err(type_param)?
            }
        };
        match type_expr.array {
            None => Ok(base),
            Some(ArraySuffix::Fixed(n)) => data_type::fixed_length_array(base, n).map_err(type_param),
            Some(ArraySuffix::VariableInclusiveMax(n)) => {
                data_type::variable_length_array(base, n).map_err(type_param)
            }
        }
    }

    fn finalize(self) -> Result<CompoundType, FrontendError> {
        let descriptor = self.descriptor;
        match self.accumulators.len() {
            1 => {
                let [acc] = <[Accumulator; 1]>::try_from(self.accumulators).ok().expect("checked len == 1");
                let compound = build_message(descriptor, acc, self.deprecated)?;
                Ok(compound)
            }
            2 => {
                let mut iter = self.accumulators.into_iter();
                let request_acc = iter.next().expect("checked len == 2");
                let response_acc = iter.next().expect("checked len == 2");
                let request_common = CommonInfo {
                    full_name: format!("{}.Request", descriptor.full_name),
                    version: descriptor.version,
                    deprecated: self.deprecated,
                    fixed_port_id: None,
                    source_path: descriptor.path.clone(),
                    attributes: request_acc.attributes,
                };
                let response_common = CommonInfo {
                    full_name: format!("{}.Response", descriptor.full_name),
                    version: descriptor.version,
                    deprecated: self.deprecated,
                    fixed_port_id: None,
                    source_path: descriptor.path.clone(),
                    attributes: response_acc.attributes,
                };
                check_union_size(request_acc.union, &request_common)?;
                check_union_size(response_acc.union, &response_common)?;
                check_name_collisions(&request_common)?;
                check_name_collisions(&response_common)?;
                let request_type = Arc::new(finalize_struct_or_union(request_acc.union, request_common));
                let response_type = Arc::new(finalize_struct_or_union(response_acc.union, response_common));

                let service_common = CommonInfo {
                    full_name: descriptor.full_name.clone(),
                    version: descriptor.version,
                    deprecated: self.deprecated,
                    fixed_port_id: descriptor.fixed_port_id,
                    source_path: descriptor.path.clone(),
                    attributes: vec![
                        Attribute::Field { data_type: DataType::Composite(request_type.clone()), name: "request".to_string() },
                        Attribute::Field { data_type: DataType::Composite(response_type.clone()), name: "response".to_string() },
                    ],
                };
                Ok(CompoundType::Service { common: service_common, request_type, response_type })
            }
            _ => unreachable!("at most two accumulators ever exist"),
        }
    }
}

fn from_cast_mode_keyword(keyword: CastModeKeyword) -> CastMode {
    match keyword {
        CastModeKeyword::Saturated => CastMode::Saturated,
        CastModeKeyword::Truncated => CastMode::Truncated,
    }
}

fn check_union_size(is_union: bool, common: &CommonInfo) -> Result<(), FrontendError> {
    if !is_union {
        return Ok(());
    }
    let variants = common.attributes.iter().filter(|a| matches!(a, Attribute::Field { .. })).count();
    if variants < 2 {
        return Err(FrontendError::new(ErrorKind::TypeParameter(
            "a tagged union cannot contain less than two variants".to_string(),
        )));
    }
    Ok(())
}

fn check_name_collisions(common: &CommonInfo) -> Result<(), FrontendError> {
    let mut seen = IndexSet::new();
    for attribute in &common.attributes {
        if let Some(name) = attribute.name() {
            if !seen.insert(name) {
                return Err(FrontendError::new(ErrorKind::AttributeNameCollision(format!(
                    "multiple attributes under the same name {name:?}"
                ))));
            }
        }
    }
    Ok(())
}

fn finalize_struct_or_union(is_union: bool, common: CommonInfo) -> CompoundType {
    if is_union {
        CompoundType::Union(common)
    } else {
        CompoundType::Structure(common)
    }
}

fn build_message(
    descriptor: &DefinitionDescriptor,
    acc: Accumulator,
    deprecated: bool,
) -> Result<CompoundType, FrontendError> {
    let common = CommonInfo {
        full_name: descriptor.full_name.clone(),
        version: descriptor.version,
        deprecated,
        fixed_port_id: descriptor.fixed_port_id,
        source_path: descriptor.path.clone(),
        attributes: acc.attributes,
    };
    check_union_size(acc.union, &common)?;
    check_name_collisions(&common)?;
    Ok(finalize_struct_or_union(acc.union, common))
}

/// Coerces an evaluated constant value into its declared type, §4.4.
/// `is_char_literal` distinguishes a literal `'x'` from an arbitrary
/// rational-valued expression, since only the former may be assigned to a
/// `uint8` constant (and only when its code point is ASCII).
fn coerce_constant_value(data_type: &DataType, value: Value, is_char_literal: bool) -> Result<Value, FrontendError> {
    match data_type {
        DataType::Boolean => {
            if is_char_literal {
                return Err(type_param(
                    "a character literal cannot be assigned to a boolean-typed constant",
                ));
            }
            match value {
                Value::Boolean(b) => Ok(Value::Boolean(b)),
                other => Err(type_param(format!(
                    "invalid value for boolean constant: a {} is not true/false",
                    other.type_name()
                ))),
            }
        }
        DataType::UnsignedInteger { .. } | DataType::SignedInteger { .. } => {
            if is_char_literal {
                if !data_type.is_unsigned_integer(8) {
                    return Err(type_param(format!(
                        "a character literal can only be assigned to a uint8-typed constant, not {data_type} (type mismatch)"
                    )));
                }
                let code_point = match &value {
                    Value::Rational(r) => r.to_integer(),
                    _ => unreachable!("character literals always evaluate to a rational"),
                };
                if code_point > num_bigint::BigInt::from(127) {
                    return Err(type_param(
                        "a character literal outside the ASCII range cannot be assigned to uint8",
                    ));
                }
                return Ok(value);
            }
            let rational = match value {
                Value::Rational(r) => r,
                other => {
                    return Err(type_param(format!(
                        "a rational value is required for an integer constant, found a {} (type mismatch)",
                        other.type_name()
                    )))
                }
            };
            if !rational.is_integer() {
                return Err(type_param("an integer constant's value must have an integral type"));
            }
            let (min, max) = data_type.integer_range().expect("integer type always has a range");
            let as_int = rational.to_integer();
            if as_int < min || as_int > max {
                return Err(type_param(format!("value {as_int} exceeds the range of {data_type}")));
            }
            Ok(Value::Rational(rational))
        }
        DataType::Float { .. } => {
            if is_char_literal {
                return Err(type_param(
                    "a character literal cannot be assigned to a constant of a floating-point type",
                ));
            }
            match value {
                Value::Rational(r) => Ok(Value::Rational(r)),
                other => Err(type_param(format!(
                    "a rational value is required for a floating-point constant, found a {} (type mismatch)",
                    other.type_name()
                ))),
            }
        }
        _ => Err(type_param("a constant's type must be boolean, integer or floating-point")),
    }
}
