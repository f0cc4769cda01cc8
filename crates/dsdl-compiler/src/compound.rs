//! Compound types: the output of the builder. `spec.md` §3.
//!
//! Immutable once constructed, per the lifecycle section: a `CompoundType`
//! never changes after `builder::build` returns it, so it is always handed
//! around behind a [`triomphe::Arc`] rather than cloned.

use std::fmt;
use std::path::{Path, PathBuf};

use triomphe::Arc;

use crate::bit_length_set::{bits_to_represent, BitLengthSet};
use crate::data_type::DataType;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Attribute {
    Field { data_type: DataType, name: String },
    /// Anonymous: excluded from the name-uniqueness check and from
    /// `number_of_variants`.
    PaddingField { data_type: DataType },
    Constant {
        data_type: DataType,
        name: String,
        value: Value,
        source_expression_text: String,
    },
}

impl Attribute {
    pub fn name(&self) -> Option<&str> {
        match self {
            Attribute::Field { name, .. } | Attribute::Constant { name, .. } => Some(name),
            Attribute::PaddingField { .. } => None,
        }
    }

    pub fn data_type(&self) -> &DataType {
        match self {
            Attribute::Field { data_type, .. }
            | Attribute::PaddingField { data_type, .. }
            | Attribute::Constant { data_type, .. } => data_type,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Field { data_type, name } => write!(f, "{data_type} {name}"),
            Attribute::PaddingField { data_type } => write!(f, "{data_type}"),
            Attribute::Constant { data_type, name, .. } => write!(f, "{data_type} {name}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommonInfo {
    pub full_name: String,
    pub version: (u16, u16),
    pub deprecated: bool,
    pub fixed_port_id: Option<u16>,
    pub source_path: PathBuf,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug)]
pub enum CompoundType {
    Structure(CommonInfo),
    /// Builder guarantees `attributes.len() >= 2` and no `PaddingField`.
    Union(CommonInfo),
    Service {
        common: CommonInfo,
        request_type: Arc<CompoundType>,
        response_type: Arc<CompoundType>,
    },
}

impl CompoundType {
    pub fn common(&self) -> &CommonInfo {
        match self {
            CompoundType::Structure(c) | CompoundType::Union(c) => c,
            CompoundType::Service { common, .. } => common,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.common().full_name
    }

    pub fn version(&self) -> (u16, u16) {
        self.common().version
    }

    pub fn deprecated(&self) -> bool {
        self.common().deprecated
    }

    pub fn has_regulated_port_id(&self) -> bool {
        self.common().fixed_port_id.is_some()
    }

    pub fn fixed_port_id(&self) -> Option<u16> {
        self.common().fixed_port_id
    }

    pub fn source_path(&self) -> &Path {
        &self.common().source_path
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.common().attributes
    }

    pub fn fields(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes()
            .iter()
            .filter(|a| matches!(a, Attribute::Field { .. } | Attribute::PaddingField { .. }))
    }

    pub fn constants(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes().iter().filter(|a| matches!(a, Attribute::Constant { .. }))
    }

    /// Number of union variants, i.e. non-padding fields; `0` for a
    /// structure or a service.
    pub fn number_of_variants(&self) -> usize {
        match self {
            CompoundType::Union(common) => {
                common.attributes.iter().filter(|a| matches!(a, Attribute::Field { .. })).count()
            }
            _ => 0,
        }
    }

    pub fn request_type(&self) -> Option<&Arc<CompoundType>> {
        match self {
            CompoundType::Service { request_type, .. } => Some(request_type),
            _ => None,
        }
    }

    pub fn response_type(&self) -> Option<&Arc<CompoundType>> {
        match self {
            CompoundType::Service { response_type, .. } => Some(response_type),
            _ => None,
        }
    }

    /// Structure: Minkowski sum of its fields' sets (a field-less structure
    /// is `{0}`). Union: tag width plus the union of its variants' sets.
    /// Service: always `{0}` — its substance lives in request/response.
    pub fn bit_length_set(&self) -> BitLengthSet {
        match self {
            CompoundType::Structure(common) => common
                .attributes
                .iter()
                .filter_map(field_bit_length_set)
                .fold(BitLengthSet::single(0), |acc, s| acc.minkowski_sum(&s)),
            CompoundType::Union(common) => {
                let mut variants = common.attributes.iter().filter_map(field_bit_length_set);
                let first = variants.next().expect("union has at least two variants");
                let union_of_variants = variants.fold(first, |acc, s| acc.union(&s));
                let tag_bits = bits_to_represent(self.number_of_variants().max(2) as u64) as u64;
                union_of_variants.shift(tag_bits)
            }
            CompoundType::Service { .. } => BitLengthSet::single(0),
        }
    }
}

fn field_bit_length_set(attr: &Attribute) -> Option<BitLengthSet> {
    match attr {
        Attribute::Field { data_type, .. } | Attribute::PaddingField { data_type, .. } => {
            Some(data_type.bit_length_set())
        }
        Attribute::Constant { .. } => None,
    }
}
