//! Regulated port-ID ranges, `spec.md` §4.6. Concrete numeric ranges are not
//! given by `spec.md` itself; see `DESIGN.md` for where these come from.

use crate::compound::CompoundType;
use crate::error::{ErrorKind, FrontendError};

const REGULATED_SUBJECT_ID_MAX: u16 = 6143;
const REGULATED_SERVICE_ID_MAX: u16 = 255;

pub fn is_valid_regulated_subject_id(port_id: u16) -> bool {
    port_id <= REGULATED_SUBJECT_ID_MAX
}

pub fn is_valid_regulated_service_id(port_id: u16) -> bool {
    port_id <= REGULATED_SERVICE_ID_MAX
}

/// Validates `compound`'s fixed port-ID, if it has one, against the
/// regulated range appropriate to whether it is a service or a message.
pub fn validate_fixed_port_id(compound: &CompoundType) -> Result<(), FrontendError> {
    let Some(port_id) = compound.fixed_port_id() else {
        return Ok(());
    };
    let is_service = matches!(compound, CompoundType::Service { .. });
    let valid = if is_service {
        is_valid_regulated_service_id(port_id)
    } else {
        is_valid_regulated_subject_id(port_id)
    };
    if valid {
        Ok(())
    } else {
        Err(FrontendError::new(ErrorKind::InvalidFixedPortId(format!(
            "regulated port-ID {port_id} is not valid for {} type {:?}; consider allow_unregulated_fixed_port_id",
            if is_service { "service" } else { "message" },
            compound.full_name()
        ))))
    }
}
