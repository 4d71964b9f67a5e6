use serde::{Deserialize, Serialize};

use toolroom_core::{DomainError, DomainResult};

/// Current allocation state of one item for one project.
///
/// An allocation of zero is indistinguishable from no allocation, so zero is
/// simply not representable: `Allocated` always carries a positive quantity,
/// and stores translate row absence to `Unallocated` (no zero-quantity rows
/// persist).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Allocation {
    Unallocated,
    Allocated(i64),
}

impl Allocation {
    /// Translate a stored row quantity into an allocation state.
    ///
    /// Zero maps to `Unallocated` for callers that treat a missing row as
    /// quantity 0; negative quantities can only come from corrupted storage.
    pub fn from_quantity(quantity: i64) -> DomainResult<Self> {
        match quantity {
            0 => Ok(Allocation::Unallocated),
            q if q > 0 => Ok(Allocation::Allocated(q)),
            q => Err(DomainError::invariant(format!(
                "allocation quantity cannot be negative (found {q})"
            ))),
        }
    }

    /// Quantity currently held (0 when unallocated).
    pub fn quantity(&self) -> i64 {
        match self {
            Allocation::Unallocated => 0,
            Allocation::Allocated(q) => *q,
        }
    }

    pub fn is_allocated(&self) -> bool {
        matches!(self, Allocation::Allocated(_))
    }
}
