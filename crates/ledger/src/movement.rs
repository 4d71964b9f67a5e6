use toolroom_core::{DomainError, DomainResult};

use crate::allocation::Allocation;
use crate::entry::EntryAction;

/// A fully decided ledger movement: the new pool quantity, the new
/// allocation state, and the entry to append.
///
/// Planning is separated from persistence so every precondition in the
/// borrow/return contract is enforced in one pure place; a store's only job
/// is to read current state, plan, and apply all three effects atomically.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Movement {
    pub action: EntryAction,
    pub quantity: i64,
    pub pool_before: i64,
    pub pool_after: i64,
    pub allocation_after: Allocation,
}

/// Plan moving `quantity` units from the pool into a project's allocation.
///
/// Preconditions: `quantity > 0` and `pool >= quantity`. No partial borrow:
/// an insufficient pool rejects the whole request.
pub fn plan_borrow(pool: i64, allocation: Allocation, quantity: i64) -> DomainResult<Movement> {
    require_positive(quantity)?;
    if pool < quantity {
        return Err(DomainError::invariant(format!(
            "insufficient pool quantity: have {pool}, requested {quantity}"
        )));
    }

    let held = allocation.quantity();
    let new_held = held
        .checked_add(quantity)
        .ok_or_else(|| DomainError::invariant("allocation quantity overflow"))?;

    Ok(Movement {
        action: EntryAction::Borrow,
        quantity,
        pool_before: pool,
        pool_after: pool - quantity,
        allocation_after: Allocation::Allocated(new_held),
    })
}

/// Plan moving `quantity` units back from a project's allocation into the
/// pool.
///
/// Preconditions: `quantity > 0`, an allocation exists, and it holds at
/// least `quantity`. Returning the last unit dissolves the allocation.
pub fn plan_return(pool: i64, allocation: Allocation, quantity: i64) -> DomainResult<Movement> {
    require_positive(quantity)?;

    let held = match allocation {
        Allocation::Unallocated => return Err(DomainError::not_found()),
        Allocation::Allocated(held) => held,
    };

    if held < quantity {
        return Err(DomainError::invariant(format!(
            "cannot return more than currently allocated: held {held}, requested {quantity}"
        )));
    }

    let pool_after = pool
        .checked_add(quantity)
        .ok_or_else(|| DomainError::invariant("pool quantity overflow"))?;

    let allocation_after = if held == quantity {
        Allocation::Unallocated
    } else {
        Allocation::Allocated(held - quantity)
    };

    Ok(Movement {
        action: EntryAction::Return,
        quantity,
        pool_before: pool,
        pool_after,
        allocation_after,
    })
}

fn require_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(())
}
