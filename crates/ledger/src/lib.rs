//! Allocation ledger domain module.
//!
//! This crate contains the business rules for moving item quantity between a
//! tenant's pool and its per-project allocations, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).
//!
//! The pool conservation law the module maintains: for any item, the sum of
//! all project allocations plus the remaining pool quantity equals the total
//! quantity the tenant holds. Both movements preserve it by construction,
//! and [`replay`] can rebuild the allocation side from the entry log to
//! detect drift.

pub mod allocation;
pub mod entry;
pub mod movement;
pub mod replay;

pub use allocation::Allocation;
pub use entry::{EntryAction, LedgerEntry};
pub use movement::{plan_borrow, plan_return, Movement};
pub use replay::{check_log, diff_allocations, rebuild_allocations, AllocationDrift, LogBreak};
