//! `toolroom-store` — persistence for the catalog and the allocation ledger.
//!
//! Two backends implement the same [`LedgerStore`] seam:
//!
//! - [`InMemoryStore`]: mutex-guarded maps for dev and tests
//! - [`PgStore`]: Postgres via sqlx, one database transaction per movement
//!
//! ## Tenant isolation
//!
//! Every query includes `tenant_id` in its key or WHERE clause. This makes
//! cross-tenant access architecturally impossible: another tenant's item or
//! project is indistinguishable from a missing one.
//!
//! ## Movement atomicity
//!
//! A borrow/return has three effects (pool update, allocation upsert/delete,
//! ledger append). Both backends apply all three or none: the in-memory
//! backend holds its state lock across the whole movement, the Postgres
//! backend wraps it in a transaction with `FOR UPDATE` row locks so
//! concurrent movements against the same item serialize.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod reconcile;
pub mod records;
pub mod store;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use query::{EntryFilter, EntryPage, Pagination};
pub use reconcile::ReconcileReport;
pub use records::{AllocationView, ItemSummary, MovementOutcome, ProjectSummary, TransactionView};
pub use store::LedgerStore;
