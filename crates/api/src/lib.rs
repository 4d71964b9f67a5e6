//! `toolroom-api` — HTTP surface for the allocation ledger.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
