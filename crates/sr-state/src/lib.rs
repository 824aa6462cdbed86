//! sr-state
//!
//! The reconciliation state: two multiset counters, the database watermark
//! and low-water mark, aggregate counts, and the audit logs. Owned
//! exclusively by the batch reconciler (`sr-recon`) — nothing else reads or
//! writes the multisets.

mod multiset;
mod state;

pub use multiset::Multiset;
pub use state::{BadRow, BadRowReason, QueryWindow, ReconciliationState, StateInvariantViolation};
