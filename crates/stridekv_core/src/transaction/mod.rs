//! Optimistic transactions with snapshot isolation.
//!
//! - **Atomicity**: a commit applies every staged write under one version
//!   or none of them
//! - **Isolation**: staged writes are private until commit; snapshot
//!   transactions read one fixed version
//! - **Validation**: reads tracked with [`Options::TRACK_READS`] are
//!   checked against the store at commit
//!
//! [`Options::TRACK_READS`]: crate::Options::TRACK_READS

mod manager;
mod state;

pub use manager::TransactionManager;
pub use state::{Conflict, PendingWrite, Transaction, TransactionState};
