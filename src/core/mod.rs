//! In-memory authoritative roster store.

/// Event roster store and its closed-event guard.
pub mod store;
