//! One async session per open event: a single writer task in front of a
//! [`RosterStore`](crate::core::store::RosterStore), with roster events
//! broadcast to every subscriber.

/// Roster events broadcast by a session.
pub mod events;
/// Session handle, command loop and persistence worker.
pub mod handle;
