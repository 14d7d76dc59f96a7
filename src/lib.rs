//! Appointment scheduling and conflict-resolution core for multi-tenant
//! service businesses.
//!
//! Callers hand the [`engine::Engine`] well-formed, already-authorized
//! booking requests. The engine resolves the referenced entities (client,
//! team member, category, services, package), derives the time window,
//! checks the team member's calendar for collisions, and persists the
//! outcome through a write-ahead log — all while holding that calendar's
//! write lock, so a conflict check and its write can never interleave with
//! a competing request for the same team member.
//!
//! Transport, authentication and profile management live in the embedding
//! service; this crate is the decision core and its data contracts.

pub mod clock;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod store;
pub mod wal;
