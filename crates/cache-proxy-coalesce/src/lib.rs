//! Single-flight request coalescing.
//!
//! For a given fingerprint, at most one concurrent execution is allowed to
//! run the producer ("the leader"); every other concurrent caller for the
//! same fingerprint ("a follower") waits for the leader's completion signal
//! and then re-enters the caller's own strategy path, which by then should
//! find a cache hit.
//!
//! Unlike a broadcast-based coalescer, the slot here never carries the
//! leader's response payload — only a success/failure marker — because the
//! response is expected to already be sitting in the cache by the time a
//! follower wakes up. This keeps the coalescer decoupled from whatever the
//! producer actually returns.
//!
//! # Prior art
//!
//! This pattern is also known as singleflight (Go's
//! `golang.org/x/sync/singleflight`), request deduplication, or request
//! collapsing.

mod config;
mod dedup;
mod events;

pub use config::{CoalesceConfig, CoalesceConfigBuilder};
pub use dedup::{Attempt, Deduper, Follower, FollowerOutcome, LeaderGuard};
pub use events::CoalesceEvent;
