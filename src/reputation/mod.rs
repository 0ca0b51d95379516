//! Reputation Store
//!
//! Durable mapping from member identity to trust score and activity
//! counters. This is the only place reputation is read or written; every
//! other component mutates it through atomic per-member operations.
//!
//! ## Score Model
//!
//! - Members are created lazily on first observation with the configured
//!   default score (baseline 50)
//! - Clean activity earns a small reward (+0.1 per message)
//! - Violations apply fixed penalties decided by the escalation engine
//! - Adjustments clamp into the configured bound (default `[0, 100]`);
//!   clamping is policy, not a hard invariant, and can be disabled
//!
//! Records are never deleted. Flood windows and other transient state live
//! elsewhere; only reputation and counters persist.

mod member;
mod store;

pub use member::{ActivityCounter, MemberRecord};
pub use store::ReputationStore;
