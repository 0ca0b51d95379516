//! Escalation Engine
//!
//! Central state machine of the moderation pipeline. Consumes flood and
//! classifier verdicts, consults the warn ledger, decides an enforcement
//! action, and commits the reputation delta.
//!
//! ## Enforcement tiers
//!
//! Tiers are derived from the cumulative warn count, never stored:
//!
//! ```text
//! warn count      0 .. mute_threshold   -> Tier 0: log + penalty
//! mute_threshold .. ban_threshold       -> Tier 1: 24h mute on the warn
//! ban_threshold ..                      -> Tier 2: ban
//! ```
//!
//! Flood mutes are an independent enforcement path with their own, shorter
//! duration; both paths may fire for one member over time and re-issued
//! mutes/bans are no-ops rather than errors.
//!
//! ## Per-event decision order
//!
//! 1. administrative exemption (skip entirely)
//! 2. flood check (cheap, in-memory, first)
//! 3. content classification (bounded external call)
//! 4. clean: activity logging + participation reward
//!
//! Events for one member are serialized through a per-member gate and apply
//! in arrival order; members never block each other.

mod action;
mod engine;

pub use action::{
    CommandOutcome, EnforcementAction, EventOutcome, MessageEvent, ReplyTarget,
};
pub use engine::EscalationEngine;
