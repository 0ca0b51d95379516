//! Warden - Reputation-Weighted Moderation Engine
//!
//! Real-time moderation for a group-messaging community: scores member
//! trustworthiness, detects flooding and abusive content, and escalates
//! enforcement (delete -> warn -> mute -> ban) without human intervention
//! on the common path. Message transport is a consumed capability; the
//! engine is invoked in-process by the surrounding bot-framework glue.
//!
//! ## Module Structure
//!
//! ```text
//! warden/src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── config.rs      - Policy constants & configuration management
//! ├── error.rs       - Engine error taxonomy
//! ├── reputation/    - Reputation Store (single writer)
//! │   ├── member.rs     - Member records & activity counters
//! │   └── store.rs      - Atomic per-member score operations
//! ├── flood.rs       - Reputation-scaled sliding-window flood detector
//! ├── classify/      - Content classifier contract
//! │   └── keyword.rs    - Keyword-matching stand-in
//! ├── escalation/    - Escalation state machine
//! │   ├── action.rs     - Events, enforcement actions, outcomes
//! │   └── engine.rs     - Decision pipeline & moderator commands
//! ├── warns.rs       - Append-only warn ledger
//! ├── gateway.rs     - Chat transport collaborator contract
//! ├── sweep.rs       - Periodic maintenance loop
//! ├── community/     - Onboarding, tickets, FAQ, leaderboard
//! └── database/      - PostgreSQL persistence mirrors
//! ```

pub mod classify;
pub mod community;
pub mod config;
pub mod database;
pub mod error;
pub mod escalation;
pub mod flood;
pub mod gateway;
pub mod reputation;
pub mod sweep;
pub mod warns;

/// Opaque stable member identity.
pub type MemberId = i64;
/// Chat (group) identity.
pub type ChatId = i64;
/// Review/broadcast channel identity.
pub type ChannelId = i64;

// Re-export main types for convenience
pub use classify::{
    ContentClassifier, GuardedClassifier, KeywordClassifier, MediaVerdict, TextVerdict,
};
pub use community::{FaqStore, Onboarding, TicketDesk, TicketPriority, TicketState};
pub use config::{
    init_logging, ClassifierConfig, Config, DatabaseConfig, EscalationPolicy, FloodPolicy,
    LoggingConfig, ReputationPolicy, SweepPolicy,
};
pub use database::DatabasePool;
pub use error::EngineError;
pub use escalation::{
    CommandOutcome, EnforcementAction, EscalationEngine, EventOutcome, MessageEvent, ReplyTarget,
};
pub use flood::{FloodDetector, FloodVerdict};
pub use gateway::{
    ChatGateway, ChatPermissions, MessageRef, NoticeTarget, ReviewAction, REVIEW_ACTIONS,
};
pub use reputation::{ActivityCounter, MemberRecord, ReputationStore};
pub use sweep::{PeriodicSweep, TransientState};
pub use warns::{WarnIssuer, WarnLedger, WarnRecord, AUTOMATIC_ISSUER_ID};
