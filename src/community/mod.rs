//! Community collaborators
//!
//! Request/response glue around the core engine: welcome/verification,
//! support tickets, FAQ auto-reply, and leaderboard formatting. These
//! consume the Reputation Store and gateway through the same interfaces as
//! the moderation pipeline but carry no enforcement logic of their own.

pub mod faq;
pub mod leaderboard;
pub mod onboarding;
pub mod ticket;

pub use faq::FaqStore;
pub use onboarding::Onboarding;
pub use ticket::{TicketDesk, TicketPriority, TicketState};
