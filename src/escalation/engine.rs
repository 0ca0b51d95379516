use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::classify::{ContentClassifier, GuardedClassifier, MediaVerdict, TextVerdict};
use crate::config::{Config, EscalationPolicy, FloodPolicy};
use crate::error::EngineError;
use crate::escalation::{
    CommandOutcome, EnforcementAction, EventOutcome, MessageEvent, ReplyTarget,
};
use crate::flood::FloodDetector;
use crate::gateway::{ChatGateway, ChatPermissions, NoticeTarget, ReviewAction, REVIEW_ACTIONS};
use crate::reputation::{ActivityCounter, ReputationStore};
use crate::sweep::TransientState;
use crate::warns::{WarnIssuer, WarnLedger};
use crate::{ChannelId, ChatId, MemberId};

/// Central moderation state machine.
///
/// One instance serves every chat the surrounding glue routes through it.
/// Processing for a single member is serialized through a per-member gate
/// (acquired in arrival order); the classifier call and gateway dispatches
/// are the only suspension points inside that critical section.
pub struct EscalationEngine {
    admin_ids: HashSet<MemberId>,
    review_channel: ChannelId,
    flood_policy: FloodPolicy,
    escalation: EscalationPolicy,
    activity_reward: f64,

    store: Arc<ReputationStore>,
    ledger: Arc<WarnLedger>,
    flood: Arc<FloodDetector>,
    classifier: GuardedClassifier,
    gateway: Arc<dyn ChatGateway>,

    /// Per-member processing gates; tokio mutexes hand out the lock in
    /// arrival order, which preserves per-member event ordering.
    gates: DashMap<MemberId, Arc<Mutex<()>>>,
    /// Enforcement bookkeeping so re-issued mutes/bans stay no-ops.
    muted_until: DashMap<MemberId, DateTime<Utc>>,
    banned: DashMap<MemberId, DateTime<Utc>>,
}

impl EscalationEngine {
    pub fn new(
        config: &Config,
        store: Arc<ReputationStore>,
        ledger: Arc<WarnLedger>,
        classifier: Arc<dyn ContentClassifier>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        let flood = Arc::new(FloodDetector::new(
            config.flood.clone(),
            config.reputation.max_score,
        ));
        let classifier = GuardedClassifier::new(
            classifier,
            std::time::Duration::from_secs(config.classifier.timeout_secs),
        );

        Self {
            admin_ids: config.admin_ids.iter().copied().collect(),
            review_channel: config.review_channel,
            flood_policy: config.flood.clone(),
            escalation: config.escalation.clone(),
            activity_reward: config.reputation.activity_reward,
            store,
            ledger,
            flood,
            classifier,
            gateway,
            gates: DashMap::new(),
            muted_until: DashMap::new(),
            banned: DashMap::new(),
        }
    }

    /// Shared handle to the flood detector, for sweep registration.
    pub fn flood_detector(&self) -> Arc<FloodDetector> {
        self.flood.clone()
    }

    /// Evaluate one inbound message through the moderation pipeline.
    pub async fn handle_message(
        &self,
        event: &MessageEvent,
    ) -> Result<EventOutcome, EngineError> {
        // (1) Administrative exemption skips the pipeline entirely.
        if self.admin_ids.contains(&event.sender) {
            debug!(member = event.sender, "Administrative exemption");
            return Ok(EventOutcome {
                action: EnforcementAction::None,
                reputation: self.store.get(event.sender),
                events_in_window: 0,
            });
        }

        let gate = self.gate(event.sender);
        let _serialized = gate.lock().await;

        // (2) Flood check runs first: cheap, in-memory, no suspension.
        let reputation = self.store.get(event.sender);
        let verdict = self.flood.observe(event.sender, reputation, event.sent_at);
        if !verdict.within_limit {
            return self.enforce_flood(event, verdict.events_in_window).await;
        }

        // (3) Content classification, bounded and fail-open.
        let mut alert = None;
        if let Some(ref body) = event.text {
            if self.classifier.classify_text(body).await == TextVerdict::Negative {
                alert = Some(format!(
                    "Toxic message detected from member {}.\n\nMessage: {}",
                    event.sender, body
                ));
            }
        }
        if alert.is_none() {
            if let Some(ref reference) = event.media {
                if self.classifier.classify_media(reference).await == MediaVerdict::Flagged {
                    alert = Some(format!(
                        "Flagged media from member {}: {}",
                        event.sender, reference
                    ));
                }
            }
        }
        if let Some(alert) = alert {
            return self
                .enforce_flagged_content(event, reputation, &alert, verdict.events_in_window)
                .await;
        }

        // (4) Clean event: count the activity and reward participation.
        self.store
            .record_activity(event.sender, ActivityCounter::MessagesSent)
            .await?;
        let reputation = self.store.adjust(event.sender, self.activity_reward).await?;

        Ok(EventOutcome {
            action: EnforcementAction::None,
            reputation,
            events_in_window: verdict.events_in_window,
        })
    }

    async fn enforce_flood(
        &self,
        event: &MessageEvent,
        events_in_window: u32,
    ) -> Result<EventOutcome, EngineError> {
        info!(
            member = event.sender,
            events = events_in_window,
            "Flood violation, muting member"
        );

        if let Err(e) = self.gateway.delete_message(event.reference()).await {
            error!(member = event.sender, "{}", EngineError::transport(e));
        }

        let mute = Duration::seconds(self.flood_policy.mute_secs);
        self.dispatch_mute(event.chat_id, event.sender, event.sent_at + mute)
            .await;

        let reputation = self
            .store
            .adjust(event.sender, -self.flood_policy.penalty)
            .await?;

        self.notify(
            NoticeTarget::Chat(event.chat_id),
            &format!(
                "Member {} has been muted for {} minutes due to message flooding.",
                event.sender,
                self.flood_policy.mute_secs / 60
            ),
        )
        .await;

        Ok(EventOutcome {
            action: EnforcementAction::Mute(mute),
            reputation,
            events_in_window,
        })
    }

    async fn enforce_flagged_content(
        &self,
        event: &MessageEvent,
        prior_reputation: f64,
        alert: &str,
        events_in_window: u32,
    ) -> Result<EventOutcome, EngineError> {
        info!(member = event.sender, "Flagged content, deleting message");

        if let Err(e) = self.gateway.delete_message(event.reference()).await {
            error!(member = event.sender, "{}", EngineError::transport(e));
        }

        // Human moderators get the alert with the full review palette.
        if let Err(e) = self
            .gateway
            .send_message(
                NoticeTarget::Channel(self.review_channel),
                alert,
                &REVIEW_ACTIONS,
            )
            .await
        {
            warn!(member = event.sender, "{}", EngineError::transport(e));
        }

        self.notify(
            NoticeTarget::Chat(event.chat_id),
            &format!(
                "Member {}: your message was flagged and has been removed.",
                event.sender
            ),
        )
        .await;

        let reputation = self
            .store
            .adjust(event.sender, -self.escalation.toxicity_penalty)
            .await?;

        // Members already below the low-trust bar lose posting rights for a
        // short period on top of the deletion.
        let action = if prior_reputation < self.escalation.low_trust_threshold {
            let mute = Duration::seconds(self.escalation.low_trust_mute_secs);
            self.dispatch_mute(event.chat_id, event.sender, event.sent_at + mute)
                .await;
            EnforcementAction::Mute(mute)
        } else {
            EnforcementAction::DeleteMessage
        };

        Ok(EventOutcome {
            action,
            reputation,
            events_in_window,
        })
    }

    /// Moderator `warn` command.
    ///
    /// Guard chain: reply context present, issuer authorized. Guards return
    /// typed failures before any state is touched.
    pub async fn warn_command(
        &self,
        issuer: MemberId,
        reply: Option<ReplyTarget>,
        reason: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let target = require_reply(reply)?;
        self.require_admin(issuer)?;
        self.issue_warn(WarnIssuer::Moderator(issuer), target.chat_id, target.member, reason)
            .await
    }

    /// Moderator `ban` command, same guard chain as `warn`.
    pub async fn ban_command(
        &self,
        issuer: MemberId,
        reply: Option<ReplyTarget>,
    ) -> Result<CommandOutcome, EngineError> {
        let target = require_reply(reply)?;
        self.require_admin(issuer)?;

        let gate = self.gate(target.member);
        let _serialized = gate.lock().await;
        self.ban_inner(target.chat_id, target.member).await
    }

    /// Apply one action from a review-channel alert.
    pub async fn apply_review_action(
        &self,
        issuer: MemberId,
        action: ReviewAction,
        chat_id: ChatId,
        subject: MemberId,
    ) -> Result<CommandOutcome, EngineError> {
        self.require_admin(issuer)?;

        match action {
            ReviewAction::Warn => {
                self.issue_warn(
                    WarnIssuer::Automatic,
                    chat_id,
                    subject,
                    "Flagged content confirmed by review",
                )
                .await
            }
            ReviewAction::Mute => {
                let gate = self.gate(subject);
                let _serialized = gate.lock().await;

                let mute = Duration::seconds(self.escalation.warn_mute_secs);
                self.dispatch_mute(chat_id, subject, Utc::now() + mute).await;
                self.notify(
                    NoticeTarget::Chat(chat_id),
                    &format!("Member {} has been muted following review.", subject),
                )
                .await;

                Ok(CommandOutcome {
                    action: EnforcementAction::Mute(mute),
                    reputation: self.store.get(subject),
                    warn_count: self.ledger.count_for(subject).await,
                })
            }
            ReviewAction::Ban => {
                let gate = self.gate(subject);
                let _serialized = gate.lock().await;
                self.ban_inner(chat_id, subject).await
            }
        }
    }

    /// Append a warn and escalate from the post-insert count.
    async fn issue_warn(
        &self,
        issuer: WarnIssuer,
        chat_id: ChatId,
        subject: MemberId,
        reason: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let gate = self.gate(subject);
        let _serialized = gate.lock().await;

        self.ledger.append(subject, issuer, reason).await?;
        // The post-insert count decides the tier, so the warn that crosses
        // a threshold escalates in this same call.
        let warn_count = self.ledger.count_for(subject).await;
        let reputation = self
            .store
            .adjust(subject, -self.escalation.warn_penalty)
            .await?;

        let action = if warn_count >= self.escalation.ban_threshold {
            self.execute_ban(chat_id, subject).await?;
            self.notify(
                NoticeTarget::Chat(chat_id),
                &format!(
                    "Member {} reached the warning limit ({}) and has been banned.",
                    subject, self.escalation.ban_threshold
                ),
            )
            .await;
            EnforcementAction::Ban
        } else if warn_count >= self.escalation.mute_threshold {
            let mute = Duration::seconds(self.escalation.warn_mute_secs);
            self.dispatch_mute(chat_id, subject, Utc::now() + mute).await;
            self.notify(
                NoticeTarget::Chat(chat_id),
                &format!(
                    "Member {} reached the mute limit ({}) and has been muted for {} hours.",
                    subject,
                    self.escalation.mute_threshold,
                    self.escalation.warn_mute_secs / 3600
                ),
            )
            .await;
            EnforcementAction::Mute(mute)
        } else {
            self.notify(
                NoticeTarget::Chat(chat_id),
                &format!(
                    "Member {} has been warned. Total warns: {}",
                    subject, warn_count
                ),
            )
            .await;
            EnforcementAction::None
        };

        info!(
            subject,
            warn_count,
            issuer = ?issuer,
            "Warn recorded"
        );

        Ok(CommandOutcome {
            action,
            reputation,
            warn_count,
        })
    }

    /// Ban path shared by the command and review action; caller holds the
    /// member gate.
    async fn ban_inner(
        &self,
        chat_id: ChatId,
        subject: MemberId,
    ) -> Result<CommandOutcome, EngineError> {
        let warn_count = self.ledger.count_for(subject).await;

        if !self.execute_ban(chat_id, subject).await? {
            info!(subject, "Ban requested for already-banned member, no-op");
            return Ok(CommandOutcome {
                action: EnforcementAction::None,
                reputation: self.store.get(subject),
                warn_count,
            });
        }

        let reputation = self
            .store
            .adjust(subject, -self.escalation.ban_penalty)
            .await?;
        self.notify(
            NoticeTarget::Chat(chat_id),
            &format!("Member {} has been banned.", subject),
        )
        .await;

        Ok(CommandOutcome {
            action: EnforcementAction::Ban,
            reputation,
            warn_count,
        })
    }

    /// Dispatch a ban unless the member is already banned.
    ///
    /// Returns whether this call newly banned the member. Transport failure
    /// surfaces to the caller; nothing committed so far is rolled back.
    async fn execute_ban(
        &self,
        chat_id: ChatId,
        subject: MemberId,
    ) -> Result<bool, EngineError> {
        if self.banned.contains_key(&subject) {
            return Ok(false);
        }

        self.gateway
            .ban_member(chat_id, subject)
            .await
            .map_err(EngineError::transport)?;
        self.banned.insert(subject, Utc::now());

        info!(subject, chat_id, "Member banned");
        Ok(true)
    }

    /// Dispatch a timed mute unless one already covers the deadline.
    async fn dispatch_mute(&self, chat_id: ChatId, member: MemberId, until: DateTime<Utc>) {
        let covered = self
            .muted_until
            .get(&member)
            .map(|active| *active >= until)
            .unwrap_or(false);
        if covered {
            debug!(member, "Mute already in effect, skipping dispatch");
            return;
        }

        self.muted_until.insert(member, until);
        if let Err(e) = self
            .gateway
            .restrict_member(chat_id, member, ChatPermissions::muted(), Some(until))
            .await
        {
            // The mute is recorded regardless; enforcement intent stands.
            error!(member, "{}", EngineError::transport(e));
        }
    }

    /// Best-effort notice; delivery failures never block enforcement.
    async fn notify(&self, target: NoticeTarget, body: &str) {
        if let Err(e) = self.gateway.send_message(target, body, &[]).await {
            warn!("Failed to deliver notice: {}", EngineError::transport(e));
        }
    }

    fn require_admin(&self, issuer: MemberId) -> Result<(), EngineError> {
        if self.admin_ids.contains(&issuer) {
            Ok(())
        } else {
            Err(EngineError::Unauthorized)
        }
    }

    fn gate(&self, member: MemberId) -> Arc<Mutex<()>> {
        self.gates.entry(member).or_default().clone()
    }

    pub fn is_banned(&self, member: MemberId) -> bool {
        self.banned.contains_key(&member)
    }

    pub fn mute_expiry(&self, member: MemberId) -> Option<DateTime<Utc>> {
        self.muted_until
            .get(&member)
            .map(|until| *until)
            .filter(|until| *until > Utc::now())
    }
}

impl TransientState for EscalationEngine {
    /// Drop expired mute bookkeeping. Ban records are kept; bans have no
    /// expiry in this engine.
    fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.muted_until.len();
        self.muted_until.retain(|_, until| *until > now);
        before - self.muted_until.len()
    }
}

fn require_reply(reply: Option<ReplyTarget>) -> Result<ReplyTarget, EngineError> {
    reply.ok_or(EngineError::InvalidTarget)
}
