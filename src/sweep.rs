//! Periodic maintenance sweep
//!
//! Fixed-cadence background loop sharing the Reputation Store and Warn
//! Ledger with the online path under the same concurrency discipline.
//! Date-gated tasks (daily digest, weekly inactivity pass) fire exactly
//! once per gating window: the last-fired period key is compared, so a
//! cadence check racing clock granularity cannot double-fire. Task errors
//! are caught and logged without terminating the loop.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::community::leaderboard;
use crate::config::SweepPolicy;
use crate::gateway::{ChatGateway, NoticeTarget};
use crate::reputation::ReputationStore;
use crate::warns::WarnLedger;
use crate::ChannelId;

/// Process-scoped state safe to lose on restart.
///
/// Implementors own transient per-member or per-session maps (flood
/// windows, ticket sessions, pending verifications, mute bookkeeping) and
/// drop entries past their useful life.
pub trait TransientState: Send + Sync {
    /// Drop expired entries, returning how many were removed.
    fn prune_expired(&self, now: DateTime<Utc>) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
struct SweepMarkers {
    last_digest: Option<NaiveDate>,
    /// ISO (year, week) of the last inactivity pass.
    last_inactivity: Option<(i32, u32)>,
}

/// Background maintenance loop.
pub struct PeriodicSweep {
    policy: SweepPolicy,
    review_channel: ChannelId,
    store: Arc<ReputationStore>,
    ledger: Arc<WarnLedger>,
    gateway: Arc<dyn ChatGateway>,
    transients: Vec<Arc<dyn TransientState>>,
    markers: Mutex<SweepMarkers>,
}

impl PeriodicSweep {
    pub fn new(
        policy: SweepPolicy,
        review_channel: ChannelId,
        store: Arc<ReputationStore>,
        ledger: Arc<WarnLedger>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            policy,
            review_channel,
            store,
            ledger,
            gateway,
            transients: Vec::new(),
            markers: Mutex::new(SweepMarkers::default()),
        }
    }

    /// Register transient state to prune on every pass.
    pub fn register_transient(mut self, state: Arc<dyn TransientState>) -> Self {
        self.transients.push(state);
        self
    }

    /// Run the maintenance loop until the task is dropped.
    pub async fn run(self: Arc<Self>) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.policy.cadence_secs));

        info!(
            cadence_secs = self.policy.cadence_secs,
            "Periodic sweep started"
        );

        loop {
            interval.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                error!("Sweep pass failed: {:#}", e);
            }
        }
    }

    /// One maintenance pass at the given instant. Public for direct
    /// invocation; the loop calls it with wall-clock time.
    pub async fn tick(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        for transient in &self.transients {
            let dropped = transient.prune_expired(now);
            if dropped > 0 {
                debug!(dropped, "Pruned transient state");
            }
        }

        // Window gating is decided under the marker lock; the tasks run
        // outside it so a slow dispatch cannot stall the next tick check.
        let (digest_due, inactivity_due) = {
            let mut markers = self.markers.lock().await;
            let today = now.date_naive();
            let week = (now.iso_week().year(), now.iso_week().week());

            let digest_due = now.hour() >= self.policy.digest_hour
                && markers.last_digest != Some(today);
            if digest_due {
                markers.last_digest = Some(today);
            }

            let inactivity_due = markers.last_inactivity != Some(week);
            if inactivity_due {
                markers.last_inactivity = Some(week);
            }

            (digest_due, inactivity_due)
        };

        if digest_due {
            if let Err(e) = self.daily_digest(now).await {
                error!("Daily digest failed: {:#}", e);
            }
        }

        if inactivity_due {
            if let Err(e) = self.inactivity_pass(now).await {
                error!("Inactivity pass failed: {:#}", e);
            }
        }

        Ok(())
    }

    /// Daily activity summary for the review channel.
    async fn daily_digest(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let snapshot = self.store.snapshot();
        let total_messages: u64 = snapshot.iter().map(|r| r.messages_sent).sum();

        let mut body = format!(
            "Daily digest for {}\nMembers tracked: {}\nMessages counted: {}\n\n",
            now.date_naive(),
            snapshot.len(),
            total_messages
        );
        body.push_str(&leaderboard::format_leaderboard(&snapshot, 3));

        self.gateway
            .send_message(NoticeTarget::Channel(self.review_channel), &body, &[])
            .await?;

        info!(members = snapshot.len(), "Daily digest sent");
        Ok(())
    }

    /// Weekly report of members idle past the configured horizon.
    async fn inactivity_pass(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let horizon = now - Duration::days(self.policy.inactivity_days);
        let snapshot = self.store.snapshot();

        let idle: Vec<_> = snapshot
            .iter()
            .filter(|r| r.last_active < horizon)
            .collect();
        if idle.is_empty() {
            debug!("Inactivity pass found no idle members");
            return Ok(());
        }

        let mut body = format!(
            "Inactivity report: {} members idle for over {} days\n",
            idle.len(),
            self.policy.inactivity_days
        );
        for record in idle.iter().take(20) {
            let warns = self.ledger.count_for(record.member_id).await;
            body.push_str(&format!(
                "- member {} (reputation {:.1}, warns {}, last active {})\n",
                record.member_id,
                record.reputation,
                warns,
                record.last_active.date_naive()
            ));
        }

        self.gateway
            .send_message(NoticeTarget::Channel(self.review_channel), &body, &[])
            .await?;

        info!(idle = idle.len(), "Inactivity report sent");
        Ok(())
    }
}
