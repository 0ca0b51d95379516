use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

use crate::{ChannelId, MemberId};

/// Top-level engine configuration.
///
/// Every policy constant is overridable through `WARDEN_*` environment
/// variables; the defaults are the documented baseline policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Members exempt from passive moderation and allowed to run commands.
    pub admin_ids: Vec<MemberId>,
    /// Destination for toxicity/media alerts and sweep digests.
    pub review_channel: ChannelId,
    /// Reputation scoring policy.
    pub reputation: ReputationPolicy,
    /// Flood detection policy.
    pub flood: FloodPolicy,
    /// Escalation tiers and penalties.
    pub escalation: EscalationPolicy,
    /// Classifier integration settings.
    pub classifier: ClassifierConfig,
    /// Background maintenance cadence.
    pub sweep: SweepPolicy,
    /// Persistence configuration.
    pub database: DatabaseConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationPolicy {
    /// Score assigned to a member on first observation.
    pub default_score: f64,
    /// Whether adjustments are clamped into `[min_score, max_score]`.
    pub clamp: bool,
    pub min_score: f64,
    pub max_score: f64,
    /// Reward applied per clean message, favoring sustained participation.
    pub activity_reward: f64,
}

impl Default for ReputationPolicy {
    fn default() -> Self {
        Self {
            default_score: 50.0,
            clamp: true,
            min_score: 0.0,
            max_score: 100.0,
            activity_reward: 0.1,
        }
    }
}

impl ReputationPolicy {
    /// Apply the clamping policy to a raw score.
    pub fn clamp_score(&self, score: f64) -> f64 {
        if self.clamp {
            score.clamp(self.min_score, self.max_score)
        } else {
            score
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodPolicy {
    /// Interval floor enforced even for maximum-reputation members.
    pub base_interval_secs: f64,
    /// Extra interval applied in full to zero-reputation members.
    pub interval_spread_secs: f64,
    /// Events tolerated inside one window before a violation fires.
    pub flood_threshold: u32,
    /// Mute duration issued on a flood violation.
    pub mute_secs: i64,
    /// Reputation penalty applied on a flood violation.
    pub penalty: f64,
}

impl Default for FloodPolicy {
    fn default() -> Self {
        Self {
            base_interval_secs: 0.5,
            interval_spread_secs: 1.5,
            flood_threshold: 5,
            mute_secs: 15 * 60,
            penalty: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Warn count at which a warn triggers a timed mute.
    pub mute_threshold: u64,
    /// Warn count at which a warn triggers a ban.
    pub ban_threshold: u64,
    /// Mute duration for warn-tier escalation.
    pub warn_mute_secs: i64,
    /// Reputation penalty per warn (manual or automatic).
    pub warn_penalty: f64,
    /// Reputation penalty for a message flagged toxic.
    pub toxicity_penalty: f64,
    /// Reputation penalty for a moderator-issued ban.
    pub ban_penalty: f64,
    /// Below this score a flagged message also mutes the sender.
    pub low_trust_threshold: f64,
    /// Mute duration for the low-trust auto-mute.
    pub low_trust_mute_secs: i64,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            mute_threshold: 3,
            ban_threshold: 5,
            warn_mute_secs: 24 * 60 * 60,
            warn_penalty: 5.0,
            toxicity_penalty: 15.0,
            ban_penalty: 25.0,
            low_trust_threshold: 20.0,
            low_trust_mute_secs: 15 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Budget for one classifier call; beyond it the message is treated as
    /// clean and the degradation is logged.
    pub timeout_secs: u64,
    /// Keyword list consumed by the stand-in classifier.
    pub toxic_keywords: Vec<String>,
    /// Media reference markers consumed by the stand-in classifier.
    pub flagged_media_markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            toxic_keywords: ["fuck", "motherfucker", "bastard", "asshole", "scum"]
                .into_iter()
                .map(String::from)
                .collect(),
            flagged_media_markers: ["nsfw", "gore"].into_iter().map(String::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepPolicy {
    /// Cadence of the maintenance loop.
    pub cadence_secs: u64,
    /// UTC hour after which the daily digest fires (once per day).
    pub digest_hour: u32,
    /// Members idle longer than this are reported by the weekly pass.
    pub inactivity_days: i64,
    /// Lifetime of transient sessions (tickets, pending verifications).
    pub session_ttl_secs: i64,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            cadence_secs: 60,
            digest_hour: 9,
            inactivity_days: 7,
            session_ttl_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string.
    pub postgres_url: String,
    /// If false the engine runs on in-memory state only.
    pub postgres_enabled: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/warden".to_string(),
            postgres_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_ids: Vec::new(),
            review_channel: 0,
            reputation: ReputationPolicy::default(),
            flood: FloodPolicy::default(),
            escalation: EscalationPolicy::default(),
            classifier: ClassifierConfig::default(),
            sweep: SweepPolicy::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(ids) = env::var("WARDEN_ADMIN_IDS") {
            config.admin_ids = ids
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().parse::<MemberId>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Invalid WARDEN_ADMIN_IDS value")?;
        }

        if let Ok(channel) = env::var("WARDEN_REVIEW_CHANNEL") {
            config.review_channel = channel
                .parse()
                .context("Invalid WARDEN_REVIEW_CHANNEL value")?;
        }

        // Reputation policy
        if let Ok(v) = env::var("WARDEN_DEFAULT_REPUTATION") {
            config.reputation.default_score =
                v.parse().context("Invalid WARDEN_DEFAULT_REPUTATION value")?;
        }
        if let Ok(v) = env::var("WARDEN_CLAMP_REPUTATION") {
            config.reputation.clamp =
                v.parse().context("Invalid WARDEN_CLAMP_REPUTATION value")?;
        }
        if let Ok(v) = env::var("WARDEN_MIN_REPUTATION") {
            config.reputation.min_score =
                v.parse().context("Invalid WARDEN_MIN_REPUTATION value")?;
        }
        if let Ok(v) = env::var("WARDEN_MAX_REPUTATION") {
            config.reputation.max_score =
                v.parse().context("Invalid WARDEN_MAX_REPUTATION value")?;
        }
        if let Ok(v) = env::var("WARDEN_ACTIVITY_REWARD") {
            config.reputation.activity_reward =
                v.parse().context("Invalid WARDEN_ACTIVITY_REWARD value")?;
        }

        // Flood policy
        if let Ok(v) = env::var("WARDEN_FLOOD_BASE_INTERVAL_SECS") {
            config.flood.base_interval_secs = v
                .parse()
                .context("Invalid WARDEN_FLOOD_BASE_INTERVAL_SECS value")?;
        }
        if let Ok(v) = env::var("WARDEN_FLOOD_INTERVAL_SPREAD_SECS") {
            config.flood.interval_spread_secs = v
                .parse()
                .context("Invalid WARDEN_FLOOD_INTERVAL_SPREAD_SECS value")?;
        }
        if let Ok(v) = env::var("WARDEN_FLOOD_THRESHOLD") {
            config.flood.flood_threshold =
                v.parse().context("Invalid WARDEN_FLOOD_THRESHOLD value")?;
        }
        if let Ok(v) = env::var("WARDEN_FLOOD_MUTE_SECS") {
            config.flood.mute_secs =
                v.parse().context("Invalid WARDEN_FLOOD_MUTE_SECS value")?;
        }
        if let Ok(v) = env::var("WARDEN_FLOOD_PENALTY") {
            config.flood.penalty = v.parse().context("Invalid WARDEN_FLOOD_PENALTY value")?;
        }

        // Escalation policy
        if let Ok(v) = env::var("WARDEN_MUTE_THRESHOLD") {
            config.escalation.mute_threshold =
                v.parse().context("Invalid WARDEN_MUTE_THRESHOLD value")?;
        }
        if let Ok(v) = env::var("WARDEN_BAN_THRESHOLD") {
            config.escalation.ban_threshold =
                v.parse().context("Invalid WARDEN_BAN_THRESHOLD value")?;
        }
        if let Ok(v) = env::var("WARDEN_WARN_MUTE_SECS") {
            config.escalation.warn_mute_secs =
                v.parse().context("Invalid WARDEN_WARN_MUTE_SECS value")?;
        }
        if let Ok(v) = env::var("WARDEN_WARN_PENALTY") {
            config.escalation.warn_penalty =
                v.parse().context("Invalid WARDEN_WARN_PENALTY value")?;
        }
        if let Ok(v) = env::var("WARDEN_TOXICITY_PENALTY") {
            config.escalation.toxicity_penalty =
                v.parse().context("Invalid WARDEN_TOXICITY_PENALTY value")?;
        }
        if let Ok(v) = env::var("WARDEN_BAN_PENALTY") {
            config.escalation.ban_penalty =
                v.parse().context("Invalid WARDEN_BAN_PENALTY value")?;
        }
        if let Ok(v) = env::var("WARDEN_LOW_TRUST_THRESHOLD") {
            config.escalation.low_trust_threshold = v
                .parse()
                .context("Invalid WARDEN_LOW_TRUST_THRESHOLD value")?;
        }
        if let Ok(v) = env::var("WARDEN_LOW_TRUST_MUTE_SECS") {
            config.escalation.low_trust_mute_secs = v
                .parse()
                .context("Invalid WARDEN_LOW_TRUST_MUTE_SECS value")?;
        }

        // Classifier
        if let Ok(v) = env::var("WARDEN_CLASSIFIER_TIMEOUT_SECS") {
            config.classifier.timeout_secs = v
                .parse()
                .context("Invalid WARDEN_CLASSIFIER_TIMEOUT_SECS value")?;
        }
        if let Ok(v) = env::var("WARDEN_TOXIC_KEYWORDS") {
            config.classifier.toxic_keywords = v
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Sweep
        if let Ok(v) = env::var("WARDEN_SWEEP_CADENCE_SECS") {
            config.sweep.cadence_secs =
                v.parse().context("Invalid WARDEN_SWEEP_CADENCE_SECS value")?;
        }
        if let Ok(v) = env::var("WARDEN_DIGEST_HOUR") {
            config.sweep.digest_hour =
                v.parse().context("Invalid WARDEN_DIGEST_HOUR value")?;
        }
        if let Ok(v) = env::var("WARDEN_INACTIVITY_DAYS") {
            config.sweep.inactivity_days =
                v.parse().context("Invalid WARDEN_INACTIVITY_DAYS value")?;
        }
        if let Ok(v) = env::var("WARDEN_SESSION_TTL_SECS") {
            config.sweep.session_ttl_secs =
                v.parse().context("Invalid WARDEN_SESSION_TTL_SECS value")?;
        }

        // Database
        if let Ok(v) = env::var("WARDEN_POSTGRES_URL") {
            config.database.postgres_url = v;
        }
        if let Ok(v) = env::var("WARDEN_POSTGRES_ENABLED") {
            config.database.postgres_enabled =
                v.parse().context("Invalid WARDEN_POSTGRES_ENABLED value")?;
        }

        // Logging
        if let Ok(v) = env::var("WARDEN_LOG_LEVEL") {
            config.logging.level = v;
        }

        config.validate()?;

        info!(
            admins = config.admin_ids.len(),
            clamp = config.reputation.clamp,
            flood_threshold = config.flood.flood_threshold,
            "Moderation engine configured"
        );

        Ok(config)
    }

    /// Validate policy consistency.
    pub fn validate(&self) -> Result<()> {
        if self.reputation.min_score >= self.reputation.max_score {
            return Err(anyhow::anyhow!(
                "min_score ({}) must be below max_score ({})",
                self.reputation.min_score,
                self.reputation.max_score
            ));
        }

        if self.reputation.clamp
            && (self.reputation.default_score < self.reputation.min_score
                || self.reputation.default_score > self.reputation.max_score)
        {
            return Err(anyhow::anyhow!(
                "default_score ({}) must lie inside the clamp bound [{}, {}]",
                self.reputation.default_score,
                self.reputation.min_score,
                self.reputation.max_score
            ));
        }

        if self.flood.flood_threshold == 0 {
            return Err(anyhow::anyhow!("flood_threshold must be non-zero"));
        }

        if self.flood.base_interval_secs < 0.0 || self.flood.interval_spread_secs < 0.0 {
            return Err(anyhow::anyhow!("flood intervals must be non-negative"));
        }

        if self.escalation.mute_threshold == 0
            || self.escalation.mute_threshold >= self.escalation.ban_threshold
        {
            return Err(anyhow::anyhow!(
                "mute_threshold ({}) must be non-zero and below ban_threshold ({})",
                self.escalation.mute_threshold,
                self.escalation.ban_threshold
            ));
        }

        if self.sweep.cadence_secs == 0 {
            return Err(anyhow::anyhow!("sweep cadence must be non-zero"));
        }

        if self.sweep.digest_hour >= 24 {
            return Err(anyhow::anyhow!(
                "digest_hour ({}) must be a valid UTC hour",
                self.sweep.digest_hour
            ));
        }

        if self.classifier.timeout_secs == 0 {
            return Err(anyhow::anyhow!("classifier timeout must be non-zero"));
        }

        Ok(())
    }
}

/// Install the global tracing subscriber from the logging configuration.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_level = match config.level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_clamp_score() {
        let policy = ReputationPolicy::default();
        assert_eq!(policy.clamp_score(120.0), 100.0);
        assert_eq!(policy.clamp_score(-3.0), 0.0);
        assert_eq!(policy.clamp_score(42.5), 42.5);

        let unclamped = ReputationPolicy {
            clamp: false,
            ..ReputationPolicy::default()
        };
        assert_eq!(unclamped.clamp_score(120.0), 120.0);
    }

    #[test]
    fn test_validation_rejects_inverted_bounds() {
        let mut config = Config::default();
        config.reputation.min_score = 100.0;
        config.reputation.max_score = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_tier_inversion() {
        let mut config = Config::default();
        config.escalation.mute_threshold = 5;
        config.escalation.ban_threshold = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_bound_default() {
        let mut config = Config::default();
        config.reputation.default_score = 150.0;
        assert!(config.validate().is_err());
    }
}
