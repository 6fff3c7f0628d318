//! # Engine configuration
//!
//! All tunables ship with working defaults, so the engine runs with no
//! config file at all. A `civic-pulse.toml` next to the
//! binary and `CIVIC_PULSE_`-prefixed environment variables override them
//! (e.g. `CIVIC_PULSE_AUTO_HIDE_THRESHOLD=5`; nested keys use `__`, as in
//! `CIVIC_PULSE_HTTP__BIND_ADDR`).

use serde::Deserialize;

use crate::models::PenaltyType;

/// Trust-score delta table for content lifecycle events and penalties.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrustRules {
    pub idea_approved: f64,
    pub idea_rejected: f64,
    pub warning: f64,
    pub content_removed: f64,
    pub temporary_restriction: f64,
    pub permanent_restriction: f64,
}

impl Default for TrustRules {
    fn default() -> Self {
        Self {
            idea_approved: 2.0,
            idea_rejected: -1.0,
            warning: -5.0,
            content_removed: -15.0,
            temporary_restriction: -25.0,
            permanent_restriction: -50.0,
        }
    }
}

impl TrustRules {
    /// The signed delta a penalty of this kind applies.
    pub fn penalty_delta(&self, kind: PenaltyType) -> f64 {
        match kind {
            PenaltyType::Warning => self.warning,
            PenaltyType::ContentRemoved => self.content_removed,
            PenaltyType::TemporaryRestriction => self.temporary_restriction,
            PenaltyType::PermanentRestriction => self.permanent_restriction,
        }
    }
}

/// Parameters of the vote weight function `clamp(trust / pivot, floor, cap)`.
///
/// The floor keeps low-trust voters from being silently disenfranchised; the
/// cap keeps a single high-trust voter from dominating.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeightRules {
    pub pivot: f64,
    pub floor: f64,
    pub cap: f64,
}

impl Default for WeightRules {
    fn default() -> Self {
        Self { pivot: 50.0, floor: 0.1, cap: 2.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub database_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            database_url: "sqlite::memory:".to_string(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub trust: TrustRules,
    pub weights: WeightRules,
    /// Distinct unreviewed reporters required before auto-hide fires.
    pub auto_hide_threshold: u64,
    /// Whether dismissing every flag on an auto-hidden item restores it.
    /// Defaults to false: un-hiding stays an explicit action.
    pub unhide_on_dismiss: bool,
    /// Background aggregate-cache refresh period, in seconds.
    pub cache_refresh_secs: u64,
    pub http: HttpConfig,
}

impl EngineConfig {
    /// Loads `civic-pulse.toml` (optional) and environment overrides over
    /// the built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name("civic-pulse").required(false))
            .add_source(config::Environment::with_prefix("CIVIC_PULSE").separator("__"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}

// Hand-written so serde(default) picks up the non-zero scalar defaults.
impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trust: TrustRules::default(),
            weights: WeightRules::default(),
            auto_hide_threshold: 3,
            unhide_on_dismiss: false,
            cache_refresh_secs: 60,
            http: HttpConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_table_defaults() {
        let rules = TrustRules::default();
        assert_eq!(rules.penalty_delta(PenaltyType::Warning), -5.0);
        assert_eq!(rules.penalty_delta(PenaltyType::ContentRemoved), -15.0);
        assert_eq!(rules.penalty_delta(PenaltyType::TemporaryRestriction), -25.0);
        assert_eq!(rules.penalty_delta(PenaltyType::PermanentRestriction), -50.0);
        assert_eq!(rules.idea_approved, 2.0);
        assert_eq!(rules.idea_rejected, -1.0);
    }

    #[test]
    fn engine_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.auto_hide_threshold, 3);
        assert!(!cfg.unhide_on_dismiss);
        assert_eq!(cfg.weights.floor, 0.1);
        assert_eq!(cfg.weights.cap, 2.0);
    }
}
