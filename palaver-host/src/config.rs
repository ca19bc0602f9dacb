//! Host-side view of the configuration.
//!
//! [`PalaverConfig`] is expressed in seconds for people editing
//! `palaver.toml`; the authoritative context works in ticks. [`RuleSettings`]
//! is the converted, ready-to-use form.

use std::path::Path;

use anyhow::Context;
use palaver_core::config::PalaverConfig;
use palaver_core::types::Tick;
use tracing::{info, warn};

/// Tick-based settings derived from [`PalaverConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSettings {
    /// Length of both the NPC freeze and the session expiry window.
    pub freeze_ticks: Tick,
    /// Lower-cased quest keyword.
    pub quest_keyword: String,
    /// Cap for per-player ad-hoc histories.
    pub ad_hoc_history_cap: usize,
    /// Cap for per-NPC histories.
    pub npc_history_cap: usize,
    /// Cap for the shared server history.
    pub server_history_cap: usize,
    /// Delay before the first village pass.
    pub village_initial_delay: Tick,
    /// Period between village passes.
    pub village_period: Tick,
}

impl RuleSettings {
    /// Convert `config` to ticks.
    #[must_use]
    pub fn from_config(config: &PalaverConfig) -> Self {
        Self {
            freeze_ticks: config.seconds_to_ticks(config.session.freeze_seconds),
            quest_keyword: config.session.quest_keyword.to_lowercase(),
            ad_hoc_history_cap: config.session.ad_hoc_history_cap,
            npc_history_cap: config.session.npc_history_cap,
            server_history_cap: config.session.server_history_cap,
            village_initial_delay: config.seconds_to_ticks(config.villages.initial_delay_seconds),
            // A zero period would re-arm on the same tick forever.
            village_period: config.seconds_to_ticks(config.villages.period_seconds).max(1),
        }
    }
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self::from_config(&PalaverConfig::default())
    }
}

/// Load `palaver.toml`, falling back to defaults when no path is given or
/// the file does not exist. Validation warnings are logged, never fatal.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PalaverConfig> {
    let config = match path {
        Some(path) if path.exists() => PalaverConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        Some(path) => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            PalaverConfig::default()
        }
        None => PalaverConfig::default(),
    };

    for warning in config.validate() {
        warn!("{warning}");
    }
    info!(
        personalities = config.personalities.len(),
        base_names = config.names.base.len(),
        village_names = config.villages.names.len(),
        quest_templates = config.quests.templates.len(),
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_become_ticks() {
        let config = PalaverConfig::from_toml(
            r#"
            [general]
            ticks_per_second = 20

            [session]
            freeze_seconds = 30
            quest_keyword = "QUEST"

            [villages]
            initial_delay_seconds = 10
            period_seconds = 600
            "#,
        )
        .expect("valid toml");
        let settings = RuleSettings::from_config(&config);
        assert_eq!(settings.freeze_ticks, 600);
        assert_eq!(settings.quest_keyword, "quest");
        assert_eq!(settings.village_initial_delay, 200);
        assert_eq!(settings.village_period, 12_000);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(Some(&dir.path().join("absent.toml"))).expect("defaults");
        assert_eq!(config.session.freeze_seconds, 30);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("palaver.toml");
        std::fs::write(&path, "[session\nfreeze_seconds = ").expect("write");
        assert!(load_config(Some(&path)).is_err());
    }
}
