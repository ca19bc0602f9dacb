//! Configuration for the Palaver system.
//!
//! Maps directly to `palaver.toml`. Every field has a default so a partial
//! (or empty) file is valid; [`PalaverConfig::validate`] reports settings
//! that degrade quality without being fatal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::quest::QuestTemplate;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PalaverConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Inference proxy settings.
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Conversation session tuning.
    #[serde(default)]
    pub session: SessionConfig,
    /// Village clustering.
    #[serde(default)]
    pub villages: VillageConfig,
    /// Base name pool for NPC display names.
    #[serde(default)]
    pub names: NamesConfig,
    /// Personality templates: category → prompt with a `{name}` placeholder.
    #[serde(default = "default_personalities")]
    pub personalities: HashMap<String, String>,
    /// Persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Quest template overrides.
    #[serde(default)]
    pub quests: QuestConfig,
}

impl Default for PalaverConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            proxy: ProxyConfig::default(),
            session: SessionConfig::default(),
            villages: VillageConfig::default(),
            names: NamesConfig::default(),
            personalities: default_personalities(),
            persistence: PersistenceConfig::default(),
            quests: QuestConfig::default(),
        }
    }
}

impl PalaverConfig {
    /// Load configuration from a TOML string.
    ///
    /// Personality keys are upper-cased so lookups are case-insensitive.
    ///
    /// # Errors
    /// Returns `PalaverError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        let mut config: Self =
            toml::from_str(toml_str).map_err(|e| crate::PalaverError::Config(e.to_string()))?;
        config.personalities = config
            .personalities
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Collect configuration defects that degrade behavior but are not fatal.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.proxy.system_prompt.trim().is_empty() {
            warnings.push("proxy.system_prompt is blank; the proxy may reject requests".to_string());
        }
        if self.names.base.is_empty() {
            warnings.push("names.base is empty; NPCs will share a fallback name".to_string());
        }
        if self.villages.names.is_empty() {
            warnings.push("villages.names is empty; villages will use a fallback name".to_string());
        }
        if !self.personalities.contains_key("DEFAULT") {
            warnings.push("personalities has no DEFAULT template".to_string());
        }
        for template in self.quests.templates.iter().filter(|t| t.amount == 0) {
            warnings.push(format!(
                "quest template {} {} has amount 0; it will require 1",
                template.kind.label(),
                template.target
            ));
        }
        if self.quests.templates.is_empty() {
            warnings.push("quests.templates is empty; quest-givers cannot issue quests".to_string());
        }
        warnings
    }

    /// Convert a duration in seconds to simulation ticks.
    #[must_use]
    pub fn seconds_to_ticks(&self, seconds: u64) -> u64 {
        seconds.saturating_mul(self.general.ticks_per_second)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Authoritative ticks per second of wall time.
    #[serde(default = "default_20_u64")]
    pub ticks_per_second: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            ticks_per_second: 20,
        }
    }
}

/// How requests reach the inference endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    /// POST JSON to `proxy.url`.
    #[default]
    Http,
    /// No endpoint; every call resolves to an empty answer.
    Offline,
}

/// Inference proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Transport mode.
    #[serde(default)]
    pub mode: ProxyMode,
    /// Endpoint URL.
    #[serde(default = "default_proxy_url")]
    pub url: String,
    /// Model name sent with each request.
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Default system prompt for ad-hoc and event chat.
    #[serde(default)]
    pub system_prompt: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Token budget per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Hard timeout for one exchange, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: ProxyMode::Http,
            url: default_proxy_url(),
            model_name: default_model_name(),
            system_prompt: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Conversation session tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Window (seconds) for both the NPC freeze and the session expiry.
    #[serde(default = "default_30_u64")]
    pub freeze_seconds: u64,
    /// Substring (case-insensitive) that marks a quest request.
    #[serde(default = "default_quest_keyword")]
    pub quest_keyword: String,
    /// Cap for per-player ad-hoc histories.
    #[serde(default = "default_6")]
    pub ad_hoc_history_cap: usize,
    /// Cap for per-NPC histories.
    #[serde(default = "default_20_usize")]
    pub npc_history_cap: usize,
    /// Cap for the shared server event history.
    #[serde(default = "default_20_usize")]
    pub server_history_cap: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            freeze_seconds: 30,
            quest_keyword: default_quest_keyword(),
            ad_hoc_history_cap: 6,
            npc_history_cap: 20,
            server_history_cap: 20,
        }
    }
}

/// Village clustering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VillageConfig {
    /// Two NPCs closer than this (same partition) share a village.
    #[serde(default = "default_radius")]
    pub radius: f32,
    /// Delay before the first pass, in seconds.
    #[serde(default = "default_10_u64")]
    pub initial_delay_seconds: u64,
    /// Period between passes, in seconds.
    #[serde(default = "default_600_u64")]
    pub period_seconds: u64,
    /// Fraction of each cluster designated as quest-givers.
    #[serde(default = "default_quarter")]
    pub quest_giver_fraction: f32,
    /// Cyclic pool of village names.
    #[serde(default = "default_village_names")]
    pub names: Vec<String>,
}

impl Default for VillageConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            initial_delay_seconds: 10,
            period_seconds: 600,
            quest_giver_fraction: default_quarter(),
            names: default_village_names(),
        }
    }
}

/// Base name pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamesConfig {
    /// Base names drawn at random for new NPCs.
    #[serde(default = "default_base_names")]
    pub base: Vec<String>,
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            base: default_base_names(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect save corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
            checksum_enabled: true,
        }
    }
}

/// Quest templates offered by quest-givers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestConfig {
    /// Templates picked uniformly at random.
    #[serde(default = "QuestTemplate::builtin")]
    pub templates: Vec<QuestTemplate>,
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            templates: QuestTemplate::builtin(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_proxy_url() -> String { "http://localhost:3004/ai".to_string() }
fn default_model_name() -> String { "default".to_string() }
fn default_quest_keyword() -> String { "quest".to_string() }
fn default_database_path() -> String { "palaver.db".to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_radius() -> f32 { 50.0 }
fn default_quarter() -> f32 { 0.25 }
fn default_max_tokens() -> u32 { 4000 }
fn default_timeout_ms() -> u64 { 10_000 }
fn default_6() -> usize { 6 }
fn default_20_usize() -> usize { 20 }
fn default_10_u64() -> u64 { 10 }
fn default_20_u64() -> u64 { 20 }
fn default_30_u64() -> u64 { 30 }
fn default_600_u64() -> u64 { 600 }

fn default_village_names() -> Vec<String> {
    ["Ashford", "Brindlemere", "Cobblecross", "Dunhollow", "Elmstead", "Fernwick"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_base_names() -> Vec<String> {
    ["Mira", "Tobin", "Hale", "Orla", "Bram", "Wynn", "Edda", "Corin"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_personalities() -> HashMap<String, String> {
    [
        ("DEFAULT", "You are {name}, a villager. Stay in character and keep replies under three sentences."),
        ("FARMER", "You are {name}, a weathered farmer who talks about crops, rain and hard work."),
        ("LIBRARIAN", "You are {name}, a bookish librarian who loves obscure facts."),
        ("CLERIC", "You are {name}, a calm cleric who speaks in measured, kindly words."),
        ("ARMORER", "You are {name}, a gruff armorer proud of good steel."),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = PalaverConfig::from_toml("").expect("empty config parses");
        assert_eq!(config.proxy.url, "http://localhost:3004/ai");
        assert_eq!(config.proxy.request_timeout_ms, 10_000);
        assert_eq!(config.session.freeze_seconds, 30);
        assert!((config.villages.radius - 50.0).abs() < f32::EPSILON);
        assert_eq!(config.quests.templates.len(), 3);
    }

    #[test]
    fn personality_keys_are_upper_cased() {
        let config = PalaverConfig::from_toml(
            r#"
            [personalities]
            default = "You are {name}."
            fisherman = "You are {name}, who fishes."
            "#,
        )
        .expect("parses");
        assert!(config.personalities.contains_key("DEFAULT"));
        assert!(config.personalities.contains_key("FISHERMAN"));
    }

    #[test]
    fn blank_system_prompt_is_a_warning_not_an_error() {
        let config = PalaverConfig::default();
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("system_prompt")));
    }

    #[test]
    fn zero_amount_quest_template_is_a_warning() {
        let config = PalaverConfig::from_toml(
            r#"
            [[quests.templates]]
            kind = "KILL"
            target = "ZOMBIE"
            amount = 0
            location_hint = "nearby"
            reward_command = "give %player% bread 1"
            "#,
        )
        .expect("parses");
        assert!(config.validate().iter().any(|w| w.contains("amount 0")));
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = PalaverConfig::from_toml("[proxy\nurl=").expect_err("invalid");
        assert!(matches!(err, crate::PalaverError::Config(_)));
    }

    #[test]
    fn offline_mode_parses() {
        let config = PalaverConfig::from_toml("[proxy]\nmode = \"offline\"").expect("parses");
        assert_eq!(config.proxy.mode, ProxyMode::Offline);
    }

    #[test]
    fn seconds_convert_with_tick_rate() {
        let config = PalaverConfig::default();
        assert_eq!(config.seconds_to_ticks(30), 600);
    }
}
