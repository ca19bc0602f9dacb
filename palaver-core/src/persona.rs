//! Personality templates and persistent NPC display names.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::warn;

use crate::types::EntityId;

/// Placeholder in personality templates replaced with the NPC's display name.
pub const NAME_TOKEN: &str = "{name}";

/// Category used when an NPC's own category has no template.
pub const DEFAULT_CATEGORY: &str = "DEFAULT";

/// Base name used when the name pool is empty.
pub const FALLBACK_BASE_NAME: &str = "Villager";

const FALLBACK_TEMPLATE: &str = "You are {name}.";

/// Category → prompt template lookup. Keys are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct PersonalityBook {
    templates: HashMap<String, String>,
}

impl PersonalityBook {
    /// Build from a category → template map.
    #[must_use]
    pub fn new(templates: &HashMap<String, String>) -> Self {
        let templates: HashMap<String, String> = templates
            .iter()
            .map(|(k, v)| (k.to_uppercase(), v.clone()))
            .collect();
        if !templates.contains_key(DEFAULT_CATEGORY) {
            warn!("No DEFAULT personality configured, unknown categories get a bare prompt");
        }
        Self { templates }
    }

    /// The system prompt for an NPC of `category` named `name`.
    #[must_use]
    pub fn resolve(&self, category: &str, name: &str) -> String {
        self.templates
            .get(&category.to_uppercase())
            .or_else(|| self.templates.get(DEFAULT_CATEGORY))
            .map_or(FALLBACK_TEMPLATE, String::as_str)
            .replace(NAME_TOKEN, name)
    }

    /// Number of configured categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no templates are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// `"FARMER"` → `"Farmer"`.
#[must_use]
pub fn capitalize_category(category: &str) -> String {
    let mut chars = category.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Assigns each NPC a random base name on first sight and remembers it.
#[derive(Debug)]
pub struct NameRegistry {
    pool: Vec<String>,
    assigned: HashMap<EntityId, String>,
    rng: StdRng,
}

impl NameRegistry {
    /// Create a registry drawing from `pool`.
    #[must_use]
    pub fn new(pool: Vec<String>) -> Self {
        Self::with_rng(pool, StdRng::from_entropy())
    }

    /// Create a registry with a fixed seed.
    #[must_use]
    pub fn seeded(pool: Vec<String>, seed: u64) -> Self {
        Self::with_rng(pool, StdRng::seed_from_u64(seed))
    }

    fn with_rng(pool: Vec<String>, rng: StdRng) -> Self {
        Self {
            pool,
            assigned: HashMap::new(),
            rng,
        }
    }

    /// Seed with persisted base names.
    pub fn restore(&mut self, assigned: HashMap<EntityId, String>) {
        self.assigned = assigned;
    }

    /// The NPC's base name, drawing one if none exists yet.
    ///
    /// The second element is `true` when the name was just drawn and should
    /// be persisted.
    pub fn base_name(&mut self, npc: EntityId) -> (String, bool) {
        if let Some(existing) = self.assigned.get(&npc) {
            return (existing.clone(), false);
        }
        let drawn = self
            .pool
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| FALLBACK_BASE_NAME.to_string());
        self.assigned.insert(npc, drawn.clone());
        (drawn, true)
    }

    /// `"<base> the <Category>"`, plus whether the base name is new.
    pub fn display_name(&mut self, npc: EntityId, category: &str) -> (String, bool) {
        let (base, fresh) = self.base_name(npc);
        (format!("{base} the {}", capitalize_category(category)), fresh)
    }
}
