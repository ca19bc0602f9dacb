//! Prompt text sent to the proxy.
//!
//! Templates are plain strings with `{var}` slots so they can be inspected
//! and tested without a model in the loop.

/// Welcome prompt for a joining player.
pub const JOIN: &str = "Write a short, unique welcome for player {player}. Keep it under 25 words.";

/// Farewell prompt for a leaving player.
pub const QUIT: &str = "Say a fond farewell to {player} as they leave the server.";

/// Death prompt when nothing killed the player directly.
pub const DEATH: &str = "{victim} has fallen... comment briefly.";

/// Death prompt when another player landed the blow.
pub const DEATH_BY: &str = "{victim} was slain by {killer}. Give a witty remark.";

/// Advancement prompt.
pub const ADVANCEMENT: &str = "{player} just achieved \u{201c}{advancement}\u{201d}. Congratulate them!";

/// Weather change prompt.
pub const WEATHER: &str = "The weather in {world} has changed to {state}. Comment on it.";

/// First line sent when a conversation opens.
pub const GREETING: &str = "Greet {player} as a {category} from {village}.";

/// Appended to every NPC's personality prompt.
pub const VILLAGE_FRAMING: &str = "\nYou live in the village of {village}.";

/// Appended for NPCs that may hand out quests.
pub const QUEST_GIVER_FRAMING: &str = "\nAs a quest-giver, you assign missions on request.";

/// Fill `{key}` slots in `template`.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// Welcome prompt.
#[must_use]
pub fn join(player: &str) -> String {
    render_template(JOIN, &[("player", player)])
}

/// Farewell prompt.
#[must_use]
pub fn quit(player: &str) -> String {
    render_template(QUIT, &[("player", player)])
}

/// Death prompt, with or without a killer.
#[must_use]
pub fn death(victim: &str, killer: Option<&str>) -> String {
    match killer {
        Some(killer) => render_template(DEATH_BY, &[("victim", victim), ("killer", killer)]),
        None => render_template(DEATH, &[("victim", victim)]),
    }
}

/// Advancement prompt. Underscores in the advancement key read as spaces.
#[must_use]
pub fn advancement(player: &str, key: &str) -> String {
    let readable = key.replace('_', " ");
    render_template(ADVANCEMENT, &[("player", player), ("advancement", &readable)])
}

/// Weather prompt.
#[must_use]
pub fn weather(world: &str, storming: bool) -> String {
    let state = palaver_core::placeholders::weather_label(storming);
    render_template(WEATHER, &[("world", world), ("state", state)])
}

/// Greeting prompt. The category is lower-cased.
#[must_use]
pub fn greeting(player: &str, category: &str, village: &str) -> String {
    let category = category.to_lowercase();
    render_template(
        GREETING,
        &[("player", player), ("category", &category), ("village", village)],
    )
}

/// The full system prompt for a conversation.
#[must_use]
pub fn npc_system_prompt(personality: &str, village: &str, quest_giver: bool) -> String {
    let mut system = personality.to_string();
    system.push_str(&render_template(VILLAGE_FRAMING, &[("village", village)]));
    if quest_giver {
        system.push_str(QUEST_GIVER_FRAMING);
    }
    system
}
