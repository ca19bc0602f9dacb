//! Live-state tokens filled in just before text is shown to players.
//!
//! Tokens are never sent to the proxy; they are resolved on the reply path.

use std::time::Duration;

/// In-game clock, `HH:MM`.
pub const CURRENT_TIME: &str = "{{current_time}}";
/// Server uptime, `Xh Ym Zs`.
pub const UPTIME: &str = "{{uptime}}";
/// Number of players online.
pub const ONLINE_PLAYERS: &str = "{{online_players}}";
/// `rain` or `clear skies`.
pub const WEATHER: &str = "{{current_weather_state}}";

/// Snapshot of the world values tokens resolve against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveState {
    /// World clock in ticks (1000 ticks per in-game hour, tick 0 = 06:00).
    pub world_time_ticks: u64,
    /// Wall-clock time since the host started.
    pub uptime: Duration,
    /// Players currently online.
    pub online_players: usize,
    /// Whether it is raining or storming.
    pub storming: bool,
}

/// Format a world clock value as `HH:MM`.
#[must_use]
pub fn format_world_time(ticks: u64) -> String {
    let hours = (ticks / 1000 + 6) % 24;
    let minutes = (ticks % 1000) * 60 / 1000;
    format!("{hours:02}:{minutes:02}")
}

/// Format an uptime as `Xh Ym Zs`.
#[must_use]
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, rest) = (total / 3600, total % 3600);
    format!("{hours}h {}m {}s", rest / 60, rest % 60)
}

/// Weather label used in prompts and replies.
#[must_use]
pub fn weather_label(storming: bool) -> &'static str {
    if storming { "rain" } else { "clear skies" }
}

/// Fill every token. Used for server-wide broadcasts.
#[must_use]
pub fn fill_all(text: &str, state: &LiveState) -> String {
    let mut out = fill_npc(text, state);
    if out.contains(UPTIME) {
        out = out.replace(UPTIME, &format_uptime(state.uptime));
    }
    if out.contains(ONLINE_PLAYERS) {
        out = out.replace(ONLINE_PLAYERS, &state.online_players.to_string());
    }
    out
}

/// Fill only the clock and weather tokens. Used for NPC replies.
#[must_use]
pub fn fill_npc(text: &str, state: &LiveState) -> String {
    let mut out = text.to_string();
    if out.contains(CURRENT_TIME) {
        out = out.replace(CURRENT_TIME, &format_world_time(state.world_time_ticks));
    }
    if out.contains(WEATHER) {
        out = out.replace(WEATHER, weather_label(state.storming));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> LiveState {
        LiveState {
            world_time_ticks: 18_500,
            uptime: Duration::from_secs(3 * 3600 + 25 * 60 + 7),
            online_players: 4,
            storming: true,
        }
    }

    #[test]
    fn world_clock_starts_at_six() {
        assert_eq!(format_world_time(0), "06:00");
        assert_eq!(format_world_time(6000), "12:00");
        assert_eq!(format_world_time(18_500), "00:30");
    }

    #[test]
    fn uptime_format() {
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 25 * 60 + 7)), "3h 25m 7s");
        assert_eq!(format_uptime(Duration::ZERO), "0h 0m 0s");
    }

    #[test]
    fn server_fill_resolves_everything() {
        let text = "It is {{current_time}}, {{current_weather_state}}, up {{uptime}} with {{online_players}} online";
        assert_eq!(fill_all(text, &state()), "It is 00:30, rain, up 3h 25m 7s with 4 online");
    }

    #[test]
    fn npc_fill_leaves_server_tokens() {
        let text = "{{current_time}} {{uptime}} {{current_weather_state}}";
        assert_eq!(fill_npc(text, &state()), "00:30 {{uptime}} rain");
    }
}
