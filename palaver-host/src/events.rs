//! Host events that drive conversations, server chat and quest progress.
//!
//! The embedding host translates its own callbacks into [`HostEvent`]s and
//! feeds them to [`crate::rule::ChatRule::handle_event`] on the
//! authoritative context. Events are serde-tagged so a host written in
//! another process can stream them as JSON lines.

use palaver_core::quest::{ProgressEvent, QuestKind};
use palaver_core::types::EntityId;
use serde::{Deserialize, Serialize};

/// An event observed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A player interacted with an NPC.
    InteractionStart {
        player: EntityId,
        player_name: String,
        npc: EntityId,
    },

    /// A player submitted a chat line.
    ChatSubmitted {
        player: EntityId,
        player_name: String,
        message: String,
    },

    /// A player killed a creature.
    EntityKilled {
        killer: EntityId,
        killer_name: String,
        /// Creature kind, e.g. `ZOMBIE`.
        kind: String,
    },

    /// A player died.
    PlayerDied {
        victim_name: String,
        /// Set when another player landed the killing blow.
        #[serde(default)]
        killer_name: Option<String>,
    },

    /// A player picked up an item.
    ItemPickup {
        player: EntityId,
        player_name: String,
        item_kind: String,
    },

    /// A player joined the server.
    Join { player: EntityId, player_name: String },

    /// A player left the server.
    Quit { player: EntityId, player_name: String },

    /// A player completed an advancement.
    AdvancementDone { player_name: String, key: String },

    /// Weather changed in a world.
    WeatherChange { world: String, storming: bool },
}

impl HostEvent {
    /// Short name for logging.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::InteractionStart { .. } => "interaction_start",
            Self::ChatSubmitted { .. } => "chat_submitted",
            Self::EntityKilled { .. } => "entity_killed",
            Self::PlayerDied { .. } => "player_died",
            Self::ItemPickup { .. } => "item_pickup",
            Self::Join { .. } => "join",
            Self::Quit { .. } => "quit",
            Self::AdvancementDone { .. } => "advancement_done",
            Self::WeatherChange { .. } => "weather_change",
        }
    }

    /// The player the event is about, when there is one identified by id.
    #[must_use]
    pub fn player(&self) -> Option<EntityId> {
        match self {
            Self::InteractionStart { player, .. }
            | Self::ChatSubmitted { player, .. }
            | Self::ItemPickup { player, .. }
            | Self::Join { player, .. }
            | Self::Quit { player, .. } => Some(*player),
            Self::EntityKilled { killer, .. } => Some(*killer),
            Self::PlayerDied { .. } | Self::AdvancementDone { .. } | Self::WeatherChange { .. } => None,
        }
    }

    /// The quest progress this event represents, if any.
    #[must_use]
    pub fn as_progress(&self) -> Option<ProgressEvent> {
        match self {
            Self::EntityKilled {
                killer,
                killer_name,
                kind,
            } => Some(ProgressEvent {
                kind: QuestKind::Kill,
                actor: *killer,
                actor_name: killer_name.clone(),
                subject: kind.clone(),
            }),
            Self::ItemPickup {
                player,
                player_name,
                item_kind,
            } => Some(ProgressEvent {
                kind: QuestKind::Fetch,
                actor: *player,
                actor_name: player_name.clone(),
                subject: item_kind.clone(),
            }),
            _ => None,
        }
    }
}

/// Whether the host should continue its own handling of an event.
///
/// A consumed interaction must not open the host's own UI (e.g. a trade
/// window), and a consumed chat line must not be broadcast as ordinary chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Palaver took over the event.
    Consumed,
    /// The host should proceed as usual.
    Ignored,
}

impl Disposition {
    /// `Consumed` when `taken` is true.
    #[must_use]
    pub fn from_taken(taken: bool) -> Self {
        if taken { Self::Consumed } else { Self::Ignored }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kills_and_pickups_become_progress() {
        let player = EntityId::new();
        let kill = HostEvent::EntityKilled {
            killer: player,
            killer_name: "Steve".into(),
            kind: "ZOMBIE".into(),
        };
        let progress = kill.as_progress().expect("kill is progress");
        assert_eq!(progress.kind, QuestKind::Kill);
        assert_eq!(progress.actor, player);
        assert_eq!(progress.subject, "ZOMBIE");

        let pickup = HostEvent::ItemPickup {
            player,
            player_name: "Steve".into(),
            item_kind: "DIAMOND".into(),
        };
        assert_eq!(pickup.as_progress().expect("pickup").kind, QuestKind::Fetch);

        let join = HostEvent::Join {
            player,
            player_name: "Steve".into(),
        };
        assert!(join.as_progress().is_none());
    }

    #[test]
    fn accessors() {
        let player = EntityId::new();
        let event = HostEvent::Quit {
            player,
            player_name: "Alex".into(),
        };
        assert_eq!(event.label(), "quit");
        assert_eq!(event.player(), Some(player));
        let weather = HostEvent::WeatherChange {
            world: "world".into(),
            storming: true,
        };
        assert_eq!(weather.player(), None);
    }

    #[test]
    fn events_parse_from_json_lines() {
        let line = r#"{"type":"player_died","victim_name":"Steve"}"#;
        let event: HostEvent = serde_json::from_str(line).expect("valid event");
        assert_eq!(
            event,
            HostEvent::PlayerDied {
                victim_name: "Steve".into(),
                killer_name: None,
            }
        );
    }
}
