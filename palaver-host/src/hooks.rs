//! Collaborator surfaces the host provides.
//!
//! Palaver never reaches into the game directly. Everything it needs from
//! the world, and every effect it has on it, goes through these traits. All
//! calls are made from the authoritative context.

use palaver_core::types::{EntityId, NpcPosition};

/// How a line of text should be styled by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Status lines such as "Thinking..." and echoed chat.
    Muted,
    /// NPC or server-AI speech.
    Speech,
    /// Static guidance.
    Hint,
    /// Quest notifications.
    Quest,
    /// Reward notifications.
    Reward,
}

/// NPC control surface.
pub trait NpcControl {
    /// Turn autonomous behavior (movement, pathing) on or off.
    fn set_autonomy(&mut self, npc: EntityId, enabled: bool);

    /// The NPC's personality category (e.g. `FARMER`), if it has one.
    fn category(&self, npc: EntityId) -> Option<String>;

    /// Show `name` above the NPC.
    fn set_display_name(&mut self, npc: EntityId, name: &str);
}

/// Notification surface.
pub trait Notifier {
    /// Send a line to every player.
    fn broadcast(&mut self, tone: Tone, text: &str);

    /// Send a line to one player.
    fn tell(&mut self, player: EntityId, tone: Tone, text: &str);

    /// Transient line above the player's hotbar.
    fn action_bar(&mut self, player: EntityId, text: &str);

    /// Show a progress indicator titled `title`, replacing any existing one.
    fn open_indicator(&mut self, player: EntityId, title: &str);

    /// Restart the indicator's countdown.
    fn refresh_indicator(&mut self, player: EntityId);

    /// Remove the indicator.
    fn close_indicator(&mut self, player: EntityId);

    /// A clickable affordance that suggests replying.
    fn offer_talk(&mut self, player: EntityId, label: &str);
}

/// Runs console directives such as quest rewards.
pub trait CommandDispatcher {
    /// Execute `command` with console privileges.
    fn dispatch_console(&mut self, command: &str);
}

/// Read-only view of live world state.
pub trait WorldView {
    /// World clock in ticks.
    fn world_time_ticks(&self) -> u64;

    /// Whether it is raining or storming.
    fn is_storming(&self) -> bool;

    /// Players currently online.
    fn online_players(&self) -> usize;

    /// Every loaded NPC that takes part in village clustering.
    fn npcs(&self) -> Vec<NpcPosition>;
}

/// Everything Palaver needs from its host.
pub trait Host: NpcControl + Notifier + CommandDispatcher + WorldView {}

impl<T: NpcControl + Notifier + CommandDispatcher + WorldView> Host for T {}
