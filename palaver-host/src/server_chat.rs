//! Server-wide AI chat: event commentary and ad-hoc replies to players who
//! are not in an NPC session.

use std::collections::HashMap;

use palaver_core::history::ConversationHistory;
use palaver_core::placeholders::{fill_all, LiveState};
use palaver_core::types::EntityId;
use palaver_llm::prompt;
use tracing::debug;

use crate::hooks::{Host, Tone};
use crate::session::{Continuation, ProxyClient};

/// Speaker tag for server-AI lines.
pub const AI_TAG: &str = "[AI]";

/// Shared event history plus one short history per chatting player.
pub struct ServerChat {
    client: ProxyClient,
    server_history: ConversationHistory,
    ad_hoc: HashMap<EntityId, ConversationHistory>,
    ad_hoc_cap: usize,
}

impl std::fmt::Debug for ServerChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerChat")
            .field("server_history", &self.server_history.len())
            .field("ad_hoc_players", &self.ad_hoc.len())
            .finish_non_exhaustive()
    }
}

impl ServerChat {
    /// Create with the given history caps.
    #[must_use]
    pub fn new(client: ProxyClient, server_history_cap: usize, ad_hoc_cap: usize) -> Self {
        Self {
            client,
            server_history: ConversationHistory::with_cap(server_history_cap),
            ad_hoc: HashMap::new(),
            ad_hoc_cap,
        }
    }

    /// Welcome a joining player.
    pub fn on_join<H: Host>(&mut self, host: &mut H, player_name: &str) {
        self.event_prompt(host, &prompt::join(player_name));
    }

    /// Say farewell and forget the player's ad-hoc history.
    pub fn on_quit<H: Host>(&mut self, host: &mut H, player: EntityId, player_name: &str) {
        self.ad_hoc.remove(&player);
        self.event_prompt(host, &prompt::quit(player_name));
    }

    /// Comment on a player's death.
    pub fn on_death<H: Host>(&mut self, host: &mut H, victim: &str, killer: Option<&str>) {
        self.event_prompt(host, &prompt::death(victim, killer));
    }

    /// Congratulate an advancement.
    pub fn on_advancement<H: Host>(&mut self, host: &mut H, player_name: &str, key: &str) {
        self.event_prompt(host, &prompt::advancement(player_name, key));
    }

    /// Comment on a weather change.
    pub fn on_weather<H: Host>(&mut self, host: &mut H, world: &str, storming: bool) {
        self.event_prompt(host, &prompt::weather(world, storming));
    }

    /// Answer a chat line. Returns `true` if the line was taken over.
    ///
    /// Blank lines and commands are left to the host. Callers route lines
    /// from players in an NPC session elsewhere first.
    pub fn on_chat<H: Host>(&mut self, host: &mut H, player: EntityId, player_name: &str, message: &str) -> bool {
        let message = message.trim();
        if message.is_empty() || message.starts_with('/') {
            return false;
        }

        host.broadcast(Tone::Muted, &format!("{player_name}: {message}"));
        host.broadcast(Tone::Muted, &format!("{AI_TAG} Thinking..."));

        let cap = self.ad_hoc_cap;
        let history = self
            .ad_hoc
            .entry(player)
            .or_insert_with(|| ConversationHistory::with_cap(cap));
        let snapshot = history.snapshot();
        history.push_user(message);

        self.client
            .ask(Some(player), &snapshot, message, Continuation::AdHocChat { player });
        true
    }

    /// Deliver a reply to an event prompt or ad-hoc line.
    pub fn on_reply<H: Host>(&mut self, host: &mut H, continuation: Continuation, answer: &str, live: &LiveState) {
        match continuation {
            Continuation::ServerEvent => self.server_history.push_assistant(answer),
            Continuation::AdHocChat { player } => match self.ad_hoc.get_mut(&player) {
                Some(history) => history.push_assistant(answer),
                // Player left while the request was in flight.
                None => debug!(player = %player, "No ad-hoc history for reply"),
            },
            Continuation::Npc { .. } => return,
        }
        if answer.trim().is_empty() {
            return;
        }
        host.broadcast(Tone::Speech, &format!("{AI_TAG} {}", fill_all(answer, live)));
    }

    /// The shared event history.
    #[must_use]
    pub fn server_history(&self) -> &ConversationHistory {
        &self.server_history
    }

    /// A player's ad-hoc history.
    #[must_use]
    pub fn ad_hoc_history(&self, player: EntityId) -> Option<&ConversationHistory> {
        self.ad_hoc.get(&player)
    }

    fn event_prompt<H: Host>(&mut self, host: &mut H, text: &str) {
        let snapshot = self.server_history.snapshot();
        self.server_history.push_system(text);
        host.broadcast(Tone::Muted, &format!("{AI_TAG} Thinking..."));
        self.client
            .ask(Some(EntityId::SERVER), &snapshot, text, Continuation::ServerEvent);
    }
}
