//! Conversation sessions between players and NPCs.
//!
//! Each player has at most one session. A session starts on interaction,
//! intercepts the player's chat while it lives, and ends when its timer
//! elapses without activity or when the player starts talking to someone
//! else. All state here is owned by the authoritative context; proxy replies
//! come back as [`Continuation::Npc`] completions and are matched against
//! the live session by [`SessionId`].

use std::collections::HashMap;

use palaver_core::history::ConversationHistory;
use palaver_core::persistence::WriterHandle;
use palaver_core::persona::{NameRegistry, PersonalityBook};
use palaver_core::placeholders::{fill_npc, LiveState};
use palaver_core::quest::QuestStateMachine;
use palaver_core::types::{EntityId, Tick};
use palaver_core::village::VillageClusterAssigner;
use palaver_llm::prompt;
use palaver_llm::AiProxyClient;
use tracing::{debug, info, warn};

use crate::feedback::apply_quest_effects;
use crate::hooks::{Host, Tone};
use crate::scheduler::{Scheduler, TimerId};

/// Village name used for NPCs no clustering pass has reached.
pub const FALLBACK_VILLAGE: &str = "the wilds";

/// Category used when the host reports none.
pub const FALLBACK_CATEGORY: &str = "VILLAGER";

/// Label of the reply affordance shown when a session opens.
pub const TALK_LABEL: &str = "[ Talk \u{25b6} ]";

/// Identifies one session instance. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

/// What a proxy completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// A reply inside an NPC session.
    Npc { player: EntityId, session: SessionId },
    /// A reply to a server event prompt.
    ServerEvent,
    /// A reply to a player's ad-hoc chat line.
    AdHocChat { player: EntityId },
}

/// Work scheduled on the authoritative tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    /// Close `session` unless it has been replaced.
    EndSession { player: EntityId, session: SessionId },
    /// Give `npc` its autonomy back.
    ResumeNpc { player: EntityId, npc: EntityId },
    /// Run a village clustering pass.
    VillagePass,
}

/// The proxy client as the host uses it.
pub type ProxyClient = AiProxyClient<Continuation>;

/// Mutable state sessions share with the rest of the rule.
pub struct SessionContext<'a, H> {
    pub host: &'a mut H,
    pub timers: &'a mut Scheduler<TimerTask>,
    pub quests: &'a mut QuestStateMachine,
    pub villages: &'a VillageClusterAssigner,
}

#[derive(Debug)]
struct Session {
    id: SessionId,
    npc: EntityId,
    display_name: String,
    system_prompt: String,
    quest_giver: bool,
    village: String,
    end_timer: TimerId,
}

/// Session tuning, in ticks.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Freeze and expiry window.
    pub freeze_ticks: Tick,
    /// Lower-cased quest keyword. Empty disables quest requests.
    pub quest_keyword: String,
    /// Cap for NPC histories.
    pub npc_history_cap: usize,
}

/// Owns every active session and the per-NPC conversation memory.
pub struct ConversationSessionManager {
    sessions: HashMap<EntityId, Session>,
    /// Pending NPC-resume timer per player, with the NPC it will resume.
    resume_timers: HashMap<EntityId, (TimerId, EntityId)>,
    memory: HashMap<EntityId, ConversationHistory>,
    personalities: PersonalityBook,
    names: NameRegistry,
    client: ProxyClient,
    writer: WriterHandle,
    settings: SessionSettings,
    next_session: u64,
}

impl std::fmt::Debug for ConversationSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSessionManager")
            .field("sessions", &self.sessions.len())
            .field("remembered_npcs", &self.memory.len())
            .finish_non_exhaustive()
    }
}

impl ConversationSessionManager {
    /// Create a manager over restored NPC memory.
    #[must_use]
    pub fn new(
        settings: SessionSettings,
        personalities: PersonalityBook,
        names: NameRegistry,
        memory: HashMap<EntityId, ConversationHistory>,
        client: ProxyClient,
        writer: WriterHandle,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            resume_timers: HashMap::new(),
            memory,
            personalities,
            names,
            client,
            writer,
            settings,
            next_session: 0,
        }
    }

    /// Start a conversation between `player` and `npc`.
    ///
    /// Any existing session for the player is closed first. If the player
    /// has quests from this NPC ready for turn-in, they are completed and no
    /// session is opened.
    pub fn begin<H: Host>(
        &mut self,
        cx: &mut SessionContext<'_, H>,
        player: EntityId,
        player_name: &str,
        npc: EntityId,
    ) {
        self.exit(cx, player);
        self.suspend(cx, player, npc);

        let (village, quest_giver) = cx
            .villages
            .assignment(npc)
            .map_or_else(|| (FALLBACK_VILLAGE.to_string(), false), |a| (a.name.clone(), a.quest_giver));

        let ready = cx.quests.ready_turn_in_quests(player, npc);
        if !ready.is_empty() {
            info!(player = %player, npc = %npc, count = ready.len(), "Turning in quests");
            let effects: Vec<_> = ready
                .iter()
                .filter_map(|quest| cx.quests.complete_quest(player, &quest.id, player_name))
                .collect();
            apply_quest_effects(cx.host, effects);
            return;
        }

        let category = cx
            .host
            .category(npc)
            .map_or_else(|| FALLBACK_CATEGORY.to_string(), |c| c.to_uppercase());
        let (display_name, fresh) = self.names.display_name(npc, &category);
        if fresh {
            let (base, _) = self.names.base_name(npc);
            self.writer.save_base_name(npc, base);
            cx.host.set_display_name(npc, &display_name);
        }

        let personality = self.personalities.resolve(&category, &display_name);
        let system_prompt = prompt::npc_system_prompt(&personality, &village, quest_giver);

        cx.host.open_indicator(player, &format!("Chatting with {display_name}"));

        let cap = self.settings.npc_history_cap;
        let snapshot = self
            .memory
            .entry(npc)
            .or_insert_with(|| ConversationHistory::with_cap(cap))
            .snapshot();

        let id = SessionId(self.next_session);
        self.next_session += 1;
        let end_timer = cx.timers.arm(
            self.settings.freeze_ticks,
            TimerTask::EndSession { player, session: id },
        );

        info!(player = %player, npc = %npc, name = %display_name, village = %village, quest_giver, "Session started");
        cx.host.broadcast(Tone::Muted, &format!("[{display_name}] Thinking..."));
        cx.host.offer_talk(player, TALK_LABEL);

        let greeting = prompt::greeting(player_name, &category, &village);
        self.client.ask_with_system(
            Some(player),
            &snapshot,
            &greeting,
            &system_prompt,
            Continuation::Npc { player, session: id },
        );

        self.sessions.insert(
            player,
            Session {
                id,
                npc,
                display_name,
                system_prompt,
                quest_giver,
                village,
                end_timer,
            },
        );
    }

    /// Route a chat line from `player`.
    ///
    /// Returns `false` when the player has no session, in which case the line
    /// is ordinary chat. Every line from a player in a session is consumed.
    pub fn on_player_message<H: Host>(
        &mut self,
        cx: &mut SessionContext<'_, H>,
        player: EntityId,
        message: &str,
    ) -> bool {
        if !self.sessions.contains_key(&player) {
            return false;
        }
        let message = message.trim();
        if message.is_empty() {
            return true;
        }
        self.touch(cx, player);

        let Some(session) = self.sessions.get(&player) else {
            return true;
        };
        let keyword = &self.settings.quest_keyword;
        let wants_quest = !keyword.is_empty() && message.to_lowercase().contains(keyword.as_str());

        if wants_quest && session.quest_giver {
            match cx.quests.issue_quest(session.npc, player, &session.village) {
                Some(effect) => apply_quest_effects(cx.host, [effect]),
                None => warn!(npc = %session.npc, "No quest templates configured"),
            }
            return true;
        }
        if wants_quest {
            cx.host.tell(
                player,
                Tone::Hint,
                &format!(
                    "I don\u{2019}t give quests\u{2014}look for the quest-giver in {}.",
                    session.village
                ),
            );
            return true;
        }

        cx.host.broadcast(Tone::Muted, &format!("[{}] Thinking...", session.display_name));
        let cap = self.settings.npc_history_cap;
        let history = self
            .memory
            .entry(session.npc)
            .or_insert_with(|| ConversationHistory::with_cap(cap));
        let snapshot = history.snapshot();
        history.push_user(message);

        self.client.ask_with_system(
            Some(player),
            &snapshot,
            message,
            &session.system_prompt,
            Continuation::Npc {
                player,
                session: session.id,
            },
        );
        true
    }

    /// Deliver a proxy reply for `session`. Replies for a session that has
    /// since ended or been replaced are dropped.
    pub fn on_reply<H: Host>(
        &mut self,
        cx: &mut SessionContext<'_, H>,
        player: EntityId,
        session: SessionId,
        answer: &str,
        live: &LiveState,
    ) {
        let Some(active) = self.sessions.get(&player).filter(|s| s.id == session) else {
            debug!(player = %player, "Dropping reply for a closed session");
            return;
        };
        let npc = active.npc;
        let display_name = active.display_name.clone();

        let cap = self.settings.npc_history_cap;
        let history = self
            .memory
            .entry(npc)
            .or_insert_with(|| ConversationHistory::with_cap(cap));
        history.push_assistant(answer);
        self.writer.save_history(npc, history);

        if answer.trim().is_empty() {
            return;
        }
        self.touch(cx, player);
        cx.host.broadcast(
            Tone::Speech,
            &format!("[{display_name}] {}", fill_npc(answer, live)),
        );
    }

    /// Handle a fired session timer. Other tasks are ignored.
    pub fn on_timer<H: Host>(&mut self, cx: &mut SessionContext<'_, H>, task: TimerTask) {
        match task {
            TimerTask::EndSession { player, session } => {
                if self.sessions.get(&player).is_some_and(|s| s.id == session) {
                    debug!(player = %player, "Session expired");
                    self.exit(cx, player);
                }
            }
            TimerTask::ResumeNpc { player, npc } => {
                if self.resume_timers.get(&player).is_some_and(|(_, n)| *n == npc) {
                    self.resume_timers.remove(&player);
                }
                cx.host.set_autonomy(npc, true);
            }
            TimerTask::VillagePass => {}
        }
    }

    /// Close `player`'s session: remove its indicator, cancel its timers,
    /// resume the NPC and persist the NPC's history. Returns `false` if
    /// there was no session.
    pub fn exit<H: Host>(&mut self, cx: &mut SessionContext<'_, H>, player: EntityId) -> bool {
        let Some(session) = self.sessions.remove(&player) else {
            return false;
        };
        cx.timers.cancel(session.end_timer);
        cx.host.close_indicator(player);
        if let Some((timer, npc)) = self.resume_timers.remove(&player) {
            if cx.timers.cancel(timer) {
                cx.host.set_autonomy(npc, true);
            }
        }
        if let Some(history) = self.memory.get(&session.npc) {
            self.writer.save_history(session.npc, history);
        }
        info!(player = %player, npc = %session.npc, "Session ended");
        true
    }

    /// Close every session, e.g. on shutdown.
    pub fn exit_all<H: Host>(&mut self, cx: &mut SessionContext<'_, H>) {
        let players: Vec<EntityId> = self.sessions.keys().copied().collect();
        for player in players {
            self.exit(cx, player);
        }
    }

    /// Whether `player` is talking to an NPC.
    #[must_use]
    pub fn is_in_session(&self, player: EntityId) -> bool {
        self.sessions.contains_key(&player)
    }

    /// The NPC `player` is talking to.
    #[must_use]
    pub fn partner(&self, player: EntityId) -> Option<EntityId> {
        self.sessions.get(&player).map(|s| s.npc)
    }

    /// Display name of the NPC `player` is talking to.
    #[must_use]
    pub fn partner_name(&self, player: EntityId) -> Option<&str> {
        self.sessions.get(&player).map(|s| s.display_name.as_str())
    }

    /// Number of active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// What `npc` remembers.
    #[must_use]
    pub fn memory_of(&self, npc: EntityId) -> Option<&ConversationHistory> {
        self.memory.get(&npc)
    }

    /// Re-arm the session-end and NPC-resume timers and refresh the indicator.
    fn touch<H: Host>(&mut self, cx: &mut SessionContext<'_, H>, player: EntityId) {
        let Some(session) = self.sessions.get_mut(&player) else {
            return;
        };
        cx.timers.cancel(session.end_timer);
        session.end_timer = cx.timers.arm(
            self.settings.freeze_ticks,
            TimerTask::EndSession {
                player,
                session: session.id,
            },
        );
        let npc = session.npc;
        self.suspend(cx, player, npc);
        cx.host.refresh_indicator(player);
    }

    /// Freeze `npc` and (re)arm its resume timer. A different NPC still
    /// frozen for this player is released.
    fn suspend<H: Host>(&mut self, cx: &mut SessionContext<'_, H>, player: EntityId, npc: EntityId) {
        cx.host.set_autonomy(npc, false);
        if let Some((timer, previous)) = self.resume_timers.remove(&player) {
            if cx.timers.cancel(timer) && previous != npc {
                cx.host.set_autonomy(previous, true);
            }
        }
        let timer = cx
            .timers
            .arm(self.settings.freeze_ticks, TimerTask::ResumeNpc { player, npc });
        self.resume_timers.insert(player, (timer, npc));
    }
}
