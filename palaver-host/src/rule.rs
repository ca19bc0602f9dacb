//! `ChatRule` — the authoritative-context owner.
//!
//! The host holds one `ChatRule` and calls into it from its main tick
//! thread only: [`ChatRule::handle_event`] for every [`HostEvent`], and
//! [`ChatRule::tick`] once per simulation tick. Proxy round trips run on the
//! tokio runtime handed to [`ChatRule::bootstrap`]; their completions queue
//! on a channel that `tick` drains, so no session, history or quest state is
//! ever touched off the tick thread.

use std::time::Instant;

use anyhow::Context;
use palaver_core::config::PalaverConfig;
use palaver_core::persistence::{PersistenceWriter, Store, WriterHandle};
use palaver_core::persona::{NameRegistry, PersonalityBook};
use palaver_core::placeholders::LiveState;
use palaver_core::quest::QuestStateMachine;
use palaver_core::types::Tick;
use palaver_core::village::VillageClusterAssigner;
use palaver_llm::{AiProxyClient, Completion, ProxyStatsSnapshot, ProxyTransport, RequestSettings};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::config::RuleSettings;
use crate::events::{Disposition, HostEvent};
use crate::feedback::apply_quest_effects;
use crate::hooks::Host;
use crate::scheduler::{Scheduler, SchedulerStats};
use crate::server_chat::ServerChat;
use crate::session::{
    Continuation, ConversationSessionManager, ProxyClient, SessionContext, SessionSettings, TimerTask,
};

/// Central state for conversational NPCs, server chat and quests.
pub struct ChatRule {
    settings: RuleSettings,
    sessions: ConversationSessionManager,
    server_chat: ServerChat,
    quests: QuestStateMachine,
    villages: VillageClusterAssigner,
    timers: Scheduler<TimerTask>,
    client: ProxyClient,
    completions: UnboundedReceiver<Completion<Continuation>>,
    writer: WriterHandle,
    persistence: Option<PersistenceWriter>,
    started: Instant,
    village_pass_armed: bool,
}

impl std::fmt::Debug for ChatRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRule")
            .field("sessions", &self.sessions)
            .field("open_quests", &self.quests.open_count())
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

impl ChatRule {
    /// Open the configured database and connect to the configured proxy.
    ///
    /// Configuration warnings are logged by [`crate::config::load_config`].
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened or read, or the persistence
    /// thread cannot be started.
    pub fn bootstrap(config: &PalaverConfig, runtime: Handle) -> anyhow::Result<Self> {
        let path = &config.persistence.database_path;
        let store = Store::open(path, &config.persistence)
            .with_context(|| format!("failed to open database {path}"))?;
        info!(url = %config.proxy.url, model = %config.proxy.model_name, mode = ?config.proxy.mode, "Proxy configured");
        Self::from_parts(config, store, ProxyTransport::from_config(&config.proxy), runtime, None)
    }

    /// Assemble a rule from an open store and an explicit transport.
    ///
    /// With a `seed`, quest picks, quest-giver selection and name draws are
    /// repeatable.
    ///
    /// # Errors
    ///
    /// Fails if persisted state cannot be read or the persistence thread
    /// cannot be started.
    pub fn from_parts(
        config: &PalaverConfig,
        store: Store,
        transport: ProxyTransport,
        runtime: Handle,
        seed: Option<u64>,
    ) -> anyhow::Result<Self> {
        let settings = RuleSettings::from_config(config);

        let ledger = store.load_quest_ledger().context("failed to load quest ledger")?;
        let assignments = store.load_villages().context("failed to load villages")?;
        let base_names = store.load_base_names().context("failed to load names")?;
        let memory = store
            .load_histories(settings.npc_history_cap)
            .context("failed to load NPC memory")?;
        info!(
            players_with_quests = ledger.len(),
            villagers = assignments.len(),
            named = base_names.len(),
            remembered = memory.len(),
            "Persisted state loaded"
        );

        let persistence = PersistenceWriter::spawn(store).context("failed to start persistence writer")?;
        let writer = persistence.handle();

        let templates = config.quests.templates.clone();
        let mut quests = match seed {
            Some(seed) => QuestStateMachine::seeded(templates, seed),
            None => QuestStateMachine::new(templates),
        }
        .with_sink(Box::new(writer.clone()));
        quests.restore(ledger);

        let mut villages = match seed {
            Some(seed) => VillageClusterAssigner::seeded(&config.villages, seed.wrapping_add(1)),
            None => VillageClusterAssigner::new(&config.villages),
        };
        villages.restore(assignments);

        let mut names = match seed {
            Some(seed) => NameRegistry::seeded(config.names.base.clone(), seed.wrapping_add(2)),
            None => NameRegistry::new(config.names.base.clone()),
        };
        names.restore(base_names);

        let (client, completions) =
            AiProxyClient::with_transport(transport, RequestSettings::from_config(&config.proxy), runtime);

        let sessions = ConversationSessionManager::new(
            SessionSettings {
                freeze_ticks: settings.freeze_ticks,
                quest_keyword: settings.quest_keyword.clone(),
                npc_history_cap: settings.npc_history_cap,
            },
            PersonalityBook::new(&config.personalities),
            names,
            memory,
            client.clone(),
            writer.clone(),
        );
        let server_chat = ServerChat::new(
            client.clone(),
            settings.server_history_cap,
            settings.ad_hoc_history_cap,
        );

        info!(
            freeze_ticks = settings.freeze_ticks,
            first_village_pass = settings.village_initial_delay,
            village_period = settings.village_period,
            "Chat rule ready"
        );

        Ok(Self {
            settings,
            sessions,
            server_chat,
            quests,
            villages,
            timers: Scheduler::new(),
            client,
            completions,
            writer,
            persistence: Some(persistence),
            started: Instant::now(),
            village_pass_armed: false,
        })
    }

    /// Handle one host event.
    pub fn handle_event<H: Host>(&mut self, host: &mut H, event: HostEvent) -> Disposition {
        debug!(event = event.label(), player = ?event.player(), "Host event");

        if let Some(progress) = event.as_progress() {
            let effects = self.quests.on_world_event(&progress);
            apply_quest_effects(host, effects);
            return Disposition::Ignored;
        }

        match event {
            HostEvent::InteractionStart {
                player,
                player_name,
                npc,
            } => {
                let mut cx = SessionContext {
                    host: &mut *host,
                    timers: &mut self.timers,
                    quests: &mut self.quests,
                    villages: &self.villages,
                };
                self.sessions.begin(&mut cx, player, &player_name, npc);
                Disposition::Consumed
            }
            HostEvent::ChatSubmitted {
                player,
                player_name,
                message,
            } => {
                let mut cx = SessionContext {
                    host: &mut *host,
                    timers: &mut self.timers,
                    quests: &mut self.quests,
                    villages: &self.villages,
                };
                if self.sessions.on_player_message(&mut cx, player, &message) {
                    return Disposition::Consumed;
                }
                let taken = self.server_chat.on_chat(host, player, &player_name, &message);
                Disposition::from_taken(taken)
            }
            HostEvent::PlayerDied {
                victim_name,
                killer_name,
            } => {
                self.server_chat.on_death(host, &victim_name, killer_name.as_deref());
                Disposition::Ignored
            }
            HostEvent::Join { player_name, .. } => {
                self.server_chat.on_join(host, &player_name);
                Disposition::Ignored
            }
            HostEvent::Quit { player, player_name } => {
                let mut cx = SessionContext {
                    host: &mut *host,
                    timers: &mut self.timers,
                    quests: &mut self.quests,
                    villages: &self.villages,
                };
                self.sessions.exit(&mut cx, player);
                self.server_chat.on_quit(host, player, &player_name);
                Disposition::Ignored
            }
            HostEvent::AdvancementDone { player_name, key } => {
                self.server_chat.on_advancement(host, &player_name, &key);
                Disposition::Ignored
            }
            HostEvent::WeatherChange { world, storming } => {
                self.server_chat.on_weather(host, &world, storming);
                Disposition::Ignored
            }
            HostEvent::EntityKilled { .. } | HostEvent::ItemPickup { .. } => Disposition::Ignored,
        }
    }

    /// Advance to `now`: fire due timers, then deliver finished replies.
    pub fn tick<H: Host>(&mut self, host: &mut H, now: Tick) {
        for task in self.timers.advance(now) {
            self.run_timer(host, task);
        }

        if !self.village_pass_armed {
            self.timers.arm(self.settings.village_initial_delay, TimerTask::VillagePass);
            self.village_pass_armed = true;
        }

        let live = self.live_state(&*host);
        while let Ok(done) = self.completions.try_recv() {
            self.deliver(host, done, &live);
        }
    }

    /// Close every session and wait for pending writes.
    pub fn shutdown<H: Host>(mut self, host: &mut H) {
        let mut cx = SessionContext {
            host: &mut *host,
            timers: &mut self.timers,
            quests: &mut self.quests,
            villages: &self.villages,
        };
        self.sessions.exit_all(&mut cx);
        if let Err(e) = self.writer.flush() {
            warn!(error = %e, "Persistence flush failed during shutdown");
        }
        drop(self.persistence.take());
        info!(uptime_s = self.started.elapsed().as_secs(), "Chat rule stopped");
    }

    /// Live values for placeholder substitution.
    pub fn live_state<H: Host>(&self, host: &H) -> LiveState {
        LiveState {
            world_time_ticks: host.world_time_ticks(),
            uptime: self.started.elapsed(),
            online_players: host.online_players(),
            storming: host.is_storming(),
        }
    }

    /// Quest state.
    #[must_use]
    pub fn quests(&self) -> &QuestStateMachine {
        &self.quests
    }

    /// Session state.
    #[must_use]
    pub fn sessions(&self) -> &ConversationSessionManager {
        &self.sessions
    }

    /// Server chat state.
    #[must_use]
    pub fn server_chat(&self) -> &ServerChat {
        &self.server_chat
    }

    /// Village assignments.
    #[must_use]
    pub fn villages(&self) -> &VillageClusterAssigner {
        &self.villages
    }

    /// Proxy traffic counters.
    #[must_use]
    pub fn proxy_stats(&self) -> ProxyStatsSnapshot {
        self.client.stats()
    }

    /// Timer counters.
    #[must_use]
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.timers.stats()
    }

    /// Number of armed timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Block until every write submitted so far is on disk.
    ///
    /// # Errors
    ///
    /// Fails if the persistence writer has stopped.
    pub fn flush(&self) -> anyhow::Result<()> {
        self.writer.flush().context("persistence writer stopped")
    }

    fn deliver<H: Host>(&mut self, host: &mut H, done: Completion<Continuation>, live: &LiveState) {
        let Completion {
            identity,
            answer,
            token,
        } = done;
        debug!(identity = ?identity, continuation = ?token, chars = answer.len(), "Completion delivered");
        match token {
            Continuation::Npc { player, session } => {
                let mut cx = SessionContext {
                    host: &mut *host,
                    timers: &mut self.timers,
                    quests: &mut self.quests,
                    villages: &self.villages,
                };
                self.sessions.on_reply(&mut cx, player, session, &answer, live);
            }
            other => self.server_chat.on_reply(host, other, &answer, live),
        }
    }

    fn run_timer<H: Host>(&mut self, host: &mut H, task: TimerTask) {
        if task == TimerTask::VillagePass {
            self.run_village_pass(host);
            return;
        }
        let mut cx = SessionContext {
            host: &mut *host,
            timers: &mut self.timers,
            quests: &mut self.quests,
            villages: &self.villages,
        };
        self.sessions.on_timer(&mut cx, task);
    }

    fn run_village_pass<H: Host>(&mut self, host: &mut H) {
        let start = Instant::now();
        let npcs = host.npcs();
        let clusters = self.villages.run_pass(&npcs);
        for member in clusters.iter().flat_map(|c| c.members.iter()) {
            if let Some(assignment) = self.villages.assignment(*member) {
                self.writer.save_village(*member, assignment.clone());
            }
        }
        info!(
            npcs = npcs.len(),
            villages = clusters.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Village pass complete"
        );
        self.timers.arm(self.settings.village_period, TimerTask::VillagePass);
    }
}
