//! Quest ledger and progress state machine.
//!
//! Lifecycle of a quest:
//!
//! ```text
//! issue ──► open(amount) ──matching event──► open(amount - 1)
//!                │                               │ amount == 0
//!                │                  ┌────────────┴─────────────┐
//!                │          requires turn-in               otherwise
//!                │                  ▼                          ▼
//!                │        ready_to_turn_in ──giver visit──► completed (removed,
//!                │                                          reward dispatched once)
//! ```
//!
//! The state machine never talks to the world directly. Every operation
//! returns [`QuestEffect`]s for the host to render and dispatch, and every
//! mutation immediately hands the affected player's ledger to the configured
//! [`LedgerSink`].

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::EntityId;

/// Token in reward directives replaced with the player's name.
pub const PLAYER_TOKEN: &str = "%player%";

/// Token in location hints replaced with the giver's village name.
pub const VILLAGE_TOKEN: &str = "{village}";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What a quest asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestKind {
    /// Slay `amount` creatures of the target kind.
    Kill,
    /// Pick up `amount` items of the target kind.
    Fetch,
}

impl QuestKind {
    /// Upper-case label used in player-facing text.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Kill => "KILL",
            Self::Fetch => "FETCH",
        }
    }
}

/// A quest owned by one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    /// Unique quest ID.
    pub id: String,
    /// Objective type.
    pub kind: QuestKind,
    /// Creature or item kind that counts toward the objective.
    pub target: String,
    /// Remaining count. Never negative.
    pub amount: u32,
    /// Where to look.
    pub location_hint: String,
    /// Console directive run on completion, with [`PLAYER_TOKEN`] substituted.
    pub reward_command: String,
    /// NPC that issued the quest.
    pub giver: EntityId,
    /// Player that owns the quest.
    pub owner: EntityId,
    /// Whether the player must return to the giver once the objective is met.
    #[serde(default)]
    pub requires_turn_in: bool,
    /// Set once the objective is met on a turn-in quest.
    #[serde(default)]
    pub ready_to_turn_in: bool,
}

impl Quest {
    /// Whether a world event still counts toward this quest.
    #[must_use]
    pub fn accepts(&self, kind: QuestKind, subject: &str) -> bool {
        self.kind == kind
            && self.amount > 0
            && !self.ready_to_turn_in
            && self.target.eq_ignore_ascii_case(subject)
    }

    /// The reward directive with the player's name filled in.
    #[must_use]
    pub fn reward_for(&self, player_name: &str) -> String {
        self.reward_command.replace(PLAYER_TOKEN, player_name)
    }
}

/// Data-driven recipe for a quest. Quest-givers pick one uniformly at random.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestTemplate {
    /// Objective type.
    pub kind: QuestKind,
    /// Creature or item kind.
    pub target: String,
    /// Count required. Zero is treated as one.
    pub amount: u32,
    /// Location hint; may contain [`VILLAGE_TOKEN`].
    pub location_hint: String,
    /// Reward directive; may contain [`PLAYER_TOKEN`].
    pub reward_command: String,
    /// Whether completion requires revisiting the giver.
    #[serde(default)]
    pub requires_turn_in: bool,
}

impl QuestTemplate {
    /// The three stock quests.
    #[must_use]
    pub fn builtin() -> Vec<Self> {
        vec![
            Self {
                kind: QuestKind::Kill,
                target: "ZOMBIE".to_string(),
                amount: 5,
                location_hint: format!("{VILLAGE_TOKEN} outskirts"),
                reward_command: format!("give {PLAYER_TOKEN} iron_sword 1"),
                requires_turn_in: false,
            },
            Self {
                kind: QuestKind::Fetch,
                target: "DIAMOND".to_string(),
                amount: 1,
                location_hint: "hidden cave".to_string(),
                reward_command: format!("give {PLAYER_TOKEN} diamond 2"),
                requires_turn_in: true,
            },
            Self {
                kind: QuestKind::Kill,
                target: "SKELETON".to_string(),
                amount: 3,
                location_hint: "ancient ruins".to_string(),
                reward_command: format!("give {PLAYER_TOKEN} bow 1"),
                requires_turn_in: false,
            },
        ]
    }

    /// Instantiate the template for a giver/player pair.
    #[must_use]
    pub fn instantiate(&self, giver: EntityId, owner: EntityId, village_name: &str) -> Quest {
        Quest {
            id: Uuid::new_v4().to_string(),
            kind: self.kind,
            target: self.target.clone(),
            amount: self.amount.max(1),
            location_hint: self.location_hint.replace(VILLAGE_TOKEN, village_name),
            reward_command: self.reward_command.clone(),
            giver,
            owner,
            requires_turn_in: self.requires_turn_in,
            ready_to_turn_in: false,
        }
    }
}

/// A world event that may advance quests.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Kill or pickup.
    pub kind: QuestKind,
    /// The player who performed it.
    pub actor: EntityId,
    /// The player's display name (for reward substitution).
    pub actor_name: String,
    /// Creature or item kind involved.
    pub subject: String,
}

/// What the host should show or do as a result of a quest operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestEffect {
    /// A quest was added to a player's ledger.
    Issued {
        /// The new quest.
        quest: Quest,
    },
    /// A matching event reduced the remaining amount.
    Progress {
        /// Owner.
        player: EntityId,
        /// Target kind.
        target: String,
        /// Remaining count after the decrement.
        remaining: u32,
    },
    /// A turn-in quest's objective is met.
    ReadyToTurnIn {
        /// Owner.
        player: EntityId,
        /// Quest ID.
        quest_id: String,
    },
    /// A quest finished. The reward directive must be dispatched exactly once.
    Completed {
        /// Owner.
        player: EntityId,
        /// Quest ID.
        quest_id: String,
        /// Reward directive with the player's name filled in.
        reward_command: String,
    },
}

// ---------------------------------------------------------------------------
// Persistence seam
// ---------------------------------------------------------------------------

/// Receives a player's full quest list after every mutation.
///
/// Implementations must not block; the expected implementation forwards to a
/// background writer.
pub trait LedgerSink: Send {
    /// Persist `quests` as the complete ledger of `player`.
    fn persist(&self, player: EntityId, quests: Vec<Quest>);
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Owns every player's quest records.
pub struct QuestStateMachine {
    ledger: HashMap<EntityId, Vec<Quest>>,
    templates: Vec<QuestTemplate>,
    rng: StdRng,
    sink: Option<Box<dyn LedgerSink>>,
}

impl std::fmt::Debug for QuestStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestStateMachine")
            .field("players", &self.ledger.len())
            .field("templates", &self.templates.len())
            .finish_non_exhaustive()
    }
}

impl QuestStateMachine {
    /// Create an empty state machine with entropy-seeded randomness.
    #[must_use]
    pub fn new(templates: Vec<QuestTemplate>) -> Self {
        Self::with_rng(templates, StdRng::from_entropy())
    }

    /// Create an empty state machine with a fixed seed (repeatable picks).
    #[must_use]
    pub fn seeded(templates: Vec<QuestTemplate>, seed: u64) -> Self {
        Self::with_rng(templates, StdRng::seed_from_u64(seed))
    }

    fn with_rng(templates: Vec<QuestTemplate>, rng: StdRng) -> Self {
        Self {
            ledger: HashMap::new(),
            templates,
            rng,
            sink: None,
        }
    }

    /// Attach the persistence sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn LedgerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the in-memory ledger with previously persisted state.
    /// Amounts are taken as stored; nothing is written back.
    pub fn restore(&mut self, ledger: HashMap<EntityId, Vec<Quest>>) {
        let count: usize = ledger.values().map(Vec::len).sum();
        info!(players = ledger.len(), quests = count, "Quest ledger restored");
        self.ledger = ledger;
    }

    /// Pick a template uniformly at random and add it to `player`'s ledger.
    ///
    /// Returns `None` only when no templates are configured.
    pub fn issue_quest(
        &mut self,
        giver: EntityId,
        player: EntityId,
        village_name: &str,
    ) -> Option<QuestEffect> {
        if self.templates.is_empty() {
            return None;
        }
        let pick = self.rng.gen_range(0..self.templates.len());
        let quest = self.templates[pick].instantiate(giver, player, village_name);
        Some(self.add_quest(quest))
    }

    /// Add a fully-formed quest to its owner's ledger.
    pub fn add_quest(&mut self, quest: Quest) -> QuestEffect {
        let owner = quest.owner;
        debug!(player = %owner, quest = %quest.id, kind = quest.kind.label(), target = %quest.target, "Quest issued");
        self.ledger.entry(owner).or_default().push(quest.clone());
        self.persist(owner);
        QuestEffect::Issued { quest }
    }

    /// Advance the actor's first matching open quest.
    ///
    /// At most one quest is affected per event. Non-matching events produce
    /// no effects and no writes.
    pub fn on_world_event(&mut self, event: &ProgressEvent) -> Vec<QuestEffect> {
        let Some(quests) = self.ledger.get_mut(&event.actor) else {
            return Vec::new();
        };
        let Some(index) = quests
            .iter()
            .position(|q| q.accepts(event.kind, &event.subject))
        else {
            return Vec::new();
        };

        let quest = &mut quests[index];
        quest.amount -= 1;

        let effect = if quest.amount > 0 {
            QuestEffect::Progress {
                player: event.actor,
                target: quest.target.clone(),
                remaining: quest.amount,
            }
        } else if quest.requires_turn_in {
            quest.ready_to_turn_in = true;
            QuestEffect::ReadyToTurnIn {
                player: event.actor,
                quest_id: quest.id.clone(),
            }
        } else {
            let quest = quests.remove(index);
            self.finish(quest, &event.actor_name)
        };

        self.persist(event.actor);
        vec![effect]
    }

    /// Quests owned by `player`, issued by `giver`, ready for turn-in.
    #[must_use]
    pub fn ready_turn_in_quests(&self, player: EntityId, giver: EntityId) -> Vec<Quest> {
        self.ledger
            .get(&player)
            .map(|quests| {
                quests
                    .iter()
                    .filter(|q| q.giver == giver && q.ready_to_turn_in)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Complete a quest and remove it from the ledger.
    ///
    /// Returns `None` if the quest is no longer present, so a second call for
    /// the same quest never dispatches a second reward.
    pub fn complete_quest(
        &mut self,
        player: EntityId,
        quest_id: &str,
        player_name: &str,
    ) -> Option<QuestEffect> {
        let quests = self.ledger.get_mut(&player)?;
        let index = quests.iter().position(|q| q.id == quest_id)?;
        let quest = quests.remove(index);
        let effect = self.finish(quest, player_name);
        self.persist(player);
        Some(effect)
    }

    /// All quests currently owned by `player`, in issue order.
    #[must_use]
    pub fn quests_for(&self, player: EntityId) -> &[Quest] {
        self.ledger.get(&player).map_or(&[], Vec::as_slice)
    }

    /// Total number of open quests across all players.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.ledger.values().map(Vec::len).sum()
    }

    fn finish(&self, quest: Quest, player_name: &str) -> QuestEffect {
        info!(player = %quest.owner, quest = %quest.id, "Quest completed");
        QuestEffect::Completed {
            player: quest.owner,
            reward_command: quest.reward_for(player_name),
            quest_id: quest.id,
        }
    }

    fn persist(&mut self, player: EntityId) {
        let quests = self.ledger.get(&player).cloned().unwrap_or_default();
        if quests.is_empty() {
            self.ledger.remove(&player);
        }
        if let Some(sink) = &self.sink {
            sink.persist(player, quests);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<(EntityId, usize)>>>);

    impl LedgerSink for RecordingSink {
        fn persist(&self, player: EntityId, quests: Vec<Quest>) {
            self.0.lock().expect("lock").push((player, quests.len()));
        }
    }

    fn kill_template(amount: u32, requires_turn_in: bool) -> QuestTemplate {
        QuestTemplate {
            kind: QuestKind::Kill,
            target: "ZOMBIE".to_string(),
            amount,
            location_hint: format!("{VILLAGE_TOKEN} outskirts"),
            reward_command: format!("give {PLAYER_TOKEN} iron_sword 1"),
            requires_turn_in,
        }
    }

    fn kill(actor: EntityId, subject: &str) -> ProgressEvent {
        ProgressEvent {
            kind: QuestKind::Kill,
            actor,
            actor_name: "Steve".to_string(),
            subject: subject.to_string(),
        }
    }

    fn completions(effects: &[QuestEffect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, QuestEffect::Completed { .. }))
            .count()
    }

    #[test]
    fn zero_amount_template_needs_one_event() {
        let mut machine = QuestStateMachine::seeded(vec![kill_template(0, false)], 7);
        let (giver, player) = (EntityId::new(), EntityId::new());
        machine.issue_quest(giver, player, "Ashford").expect("issued");
        assert_eq!(machine.quests_for(player)[0].amount, 1);

        let effects = machine.on_world_event(&kill(player, "ZOMBIE"));
        assert_eq!(completions(&effects), 1);
        assert_eq!(machine.open_count(), 0);

        let mut machine = QuestStateMachine::seeded(vec![kill_template(0, true)], 7);
        machine.issue_quest(giver, player, "Ashford").expect("issued");
        machine.on_world_event(&kill(player, "ZOMBIE"));
        assert_eq!(machine.ready_turn_in_quests(player, giver).len(), 1);
    }

    #[test]
    fn kill_quest_auto_completes_exactly_once() {
        let mut machine = QuestStateMachine::seeded(vec![kill_template(5, false)], 7);
        let (giver, player) = (EntityId::new(), EntityId::new());
        machine.issue_quest(giver, player, "Ashford").expect("issued");

        let mut all = Vec::new();
        for _ in 0..5 {
            all.extend(machine.on_world_event(&kill(player, "zombie")));
        }
        assert_eq!(completions(&all), 1);
        assert!(machine.quests_for(player).is_empty());

        // Further kills do nothing.
        assert!(machine.on_world_event(&kill(player, "ZOMBIE")).is_empty());
    }

    #[test]
    fn reward_substitutes_player_name() {
        let mut machine = QuestStateMachine::seeded(vec![kill_template(1, false)], 1);
        let player = EntityId::new();
        machine.issue_quest(EntityId::new(), player, "Ashford");
        let effects = machine.on_world_event(&kill(player, "ZOMBIE"));
        assert!(matches!(
            &effects[0],
            QuestEffect::Completed { reward_command, .. } if reward_command == "give Steve iron_sword 1"
        ));
    }

    #[test]
    fn turn_in_quest_waits_for_giver() {
        let mut machine = QuestStateMachine::seeded(vec![kill_template(2, true)], 3);
        let (giver, player) = (EntityId::new(), EntityId::new());
        machine.issue_quest(giver, player, "Ashford");

        let mut all = machine.on_world_event(&kill(player, "ZOMBIE"));
        all.extend(machine.on_world_event(&kill(player, "ZOMBIE")));
        assert_eq!(completions(&all), 0);
        assert!(matches!(all.last(), Some(QuestEffect::ReadyToTurnIn { .. })));

        // Ready quests ignore further matching events and keep amount at zero.
        assert!(machine.on_world_event(&kill(player, "ZOMBIE")).is_empty());
        assert_eq!(machine.quests_for(player)[0].amount, 0);

        assert!(machine.ready_turn_in_quests(player, EntityId::new()).is_empty());
        let ready = machine.ready_turn_in_quests(player, giver);
        assert_eq!(ready.len(), 1);

        let done = machine.complete_quest(player, &ready[0].id, "Steve");
        assert!(matches!(done, Some(QuestEffect::Completed { .. })));
        assert!(machine.complete_quest(player, &ready[0].id, "Steve").is_none());
    }

    #[test]
    fn only_first_match_is_decremented() {
        let mut machine = QuestStateMachine::seeded(vec![kill_template(3, false)], 9);
        let player = EntityId::new();
        machine.issue_quest(EntityId::new(), player, "A");
        machine.issue_quest(EntityId::new(), player, "B");
        machine.on_world_event(&kill(player, "ZOMBIE"));
        let amounts: Vec<u32> = machine.quests_for(player).iter().map(|q| q.amount).collect();
        assert_eq!(amounts, vec![2, 3]);
    }

    #[test]
    fn wrong_kind_or_target_is_ignored() {
        let mut machine = QuestStateMachine::seeded(vec![kill_template(3, false)], 9);
        let player = EntityId::new();
        machine.issue_quest(EntityId::new(), player, "A");
        assert!(machine.on_world_event(&kill(player, "SKELETON")).is_empty());
        let pickup = ProgressEvent {
            kind: QuestKind::Fetch,
            ..kill(player, "ZOMBIE")
        };
        assert!(machine.on_world_event(&pickup).is_empty());
        assert_eq!(machine.quests_for(player)[0].amount, 3);
    }

    #[test]
    fn every_mutation_is_persisted() {
        let sink = RecordingSink::default();
        let mut machine =
            QuestStateMachine::seeded(vec![kill_template(2, false)], 5).with_sink(Box::new(sink.clone()));
        let player = EntityId::new();
        machine.issue_quest(EntityId::new(), player, "A");
        machine.on_world_event(&kill(player, "ZOMBIE"));
        machine.on_world_event(&kill(player, "ZOMBIE"));
        machine.on_world_event(&kill(player, "SKELETON"));

        let writes = sink.0.lock().expect("lock").clone();
        assert_eq!(writes, vec![(player, 1), (player, 1), (player, 0)]);
    }

    #[test]
    fn seeded_picks_are_repeatable() {
        let picks = |seed| {
            let mut machine = QuestStateMachine::seeded(QuestTemplate::builtin(), seed);
            (0..10)
                .filter_map(|_| machine.issue_quest(EntityId::new(), EntityId::new(), "V"))
                .map(|e| match e {
                    QuestEffect::Issued { quest } => quest.target,
                    other => panic!("unexpected effect {other:?}"),
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(42), picks(42));
    }

    #[test]
    fn village_token_fills_location_hint() {
        let quest = kill_template(1, false).instantiate(EntityId::new(), EntityId::new(), "Elmstead");
        assert_eq!(quest.location_hint, "Elmstead outskirts");
    }

    #[test]
    fn no_templates_issues_nothing() {
        let mut machine = QuestStateMachine::seeded(Vec::new(), 0);
        assert!(machine.issue_quest(EntityId::new(), EntityId::new(), "V").is_none());
    }
}
