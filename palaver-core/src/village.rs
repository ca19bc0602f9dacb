//! Spatial grouping of NPCs into named villages.
//!
//! A pass walks every NPC once. Each unvisited NPC seeds a breadth-first
//! expansion over unvisited NPCs in the same partition that lie strictly
//! within `radius` of a member already in the cluster. The result is the set
//! of connected components of the "closer than radius" graph, so membership
//! does not depend on the order NPCs are reported in.
//!
//! Village identity is sticky: a cluster whose first member was already
//! assigned keeps that village's id and name. Quest-giver flags are redrawn
//! on every pass.

use std::collections::{HashMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::VillageConfig;
use crate::types::{EntityId, NpcPosition, VillageId};

/// Name used when the village name pool is empty.
pub const FALLBACK_VILLAGE_NAME: &str = "Unnamed Village";

/// An NPC's village membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VillageAssignment {
    /// Village identity, stable across passes.
    pub village_id: VillageId,
    /// Village name, stable across passes.
    pub name: String,
    /// Whether this NPC may issue quests until the next pass.
    pub quest_giver: bool,
}

/// One cluster produced by a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VillageCluster {
    /// Village identity.
    pub village_id: VillageId,
    /// Village name.
    pub name: String,
    /// Members in discovery order.
    pub members: Vec<EntityId>,
    /// Members chosen as quest-givers this pass.
    pub quest_givers: Vec<EntityId>,
}

/// Runs clustering passes and remembers the resulting assignments.
#[derive(Debug)]
pub struct VillageClusterAssigner {
    radius_squared: f32,
    quest_giver_fraction: f32,
    names: Vec<String>,
    name_cursor: usize,
    assignments: HashMap<EntityId, VillageAssignment>,
    rng: StdRng,
}

impl VillageClusterAssigner {
    /// Create an assigner from configuration.
    #[must_use]
    pub fn new(config: &VillageConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create an assigner with a fixed seed for quest-giver draws.
    #[must_use]
    pub fn seeded(config: &VillageConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &VillageConfig, rng: StdRng) -> Self {
        if config.names.is_empty() {
            warn!("Village name pool is empty, clusters will be named '{FALLBACK_VILLAGE_NAME}'");
        }
        Self {
            radius_squared: config.radius * config.radius,
            quest_giver_fraction: config.quest_giver_fraction.clamp(0.0, 1.0),
            names: config.names.clone(),
            name_cursor: 0,
            assignments: HashMap::new(),
            rng,
        }
    }

    /// Seed the assigner with persisted assignments.
    ///
    /// The name cursor resumes after the villages already named so a restart
    /// does not immediately hand out a name that is in use.
    pub fn restore(&mut self, assignments: HashMap<EntityId, VillageAssignment>) {
        let villages: HashSet<VillageId> = assignments.values().map(|a| a.village_id).collect();
        self.name_cursor = villages.len();
        info!(
            npcs = assignments.len(),
            villages = villages.len(),
            "Village assignments restored"
        );
        self.assignments = assignments;
    }

    /// Run one clustering pass over the NPCs the host currently reports.
    ///
    /// NPCs not present in `npcs` keep their previous assignment untouched.
    pub fn run_pass(&mut self, npcs: &[NpcPosition]) -> Vec<VillageCluster> {
        if npcs.is_empty() {
            warn!("No NPCs found, skipping village pass");
            return Vec::new();
        }

        let mut clusters = Vec::new();
        for members in self.components(npcs) {
            let (village_id, name) = match self.assignments.get(&members[0]) {
                Some(existing) => (existing.village_id, existing.name.clone()),
                None => (VillageId::new(), self.next_name()),
            };

            let mut shuffled = members.clone();
            shuffled.shuffle(&mut self.rng);
            let givers: HashSet<EntityId> = shuffled
                .into_iter()
                .take(self.quest_giver_count(members.len()))
                .collect();

            for npc in &members {
                self.assignments.insert(
                    *npc,
                    VillageAssignment {
                        village_id,
                        name: name.clone(),
                        quest_giver: givers.contains(npc),
                    },
                );
            }

            debug!(village = %name, members = members.len(), quest_givers = givers.len(), "Village assigned");
            let quest_givers = members.iter().copied().filter(|m| givers.contains(m)).collect();
            clusters.push(VillageCluster {
                village_id,
                name,
                members,
                quest_givers,
            });
        }

        info!(villages = clusters.len(), npcs = npcs.len(), "Village pass complete");
        clusters
    }

    /// Connected components, each in breadth-first discovery order.
    fn components(&self, npcs: &[NpcPosition]) -> Vec<Vec<EntityId>> {
        let mut visited = vec![false; npcs.len()];
        let mut components = Vec::new();

        for seed in 0..npcs.len() {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            let mut queue = VecDeque::from([seed]);
            let mut members = Vec::new();

            while let Some(current) = queue.pop_front() {
                members.push(npcs[current].id);
                for (other, candidate) in npcs.iter().enumerate() {
                    if !visited[other]
                        && candidate.partition == npcs[current].partition
                        && candidate.location.distance_squared(&npcs[current].location)
                            < self.radius_squared
                    {
                        visited[other] = true;
                        queue.push_back(other);
                    }
                }
            }
            components.push(members);
        }
        components
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn quest_giver_count(&self, members: usize) -> usize {
        let wanted = (members as f32 * self.quest_giver_fraction).ceil() as usize;
        wanted.clamp(1, members.max(1))
    }

    fn next_name(&mut self) -> String {
        if self.names.is_empty() {
            return FALLBACK_VILLAGE_NAME.to_string();
        }
        let name = self.names[self.name_cursor % self.names.len()].clone();
        self.name_cursor += 1;
        name
    }

    /// Current assignment of `npc`, if any pass has covered it.
    #[must_use]
    pub fn assignment(&self, npc: EntityId) -> Option<&VillageAssignment> {
        self.assignments.get(&npc)
    }

    /// Whether `npc` may issue quests.
    #[must_use]
    pub fn is_quest_giver(&self, npc: EntityId) -> bool {
        self.assignments.get(&npc).is_some_and(|a| a.quest_giver)
    }

    /// All current assignments.
    #[must_use]
    pub fn assignments(&self) -> &HashMap<EntityId, VillageAssignment> {
        &self.assignments
    }
}
