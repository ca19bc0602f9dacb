//! Turns quest effects into player-facing notifications and rewards.

use palaver_core::quest::QuestEffect;
use tracing::info;

use crate::hooks::{Host, Tone};

/// Reward confirmation shown after the directive runs.
pub const REWARD_MESSAGE: &str = "Quest complete! You earned your reward.";

/// Shown when a turn-in quest's objective is met.
pub const RETURN_MESSAGE: &str = "Return to quest giver to complete!";

/// Show each effect to its player. `Completed` dispatches its reward
/// directive here, which is the only place a reward is ever run.
pub fn apply_quest_effects<H: Host>(host: &mut H, effects: impl IntoIterator<Item = QuestEffect>) {
    for effect in effects {
        match effect {
            QuestEffect::Issued { quest } => {
                let headline = format!(
                    "New Quest: {} {}\u{00d7} {}",
                    quest.kind.label(),
                    quest.amount,
                    quest.target
                );
                host.tell(
                    quest.owner,
                    Tone::Quest,
                    &format!("{headline} near {}", quest.location_hint),
                );
                host.action_bar(quest.owner, &headline);
            }
            QuestEffect::Progress {
                player,
                target,
                remaining,
            } => {
                host.action_bar(player, &format!("Quest Progress: {remaining}\u{00d7} {target} left"));
            }
            QuestEffect::ReadyToTurnIn { player, .. } => {
                host.action_bar(player, RETURN_MESSAGE);
            }
            QuestEffect::Completed {
                player,
                quest_id,
                reward_command,
            } => {
                info!(player = %player, quest = %quest_id, command = %reward_command, "Dispatching quest reward");
                host.dispatch_console(&reward_command);
                host.action_bar(player, REWARD_MESSAGE);
                host.tell(player, Tone::Reward, REWARD_MESSAGE);
            }
        }
    }
}
