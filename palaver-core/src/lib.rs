//! # Palaver Core Library
//!
//! Game-agnostic state for conversational NPCs:
//!
//! - **History** — bounded, role-tagged conversation records per identity
//! - **Quests** — the per-player quest ledger and its progress state machine
//! - **Villages** — spatial clustering of NPCs into named villages with quest-givers
//! - **Persona** — personality templates and persistent display names
//! - **Placeholders** — live-state tokens resolved just before display
//! - **Persistence** — SQLite storage and the fire-and-forget write path
//!
//! Nothing in this crate performs network I/O or owns a clock. The host drives
//! every mutation from its single authoritative context.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod history;
pub mod persistence;
pub mod persona;
pub mod placeholders;
pub mod quest;
pub mod types;
pub mod village;

pub use config::PalaverConfig;
pub use error::PalaverError;
pub use history::{ConversationHistory, Role, Utterance};
pub use quest::{Quest, QuestEffect, QuestKind, QuestStateMachine};
pub use types::*;
pub use village::{VillageAssignment, VillageClusterAssigner};
