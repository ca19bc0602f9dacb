//! # palaver-host — Host Integration for Palaver
//!
//! Binds a game server's events to conversational NPCs, server-wide AI
//! chat and the quest economy.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────── host tick thread ────────────────────────┐
//! │  HostEvent ──► ChatRule ──► ConversationSessionManager           │
//! │                   │    └──► ServerChat                           │
//! │                   │    └──► QuestStateMachine / VillageCluster…  │
//! │   tick(now) ──────┤                                              │
//! │                   ├── Scheduler (session end, NPC resume, passes)│
//! │                   └── drains Completion<Continuation>            │
//! └───────────────────────────────▲──────────────────────────────────┘
//!                                 │ mpsc
//!                   tokio workers: AiProxyClient round trips
//! ```
//!
//! ## Modules
//!
//! - `events` — host events and their disposition
//! - `hooks` — traits the host implements (NPC control, notifications, console, world view)
//! - `scheduler` — cooperative tick timers
//! - `session` — per-player NPC conversations
//! - `server_chat` — event commentary and ad-hoc chat
//! - `feedback` — quest notifications and reward dispatch
//! - `rule` — `ChatRule`, which owns all of the above
//! - `config`, `logging` — startup helpers

pub mod config;
pub mod events;
pub mod feedback;
pub mod hooks;
pub mod logging;
pub mod rule;
pub mod scheduler;
pub mod server_chat;
pub mod session;

pub use events::{Disposition, HostEvent};
pub use hooks::{CommandDispatcher, Host, NpcControl, Notifier, Tone, WorldView};
pub use rule::ChatRule;
