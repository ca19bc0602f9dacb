//! # palaver-llm — Inference Proxy Client for Palaver
//!
//! Every model call in Palaver goes through [`AiProxyClient`]:
//!
//! - requests always carry a structured-output schema demanding a single
//!   string field `answer`
//! - the round trip runs on a tokio worker, never on the caller's thread
//! - whatever comes back (five known body shapes, garbage, a timeout) is
//!   reduced to a plain string; failures become an empty answer
//! - exactly one [`Completion`] is delivered per call, over a channel the
//!   authoritative context drains
//!
//! ```text
//!  authoritative tick ──ask()──► tokio task ──POST──► proxy
//!        ▲                            │
//!        └──── Completion<T> ◄── resolve_body()
//! ```

pub mod client;
pub mod error;
pub mod prompt;
pub mod resolve;
pub mod stats;
pub mod types;

pub use client::{AiProxyClient, ProxyTransport};
pub use error::ProxyError;
pub use resolve::{resolve_answer, resolve_body};
pub use stats::{ProxyStats, ProxyStatsSnapshot};
pub use types::{Completion, ProxyRequest, RequestSettings, WireMessage};
