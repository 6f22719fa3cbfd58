//! Trust scoring and graduated authorization engine for autonomous agents.
//!
//! Wraps the pure models from `trust_core` with a per-agent serialised
//! orchestrator: signed, hash-chained action receipts, capability tokens,
//! and an event bus for collaborators.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod locks;
pub mod memory;
pub mod signing;
pub mod store;
pub mod token;
pub mod views;

pub use chain::{ChainFault, ChainReport, FaultKind};
pub use config::EngineConfig;
pub use engine::{TrustEngine, DEFAULT_HISTORY_LIMIT, MAX_CLOCK_SKEW_SECS};
pub use error::EngineError;
pub use events::{EventBus, TrustEvent};
pub use locks::AgentLocks;
pub use memory::MemoryStore;
pub use signing::ReceiptSigner;
pub use store::TrustStore;
pub use token::{CapabilityClaims, IssuedToken, TokenIssuer};
pub use views::{
    ActionRecord, AgentCard, AuthorizationResponse, BatchAuthorizationResponse, DashboardStats,
    ScoreFactors, TrustBreakdown,
};
