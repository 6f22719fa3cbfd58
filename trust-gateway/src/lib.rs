//! HTTP API gateway for the agent trust engine.
//!
//! Exposes registration, action recording, authorization, capability tokens
//! and receipt chain verification over JSON.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod routes;
