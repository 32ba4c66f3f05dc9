//! Client module - network, persistence and orchestration
//!
//! This module contains the I/O side of the player:
//! - PlayerClient: main orchestrator wiring the session to the network
//! - Connection manager thread (WebSocket, reconnect backoff)
//! - Host discovery over HTTP
//! - Configuration loading
//! - Device identity persistence
//! - Team photo encoding
//! - Logging setup

pub mod config;
pub mod discovery;
pub mod identity;
pub mod logging;
pub mod photo;
pub mod player;
pub mod websocket;

pub use player::PlayerClient;
