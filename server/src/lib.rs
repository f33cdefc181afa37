//! # Star Jump Server Library
//!
//! Authoritative server for Star Jump, a multiplayer platformer in which players race to a
//! star at the top of the map and can freeze themselves into temporary platforms for others
//! to climb on.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every room runs its own simulation on the server. Clients only send intents (join, inputs,
//! freeze, start) and render the snapshots they receive back.
//!
//! ### Rooms
//! A connecting client either creates a new room or enters an existing one by id. Rooms never
//! share state and are torn down when their last member leaves or times out.
//!
//! ### Snapshot Distribution
//! At a configurable cadence each client receives its room's projection, stamped with the server
//! time, together with every event queued for it since its previous snapshot.
//!
//! ## Module Organization
//!
//! - [`generator`]: random platform layout for a new round
//! - [`physics`]: arcade rigid bodies, colliders and contact flags
//! - [`events`]: event queue filled by the simulation and per-member mailboxes
//! - [`game`]: room state, request handlers and the tick rule
//! - [`room`]: request dispatch, room lifecycle and event routing
//! - [`client_manager`]: connections, request buffering and timeouts
//! - [`network`]: UDP transport and the main server loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         tick_duration: Duration::from_millis(33),
//!         snapshot_interval: 1,
//!         max_clients: 32,
//!         seed: None,
//!     };
//!     let mut server = Server::new("127.0.0.1:8080", config).await?;
//!
//!     // Runs until the packet channel closes:
//!     // - buffers requests and answers them at the next tick
//!     // - advances every room and sends each client its snapshot
//!     // - drops clients that stay silent for five seconds
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod events;
pub mod game;
pub mod generator;
pub mod network;
pub mod physics;
pub mod room;
