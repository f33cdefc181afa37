//! # Star Jump Client Library
//!
//! The client is a thin view over the authoritative server. It never simulates physics:
//! it sends requests describing what the player wants, and draws the snapshots the server
//! broadcasts, smoothed by an interpolation buffer.
//!
//! ## Module Organization
//!
//! - `interpolation`: generic time-delayed buffer that blends between timestamped snapshots
//!   and hands out the events attached to them exactly once.
//! - `game`: connection state, clock offset estimation, and the interpolated world view.
//! - `input`: keyboard sampling, turned into `SetInputs` on change and `Freeze`/`StartGame`
//!   on key press.
//! - `network`: UDP socket on a background thread, with heartbeats and optional fake latency.
//! - `rendering`: macroquad drawing of platforms, the star, players and the HUD.
//!
//! ## Usage Example
//!
//! ```rust
//! use client::game::ClientGameState;
//! use shared::{Packet, Request};
//!
//! let mut game = ClientGameState::new(50);
//! let reply = game.handle_packet(Packet::Connected { client_id: 1, room_id: 1 }, 0);
//! assert_eq!(reply, Some(Request::JoinGame));
//! ```

pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod rendering;
