//! Room runner: owns one simulation per room and routes requests, ticks and events to it.

use crate::events::Mailbox;
use crate::game::{Context, GameState, RoomMethods};
use log::{debug, info};
use shared::{GameEvent, PlayerState, Request, Response, RoomId, UserId};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound(RoomId),
}

/// Maps a decoded request onto the matching handler.
pub fn dispatch<M: RoomMethods>(
    state: &mut M,
    user_id: UserId,
    ctx: &mut Context,
    request: Request,
) -> Response {
    match request {
        Request::JoinGame => state.join_game(user_id, ctx),
        Request::SetInputs { inputs } => state.set_inputs(user_id, ctx, inputs),
        Request::Freeze => state.freeze(user_id, ctx),
        Request::StartGame => state.start_game(user_id, ctx),
    }
}

pub struct Room {
    id: RoomId,
    state: GameState,
    ctx: Context,
    mailbox: Mailbox,
    members: Vec<UserId>,
}

impl Room {
    pub fn new(id: RoomId, seed: u64) -> Self {
        let mut ctx = Context::new(seed);
        let state = GameState::initialize(&mut ctx);
        ctx.events.take();

        Self {
            id,
            state,
            ctx,
            mailbox: Mailbox::new(),
            members: Vec::new(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn members(&self) -> &[UserId] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn add_member(&mut self, user_id: UserId) {
        if !self.members.contains(&user_id) {
            self.members.push(user_id);
        }
    }

    /// Drops a member's connection. Their player record stays in the simulation.
    pub fn remove_member(&mut self, user_id: UserId) {
        self.members.retain(|member| *member != user_id);
        self.mailbox.remove(user_id);
    }

    pub fn handle_request(&mut self, user_id: UserId, request: Request, time: u64) -> Response {
        self.ctx.time = time;
        let response = dispatch(&mut self.state, user_id, &mut self.ctx, request);
        self.route_events();
        response
    }

    pub fn tick(&mut self, time: u64, time_delta: f32) {
        self.ctx.time = time;
        self.state.on_tick(&mut self.ctx, time_delta);
        self.route_events();
    }

    /// Projection for one member together with every event queued for them since their last
    /// snapshot.
    pub fn snapshot_for(&mut self, user_id: UserId) -> (PlayerState, Vec<GameEvent>) {
        (
            self.state.get_user_state(user_id),
            self.mailbox.drain(user_id),
        )
    }

    fn route_events(&mut self) {
        let events = self.ctx.events.take();
        if !events.is_empty() {
            debug!("Room {}: routing {} events", self.id, events.len());
            self.mailbox.deliver(events, &self.members);
        }
    }
}

/// All live rooms on this server.
pub struct RoomManager {
    rooms: HashMap<RoomId, Room>,
    next_room_id: RoomId,
    base_seed: Option<u64>,
}

impl RoomManager {
    /// Without a base seed every room gets a fresh random seed.
    pub fn new(base_seed: Option<u64>) -> Self {
        Self {
            rooms: HashMap::new(),
            next_room_id: 1,
            base_seed,
        }
    }

    fn seed_for(&self, room_id: RoomId) -> u64 {
        match self.base_seed {
            Some(seed) => seed.wrapping_add(room_id as u64),
            None => rand::random(),
        }
    }

    /// Adds a user to an existing room, or to a freshly created one when `room_id` is `None`.
    pub fn join(&mut self, room_id: Option<RoomId>, user_id: UserId) -> Result<RoomId, RoomError> {
        let room_id = match room_id {
            Some(id) if self.rooms.contains_key(&id) => id,
            Some(id) => return Err(RoomError::NotFound(id)),
            None => {
                let id = self.next_room_id;
                self.next_room_id += 1;
                let seed = self.seed_for(id);
                self.rooms.insert(id, Room::new(id, seed));
                info!("Room {} created", id);
                id
            }
        };

        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.add_member(user_id);
            info!(
                "User {} entered room {} ({} members)",
                user_id,
                room_id,
                room.members().len()
            );
        }
        Ok(room_id)
    }

    /// Removes a user from their room, tearing the room down once nobody is left.
    pub fn leave(&mut self, room_id: RoomId, user_id: UserId) {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        room.remove_member(user_id);

        if room.is_empty() {
            self.rooms.remove(&room_id);
            info!("Room {} closed", room_id);
        }
    }

    pub fn get(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub fn get_mut(&mut self, room_id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&room_id)
    }

    pub fn tick_all(&mut self, time: u64, time_delta: f32) {
        for room in self.rooms.values_mut() {
            room.tick(time, time_delta);
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
