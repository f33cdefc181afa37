//! Authoritative room simulation: players, platforms, the star and the round clock.

use crate::events::EventQueue;
use crate::generator::generate_platforms;
use crate::physics::{BodyHandle, PhysicsWorld};
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shared::{
    GameEvent, Inputs, Platform, Player, PlayerState, RequestError, Response, Star, UserId,
    XDirection, YDirection, BORDER_MARGIN, FAST_FALL_ACCELERATION, FREEZE_DURATION, GRAVITY,
    JUMP_VELOCITY, MAP_HEIGHT, MAP_WIDTH, PLATFORM_HEIGHT, PLAYER_HEIGHT, PLAYER_SPEED,
    PLAYER_WIDTH, RESPAWN_NUDGE, STAR_HEIGHT, STAR_WIDTH, STAR_Y,
};

/// Per-call environment supplied by the room runner.
///
/// `time` is the tick time in milliseconds, `rng` the room's seeded random source, and `events`
/// collects notifications emitted by the call for the runner to route afterwards.
pub struct Context {
    pub time: u64,
    pub rng: ChaCha8Rng,
    pub events: EventQueue,
}

impl Context {
    pub fn new(seed: u64) -> Self {
        Self {
            time: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            events: EventQueue::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Lobby,
    RoundInProgress,
    RoundFinished,
}

/// Request surface of a room. Every handler validates before mutating and reports
/// precondition failures through [`Response`].
pub trait RoomMethods: Sized {
    fn initialize(ctx: &mut Context) -> Self;
    fn join_game(&mut self, user_id: UserId, ctx: &mut Context) -> Response;
    fn set_inputs(&mut self, user_id: UserId, ctx: &mut Context, inputs: Inputs) -> Response;
    fn freeze(&mut self, user_id: UserId, ctx: &mut Context) -> Response;
    fn start_game(&mut self, user_id: UserId, ctx: &mut Context) -> Response;
    fn get_user_state(&self, user_id: UserId) -> PlayerState;
    fn on_tick(&mut self, ctx: &mut Context, time_delta: f32);
}

#[derive(Debug, Clone, Copy)]
struct InternalPlayer {
    id: UserId,
    body: BodyHandle,
    inputs: Inputs,
    /// Seconds until a frozen player respawns; zero when not frozen.
    freeze_timer: f32,
}

#[derive(Debug, Clone, Copy)]
struct InternalPlatform {
    body: BodyHandle,
    width: f32,
}

#[derive(Debug)]
pub struct GameState {
    physics: PhysicsWorld,
    players: Vec<InternalPlayer>,
    platforms: Vec<InternalPlatform>,
    /// Platforms spawned by freezes since the round started.
    freeze_platforms: usize,
    star: BodyHandle,
    start_time: Option<u64>,
    finish_time: Option<u64>,
}

fn spawn_x<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.gen_range(0..=(MAP_WIDTH - PLAYER_WIDTH) as u32) as f32
}

const SPAWN_Y: f32 = MAP_HEIGHT - PLAYER_HEIGHT;

/// Freeze platforms allowed per round. Keeps a snapshot within one UDP datagram.
pub const MAX_FREEZE_PLATFORMS: usize = 1024;

impl GameState {
    pub fn phase(&self) -> GamePhase {
        match (self.start_time, self.finish_time) {
            (None, _) => GamePhase::Lobby,
            (Some(_), None) => GamePhase::RoundInProgress,
            (Some(_), Some(_)) => GamePhase::RoundFinished,
        }
    }

    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<u64> {
        self.finish_time
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn platform_count(&self) -> usize {
        self.platforms.len()
    }

    pub fn has_player(&self, user_id: UserId) -> bool {
        self.player_index(user_id).is_some()
    }

    pub fn is_frozen(&self, user_id: UserId) -> bool {
        self.player_index(user_id)
            .is_some_and(|index| self.players[index].freeze_timer > 0.0)
    }

    fn player_index(&self, user_id: UserId) -> Option<usize> {
        self.players.iter().position(|player| player.id == user_id)
    }

    /// Adds a static platform that collides with every current player.
    fn add_platform(&mut self, x: f32, y: f32, width: f32) {
        let body = self.physics.add_static_body(x, y, width, PLATFORM_HEIGHT);
        for player in &self.players {
            self.physics.add_collider(player.body, body);
        }
        self.platforms.push(InternalPlatform { body, width });
    }

    fn respawn<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) {
        let player = &mut self.players[index];
        player.freeze_timer = 0.0;
        self.physics.reset(player.body, spawn_x(rng), SPAWN_Y);
        self.physics.set_moves(player.body, true);
    }

    fn apply_inputs(&mut self, player: InternalPlayer, ctx: &mut Context, time_delta: f32) {
        let body = self.physics[player.body];

        match player.inputs.horizontal {
            XDirection::Left => {
                if !body.blocked.left {
                    self.physics.set_velocity_x(player.body, -PLAYER_SPEED);
                }
            }
            XDirection::Right => {
                if !body.blocked.right {
                    self.physics.set_velocity_x(player.body, PLAYER_SPEED);
                }
            }
            XDirection::None => self.physics.set_velocity_x(player.body, 0.0),
        }

        match player.inputs.vertical {
            YDirection::Up if body.blocked.down => {
                self.physics.set_velocity_y(player.body, JUMP_VELOCITY);
                ctx.events.send(player.id, GameEvent::Jump);
            }
            YDirection::Down if !body.blocked.down => {
                let velocity = body.velocity.y + FAST_FALL_ACCELERATION * time_delta;
                self.physics.set_velocity_y(player.body, velocity);
            }
            _ => {}
        }
    }

    /// True when some player would be changed by integrating the world: it is moving,
    /// airborne, or overlapping something it should be pushed out of.
    fn needs_integration(&self) -> bool {
        self.players.iter().any(|player| {
            let body = &self.physics[player.body];
            body.moves && (!body.is_at_rest() || self.physics.is_embedded(player.body))
        })
    }
}

impl RoomMethods for GameState {
    fn initialize(ctx: &mut Context) -> Self {
        let mut physics = PhysicsWorld::new(MAP_WIDTH, MAP_HEIGHT, GRAVITY);
        let star_x = ctx.rng.gen_range(0..=(MAP_WIDTH - STAR_WIDTH) as u32) as f32;
        let star = physics.add_static_body(star_x, STAR_Y, STAR_WIDTH, STAR_HEIGHT);

        Self {
            physics,
            players: Vec::new(),
            platforms: Vec::new(),
            freeze_platforms: 0,
            star,
            start_time: None,
            finish_time: None,
        }
    }

    fn join_game(&mut self, user_id: UserId, ctx: &mut Context) -> Response {
        if self.has_player(user_id) {
            return Err(RequestError::AlreadyJoined);
        }

        let body = self
            .physics
            .add_body(spawn_x(&mut ctx.rng), SPAWN_Y, PLAYER_WIDTH, PLAYER_HEIGHT);
        self.physics.set_pushable(body, false);
        self.physics.set_collide_world_bounds(body, true);
        for platform in &self.platforms {
            self.physics.add_collider(body, platform.body);
        }
        for player in &self.players {
            self.physics.add_collider(body, player.body);
        }

        self.players.push(InternalPlayer {
            id: user_id,
            body,
            inputs: Inputs::default(),
            freeze_timer: 0.0,
        });

        info!(
            "Player {} joined at ({}, {})",
            user_id, self.physics[body].x, self.physics[body].y
        );
        Ok(())
    }

    fn set_inputs(&mut self, user_id: UserId, _ctx: &mut Context, inputs: Inputs) -> Response {
        let index = self
            .player_index(user_id)
            .ok_or(RequestError::NotJoined)?;
        self.players[index].inputs = inputs;
        Ok(())
    }

    fn freeze(&mut self, user_id: UserId, ctx: &mut Context) -> Response {
        let index = self
            .player_index(user_id)
            .ok_or(RequestError::NotJoined)?;
        match self.phase() {
            GamePhase::Lobby => return Err(RequestError::NotStarted),
            GamePhase::RoundFinished => return Err(RequestError::AlreadyFinished),
            GamePhase::RoundInProgress => {}
        }

        let player = self.players[index];
        if player.freeze_timer > 0.0 {
            return Err(RequestError::Frozen);
        }
        let body = self.physics[player.body];
        if body.y < BORDER_MARGIN || body.y > MAP_HEIGHT - BORDER_MARGIN {
            return Err(RequestError::TooCloseToBorder);
        }
        if self.freeze_platforms >= MAX_FREEZE_PLATFORMS {
            return Err(RequestError::PlatformLimit);
        }

        self.add_platform(body.x, body.y, PLAYER_WIDTH);
        self.freeze_platforms += 1;
        self.physics.set_moves(player.body, false);
        self.physics.set_velocity_x(player.body, 0.0);
        self.physics.set_velocity_y(player.body, 0.0);
        self.players[index].freeze_timer = FREEZE_DURATION;
        ctx.events.send(user_id, GameEvent::Frozen);

        info!("Player {} froze at ({}, {})", user_id, body.x, body.y);
        Ok(())
    }

    fn start_game(&mut self, user_id: UserId, ctx: &mut Context) -> Response {
        if self.phase() == GamePhase::RoundInProgress {
            return Err(RequestError::AlreadyStarted);
        }

        ctx.events.broadcast(GameEvent::Start);
        self.start_time = Some(ctx.time);
        self.finish_time = None;

        for platform in self.platforms.drain(..) {
            self.physics.destroy(platform.body);
        }
        self.freeze_platforms = 0;
        for Platform { x, y, width } in generate_platforms(MAP_WIDTH, MAP_HEIGHT, &mut ctx.rng) {
            self.add_platform(x, y, width);
        }

        for index in 0..self.players.len() {
            self.respawn(index, &mut ctx.rng);
            self.physics
                .set_velocity_y(self.players[index].body, RESPAWN_NUDGE);
        }

        info!(
            "Round started by player {} with {} platforms and {} players",
            user_id,
            self.platforms.len(),
            self.players.len()
        );
        Ok(())
    }

    fn get_user_state(&self, _user_id: UserId) -> PlayerState {
        let star = &self.physics[self.star];

        PlayerState {
            players: self
                .players
                .iter()
                .map(|player| {
                    let body = &self.physics[player.body];
                    Player::new(player.id, body.x, body.y)
                })
                .collect(),
            platforms: self
                .platforms
                .iter()
                .map(|platform| {
                    let body = &self.physics[platform.body];
                    Platform {
                        x: body.x,
                        y: body.y,
                        width: platform.width,
                    }
                })
                .collect(),
            star: Star {
                x: star.x,
                y: star.y,
            },
            start_time: self.start_time,
            finish_time: self.finish_time,
        }
    }

    fn on_tick(&mut self, ctx: &mut Context, time_delta: f32) {
        for index in 0..self.players.len() {
            let player = self.players[index];

            if player.freeze_timer > 0.0 {
                let remaining = player.freeze_timer - time_delta;
                if remaining <= 0.0 {
                    self.respawn(index, &mut ctx.rng);
                    ctx.events.send(player.id, GameEvent::Respawn);
                    debug!("Player {} respawned", player.id);
                } else {
                    self.players[index].freeze_timer = remaining;
                }
            } else {
                self.apply_inputs(player, ctx, time_delta);
            }

            if self.phase() == GamePhase::RoundInProgress
                && self.physics.overlaps(player.body, self.star)
            {
                let start = self.start_time.unwrap_or(ctx.time);
                self.finish_time = Some(ctx.time.max(start));
                ctx.events.broadcast(GameEvent::Finish);
                info!(
                    "Player {} reached the star after {}ms",
                    player.id,
                    ctx.time.saturating_sub(start)
                );
            }
        }

        if self.needs_integration() {
            self.physics.update(time_delta);
        }
    }
}
