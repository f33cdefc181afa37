use crate::interpolation::{Interpolated, InterpolationBuffer};
use log::{info, warn};
use shared::{GameEvent, Packet, Player, PlayerState, Request, RoomId, UserId};

/// Blends two snapshots: players present in both move linearly, everything else comes from
/// the later snapshot as-is.
pub fn lerp_state(from: &PlayerState, to: &PlayerState, t: f32) -> PlayerState {
    let players = to
        .players
        .iter()
        .map(|target| match from.player(target.id) {
            Some(origin) => Player::new(
                target.id,
                origin.x + (target.x - origin.x) * t,
                origin.y + (target.y - origin.y) * t,
            ),
            None => target.clone(),
        })
        .collect();

    PlayerState {
        players,
        platforms: to.platforms.clone(),
        star: to.star,
        start_time: to.start_time,
        finish_time: to.finish_time,
    }
}

/// Formats a duration in milliseconds as `mm:ss`.
pub fn format_clock(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Estimates server time from local time.
///
/// The smallest observed `local - server` difference is the best bound on the clock offset,
/// since every other sample also includes network delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockSync {
    offset: Option<i64>,
}

impl ClockSync {
    pub fn observe(&mut self, local_ms: u64, server_ms: u64) {
        let sample = local_ms as i64 - server_ms as i64;
        self.offset = Some(self.offset.map_or(sample, |offset| offset.min(sample)));
    }

    pub fn server_time(&self, local_ms: u64) -> u64 {
        match self.offset {
            Some(offset) => (local_ms as i64 - offset).max(0) as u64,
            None => local_ms,
        }
    }
}

pub struct ClientGameState {
    pub client_id: Option<UserId>,
    pub room_id: Option<RoomId>,
    pub connected: bool,
    /// Reason of the most recent rejected request or disconnect.
    pub last_error: Option<String>,
    /// Created from the first snapshot so the view never blends from an empty world.
    buffer: Option<InterpolationBuffer<PlayerState, GameEvent>>,
    delay_ms: u64,
    clock: ClockSync,
    current: PlayerState,
}

impl ClientGameState {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            client_id: None,
            room_id: None,
            connected: false,
            last_error: None,
            buffer: None,
            delay_ms,
            clock: ClockSync::default(),
            current: PlayerState::default(),
        }
    }

    /// Applies a packet from the server, returning a request to send in reply if one is due.
    pub fn handle_packet(&mut self, packet: Packet, local_now: u64) -> Option<Request> {
        match packet {
            Packet::Connected { client_id, room_id } => {
                info!("Connected! Client ID: {}, room {}", client_id, room_id);
                self.client_id = Some(client_id);
                self.room_id = Some(room_id);
                self.connected = true;
                self.last_error = None;
                Some(Request::JoinGame)
            }

            Packet::Snapshot {
                timestamp,
                state,
                events,
            } => {
                self.apply_snapshot(timestamp, state, events, local_now);
                None
            }

            Packet::Response { sequence, result } => {
                if let Err(reason) = result {
                    warn!("Request {} rejected: {}", sequence, reason);
                    self.last_error = Some(reason);
                }
                None
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                self.last_error = Some(reason);
                None
            }

            _ => {
                warn!("Unexpected packet type");
                None
            }
        }
    }

    pub fn apply_snapshot(
        &mut self,
        timestamp: u64,
        state: PlayerState,
        tags: Vec<String>,
        local_now: u64,
    ) {
        let events = tags
            .iter()
            .filter_map(|tag| match tag.parse::<GameEvent>() {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Ignoring event: {}", e);
                    None
                }
            })
            .collect();

        self.clock.observe(local_now, timestamp);
        match self.buffer.as_mut() {
            Some(buffer) => buffer.enqueue(state, events, timestamp),
            None => {
                let mut buffer =
                    InterpolationBuffer::new(state.clone(), self.delay_ms, lerp_state);
                buffer.enqueue(state.clone(), events, timestamp);
                self.current = state;
                self.buffer = Some(buffer);
            }
        }
    }

    /// Advances the rendered view to `local_now` and returns the events that became due.
    pub fn update(&mut self, local_now: u64) -> Vec<GameEvent> {
        let server_now = self.clock.server_time(local_now);
        let Some(buffer) = self.buffer.as_mut() else {
            return Vec::new();
        };
        let Interpolated { state, events } = buffer.get_interpolated_state(server_now);
        self.current = state;

        for event in &events {
            match event {
                GameEvent::Start => info!("Round started"),
                GameEvent::Finish => info!("Round finished"),
                GameEvent::Frozen => info!("Frozen in place"),
                GameEvent::Respawn => info!("Respawned"),
                GameEvent::Jump => {}
            }
        }
        events
    }

    pub fn current_state(&self) -> &PlayerState {
        &self.current
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.client_id.and_then(|id| self.current.player(id))
    }

    /// Round clock in milliseconds: elapsed so far, or the final time once someone won.
    pub fn round_clock(&self, local_now: u64) -> Option<u64> {
        let start = self.current.start_time?;
        let end = self
            .current
            .finish_time
            .unwrap_or_else(|| self.clock.server_time(local_now));
        Some(end.saturating_sub(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Platform, Star};

    fn state_with(players: Vec<Player>) -> PlayerState {
        PlayerState {
            players,
            ..PlayerState::default()
        }
    }

    #[test]
    fn test_lerp_state_blends_matching_players() {
        let from = state_with(vec![Player::new(1, 0.0, 0.0)]);
        let to = state_with(vec![Player::new(1, 10.0, 20.0)]);

        let mid = lerp_state(&from, &to, 0.5);

        assert_approx_eq!(mid.players[0].x, 5.0);
        assert_approx_eq!(mid.players[0].y, 10.0);
    }

    #[test]
    fn test_lerp_state_new_player_taken_as_is() {
        let from = state_with(vec![Player::new(1, 0.0, 0.0)]);
        let to = state_with(vec![Player::new(1, 10.0, 0.0), Player::new(2, 300.0, 400.0)]);

        let mid = lerp_state(&from, &to, 0.25);

        assert_eq!(mid.players.len(), 2);
        assert_eq!(mid.player(2), Some(&Player::new(2, 300.0, 400.0)));
    }

    #[test]
    fn test_lerp_state_discrete_fields_from_later() {
        let from = PlayerState {
            platforms: vec![],
            star: Star { x: 1.0, y: 16.0 },
            start_time: None,
            ..PlayerState::default()
        };
        let to = PlayerState {
            platforms: vec![Platform {
                x: 10.0,
                y: 96.0,
                width: 64.0,
            }],
            star: Star { x: 2.0, y: 16.0 },
            start_time: Some(500),
            finish_time: Some(900),
            ..PlayerState::default()
        };

        let mid = lerp_state(&from, &to, 0.1);

        assert_eq!(mid.platforms, to.platforms);
        assert_eq!(mid.star, to.star);
        assert_eq!(mid.start_time, Some(500));
        assert_eq!(mid.finish_time, Some(900));
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(61_500), "01:01");
        assert_eq!(format_clock(600_000), "10:00");
    }

    #[test]
    fn test_clock_sync_uses_minimum_offset() {
        let mut clock = ClockSync::default();
        assert_eq!(clock.server_time(1_000), 1_000);

        clock.observe(10_080, 10_000);
        clock.observe(10_150, 10_100);
        clock.observe(10_300, 10_200);

        assert_eq!(clock.server_time(20_000), 19_950);
    }

    #[test]
    fn test_connected_requests_join() {
        let mut game = ClientGameState::new(50);

        let reply = game.handle_packet(
            Packet::Connected {
                client_id: 4,
                room_id: 2,
            },
            0,
        );

        assert_eq!(reply, Some(Request::JoinGame));
        assert!(game.connected);
        assert_eq!(game.client_id, Some(4));
        assert_eq!(game.room_id, Some(2));
    }

    #[test]
    fn test_rejected_response_recorded() {
        let mut game = ClientGameState::new(50);

        game.handle_packet(
            Packet::Response {
                sequence: 3,
                result: Err("Too close to border".to_string()),
            },
            0,
        );

        assert_eq!(game.last_error.as_deref(), Some("Too close to border"));
    }

    #[test]
    fn test_snapshots_interpolated_on_server_clock() {
        let mut game = ClientGameState::new(100);
        game.client_id = Some(1);

        // Local clock runs 5 seconds ahead of the server
        game.apply_snapshot(1_000, state_with(vec![Player::new(1, 0.0, 0.0)]), vec![], 6_000);
        game.apply_snapshot(1_100, state_with(vec![Player::new(1, 10.0, 0.0)]), vec![], 6_100);

        game.update(6_150);

        assert_approx_eq!(game.local_player().unwrap().x, 5.0, 1e-4);
    }

    #[test]
    fn test_first_snapshot_shown_without_blending_from_empty_world() {
        let mut game = ClientGameState::new(100);
        game.client_id = Some(1);
        assert!(game.update(0).is_empty());
        assert!(game.local_player().is_none());

        game.apply_snapshot(1_000, state_with(vec![Player::new(1, 40.0, 80.0)]), vec![], 1_000);
        assert_eq!(game.local_player(), Some(&Player::new(1, 40.0, 80.0)));

        // Render time is still before the snapshot's timestamp
        game.update(1_050);
        assert_eq!(game.local_player(), Some(&Player::new(1, 40.0, 80.0)));

        game.apply_snapshot(1_100, state_with(vec![Player::new(1, 50.0, 80.0)]), vec![], 1_100);
        game.update(1_150);
        assert_approx_eq!(game.local_player().unwrap().x, 45.0, 1e-4);
    }

    #[test]
    fn test_unknown_event_tags_ignored() {
        let mut game = ClientGameState::new(0);
        let tags = vec!["start".to_string(), "teleport".to_string()];

        game.apply_snapshot(1_000, PlayerState::default(), tags, 1_000);

        assert_eq!(game.update(1_000), vec![GameEvent::Start]);
        assert!(game.update(1_010).is_empty());
    }

    #[test]
    fn test_round_clock() {
        let mut game = ClientGameState::new(0);
        let running = PlayerState {
            start_time: Some(1_000),
            ..PlayerState::default()
        };
        game.apply_snapshot(1_000, running, vec![], 1_000);
        game.update(4_000);
        assert_eq!(game.round_clock(4_000), Some(3_000));

        let finished = PlayerState {
            start_time: Some(1_000),
            finish_time: Some(2_500),
            ..PlayerState::default()
        };
        game.apply_snapshot(4_100, finished, vec!["finish".to_string()], 4_100);
        game.update(9_000);
        assert_eq!(game.round_clock(9_000), Some(1_500));
    }
}
