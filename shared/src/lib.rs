use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const MAP_WIDTH: f32 = 1000.0;
pub const MAP_HEIGHT: f32 = 800.0;
pub const GRAVITY: f32 = 400.0;
pub const PLAYER_SPEED: f32 = 200.0;
pub const JUMP_VELOCITY: f32 = -300.0;
pub const FAST_FALL_ACCELERATION: f32 = 400.0;
pub const RESPAWN_NUDGE: f32 = -1.0;
pub const PLAYER_WIDTH: f32 = 32.0;
pub const PLAYER_HEIGHT: f32 = 48.0;
pub const PLATFORM_HEIGHT: f32 = 32.0;
pub const STAR_WIDTH: f32 = 24.0;
pub const STAR_HEIGHT: f32 = 22.0;
pub const STAR_Y: f32 = 16.0;
pub const BORDER_MARGIN: f32 = 64.0;
/// Seconds a frozen player stays in place before respawning.
pub const FREEZE_DURATION: f32 = 5.0;
pub const CLIENT_VERSION: u32 = 1;

pub type UserId = u32;
pub type RoomId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum XDirection {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum YDirection {
    #[default]
    None,
    Up,
    Down,
}

/// Movement intent a player submits; the server applies whatever is current at tick time.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inputs {
    pub horizontal: XDirection,
    pub vertical: YDirection,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub id: UserId,
    pub x: f32,
    pub y: f32,
}

impl Player {
    pub fn new(id: UserId, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }

    pub fn get_bounds(&self) -> (f32, f32, f32, f32) {
        (self.x, self.y, self.x + PLAYER_WIDTH, self.y + PLAYER_HEIGHT)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Star {
    pub x: f32,
    pub y: f32,
}

/// World projection shipped to every viewer of a room.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PlayerState {
    pub players: Vec<Player>,
    pub platforms: Vec<Platform>,
    pub star: Star,
    pub start_time: Option<u64>,
    pub finish_time: Option<u64>,
}

impl PlayerState {
    pub fn player(&self, id: UserId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameEvent {
    Start,
    Finish,
    Jump,
    Frozen,
    Respawn,
}

impl GameEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameEvent::Start => "start",
            GameEvent::Finish => "finish",
            GameEvent::Jump => "jump",
            GameEvent::Frozen => "frozen",
            GameEvent::Respawn => "respawn",
        }
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized event tag: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for GameEvent {
    type Err = UnknownEvent;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "start" => Ok(GameEvent::Start),
            "finish" => Ok(GameEvent::Finish),
            "jump" => Ok(GameEvent::Jump),
            "frozen" => Ok(GameEvent::Frozen),
            "respawn" => Ok(GameEvent::Respawn),
            other => Err(UnknownEvent(other.to_string())),
        }
    }
}

/// Precondition failures returned by room request handlers.
#[derive(Debug, Error, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("Already joined")]
    AlreadyJoined,
    #[error("Player not joined")]
    NotJoined,
    #[error("Game not started")]
    NotStarted,
    #[error("Game already finished")]
    AlreadyFinished,
    #[error("Frozen")]
    Frozen,
    #[error("Too close to border")]
    TooCloseToBorder,
    #[error("Game already started")]
    AlreadyStarted,
    #[error("Platform limit reached")]
    PlatformLimit,
}

pub type Response = Result<(), RequestError>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Request {
    JoinGame,
    SetInputs { inputs: Inputs },
    Freeze,
    StartGame,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        room_id: Option<RoomId>,
    },
    Request {
        sequence: u32,
        request: Request,
    },
    Disconnect,
    /// Keeps an idle connection from timing out.
    Heartbeat,

    Connected {
        client_id: UserId,
        room_id: RoomId,
    },
    Response {
        sequence: u32,
        result: Result<(), String>,
    },
    Snapshot {
        timestamp: u64,
        state: PlayerState,
        events: Vec<String>,
    },
    Disconnected {
        reason: String,
    },
}

/// Milliseconds since the unix epoch. Tick times, snapshot timestamps and the client clock all
/// use this scale.
pub fn unix_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    millis.min(u64::MAX as u128) as u64
}

/// True when two `(left, top, right, bottom)` boxes share interior area.
pub fn check_overlap(a: (f32, f32, f32, f32), b: (f32, f32, f32, f32)) -> bool {
    let (x1, y1, x2, y2) = a;
    let (x3, y3, x4, y4) = b;

    !(x2 <= x3 || x4 <= x1 || y2 <= y3 || y4 <= y1)
}
