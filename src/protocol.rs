use crate::game::types::{Point, Segment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Full own-state overwrite, sent once per simulated frame.
    #[serde(rename = "update")]
    Update {
        x: f64,
        y: f64,
        angle: f64,
        #[serde(default)]
        segments: Vec<Segment>,
        #[serde(default)]
        score: u32,
    },
    #[serde(rename = "died")]
    Died {
        #[serde(rename = "foodPositions", default)]
        food_positions: Vec<Point>,
    },
    #[serde(rename = "ateFood")]
    AteFood { food: Point },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "init")]
    Init {
        #[serde(rename = "playerId")]
        player_id: String,
        foods: Vec<FoodState>,
        players: Vec<PlayerState>,
    },
    #[serde(rename = "gameState")]
    GameState {
        #[serde(rename = "currentPlayer")]
        current_player: CurrentPlayer,
        players: Vec<RemotePlayer>,
        timestamp: i64,
    },
    #[serde(rename = "playerJoined")]
    PlayerJoined { player: PlayerState },
    #[serde(rename = "playerLeft")]
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    #[serde(rename = "playerDied")]
    PlayerDied {
        #[serde(rename = "playerId")]
        player_id: String,
        #[serde(rename = "newFoods")]
        new_foods: Vec<FoodState>,
    },
    #[serde(rename = "foodUpdate")]
    FoodUpdate {
        foods: Vec<FoodState>,
        #[serde(rename = "eatenFood", default, skip_serializing_if = "Option::is_none")]
        eaten_food: Option<Point>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub score: u32,
    #[serde(default = "default_alive")]
    pub alive: bool,
    #[serde(default)]
    pub color: String,
}

fn default_alive() -> bool {
    true
}

impl PlayerState {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPlayer {
    #[serde(flatten)]
    pub state: PlayerState,
    #[serde(rename = "isCurrentPlayer", default)]
    pub is_current_player: bool,
}

impl From<PlayerState> for CurrentPlayer {
    fn from(state: PlayerState) -> Self {
        Self {
            state,
            is_current_player: true,
        }
    }
}

/// Another peer as seen by a recipient; carries only what the recipient renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePlayer {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(rename = "isOtherPlayer", default)]
    pub is_other_player: bool,
}

impl From<&PlayerState> for RemotePlayer {
    fn from(state: &PlayerState) -> Self {
        Self {
            id: state.id.clone(),
            x: state.x,
            y: state.y,
            angle: state.angle,
            segments: state.segments.clone(),
            is_other_player: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoodState {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "fromDeadSnake", default, skip_serializing_if = "std::ops::Not::not")]
    pub from_dead_snake: bool,
}

impl FoodState {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

pub fn decode_client_message(text: &str) -> Option<ClientMessage> {
    serde_json::from_str(text).ok()
}

pub fn decode_server_message(text: &str) -> Option<ServerMessage> {
    serde_json::from_str(text).ok()
}

pub fn encode<T: Serialize>(message: &T) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(error) => {
            tracing::warn!(?error, "failed to encode message");
            None
        }
    }
}
