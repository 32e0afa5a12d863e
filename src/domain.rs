//! Data model shared by the channel manager and the reconciler.

use serde::{Deserialize, Serialize};

/// One browser tab's view of a game: the game being watched and, once known,
/// which player sits at this screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub game_id: String,
    pub local_player_id: Option<String>,
}

impl Session {
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            local_player_id: None,
        }
    }

    pub fn with_player(mut self, player_id: impl Into<String>) -> Self {
        self.local_player_id = Some(player_id.into());
        self
    }

    /// Build a session from a page route such as `/game/abc` or a full URL.
    /// The game id is the last non-empty path segment.
    pub fn from_route(route: &str) -> Option<Self> {
        let path = match url::Url::parse(route) {
            Ok(url) => url.path().to_string(),
            Err(_) => route.to_string(),
        };
        let path = path.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/')
            .find(|segment| !segment.is_empty())
            .map(Session::new)
    }

    /// Two sessions share a connection when they point at the same game.
    pub fn same_game(&self, other: &Session) -> bool {
        self.game_id == other.game_id
    }
}

/// Lifecycle of a game as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    InProgress,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub marker: Option<String>,
}

/// Authoritative game state at a point in time. Never merged, only replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub board: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub current_player: Option<String>,
    #[serde(alias = "status")]
    pub game_status: GameStatus,
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub players: Vec<PlayerInfo>,
    /// Viewer identity, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
}

impl GameSnapshot {
    pub fn player(&self, id: &str) -> Option<&PlayerInfo> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Display name for a player id, falling back to the id itself.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.player(id).map(|p| p.name.as_str()).unwrap_or(id)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Option<String>> {
        self.board.get(row).and_then(|r| r.get(col))
    }
}

/// Move command sent to `POST /api/games/{id}/move`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRequest {
    pub player_id: String,
    pub row: usize,
    pub col: usize,
}

/// Seat assigned by `POST /api/games/{id}/join`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoinedGame {
    pub player_id: String,
    #[serde(default)]
    pub marker: Option<String>,
    #[serde(default)]
    pub game_status: Option<GameStatus>,
}
