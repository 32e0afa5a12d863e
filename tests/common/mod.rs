#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::oneshot;
use ticky_sync::view::declared_player_id;
use ticky_sync::{
    ApiError, ClientConfig, GameApi, GameContainer, GameSnapshot, GameStatus, JoinedGame,
    MoveRequest, PlayerInfo, ViewState,
};

pub fn config() -> ClientConfig {
    ClientConfig::new("http://localhost:8000").unwrap()
}

pub fn players() -> Vec<PlayerInfo> {
    vec![
        PlayerInfo {
            id: "p1".into(),
            name: "Ana".into(),
            marker: Some("X".into()),
        },
        PlayerInfo {
            id: "p2".into(),
            name: "Bruno".into(),
            marker: Some("O".into()),
        },
    ]
}

/// `[[X, _], [_, O]]` in progress with `current` to move.
pub fn snapshot(current: &str) -> GameSnapshot {
    GameSnapshot {
        board: vec![
            vec![Some("X".into()), None],
            vec![None, Some("O".into())],
        ],
        current_player: Some(current.into()),
        game_status: GameStatus::InProgress,
        winner: None,
        players: players(),
        player_id: None,
    }
}

pub fn finished(winner: Option<&str>) -> GameSnapshot {
    GameSnapshot {
        game_status: GameStatus::Finished,
        winner: winner.map(str::to_string),
        ..snapshot("p1")
    }
}

enum Reply {
    Snapshot(GameSnapshot),
    Fail(StatusCode),
}

struct Scripted {
    gate: Option<oneshot::Receiver<()>>,
    reply: Reply,
}

#[derive(Default)]
struct FakeState {
    current: Option<GameSnapshot>,
    fragment: String,
    script: VecDeque<Scripted>,
    fetches: Vec<String>,
    moves: Vec<(String, MoveRequest)>,
    joins: Vec<(String, String)>,
    starts: Vec<(String, String)>,
}

/// Scripted stand-in for the game server's HTTP API.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new(current: GameSnapshot) -> Arc<Self> {
        let api = Self::default();
        api.state.lock().unwrap().current = Some(current);
        Arc::new(api)
    }

    pub fn with_fragment(fragment: &str) -> Arc<Self> {
        let api = Self::default();
        api.state.lock().unwrap().fragment = fragment.to_string();
        Arc::new(api)
    }

    pub fn set_current(&self, snapshot: GameSnapshot) {
        self.state.lock().unwrap().current = Some(snapshot);
    }

    /// The next unscripted fetch waits for the returned sender before
    /// answering with `snapshot`.
    pub fn gate_next(&self, snapshot: GameSnapshot) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().unwrap().script.push_back(Scripted {
            gate: Some(rx),
            reply: Reply::Snapshot(snapshot),
        });
        tx
    }

    pub fn reply_next(&self, snapshot: GameSnapshot) {
        self.state.lock().unwrap().script.push_back(Scripted {
            gate: None,
            reply: Reply::Snapshot(snapshot),
        });
    }

    pub fn fail_next(&self, status: StatusCode) {
        self.state.lock().unwrap().script.push_back(Scripted {
            gate: None,
            reply: Reply::Fail(status),
        });
    }

    pub fn fetches(&self) -> usize {
        self.state.lock().unwrap().fetches.len()
    }

    pub fn fetched_games(&self) -> Vec<String> {
        self.state.lock().unwrap().fetches.clone()
    }

    pub fn moves(&self) -> Vec<(String, MoveRequest)> {
        self.state.lock().unwrap().moves.clone()
    }

    /// `(game_id, player_name)` per join.
    pub fn joins(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().joins.clone()
    }

    /// `(game_id, player_id)` per start.
    pub fn starts(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().starts.clone()
    }
}

#[async_trait::async_trait]
impl GameApi for FakeApi {
    async fn fetch_snapshot(&self, game_id: &str) -> Result<GameSnapshot, ApiError> {
        let next = {
            let mut state = self.state.lock().unwrap();
            state.fetches.push(game_id.to_string());
            state.script.pop_front()
        };
        match next {
            Some(Scripted { gate, reply }) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                match reply {
                    Reply::Snapshot(snapshot) => Ok(snapshot),
                    Reply::Fail(status) => Err(ApiError::Http {
                        status,
                        body: "unavailable".into(),
                    }),
                }
            }
            None => self
                .state
                .lock()
                .unwrap()
                .current
                .clone()
                .ok_or(ApiError::Http {
                    status: StatusCode::NOT_FOUND,
                    body: "Game not found".into(),
                }),
        }
    }

    async fn fetch_fragment(&self, game_id: &str) -> Result<String, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.fetches.push(game_id.to_string());
        Ok(state.fragment.clone())
    }

    async fn submit_move(&self, game_id: &str, request: &MoveRequest) -> Result<(), ApiError> {
        self.state
            .lock()
            .unwrap()
            .moves
            .push((game_id.to_string(), request.clone()));
        Ok(())
    }

    async fn join_game(&self, game_id: &str, player_name: &str) -> Result<JoinedGame, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.joins.push((game_id.to_string(), player_name.to_string()));
        Ok(JoinedGame {
            player_id: format!("p{}", state.joins.len() + 1),
            marker: Some("O".into()),
            game_status: Some(GameStatus::Waiting),
        })
    }

    async fn start_game(&self, game_id: &str, player_id: &str) -> Result<(), ApiError> {
        self.state
            .lock()
            .unwrap()
            .starts
            .push((game_id.to_string(), player_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct Recorded {
    pub views: Vec<ViewState>,
    pub fragments: Vec<String>,
    pub rebinds: usize,
    pub declared: Option<String>,
}

/// Container that remembers every mutation applied to it.
#[derive(Clone, Default)]
pub struct RecordingContainer(pub Arc<Mutex<Recorded>>);

impl RecordingContainer {
    pub fn declaring(player: &str) -> Self {
        let container = Self::default();
        container.0.lock().unwrap().declared = Some(player.to_string());
        container
    }

    pub fn views(&self) -> Vec<ViewState> {
        self.0.lock().unwrap().views.clone()
    }

    pub fn last_view(&self) -> Option<ViewState> {
        self.0.lock().unwrap().views.last().cloned()
    }

    pub fn mutations(&self) -> usize {
        let recorded = self.0.lock().unwrap();
        recorded.views.len() + recorded.fragments.len()
    }

    pub fn rebinds(&self) -> usize {
        self.0.lock().unwrap().rebinds
    }
}

impl GameContainer for RecordingContainer {
    fn declared_player_id(&self) -> Option<String> {
        self.0.lock().unwrap().declared.clone()
    }

    fn replace_fragment(&mut self, html: &str) {
        let mut recorded = self.0.lock().unwrap();
        recorded.declared = declared_player_id(html);
        recorded.fragments.push(html.to_string());
    }

    fn apply_view(&mut self, view: &ViewState) {
        self.0.lock().unwrap().views.push(view.clone());
    }

    fn rebind(&mut self) {
        self.0.lock().unwrap().rebinds += 1;
    }
}

/// Poll `condition` until it holds, failing the test after ten (virtual) seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
